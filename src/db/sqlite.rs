//! SQLite-backed nucleus store
//!
//! One connection behind an async mutex. A transaction holds the lock for its
//! whole lifetime and issues `BEGIN IMMEDIATE`, so resolutions against the same
//! store are serialized and never observe each other's uncommitted writes.

use crate::error::{NucleusError, Result};
use crate::model::{CompanyProfile, CompanyRecord, Nucleus};
use crate::store::{NucleusStore, StoreTransaction};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS nucleus (
    id TEXT PRIMARY KEY,
    canonical_name TEXT NOT NULL UNIQUE,
    display_name TEXT NOT NULL,
    variants TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS company (
    name TEXT PRIMARY KEY,
    nucleus_id TEXT NOT NULL REFERENCES nucleus(id),
    about_us TEXT,
    website TEXT,
    headquarters TEXT,
    founded TEXT,
    company_type TEXT,
    company_size TEXT,
    url TEXT,
    last_updated TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_company_nucleus_id ON company(nucleus_id);
"#;

const NUCLEUS_COLUMNS: &str = "id, canonical_name, display_name, variants, created_at, updated_at";

const COMPANY_COLUMNS: &str = "name, nucleus_id, about_us, website, headquarters, founded, \
     company_type, company_size, url, last_updated, created_at, updated_at";

/// Fixed-width so that text order is time order.
fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}

fn nucleus_from_row(row: &Row<'_>) -> rusqlite::Result<Nucleus> {
    let variants: String = row.get(3)?;
    let variants: Vec<String> = serde_json::from_str(&variants)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e)))?;
    let created_at: String = row.get(4)?;
    let updated_at: String = row.get(5)?;

    Ok(Nucleus {
        id: row.get(0)?,
        canonical_name: row.get(1)?,
        display_name: row.get(2)?,
        variants,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn company_from_row(row: &Row<'_>) -> rusqlite::Result<CompanyRecord> {
    let created_at: String = row.get(10)?;
    let updated_at: String = row.get(11)?;

    Ok(CompanyRecord {
        name: row.get(0)?,
        nucleus_id: row.get(1)?,
        profile: CompanyProfile {
            about_us: row.get(2)?,
            website: row.get(3)?,
            headquarters: row.get(4)?,
            founded: row.get(5)?,
            company_type: row.get(6)?,
            company_size: row.get(7)?,
            url: row.get(8)?,
            last_updated: row.get(9)?,
        },
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

pub struct SqliteStore {
    db: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store file and make sure the schema exists
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| NucleusError::Store(format!("Failed to open database {}: {}", path.display(), e)))?;
        info!("Opened nucleus store at {}", path.display());
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| NucleusError::Store(format!("Failed to open in-memory database: {}", e)))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| NucleusError::Store(format!("Failed to create schema: {}", e)))?;
        Ok(Self { db: Mutex::new(conn) })
    }
}

pub struct SqliteTransaction<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl<'a> SqliteTransaction<'a> {
    fn begin(conn: MutexGuard<'a, Connection>) -> Result<Self> {
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(Self { conn, finished: false })
    }
}

impl Drop for SqliteTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                warn!("Failed to roll back nucleus transaction: {}", e);
            }
        }
    }
}

#[async_trait]
impl StoreTransaction for SqliteTransaction<'_> {
    async fn find_by_canonical_name(&mut self, canonical_name: &str) -> Result<Option<Nucleus>> {
        let sql = format!("SELECT {} FROM nucleus WHERE canonical_name = ?1", NUCLEUS_COLUMNS);
        let found = self
            .conn
            .query_row(&sql, params![canonical_name], nucleus_from_row)
            .optional()?;
        Ok(found)
    }

    async fn find_by_prefix(&mut self, prefix: &str) -> Result<Vec<Nucleus>> {
        // substr keeps the comparison case-sensitive, unlike LIKE
        let sql = format!(
            "SELECT {} FROM nucleus WHERE substr(canonical_name, 1, length(?1)) = ?1 \
             ORDER BY created_at, id",
            NUCLEUS_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![prefix], nucleus_from_row)?;
        let mut nuclei = Vec::new();
        for row in rows {
            nuclei.push(row?);
        }
        Ok(nuclei)
    }

    async fn insert_nucleus(&mut self, nucleus: &Nucleus) -> Result<()> {
        let variants = serde_json::to_string(&nucleus.variants)?;
        self.conn.execute(
            r#"
            INSERT INTO nucleus (id, canonical_name, display_name, variants, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                nucleus.id,
                nucleus.canonical_name,
                nucleus.display_name,
                variants,
                format_timestamp(&nucleus.created_at),
                format_timestamp(&nucleus.updated_at),
            ],
        )?;
        Ok(())
    }

    async fn append_variant(&mut self, nucleus_id: &str, variant: &str, at: DateTime<Utc>) -> Result<bool> {
        let current: Option<String> = self
            .conn
            .query_row(
                "SELECT variants FROM nucleus WHERE id = ?1",
                params![nucleus_id],
                |row| row.get(0),
            )
            .optional()?;
        let current = current
            .ok_or_else(|| NucleusError::Store(format!("Nucleus {} does not exist", nucleus_id)))?;

        let mut variants: Vec<String> = serde_json::from_str(&current)?;
        let grew = !variants.iter().any(|v| v == variant);
        if grew {
            variants.push(variant.to_string());
        }

        self.conn.execute(
            "UPDATE nucleus SET variants = ?1, updated_at = ?2 WHERE id = ?3",
            params![serde_json::to_string(&variants)?, format_timestamp(&at), nucleus_id],
        )?;
        Ok(grew)
    }

    async fn insert_company(&mut self, name: &str, nucleus_id: &str, at: DateTime<Utc>) -> Result<bool> {
        let inserted = self.conn.execute(
            r#"
            INSERT INTO company (name, nucleus_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?3)
            ON CONFLICT(name) DO NOTHING
            "#,
            params![name, nucleus_id, format_timestamp(&at)],
        )?;
        Ok(inserted > 0)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut this = self;
        this.conn.execute_batch("COMMIT")?;
        this.finished = true;
        Ok(())
    }
}

#[async_trait]
impl NucleusStore for SqliteStore {
    async fn begin<'a>(&'a self) -> Result<Box<dyn StoreTransaction + 'a>> {
        let conn = self.db.lock().await;
        Ok(Box::new(SqliteTransaction::begin(conn)?))
    }

    async fn get_nucleus(&self, id: &str) -> Result<Option<Nucleus>> {
        let db = self.db.lock().await;
        let sql = format!("SELECT {} FROM nucleus WHERE id = ?1", NUCLEUS_COLUMNS);
        Ok(db.query_row(&sql, params![id], nucleus_from_row).optional()?)
    }

    async fn list_nuclei(&self) -> Result<Vec<Nucleus>> {
        let db = self.db.lock().await;
        let sql = format!("SELECT {} FROM nucleus ORDER BY created_at, id", NUCLEUS_COLUMNS);
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map([], nucleus_from_row)?;
        let mut nuclei = Vec::new();
        for row in rows {
            nuclei.push(row?);
        }
        Ok(nuclei)
    }

    async fn companies_for(&self, nucleus_id: &str) -> Result<Vec<CompanyRecord>> {
        let db = self.db.lock().await;
        let sql = format!(
            "SELECT {} FROM company WHERE nucleus_id = ?1 ORDER BY created_at, name",
            COMPANY_COLUMNS
        );
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map(params![nucleus_id], company_from_row)?;
        let mut companies = Vec::new();
        for row in rows {
            companies.push(row?);
        }
        Ok(companies)
    }

    async fn update_company_profile(&self, name: &str, profile: &CompanyProfile) -> Result<bool> {
        let db = self.db.lock().await;
        let updated = db.execute(
            r#"
            UPDATE company
            SET about_us = ?1,
                website = ?2,
                headquarters = ?3,
                founded = ?4,
                company_type = ?5,
                company_size = ?6,
                url = ?7,
                last_updated = ?8,
                updated_at = ?9
            WHERE name = ?10
            "#,
            params![
                profile.about_us,
                profile.website,
                profile.headquarters,
                profile.founded,
                profile.company_type,
                profile.company_size,
                profile.url,
                profile.last_updated,
                format_timestamp(&Utc::now()),
                name,
            ],
        )?;
        Ok(updated > 0)
    }

    async fn companies_missing_url(&self) -> Result<Vec<String>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare("SELECT name FROM company WHERE url IS NULL OR url = '' ORDER BY name")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut names = Vec::new();
        for row in rows {
            names.push(row?);
        }
        Ok(names)
    }

    async fn nucleus_ids_for_names(&self, names: &[String]) -> Result<Vec<String>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let db = self.db.lock().await;
        let placeholders = (1..=names.len()).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ");
        let sql = format!(
            "SELECT DISTINCT nucleus_id FROM company WHERE name IN ({}) ORDER BY nucleus_id",
            placeholders
        );
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(names.iter()), |row| row.get::<_, String>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_uncommitted_transaction_rolls_back() {
        let store = SqliteStore::open_in_memory().unwrap();
        let nucleus = Nucleus::new("Acme", "acme", Utc::now());
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_nucleus(&nucleus).await.unwrap();
            tx.insert_company("Acme", &nucleus.id, Utc::now()).await.unwrap();
        }
        assert!(store.get_nucleus(&nucleus.id).await.unwrap().is_none());
        assert!(store.companies_for(&nucleus.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_canonical_name_is_conflict() {
        let store = SqliteStore::open_in_memory().unwrap();
        let now = Utc::now();
        let mut tx = store.begin().await.unwrap();
        tx.insert_nucleus(&Nucleus::new("Acme", "acme", now)).await.unwrap();
        let mut twin = Nucleus::new("ACME", "acme", now);
        twin.id = "other".to_string();
        let err = tx.insert_nucleus(&twin).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_prefix_lookup_is_ordered_and_case_sensitive() {
        let store = SqliteStore::open_in_memory().unwrap();
        let t0 = Utc::now();
        let mut tx = store.begin().await.unwrap();
        tx.insert_nucleus(&Nucleus::new("Acme Labs", "acmelabs", t0 + chrono::Duration::seconds(1)))
            .await
            .unwrap();
        tx.insert_nucleus(&Nucleus::new("Acme", "acme", t0)).await.unwrap();
        tx.insert_nucleus(&Nucleus::new("Bacme", "bacme", t0)).await.unwrap();

        let found = tx.find_by_prefix("acme").await.unwrap();
        let names: Vec<&str> = found.iter().map(|n| n.canonical_name.as_str()).collect();
        assert_eq!(names, vec!["acme", "acmelabs"]);
        assert!(tx.find_by_prefix("ACME").await.unwrap().is_empty());
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_append_variant_dedupes() {
        let store = SqliteStore::open_in_memory().unwrap();
        let nucleus = Nucleus::new("Acme", "acme", Utc::now());
        let mut tx = store.begin().await.unwrap();
        tx.insert_nucleus(&nucleus).await.unwrap();
        assert!(tx.append_variant(&nucleus.id, "Acme Inc", Utc::now()).await.unwrap());
        assert!(!tx.append_variant(&nucleus.id, "Acme Inc", Utc::now()).await.unwrap());
        tx.commit().await.unwrap();

        let stored = store.get_nucleus(&nucleus.id).await.unwrap().unwrap();
        assert_eq!(stored.variants, vec!["Acme Inc".to_string()]);
    }

    #[tokio::test]
    async fn test_profile_enrichment_and_missing_urls() {
        let store = SqliteStore::open_in_memory().unwrap();
        let nucleus = Nucleus::new("Acme", "acme", Utc::now());
        let mut tx = store.begin().await.unwrap();
        tx.insert_nucleus(&nucleus).await.unwrap();
        assert!(tx.insert_company("Acme", &nucleus.id, Utc::now()).await.unwrap());
        assert!(!tx.insert_company("Acme", &nucleus.id, Utc::now()).await.unwrap());
        tx.insert_company("Acme Inc", &nucleus.id, Utc::now()).await.unwrap();
        tx.commit().await.unwrap();

        let profile = CompanyProfile {
            url: Some("https://www.linkedin.com/company/acme/".to_string()),
            website: Some("https://acme.example".to_string()),
            ..Default::default()
        };
        assert!(store.update_company_profile("Acme", &profile).await.unwrap());
        assert!(!store.update_company_profile("Nobody", &profile).await.unwrap());

        assert_eq!(store.companies_missing_url().await.unwrap(), vec!["Acme Inc".to_string()]);
        let ids = store
            .nucleus_ids_for_names(&["Acme".to_string(), "Acme Inc".to_string()])
            .await
            .unwrap();
        assert_eq!(ids, vec![nucleus.id.clone()]);

        let companies = store.companies_for(&nucleus.id).await.unwrap();
        let acme = companies.iter().find(|c| c.name == "Acme").unwrap();
        assert_eq!(acme.profile.website.as_deref(), Some("https://acme.example"));
    }

    #[tokio::test]
    async fn test_file_store_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nucleus.db");
        let nucleus = Nucleus::new("Acme", "acme", Utc::now());
        {
            let store = SqliteStore::open(&path).unwrap();
            let mut tx = store.begin().await.unwrap();
            tx.insert_nucleus(&nucleus).await.unwrap();
            tx.commit().await.unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        let stored = store.get_nucleus(&nucleus.id).await.unwrap().unwrap();
        assert_eq!(stored.canonical_name, "acme");
        assert_eq!(stored.created_at, nucleus.created_at);
    }
}
