//! PostgreSQL-backed nucleus store
//!
//! Each resolution runs in its own pooled transaction. The unique index on
//! `canonical_name` is what arbitrates two processes creating the same nucleus
//! at once; the loser sees `NucleusError::Conflict`.

use crate::error::{NucleusError, Result};
use crate::model::{CompanyProfile, CompanyRecord, Nucleus};
use crate::store::{NucleusStore, StoreTransaction};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::info;

const SCHEMA: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS nucleus (
        id TEXT PRIMARY KEY,
        canonical_name TEXT NOT NULL UNIQUE,
        display_name TEXT NOT NULL,
        variants TEXT[] NOT NULL DEFAULT '{}',
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
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
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_company_nucleus_id ON company(nucleus_id)",
];

const NUCLEUS_COLUMNS: &str = "id, canonical_name, display_name, variants, created_at, updated_at";

const COMPANY_COLUMNS: &str = "name, nucleus_id, about_us, website, headquarters, founded, \
     company_type, company_size, url, last_updated, created_at, updated_at";

fn nucleus_from_row(row: &PgRow) -> Result<Nucleus> {
    Ok(Nucleus {
        id: row.try_get("id")?,
        canonical_name: row.try_get("canonical_name")?,
        display_name: row.try_get("display_name")?,
        variants: row.try_get("variants")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn company_from_row(row: &PgRow) -> Result<CompanyRecord> {
    Ok(CompanyRecord {
        name: row.try_get("name")?,
        nucleus_id: row.try_get("nucleus_id")?,
        profile: CompanyProfile {
            about_us: row.try_get("about_us")?,
            website: row.try_get("website")?,
            headquarters: row.try_get("headquarters")?,
            founded: row.try_get("founded")?,
            company_type: row.try_get("company_type")?,
            company_size: row.try_get("company_size")?,
            url: row.try_get("url")?,
            last_updated: row.try_get("last_updated")?,
        },
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the nucleus and company tables if they do not exist
    pub async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Nucleus schema ready");
        Ok(())
    }
}

pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn find_by_canonical_name(&mut self, canonical_name: &str) -> Result<Option<Nucleus>> {
        let sql = format!("SELECT {} FROM nucleus WHERE canonical_name = $1", NUCLEUS_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(canonical_name)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(nucleus_from_row).transpose()
    }

    async fn find_by_prefix(&mut self, prefix: &str) -> Result<Vec<Nucleus>> {
        let sql = format!(
            "SELECT {} FROM nucleus WHERE left(canonical_name, char_length($1)) = $1 \
             ORDER BY created_at, id",
            NUCLEUS_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(prefix)
            .fetch_all(&mut *self.tx)
            .await?;
        rows.iter().map(nucleus_from_row).collect()
    }

    async fn insert_nucleus(&mut self, nucleus: &Nucleus) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO nucleus (id, canonical_name, display_name, variants, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&nucleus.id)
        .bind(&nucleus.canonical_name)
        .bind(&nucleus.display_name)
        .bind(&nucleus.variants)
        .bind(nucleus.created_at)
        .bind(nucleus.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn append_variant(&mut self, nucleus_id: &str, variant: &str, at: DateTime<Utc>) -> Result<bool> {
        // FOR UPDATE: concurrent appends to one nucleus must not lose each other
        let grew: Option<bool> = sqlx::query_scalar(
            "SELECT NOT ($2 = ANY(variants)) FROM nucleus WHERE id = $1 FOR UPDATE",
        )
        .bind(nucleus_id)
        .bind(variant)
        .fetch_optional(&mut *self.tx)
        .await?;
        let grew = grew.ok_or_else(|| {
            NucleusError::Store(format!("Nucleus {} does not exist", nucleus_id))
        })?;

        sqlx::query(
            r#"
            UPDATE nucleus
            SET variants = CASE WHEN $2 = ANY(variants) THEN variants ELSE array_append(variants, $2) END,
                updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(nucleus_id)
        .bind(variant)
        .bind(at)
        .execute(&mut *self.tx)
        .await?;
        Ok(grew)
    }

    async fn insert_company(&mut self, name: &str, nucleus_id: &str, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO company (name, nucleus_id, created_at, updated_at)
            VALUES ($1, $2, $3, $3)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(nucleus_id)
        .bind(at)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl NucleusStore for PgStore {
    async fn begin<'a>(&'a self) -> Result<Box<dyn StoreTransaction + 'a>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx }))
    }

    async fn get_nucleus(&self, id: &str) -> Result<Option<Nucleus>> {
        let sql = format!("SELECT {} FROM nucleus WHERE id = $1", NUCLEUS_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(nucleus_from_row).transpose()
    }

    async fn list_nuclei(&self) -> Result<Vec<Nucleus>> {
        let sql = format!("SELECT {} FROM nucleus ORDER BY created_at, id", NUCLEUS_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(nucleus_from_row).collect()
    }

    async fn companies_for(&self, nucleus_id: &str) -> Result<Vec<CompanyRecord>> {
        let sql = format!(
            "SELECT {} FROM company WHERE nucleus_id = $1 ORDER BY created_at, name",
            COMPANY_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(nucleus_id).fetch_all(&self.pool).await?;
        rows.iter().map(company_from_row).collect()
    }

    async fn update_company_profile(&self, name: &str, profile: &CompanyProfile) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE company
            SET about_us = $1,
                website = $2,
                headquarters = $3,
                founded = $4,
                company_type = $5,
                company_size = $6,
                url = $7,
                last_updated = $8,
                updated_at = NOW()
            WHERE name = $9
            "#,
        )
        .bind(&profile.about_us)
        .bind(&profile.website)
        .bind(&profile.headquarters)
        .bind(&profile.founded)
        .bind(&profile.company_type)
        .bind(&profile.company_size)
        .bind(&profile.url)
        .bind(&profile.last_updated)
        .bind(name)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn companies_missing_url(&self) -> Result<Vec<String>> {
        let names = sqlx::query_scalar("SELECT name FROM company WHERE url IS NULL OR url = '' ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }

    async fn nucleus_ids_for_names(&self, names: &[String]) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar(
            "SELECT DISTINCT nucleus_id FROM company WHERE name = ANY($1) ORDER BY nucleus_id",
        )
        .bind(names)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}
