//! Environment-driven configuration
//!
//! `.env` is loaded first, then:
//! - `DATABASE_URL` picks the store (`postgres://`/`postgresql://` or a SQLite path,
//!   optionally prefixed with `sqlite:`)
//! - otherwise `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASSWORD`, `DB_NAME` build a
//!   Postgres URL when `DB_HOST` is set
//! - otherwise `NUCLEUS_SQLITE_PATH` (default `nucleus.db`)

use crate::error::{NucleusError, Result};
use crate::matcher::DEFAULT_SIMILARITY_THRESHOLD;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_SQLITE_PATH: &str = "nucleus.db";
const DEFAULT_PG_PORT: u16 = 5433;
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Knobs of the resolution algorithm
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverConfig {
    /// Minimum similarity ratio for a fuzzy match, inclusive
    pub similarity_threshold: f64,
    /// Leading words that form the candidate prefix key
    pub prefix_words: usize,
    /// Fresh attempts after losing a nucleus-creation race
    pub max_conflict_retries: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            prefix_words: 2,
            max_conflict_retries: 3,
        }
    }
}

impl ResolverConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(NucleusError::Config(format!(
                "similarity threshold must be within [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if self.prefix_words == 0 {
            return Err(NucleusError::Config("prefix words must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreBackend {
    Postgres { url: String, max_connections: u32 },
    Sqlite { path: PathBuf },
}

impl StoreBackend {
    pub fn from_url(url: &str, max_connections: u32) -> Self {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            return StoreBackend::Postgres {
                url: url.to_string(),
                max_connections,
            };
        }
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(url);
        StoreBackend::Sqlite {
            path: PathBuf::from(path),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub store: StoreBackend,
    /// Pool size used whenever a Postgres store is opened
    pub max_connections: u32,
    pub resolver: ResolverConfig,
    pub log_level: String,
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map_err(|_| NucleusError::Config(format!("{} has an invalid value '{}'", name, value))),
        _ => Ok(default),
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_env()
    }

    /// Read the current process environment without touching `.env`
    pub fn from_env() -> Result<Self> {
        let max_connections = parse_var("DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;

        let store = if let Ok(url) = env::var("DATABASE_URL") {
            StoreBackend::from_url(&url, max_connections)
        } else if let Ok(host) = env::var("DB_HOST") {
            let port = parse_var("DB_PORT", DEFAULT_PG_PORT)?;
            let user = env::var("DB_USER").unwrap_or_else(|_| "postgres".to_string());
            let password = env::var("DB_PASSWORD").unwrap_or_default();
            let database = env::var("DB_NAME").unwrap_or_else(|_| "scraperdb".to_string());
            let credentials = if password.is_empty() {
                user
            } else {
                format!("{}:{}", user, password)
            };
            StoreBackend::Postgres {
                url: format!("postgresql://{}@{}:{}/{}", credentials, host, port, database),
                max_connections,
            }
        } else {
            let path = env::var("NUCLEUS_SQLITE_PATH").unwrap_or_else(|_| DEFAULT_SQLITE_PATH.to_string());
            StoreBackend::Sqlite { path: PathBuf::from(path) }
        };

        let defaults = ResolverConfig::default();
        let resolver = ResolverConfig {
            similarity_threshold: parse_var("NUCLEUS_SIMILARITY_THRESHOLD", defaults.similarity_threshold)?,
            prefix_words: parse_var("NUCLEUS_PREFIX_WORDS", defaults.prefix_words)?,
            max_conflict_retries: parse_var("NUCLEUS_CONFLICT_RETRIES", defaults.max_conflict_retries)?,
        };
        resolver.validate()?;

        let log_level = env::var("NUCLEUS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            store,
            max_connections,
            resolver,
            log_level,
        })
    }
}
