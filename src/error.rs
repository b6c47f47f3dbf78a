use thiserror::Error;

#[derive(Error, Debug)]
pub enum NucleusError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Store error: {0}")]
    Store(String),

    /// A uniqueness constraint rejected a write; another writer got there first.
    #[error("Store conflict: {0}")]
    Conflict(String),

    #[error("Invalid canonical code: {0}")]
    InvalidCode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NucleusError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, NucleusError::Conflict(_))
    }

    /// Errors a batch driver may skip past without aborting the run.
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            NucleusError::InvalidInput(_) | NucleusError::Store(_) | NucleusError::Conflict(_)
        )
    }
}

impl From<rusqlite::Error> for NucleusError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ref failure, _) = err {
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            {
                return NucleusError::Conflict(err.to_string());
            }
        }
        NucleusError::Store(err.to_string())
    }
}

impl From<sqlx::Error> for NucleusError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                return NucleusError::Conflict(err.to_string());
            }
        }
        NucleusError::Store(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NucleusError>;
