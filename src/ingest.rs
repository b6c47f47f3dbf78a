//! Batch ingestion of scraped company names
//!
//! Reads a CSV export (one company per row), resolves each distinct name in
//! order and tallies the outcome. Rows are resolved sequentially; each row is
//! its own resolution transaction, so an abort leaves earlier rows committed.

use crate::error::{NucleusError, Result};
use crate::model::Classification;
use crate::resolver::NucleusResolver;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

/// What to do when a row fails with a store error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorPolicy {
    /// Record the failure and continue with the next row
    Skip,
    /// Stop the batch and return the error
    Abort,
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Header of the column holding company names
    pub column: String,
    pub on_error: ErrorPolicy,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            column: "Company".to_string(),
            on_error: ErrorPolicy::Skip,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestFailure {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub exact: usize,
    pub variant: usize,
    pub new: usize,
    /// Rows with unusable names
    pub skipped: usize,
    /// Rows repeating a name already handled in this batch
    pub duplicates: usize,
    pub failures: Vec<IngestFailure>,
}

impl BatchReport {
    pub fn resolved(&self) -> usize {
        self.exact + self.variant + self.new
    }

    fn record(&mut self, classification: Classification) {
        match classification {
            Classification::Exact => self.exact += 1,
            Classification::Variant => self.variant += 1,
            Classification::New => self.new += 1,
        }
    }
}

pub struct BatchIngestor<'a> {
    resolver: &'a NucleusResolver,
    options: IngestOptions,
}

impl<'a> BatchIngestor<'a> {
    pub fn new(resolver: &'a NucleusResolver, options: IngestOptions) -> Self {
        Self { resolver, options }
    }

    pub async fn ingest_path(&self, path: impl AsRef<Path>) -> Result<BatchReport> {
        let path = path.as_ref();
        info!("Ingesting company names from {}", path.display());
        let file = std::fs::File::open(path)?;
        self.ingest_reader(file).await
    }

    pub async fn ingest_reader<R: Read>(&self, reader: R) -> Result<BatchReport> {
        let names = self.read_names(reader)?;
        self.ingest_names(names).await
    }

    fn read_names<R: Read>(&self, reader: R) -> Result<Vec<String>> {
        let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        let column = headers
            .iter()
            .position(|h| h.trim() == self.options.column)
            .ok_or_else(|| {
                NucleusError::InvalidInput(format!(
                    "column '{}' not found in headers {:?}",
                    self.options.column,
                    headers.iter().collect::<Vec<_>>()
                ))
            })?;

        let mut names = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            names.push(record.get(column).unwrap_or_default().to_string());
        }
        Ok(names)
    }

    /// Resolve names in order, once per distinct trimmed spelling.
    pub async fn ingest_names<I>(&self, names: I) -> Result<BatchReport>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut report = BatchReport::default();
        let mut seen: HashSet<String> = HashSet::new();

        for name in names {
            let name = name.as_ref().trim();
            if !seen.insert(name.to_string()) {
                report.duplicates += 1;
                continue;
            }

            match self.resolver.resolve(name).await {
                Ok(resolution) => report.record(resolution.classification),
                Err(NucleusError::InvalidInput(reason)) => {
                    warn!("Skipping company row: {}", reason);
                    report.skipped += 1;
                }
                Err(err) if self.options.on_error == ErrorPolicy::Skip && err.is_record_level() => {
                    warn!(name = %name, "Failed to resolve company: {}", err);
                    report.failures.push(IngestFailure {
                        name: name.to_string(),
                        error: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            resolved = report.resolved(),
            exact = report.exact,
            variant = report.variant,
            new = report.new,
            skipped = report.skipped,
            duplicates = report.duplicates,
            failed = report.failures.len(),
            "Batch ingestion finished"
        );
        Ok(report)
    }
}
