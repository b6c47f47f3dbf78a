//! Store handles consumed by the resolver
//!
//! A `NucleusStore` owns the canonical-entity table and the company projection.
//! Each resolution runs inside one `StoreTransaction`: reads, the canonical
//! write and the projection write commit together or not at all. Dropping a
//! transaction without calling `commit` rolls it back.

use crate::error::Result;
use crate::model::{CompanyProfile, CompanyRecord, Nucleus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait StoreTransaction: Send {
    async fn find_by_canonical_name(&mut self, canonical_name: &str) -> Result<Option<Nucleus>>;

    /// All nuclei whose canonical name starts with `prefix`.
    async fn find_by_prefix(&mut self, prefix: &str) -> Result<Vec<Nucleus>>;

    /// Fails with `NucleusError::Conflict` when the id or canonical name exists.
    async fn insert_nucleus(&mut self, nucleus: &Nucleus) -> Result<()>;

    /// Add `variant` unless already recorded and bump `updated_at`.
    ///
    /// Returns whether the variant list grew.
    async fn append_variant(&mut self, nucleus_id: &str, variant: &str, at: DateTime<Utc>) -> Result<bool>;

    /// Record a projection row for `name`; a name already projected is left as is.
    ///
    /// Returns whether a row was inserted.
    async fn insert_company(&mut self, name: &str, nucleus_id: &str, at: DateTime<Utc>) -> Result<bool>;

    /// Make every write of this transaction visible and release it.
    async fn commit(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait NucleusStore: Send + Sync {
    async fn begin<'a>(&'a self) -> Result<Box<dyn StoreTransaction + 'a>>;

    async fn get_nucleus(&self, id: &str) -> Result<Option<Nucleus>>;

    async fn list_nuclei(&self) -> Result<Vec<Nucleus>>;

    async fn companies_for(&self, nucleus_id: &str) -> Result<Vec<CompanyRecord>>;

    /// Fill enrichment columns of the projection row for `name`.
    async fn update_company_profile(&self, name: &str, profile: &CompanyProfile) -> Result<bool>;

    /// Projected names with no url yet.
    async fn companies_missing_url(&self) -> Result<Vec<String>>;

    /// Distinct nucleus ids referenced by the given projected names.
    async fn nucleus_ids_for_names(&self, names: &[String]) -> Result<Vec<String>>;
}
