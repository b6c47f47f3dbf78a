//! Nucleus resolution
//!
//! Maps a raw company name to the canonical id of the company it denotes:
//! 1. exact match on the normalized name
//! 2. fuzzy match among nuclei sharing the name's prefix key
//! 3. otherwise a new nucleus
//!
//! Every attempt runs in one store transaction. Two neighborhoods can only
//! overlap when their prefix keys start with the same character, so in-process
//! resolutions are serialized on a fixed set of lock stripes keyed by that
//! character. Across processes the store's unique index on `canonical_name`
//! decides creation races and the loser starts over.

use crate::config::ResolverConfig;
use crate::error::{NucleusError, Result};
use crate::matcher::CandidateMatcher;
use crate::model::{Classification, Nucleus, Resolution};
use crate::normalize::NameKey;
use crate::store::NucleusStore;
use chrono::Utc;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct NucleusResolver {
    store: Arc<dyn NucleusStore>,
    matcher: CandidateMatcher,
    config: ResolverConfig,
    /// Lock stripes indexed by the leading character of the prefix key
    neighborhoods: Vec<Mutex<()>>,
}

const NEIGHBORHOOD_STRIPES: usize = 64;

fn neighborhood_stripes() -> Vec<Mutex<()>> {
    (0..NEIGHBORHOOD_STRIPES).map(|_| Mutex::new(())).collect()
}

/// Stripe guarding every neighborhood whose prefix starts like `prefix`.
fn neighborhood_index(prefix: &str) -> usize {
    let mut hasher = DefaultHasher::new();
    prefix.chars().next().hash(&mut hasher);
    (hasher.finish() % NEIGHBORHOOD_STRIPES as u64) as usize
}

impl NucleusResolver {
    pub fn new(store: Arc<dyn NucleusStore>) -> Self {
        let config = ResolverConfig::default();
        Self {
            store,
            matcher: CandidateMatcher::new(config.similarity_threshold),
            config,
            neighborhoods: neighborhood_stripes(),
        }
    }

    pub fn with_config(store: Arc<dyn NucleusStore>, config: ResolverConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            matcher: CandidateMatcher::new(config.similarity_threshold),
            config,
            neighborhoods: neighborhood_stripes(),
        })
    }

    pub fn store(&self) -> &Arc<dyn NucleusStore> {
        &self.store
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve `raw_name` to a canonical id, creating a nucleus if nothing matches.
    pub async fn resolve(&self, raw_name: &str) -> Result<Resolution> {
        let key = NameKey::from_raw(raw_name, self.config.prefix_words)?;

        let _guard = self.neighborhoods[neighborhood_index(&key.prefix)].lock().await;

        let mut retries = 0;
        loop {
            match self.resolve_once(&key).await {
                Err(NucleusError::Conflict(msg)) => {
                    if retries >= self.config.max_conflict_retries {
                        return Err(NucleusError::Store(format!(
                            "gave up resolving '{}' after {} conflicting writes: {}",
                            key.raw,
                            retries + 1,
                            msg
                        )));
                    }
                    retries += 1;
                    warn!(
                        name = %key.raw,
                        attempt = retries,
                        "Nucleus write conflicted with a concurrent resolution, retrying"
                    );
                }
                other => return other,
            }
        }
    }

    async fn resolve_once(&self, key: &NameKey) -> Result<Resolution> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;

        if let Some(existing) = tx.find_by_canonical_name(&key.normalized).await? {
            tx.insert_company(&key.raw, &existing.id, now).await?;
            tx.commit().await?;
            debug!(name = %key.raw, id = %existing.id, "Exact nucleus match");
            return Ok(Resolution::new(existing.id, Classification::Exact));
        }

        let candidates = tx.find_by_prefix(&key.prefix).await?;
        debug!(
            name = %key.raw,
            prefix = %key.prefix,
            candidates = candidates.len(),
            "Scoring prefix candidates"
        );

        if let Some(found) = self.matcher.best_match(&key.normalized, candidates) {
            let id = found.nucleus.id;
            let grew = tx.append_variant(&id, &key.raw, now).await?;
            tx.insert_company(&key.raw, &id, now).await?;
            tx.commit().await?;
            info!(
                name = %key.raw,
                id = %id,
                matched = %found.nucleus.canonical_name,
                score = found.score,
                new_variant = grew,
                "Matched nucleus variant"
            );
            return Ok(Resolution::new(id, Classification::Variant));
        }

        let nucleus = Nucleus::new(&key.raw, &key.normalized, now);
        tx.insert_nucleus(&nucleus).await?;
        tx.insert_company(&key.raw, &nucleus.id, now).await?;
        tx.commit().await?;
        info!(name = %key.raw, id = %nucleus.id, "Created nucleus");
        Ok(Resolution::new(nucleus.id, Classification::New))
    }
}
