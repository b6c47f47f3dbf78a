use crate::code::generate_nucleus_code;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical record for one real-world company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nucleus {
    /// Base-62 canonical code of `canonical_name`; never reassigned
    pub id: String,

    /// Lowercase alphanumeric-only form
    pub canonical_name: String,

    /// First spelling that created this nucleus
    pub display_name: String,

    /// Other raw spellings matched to this nucleus, in order first seen
    pub variants: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Nucleus {
    pub fn new(display_name: &str, canonical_name: &str, at: DateTime<Utc>) -> Self {
        Self {
            id: generate_nucleus_code(canonical_name),
            canonical_name: canonical_name.to_string(),
            display_name: display_name.to_string(),
            variants: Vec::new(),
            created_at: at,
            updated_at: at,
        }
    }

    pub fn has_variant(&self, variant: &str) -> bool {
        self.variants.iter().any(|v| v == variant)
    }
}

/// Enrichment fields filled in after resolution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub about_us: Option<String>,
    pub website: Option<String>,
    pub headquarters: Option<String>,
    pub founded: Option<String>,
    pub company_type: Option<String>,
    pub company_size: Option<String>,
    pub url: Option<String>,
    pub last_updated: Option<String>,
}

/// Projection row: one observed raw name and the nucleus it resolved to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub name: String,
    pub nucleus_id: String,
    #[serde(flatten)]
    pub profile: CompanyProfile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// Normalized name equals an existing canonical name
    Exact,
    /// Fuzzy match against an existing nucleus
    Variant,
    /// A nucleus was created
    New,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Classification::Exact => "exact",
            Classification::Variant => "variant",
            Classification::New => "new",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub canonical_id: String,
    pub classification: Classification,
}

impl Resolution {
    pub fn new(canonical_id: impl Into<String>, classification: Classification) -> Self {
        Self {
            canonical_id: canonical_id.into(),
            classification,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_nucleus_uses_canonical_code() {
        let now = Utc::now();
        let nucleus = Nucleus::new("Tower Research", "towerresearch", now);
        assert_eq!(nucleus.id, generate_nucleus_code("towerresearch"));
        assert!(nucleus.variants.is_empty());
        assert_eq!(nucleus.created_at, nucleus.updated_at);
    }

    #[test]
    fn test_classification_serializes_lowercase() {
        let resolution = Resolution::new("abc", Classification::Variant);
        let json = serde_json::to_string(&resolution).unwrap();
        assert_eq!(json, r#"{"canonical_id":"abc","classification":"variant"}"#);
    }
}
