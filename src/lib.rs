pub mod code;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod resolver;
pub mod similarity;
pub mod store;

pub use error::{NucleusError, Result};
pub use model::{Classification, CompanyProfile, CompanyRecord, Nucleus, Resolution};
pub use resolver::NucleusResolver;
pub use store::{NucleusStore, StoreTransaction};
