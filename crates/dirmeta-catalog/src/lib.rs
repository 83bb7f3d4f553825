#![warn(missing_docs)]

//! dirmeta catalog: typed directory metadata with inheritance, metadata sets, queries and facets

pub mod catalog;
pub mod config;
pub mod dirmeta;
pub mod error;
pub mod facet;
pub mod kvstore;
pub mod locking;
pub mod maintenance;
pub mod metaset;
pub mod metrics;
pub mod query;
pub mod registry;
pub mod tables;
pub mod telemetry;
pub mod tree;
pub mod types;

pub use catalog::MetadataCatalog;
pub use config::CatalogConfig;
pub use dirmeta::{DirectoryMetadata, RemovalReport, SetOutcome};
pub use error::{CatalogError, CatalogResult, CatalogWarning, ConflictKind, SetConflictKind};
pub use kvstore::{KvStore, MemoryKvStore};
pub use maintenance::{FieldCreation, PromotionReport};
pub use query::{parse_query, CompareOp, Condition, Operand, Predicate, Query, Selection};
pub use registry::Declared;
pub use tree::{DirectoryTree, MemoryDirectoryTree};
pub use types::{Credentials, DirId, FieldValue, MetaValue, Ownership, SetId};
