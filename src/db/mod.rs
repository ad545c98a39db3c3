//! Database layer
//!
//! MongoDB storage for taxonomy nodes, hierarchy edges and model info, plus an
//! in-memory store with the same behaviour for tests and dev mode.

pub mod memory;
pub mod mongo;
pub mod mongo_store;
pub mod schemas;
pub mod store;

pub use memory::InMemoryTaxonomyStore;
pub use mongo::{BulkInsertReport, IntoIndexes, MongoClient, MongoCollection, Timestamped};
pub use mongo_store::MongoTaxonomyStore;
pub use schemas::{EdgeEndpoint, HierarchyEdge, ModelInfo, TaxonomyNode, MODEL_INFO_COLLECTION};
pub use store::{EdgeQuery, PageEntry, PageQuery, TaxonomyStore};
