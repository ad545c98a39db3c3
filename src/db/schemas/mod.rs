//! Database schemas
//!
//! Defines MongoDB document structures for taxonomy nodes, hierarchy edges
//! and models.

mod hierarchy;
mod model_info;
mod node;

pub use hierarchy::{EdgeEndpoint, HierarchyEdge};
pub use model_info::{ModelInfo, MODEL_INFO_COLLECTION};
pub use node::TaxonomyNode;
