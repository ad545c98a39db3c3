//! Storage seam for the taxonomy
//!
//! Repositories talk to a [`TaxonomyStore`]; MongoDB backs it in production,
//! an in-memory store backs tests and database-less dev mode.

use bson::{oid::ObjectId, DateTime};

use crate::db::schemas::{HierarchyEdge, ModelInfo, TaxonomyNode};
use crate::taxonomy::{ObjectType, Position, RelationFamily};
use crate::types::Result;

/// One page request against a variant collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    pub model_id: ObjectId,
    /// Only return documents strictly after this id in traversal order
    pub after: Option<ObjectId>,
    pub descending: bool,
    /// Number of documents to fetch (callers over-fetch by one)
    pub limit: i64,
}

/// One slot of a page window. A document that does not decode keeps its
/// slot with `node: None`, so the window size and the cursor position still
/// count it.
#[derive(Debug, Clone, PartialEq)]
pub struct PageEntry {
    pub id: ObjectId,
    pub created_at: DateTime,
    pub node: Option<TaxonomyNode>,
}

impl PageEntry {
    /// Slot for a decoded node; `None` when the node has no id
    pub fn readable(node: TaxonomyNode) -> Option<Self> {
        Some(Self {
            id: node.id?,
            created_at: node.created_at,
            node: Some(node),
        })
    }
}

/// Edges where a given node sits at `position`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeQuery {
    pub model_id: ObjectId,
    pub position: Position,
    pub object_type: ObjectType,
    pub id: ObjectId,
}

impl EdgeQuery {
    /// Edges naming the node as child, i.e. its parent edges
    pub fn parents_of(model_id: ObjectId, object_type: ObjectType, id: ObjectId) -> Self {
        Self {
            model_id,
            position: Position::Child,
            object_type,
            id,
        }
    }

    /// Edges naming the node as parent, i.e. its child edges
    pub fn children_of(model_id: ObjectId, object_type: ObjectType, id: ObjectId) -> Self {
        Self {
            model_id,
            position: Position::Parent,
            object_type,
            id,
        }
    }

    pub fn matches(&self, edge: &HierarchyEdge) -> bool {
        let endpoint = edge.endpoint(self.position);
        edge.model_id == self.model_id
            && endpoint.object_type == self.object_type
            && endpoint.id == self.id
    }
}

/// Persistence operations the repositories need
#[async_trait::async_trait]
pub trait TaxonomyStore: Send + Sync {
    /// Insert one node into the collection of `object_type`
    async fn insert_node(&self, object_type: ObjectType, node: TaxonomyNode)
        -> Result<TaxonomyNode>;

    /// Unordered bulk insert; returns only the documents actually persisted,
    /// in input order
    async fn insert_nodes(
        &self,
        object_type: ObjectType,
        nodes: Vec<TaxonomyNode>,
    ) -> Result<Vec<TaxonomyNode>>;

    async fn find_node(&self, object_type: ObjectType, id: ObjectId)
        -> Result<Option<TaxonomyNode>>;

    /// Batch lookup by id within one collection, any model
    async fn find_nodes(&self, object_type: ObjectType, ids: &[ObjectId])
        -> Result<Vec<TaxonomyNode>>;

    /// Window of a model's documents ordered by `_id`, unreadable ones
    /// included
    async fn find_page(&self, object_type: ObjectType, query: PageQuery)
        -> Result<Vec<PageEntry>>;

    /// Every node of a model in natural order
    async fn find_all(&self, object_type: ObjectType, model_id: ObjectId)
        -> Result<Vec<TaxonomyNode>>;

    /// Unordered bulk insert of edges; returns the persisted ones
    async fn insert_edges(
        &self,
        family: RelationFamily,
        edges: Vec<HierarchyEdge>,
    ) -> Result<Vec<HierarchyEdge>>;

    /// Matching edges in insertion order
    async fn find_edges(&self, family: RelationFamily, query: EdgeQuery)
        -> Result<Vec<HierarchyEdge>>;

    async fn insert_model(&self, model: ModelInfo) -> Result<ModelInfo>;

    async fn find_model(&self, id: ObjectId) -> Result<Option<ModelInfo>>;

    async fn list_models(&self) -> Result<Vec<ModelInfo>>;
}
