//! In-memory taxonomy store
//!
//! Mirrors the MongoDB store closely enough for the repositories: one vector
//! per collection (insertion order is natural order), the unique indexes
//! emulated on insert, `_id` ordering for pages.

use bson::{oid::ObjectId, DateTime};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::warn;

use crate::db::mongo::Timestamped;
use crate::db::schemas::{HierarchyEdge, ModelInfo, TaxonomyNode};
use crate::db::store::{EdgeQuery, PageEntry, PageQuery, TaxonomyStore};
use crate::taxonomy::{ObjectType, RelationFamily};
use crate::types::{Result, TaxonomyError};

/// Simple in-memory store
#[derive(Default)]
pub struct InMemoryTaxonomyStore {
    nodes: RwLock<HashMap<ObjectType, Vec<TaxonomyNode>>>,
    edges: RwLock<HashMap<RelationFamily, Vec<HierarchyEdge>>>,
    models: RwLock<Vec<ModelInfo>>,
    /// `(modelId, _id, createdAt)` of documents that exist but do not decode
    unreadable: RwLock<HashMap<ObjectType, Vec<(ObjectId, ObjectId, DateTime)>>>,
    unavailable: AtomicBool,
}

impl InMemoryTaxonomyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the connection dropped
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Record a document in `object_type`'s collection that pages see but
    /// that cannot be decoded into a node
    pub async fn insert_unreadable(&self, object_type: ObjectType, model_id: ObjectId) -> ObjectId {
        let id = ObjectId::new();
        self.unreadable
            .write()
            .await
            .entry(object_type)
            .or_default()
            .push((model_id, id, DateTime::now()));
        id
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TaxonomyError::Database(
                "connection to the store was lost".into(),
            ));
        }
        Ok(())
    }
}

/// Emulates the `_id`, `UUID` and `(modelId, code)` unique indexes
fn check_unique(
    existing: &[TaxonomyNode],
    candidate: &TaxonomyNode,
    collection: &str,
) -> Result<()> {
    for node in existing {
        let index = if node.id == candidate.id {
            Some("_id_")
        } else if node.uuid == candidate.uuid {
            Some("uuid_unique")
        } else if node.model_id == candidate.model_id && node.code == candidate.code {
            Some("model_code_unique")
        } else {
            None
        };

        if let Some(index) = index {
            return Err(TaxonomyError::Duplicate(format!(
                "E11000 duplicate key error collection: {} index: {}",
                collection, index
            )));
        }
    }
    Ok(())
}

/// Assign an id when the caller did not, then stamp timestamps
macro_rules! prepare {
    ($item:expr, $now:expr) => {{
        if $item.id.is_none() {
            $item.id = Some(ObjectId::new());
        }
        $item.stamp($now);
    }};
}

#[async_trait::async_trait]
impl TaxonomyStore for InMemoryTaxonomyStore {
    async fn insert_node(
        &self,
        object_type: ObjectType,
        mut node: TaxonomyNode,
    ) -> Result<TaxonomyNode> {
        self.check_available()?;

        prepare!(node, DateTime::now());

        let mut nodes = self.nodes.write().await;
        let collection = nodes.entry(object_type).or_default();
        check_unique(collection, &node, object_type.collection_name())?;
        collection.push(node.clone());

        Ok(node)
    }

    async fn insert_nodes(
        &self,
        object_type: ObjectType,
        batch: Vec<TaxonomyNode>,
    ) -> Result<Vec<TaxonomyNode>> {
        self.check_available()?;

        let now = DateTime::now();
        let mut nodes = self.nodes.write().await;
        let collection = nodes.entry(object_type).or_default();
        let mut persisted = Vec::with_capacity(batch.len());

        for (index, mut node) in batch.into_iter().enumerate() {
            prepare!(node, now);

            match check_unique(collection, &node, object_type.collection_name()) {
                Ok(()) => {
                    collection.push(node.clone());
                    persisted.push(node);
                }
                Err(e) => warn!("Bulk insert rejected document {}: {}", index, e),
            }
        }

        Ok(persisted)
    }

    async fn find_node(
        &self,
        object_type: ObjectType,
        id: ObjectId,
    ) -> Result<Option<TaxonomyNode>> {
        self.check_available()?;

        let nodes = self.nodes.read().await;
        Ok(nodes
            .get(&object_type)
            .and_then(|c| c.iter().find(|n| n.id == Some(id)))
            .cloned())
    }

    async fn find_nodes(
        &self,
        object_type: ObjectType,
        ids: &[ObjectId],
    ) -> Result<Vec<TaxonomyNode>> {
        self.check_available()?;

        let nodes = self.nodes.read().await;
        Ok(nodes
            .get(&object_type)
            .map(|c| {
                c.iter()
                    .filter(|n| n.id.is_some_and(|id| ids.contains(&id)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_page(
        &self,
        object_type: ObjectType,
        query: PageQuery,
    ) -> Result<Vec<PageEntry>> {
        self.check_available()?;

        let in_window = |id: ObjectId| match query.after {
            None => true,
            Some(after) if query.descending => id < after,
            Some(after) => id > after,
        };

        let nodes = self.nodes.read().await;
        let broken = self.unreadable.read().await;

        let readable = nodes
            .get(&object_type)
            .into_iter()
            .flatten()
            .filter(|n| n.model_id == query.model_id)
            .cloned()
            .filter_map(PageEntry::readable);
        let unreadable = broken
            .get(&object_type)
            .into_iter()
            .flatten()
            .filter(|(model_id, _, _)| *model_id == query.model_id)
            .map(|&(_, id, created_at)| PageEntry {
                id,
                created_at,
                node: None,
            });

        let mut page: Vec<PageEntry> = readable
            .chain(unreadable)
            .filter(|entry| in_window(entry.id))
            .collect();

        page.sort_by_key(|entry| entry.id);
        if query.descending {
            page.reverse();
        }
        page.truncate(query.limit.max(0) as usize);

        Ok(page)
    }

    async fn find_all(
        &self,
        object_type: ObjectType,
        model_id: ObjectId,
    ) -> Result<Vec<TaxonomyNode>> {
        self.check_available()?;

        let nodes = self.nodes.read().await;
        Ok(nodes
            .get(&object_type)
            .map(|c| c.iter().filter(|n| n.model_id == model_id).cloned().collect())
            .unwrap_or_default())
    }

    async fn insert_edges(
        &self,
        family: RelationFamily,
        batch: Vec<HierarchyEdge>,
    ) -> Result<Vec<HierarchyEdge>> {
        self.check_available()?;

        let now = DateTime::now();
        let mut edges = self.edges.write().await;
        let collection = edges.entry(family).or_default();
        let mut persisted = Vec::with_capacity(batch.len());

        for mut edge in batch {
            prepare!(edge, now);
            collection.push(edge.clone());
            persisted.push(edge);
        }

        Ok(persisted)
    }

    async fn find_edges(
        &self,
        family: RelationFamily,
        query: EdgeQuery,
    ) -> Result<Vec<HierarchyEdge>> {
        self.check_available()?;

        let edges = self.edges.read().await;
        Ok(edges
            .get(&family)
            .map(|c| c.iter().filter(|e| query.matches(e)).cloned().collect())
            .unwrap_or_default())
    }

    async fn insert_model(&self, mut model: ModelInfo) -> Result<ModelInfo> {
        self.check_available()?;

        prepare!(model, DateTime::now());

        let mut models = self.models.write().await;
        if models.iter().any(|m| m.name == model.name || m.id == model.id) {
            return Err(TaxonomyError::Duplicate(format!(
                "E11000 duplicate key error collection: modelinfos index: name_unique ({})",
                model.name
            )));
        }
        models.push(model.clone());

        Ok(model)
    }

    async fn find_model(&self, id: ObjectId) -> Result<Option<ModelInfo>> {
        self.check_available()?;

        let models = self.models.read().await;
        Ok(models.iter().find(|m| m.id == Some(id)).cloned())
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        self.check_available()?;

        Ok(self.models.read().await.clone())
    }
}
