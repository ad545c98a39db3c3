//! MongoDB-backed taxonomy store

use bson::{doc, oid::ObjectId, Document};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::db::mongo::{MongoClient, MongoCollection};
use crate::db::schemas::{HierarchyEdge, ModelInfo, TaxonomyNode, MODEL_INFO_COLLECTION};
use crate::db::store::{EdgeQuery, PageEntry, PageQuery, TaxonomyStore};
use crate::taxonomy::{ObjectType, Position, RelationFamily};
use crate::types::{Result, TaxonomyError};

/// Store over one collection per variant plus one edge collection per family
pub struct MongoTaxonomyStore {
    nodes: HashMap<ObjectType, MongoCollection<TaxonomyNode>>,
    edges: HashMap<RelationFamily, MongoCollection<HierarchyEdge>>,
    models: MongoCollection<ModelInfo>,
}

impl MongoTaxonomyStore {
    /// Open every collection once, applying indexes
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        let mut nodes: HashMap<ObjectType, MongoCollection<TaxonomyNode>> = HashMap::new();
        for object_type in ObjectType::ALL {
            let collection = mongo.collection(object_type.collection_name()).await?;
            nodes.insert(object_type, collection);
        }

        let mut edges: HashMap<RelationFamily, MongoCollection<HierarchyEdge>> = HashMap::new();
        for family in RelationFamily::ALL {
            let collection = mongo.collection(family.edge_collection_name()).await?;
            edges.insert(family, collection);
        }

        let models: MongoCollection<ModelInfo> = mongo.collection(MODEL_INFO_COLLECTION).await?;

        info!(
            "Taxonomy collections ready in database '{}'",
            mongo.db_name()
        );

        Ok(Self {
            nodes,
            edges,
            models,
        })
    }

    fn nodes(&self, object_type: ObjectType) -> Result<&MongoCollection<TaxonomyNode>> {
        self.nodes.get(&object_type).ok_or_else(|| {
            TaxonomyError::Internal(format!("collection for {} not opened", object_type))
        })
    }

    fn edges(&self, family: RelationFamily) -> Result<&MongoCollection<HierarchyEdge>> {
        self.edges.get(&family).ok_or_else(|| {
            TaxonomyError::Internal(format!("collection for {} not opened", family))
        })
    }
}

/// Keep the items whose input position the server did not reject
fn persisted<T>(items: Vec<T>, failed_indices: &[usize]) -> Vec<T> {
    items
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !failed_indices.contains(i))
        .map(|(_, item)| item)
        .collect()
}

fn edge_filter(query: &EdgeQuery) -> Document {
    let (type_field, id_field) = match query.position {
        Position::Parent => ("parentType", "parentId"),
        Position::Child => ("childType", "childId"),
    };
    doc! {
        "modelId": query.model_id,
        type_field: query.object_type.to_string(),
        id_field: query.id,
    }
}

fn page_filter(query: &PageQuery) -> (Document, Document) {
    let mut filter = doc! { "modelId": query.model_id };
    if let Some(after) = query.after {
        let op = if query.descending { "$lt" } else { "$gt" };
        filter.insert("_id", doc! { op: after });
    }
    let sort = doc! { "_id": if query.descending { -1 } else { 1 } };
    (filter, sort)
}

/// Decode one raw page document. Undecodable documents keep their slot;
/// `createdAt` falls back to the id's timestamp when it cannot be read.
fn page_entry(raw: Document) -> Option<PageEntry> {
    let id = match raw.get_object_id("_id") {
        Ok(id) => id,
        Err(e) => {
            warn!("Page document without an ObjectId _id: {}", e);
            return None;
        }
    };
    let created_at = raw
        .get_datetime("createdAt")
        .copied()
        .unwrap_or_else(|_| id.timestamp());

    let node = match bson::from_document::<TaxonomyNode>(raw) {
        Ok(node) => Some(node),
        Err(e) => {
            warn!("Skipping unreadable document {}: {}", id, e);
            None
        }
    };

    Some(PageEntry {
        id,
        created_at,
        node,
    })
}

#[async_trait::async_trait]
impl TaxonomyStore for MongoTaxonomyStore {
    async fn insert_node(
        &self,
        object_type: ObjectType,
        mut node: TaxonomyNode,
    ) -> Result<TaxonomyNode> {
        let collection = self.nodes(object_type)?;
        node.id.get_or_insert_with(ObjectId::new);
        let id = collection.insert_one(&mut node).await?;
        node.id = Some(id);
        Ok(node)
    }

    async fn insert_nodes(
        &self,
        object_type: ObjectType,
        mut nodes: Vec<TaxonomyNode>,
    ) -> Result<Vec<TaxonomyNode>> {
        let collection = self.nodes(object_type)?;
        for node in nodes.iter_mut() {
            node.id.get_or_insert_with(ObjectId::new);
        }
        let report = collection.insert_many_unordered(&mut nodes).await?;
        Ok(persisted(nodes, &report.failed_indices))
    }

    async fn find_node(
        &self,
        object_type: ObjectType,
        id: ObjectId,
    ) -> Result<Option<TaxonomyNode>> {
        self.nodes(object_type)?
            .find_one(doc! { "_id": id })
            .await
    }

    async fn find_nodes(
        &self,
        object_type: ObjectType,
        ids: &[ObjectId],
    ) -> Result<Vec<TaxonomyNode>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.nodes(object_type)?
            .find_many(doc! { "_id": { "$in": ids.to_vec() } })
            .await
    }

    async fn find_page(
        &self,
        object_type: ObjectType,
        query: PageQuery,
    ) -> Result<Vec<PageEntry>> {
        let (filter, sort) = page_filter(&query);
        let raw = self
            .nodes(object_type)?
            .find_raw_sorted(filter, sort, query.limit)
            .await?;
        Ok(raw.into_iter().filter_map(page_entry).collect())
    }

    async fn find_all(
        &self,
        object_type: ObjectType,
        model_id: ObjectId,
    ) -> Result<Vec<TaxonomyNode>> {
        self.nodes(object_type)?
            .find_many(doc! { "modelId": model_id })
            .await
    }

    async fn insert_edges(
        &self,
        family: RelationFamily,
        mut edges: Vec<HierarchyEdge>,
    ) -> Result<Vec<HierarchyEdge>> {
        let collection = self.edges(family)?;
        for edge in edges.iter_mut() {
            edge.id.get_or_insert_with(ObjectId::new);
        }
        let report = collection.insert_many_unordered(&mut edges).await?;
        Ok(persisted(edges, &report.failed_indices))
    }

    async fn find_edges(
        &self,
        family: RelationFamily,
        query: EdgeQuery,
    ) -> Result<Vec<HierarchyEdge>> {
        self.edges(family)?.find_many(edge_filter(&query)).await
    }

    async fn insert_model(&self, mut model: ModelInfo) -> Result<ModelInfo> {
        model.id.get_or_insert_with(ObjectId::new);
        let id = self.models.insert_one(&mut model).await?;
        model.id = Some(id);
        Ok(model)
    }

    async fn find_model(&self, id: ObjectId) -> Result<Option<ModelInfo>> {
        self.models.find_one(doc! { "_id": id }).await
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        self.models.find_many(doc! {}).await
    }
}
