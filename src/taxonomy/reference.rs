//! Reference resolution for hierarchy edge endpoints
//!
//! Edges name their endpoints by `(id, type tag, collection)` and the store
//! checks none of it. A joined document is only accepted when the collection
//! it was actually fetched from is permitted at the edge position and agrees
//! with both the edge's tag and the document's own `objectType`. The view's
//! `objectType` is always taken from the fetched collection.

use bson::oid::ObjectId;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::db::schemas::{HierarchyEdge, TaxonomyNode};
use crate::taxonomy::diagnostic::{DiagnosticKind, Diagnostics};
use crate::taxonomy::{ObjectType, Position, RelationFamily};

/// Minimal projection of a node returned as parent or child
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceView {
    pub id: String,

    #[serde(rename = "UUID")]
    pub uuid: String,

    pub code: String,

    #[serde(rename = "preferredLabel")]
    pub preferred_label: String,

    #[serde(rename = "objectType")]
    pub object_type: ObjectType,

    /// Owning model; cleared once the endpoint passes the same-model check
    #[serde(skip)]
    pub model_id: Option<ObjectId>,
}

/// Documents joined for a batch of edges, keyed by the collection they were
/// fetched from
#[derive(Debug, Default)]
pub struct JoinedNodes {
    by_collection: HashMap<ObjectType, HashMap<ObjectId, TaxonomyNode>>,
}

impl JoinedNodes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record documents read from the collection of `collection`
    pub fn extend(&mut self, collection: ObjectType, nodes: Vec<TaxonomyNode>) {
        let entry = self.by_collection.entry(collection).or_default();
        for node in nodes {
            if let Some(id) = node.id {
                entry.insert(id, node);
            }
        }
    }

    pub fn get(&self, collection: ObjectType, id: ObjectId) -> Option<&TaxonomyNode> {
        self.by_collection.get(&collection)?.get(&id)
    }
}

/// Group the endpoint ids at `position` by the collection their edges name
///
/// Unknown collections are left out; the resolver reports them.
pub fn ids_by_collection<'a>(
    edges: impl IntoIterator<Item = &'a HierarchyEdge>,
    position: Position,
    batches: &mut HashMap<ObjectType, Vec<ObjectId>>,
) {
    for edge in edges {
        let endpoint = edge.endpoint(position);
        if let Some(collection) = ObjectType::from_collection_name(endpoint.doc_model) {
            let ids = batches.entry(collection).or_default();
            if !ids.contains(&endpoint.id) {
                ids.push(endpoint.id);
            }
        }
    }
}

/// Resolve the endpoint of `edge` at `position` against the joined documents
pub fn resolve_reference(
    family: RelationFamily,
    position: Position,
    edge: &HierarchyEdge,
    joined: &JoinedNodes,
    diagnostics: &mut Diagnostics,
) -> Option<ReferenceView> {
    let endpoint = edge.endpoint(position);

    let Some(collection) = ObjectType::from_collection_name(endpoint.doc_model) else {
        diagnostics.report(
            DiagnosticKind::UnknownDocModel,
            position,
            edge.id,
            format!(
                "{} references an unknown collection: {}",
                position, endpoint.doc_model
            ),
        );
        return None;
    };

    if !family.permits(position, collection) {
        diagnostics.report(
            DiagnosticKind::PositionNotPermitted,
            position,
            edge.id,
            format!(
                "{} is not {}: {}",
                position,
                family.describe_permitted(position),
                collection
            ),
        );
        return None;
    }

    let Some(node) = joined.get(collection, endpoint.id) else {
        debug!(
            "{} {} not found in {}",
            position,
            endpoint.id,
            collection.collection_name()
        );
        return None;
    };

    if endpoint.object_type != collection || node.object_type != collection {
        diagnostics.report(
            DiagnosticKind::TypeMismatch,
            position,
            edge.id,
            format!(
                "{} type mismatch: edge says {}, document says {}, fetched from {}",
                position,
                endpoint.object_type,
                node.object_type,
                collection.collection_name()
            ),
        );
        return None;
    }

    Some(ReferenceView {
        id: endpoint.id.to_hex(),
        uuid: node.uuid.clone(),
        code: node.code.clone(),
        preferred_label: node.preferred_label.clone(),
        object_type: collection,
        model_id: Some(node.model_id),
    })
}
