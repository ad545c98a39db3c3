//! Hierarchy edge document schema
//!
//! Edges reference their endpoints by id, type tag and the collection used to
//! join them. None of these are enforced by MongoDB.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, Timestamped};
use crate::taxonomy::{ObjectType, Position};

/// A directed parent → child relation between two nodes
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyEdge {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub model_id: ObjectId,

    pub parent_id: ObjectId,

    /// Type tag claimed for the parent; untrusted
    pub parent_type: ObjectType,

    /// Collection the parent is joined from
    pub parent_doc_model: String,

    pub child_id: ObjectId,

    /// Type tag claimed for the child; untrusted
    pub child_type: ObjectType,

    /// Collection the child is joined from
    pub child_doc_model: String,

    pub created_at: DateTime,

    pub updated_at: DateTime,
}

/// The id/type/collection triple of one edge endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEndpoint<'a> {
    pub id: ObjectId,
    pub object_type: ObjectType,
    pub doc_model: &'a str,
}

impl HierarchyEdge {
    /// Build an edge whose doc models follow the declared types
    pub fn new(
        model_id: ObjectId,
        parent: (ObjectType, ObjectId),
        child: (ObjectType, ObjectId),
    ) -> Self {
        let now = DateTime::now();
        Self {
            id: None,
            model_id,
            parent_id: parent.1,
            parent_type: parent.0,
            parent_doc_model: parent.0.collection_name().to_string(),
            child_id: child.1,
            child_type: child.0,
            child_doc_model: child.0.collection_name().to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn endpoint(&self, position: Position) -> EdgeEndpoint<'_> {
        match position {
            Position::Parent => EdgeEndpoint {
                id: self.parent_id,
                object_type: self.parent_type,
                doc_model: &self.parent_doc_model,
            },
            Position::Child => EdgeEndpoint {
                id: self.child_id,
                object_type: self.child_type,
                doc_model: &self.child_doc_model,
            },
        }
    }
}

impl IntoIndexes for HierarchyEdge {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "modelId": 1, "parentType": 1, "parentId": 1 },
                Some(
                    IndexOptions::builder()
                        .name("model_parent_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "modelId": 1, "childType": 1, "childId": 1 },
                Some(
                    IndexOptions::builder()
                        .name("model_child_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl Timestamped for HierarchyEdge {
    fn stamp(&mut self, now: DateTime) {
        self.created_at = now;
        self.updated_at = now;
    }
}
