//! Taxonomy node document schema
//!
//! One struct serves all four variant collections; the collection a document
//! was read from is tracked separately by the store.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, Timestamped};
use crate::taxonomy::ObjectType;
use crate::types::{Result, TaxonomyError};

/// Taxonomy node stored in one of the variant collections
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaxonomyNode {
    /// MongoDB document ID, unique only within its collection
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Globally unique identifier, assigned by the server
    #[serde(rename = "UUID")]
    pub uuid: String,

    /// Superseded UUIDs, newest last
    #[serde(rename = "UUIDHistory", default)]
    pub uuid_history: Vec<String>,

    pub code: String,

    pub preferred_label: String,

    #[serde(default)]
    pub alt_labels: Vec<String>,

    #[serde(default)]
    pub description: String,

    /// Owning model (tenant)
    pub model_id: ObjectId,

    /// Variant discriminator as recorded on the document
    pub object_type: ObjectType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_id: Option<String>,

    pub created_at: DateTime,

    pub updated_at: DateTime,
}

impl TaxonomyNode {
    /// The document ID. Only nodes not yet written lack one.
    pub fn oid(&self) -> Result<ObjectId> {
        self.id.ok_or_else(|| {
            TaxonomyError::Internal(format!(
                "{} {} has no _id",
                self.object_type, self.code
            ))
        })
    }
}

impl IntoIndexes for TaxonomyNode {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "UUID": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("uuid_unique".to_string())
                        .build(),
                ),
            ),
            // Membership lookups only; history entries may repeat across documents
            (
                doc! { "UUIDHistory": 1 },
                Some(
                    IndexOptions::builder()
                        .name("uuid_history_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "modelId": 1, "code": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("model_code_unique".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl Timestamped for TaxonomyNode {
    fn stamp(&mut self, now: DateTime) {
        self.created_at = now;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unsaved() -> TaxonomyNode {
        TaxonomyNode {
            id: None,
            uuid: "u".into(),
            uuid_history: vec![],
            code: "S1".into(),
            preferred_label: "communication".into(),
            alt_labels: vec![],
            description: String::new(),
            model_id: ObjectId::new(),
            object_type: ObjectType::SkillGroup,
            import_id: None,
            created_at: DateTime::from_millis(0),
            updated_at: DateTime::from_millis(0),
        }
    }

    #[test]
    fn test_oid_of_unsaved_node_is_an_error() {
        let err = unsaved().oid().unwrap_err();
        assert!(matches!(err, TaxonomyError::Internal(_)));
        assert_eq!(err.to_string(), "Internal error: SkillGroup S1 has no _id");
    }

    #[test]
    fn test_oid_of_saved_node() {
        let id = ObjectId::new();
        let mut node = unsaved();
        node.id = Some(id);
        assert_eq!(node.oid().unwrap(), id);
    }
}
