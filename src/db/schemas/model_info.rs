//! Model (tenant) document schema

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, Timestamped};

/// Collection name for model info
pub const MODEL_INFO_COLLECTION: &str = "modelinfos";

/// A taxonomy model; every node and edge belongs to exactly one
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub name: String,

    pub locale: String,

    #[serde(default)]
    pub description: String,

    /// Released models are read-only
    #[serde(default)]
    pub released: bool,

    pub created_at: DateTime,

    pub updated_at: DateTime,
}

impl ModelInfo {
    pub fn new(name: String, locale: String, description: String) -> Self {
        let now = DateTime::now();
        Self {
            id: None,
            name,
            locale,
            description,
            released: false,
            created_at: now,
            updated_at: now,
        }
    }
}

impl IntoIndexes for ModelInfo {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "name": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("name_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl Timestamped for ModelInfo {
    fn stamp(&mut self, now: DateTime) {
        self.created_at = now;
        self.updated_at = now;
    }
}
