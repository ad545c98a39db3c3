//! Wire shapes returned by the repositories

use bson::DateTime;
use chrono::SecondsFormat;
use serde::Serialize;

use crate::db::schemas::{HierarchyEdge, ModelInfo, TaxonomyNode};
use crate::taxonomy::diagnostic::HierarchyDiagnostic;
use crate::taxonomy::reference::ReferenceView;
use crate::taxonomy::{ObjectType, ParentCardinality};
use crate::types::{Result, TaxonomyError};

/// ISO-8601 with milliseconds, UTC
pub fn iso8601(date: DateTime) -> String {
    date.to_chrono().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A node's own fields
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDocument {
    pub id: String,
    #[serde(rename = "UUID")]
    pub uuid: String,
    #[serde(rename = "UUIDHistory")]
    pub uuid_history: Vec<String>,
    pub code: String,
    pub preferred_label: String,
    pub alt_labels: Vec<String>,
    pub description: String,
    pub model_id: String,
    pub object_type: ObjectType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<&TaxonomyNode> for NodeDocument {
    type Error = TaxonomyError;

    fn try_from(node: &TaxonomyNode) -> Result<Self> {
        Ok(Self {
            id: node.oid()?.to_hex(),
            uuid: node.uuid.clone(),
            uuid_history: node.uuid_history.clone(),
            code: node.code.clone(),
            preferred_label: node.preferred_label.clone(),
            alt_labels: node.alt_labels.clone(),
            description: node.description.clone(),
            model_id: node.model_id.to_hex(),
            object_type: node.object_type,
            import_id: node.import_id.clone(),
            created_at: iso8601(node.created_at),
            updated_at: iso8601(node.updated_at),
        })
    }
}

/// Containing node(s); the field name depends on the family
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ParentLink {
    #[serde(rename = "parent")]
    Single(Option<ReferenceView>),
    #[serde(rename = "parents")]
    Many(Vec<ReferenceView>),
}

impl ParentLink {
    pub fn empty(cardinality: ParentCardinality) -> Self {
        match cardinality {
            ParentCardinality::Single => Self::Single(None),
            ParentCardinality::Many => Self::Many(Vec::new()),
        }
    }

    /// Surviving parents in edge order
    pub fn references(&self) -> Vec<&ReferenceView> {
        match self {
            Self::Single(parent) => parent.iter().collect(),
            Self::Many(parents) => parents.iter().collect(),
        }
    }
}

/// A node with its hierarchy populated
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeView {
    #[serde(flatten)]
    pub node: NodeDocument,

    #[serde(flatten)]
    pub parent: ParentLink,

    pub children: Vec<ReferenceView>,

    /// Edges dropped while assembling this view
    #[serde(skip)]
    pub diagnostics: Vec<HierarchyDiagnostic>,
}

impl NodeView {
    /// View of a node known to have no edges yet
    pub fn without_hierarchy(node: &TaxonomyNode) -> Result<Self> {
        Ok(Self {
            node: NodeDocument::try_from(node)?,
            parent: ParentLink::empty(node.object_type.family().parent_cardinality()),
            children: Vec::new(),
            diagnostics: Vec::new(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeView {
    pub id: String,
    pub model_id: String,
    pub parent_id: String,
    pub parent_type: ObjectType,
    pub child_id: String,
    pub child_type: ObjectType,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&HierarchyEdge> for EdgeView {
    fn from(edge: &HierarchyEdge) -> Self {
        Self {
            id: edge.id.map(|id| id.to_hex()).unwrap_or_default(),
            model_id: edge.model_id.to_hex(),
            parent_id: edge.parent_id.to_hex(),
            parent_type: edge.parent_type,
            child_id: edge.child_id.to_hex(),
            child_type: edge.child_type,
            created_at: iso8601(edge.created_at),
            updated_at: iso8601(edge.updated_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelView {
    pub id: String,
    pub name: String,
    pub locale: String,
    pub description: String,
    pub released: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&ModelInfo> for ModelView {
    fn from(model: &ModelInfo) -> Self {
        Self {
            id: model.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: model.name.clone(),
            locale: model.locale.clone(),
            description: model.description.clone(),
            released: model.released,
            created_at: iso8601(model.created_at),
            updated_at: iso8601(model.updated_at),
        }
    }
}
