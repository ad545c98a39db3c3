//! Diagnostics for hierarchy edges that could not be used
//!
//! An inconsistent edge never fails a read. It is logged, recorded here and
//! left out of the assembled view.

use bson::oid::ObjectId;
use serde::Serialize;
use tracing::warn;

use crate::taxonomy::Position;

/// Why an edge endpoint was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticKind {
    /// `*DocModel` names a collection outside the taxonomy
    UnknownDocModel,
    /// Fetched collection is not allowed at this edge position
    PositionNotPermitted,
    /// Edge tag, document tag and fetched collection disagree
    TypeMismatch,
    /// Endpoint belongs to another model than the querying node
    CrossModel,
    /// Single-parent family node with more than one parent edge
    ExtraParent,
}

/// One dropped endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyDiagnostic {
    pub kind: DiagnosticKind,

    /// Position of the dropped endpoint on its edge
    pub position: Position,

    /// Edge the endpoint was read from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge_id: Option<ObjectId>,

    pub message: String,
}

/// Collects diagnostics while a view is assembled, logging each one
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<HierarchyDiagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(
        &mut self,
        kind: DiagnosticKind,
        position: Position,
        edge_id: Option<ObjectId>,
        message: impl Into<String>,
    ) {
        let message = message.into();
        warn!(
            kind = ?kind,
            edge = %edge_id.map(|id| id.to_hex()).unwrap_or_default(),
            "{}",
            message
        );
        self.entries.push(HierarchyDiagnostic {
            kind,
            position,
            edge_id,
            message,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<HierarchyDiagnostic> {
        self.entries
    }
}
