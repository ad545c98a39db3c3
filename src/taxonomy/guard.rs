//! Same-model check applied to resolved edge endpoints

use bson::oid::ObjectId;

use crate::db::schemas::HierarchyEdge;
use crate::taxonomy::diagnostic::{DiagnosticKind, Diagnostics};
use crate::taxonomy::reference::ReferenceView;
use crate::taxonomy::Position;

/// Message logged when an endpoint at `position` sits in another model than
/// the node being assembled
pub fn cross_model_message(position: Position) -> &'static str {
    match position {
        Position::Child => "Child is not in the same model as the parent",
        Position::Parent => "Parent is not in the same model as the child",
    }
}

/// Keep a resolved endpoint only when it and its edge belong to `model_id`.
/// The kept view has its model id stripped.
pub fn guard_reference(
    resolved: Option<ReferenceView>,
    position: Position,
    edge: &HierarchyEdge,
    model_id: ObjectId,
    diagnostics: &mut Diagnostics,
) -> Option<ReferenceView> {
    let mut reference = resolved?;

    if reference.model_id != Some(model_id) || edge.model_id != model_id {
        diagnostics.report(
            DiagnosticKind::CrossModel,
            position,
            edge.id,
            cross_model_message(position),
        );
        return None;
    }

    reference.model_id = None;
    Some(reference)
}
