//! Hierarchy edge endpoints

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use tracing::info;

use crate::auth::{Operation, PermissionLevel};
use crate::routes::api::{
    create_error_response, json_response, model_check_response, parse_json_body,
    taxonomy_error_response,
};
use crate::server::AppState;
use crate::taxonomy::{NewEdgeSpec, RelationFamily};

/// POST /models/{modelId}/hierarchies/{family}
///
/// Body is an array of edges. Edges whose endpoints are missing, belong to
/// another model or sit at a position the family does not allow are left
/// out; the response lists the edges that were stored.
pub async fn handle_create_hierarchy(
    state: &AppState,
    permission: PermissionLevel,
    model_id: &str,
    family: RelationFamily,
    body: &Bytes,
) -> Response<Full<Bytes>> {
    if let Err(e) = state.auth.authorize(Operation::CreateHierarchy, permission) {
        return taxonomy_error_response(&e);
    }

    let specs: Vec<NewEdgeSpec> = match parse_json_body(body) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let repositories = match state.registry.get() {
        Ok(r) => r,
        Err(e) => return taxonomy_error_response(&e),
    };

    let model_oid = match repositories.models().check_writable(model_id).await {
        Ok(oid) => oid,
        Err(e) => return model_check_response(e),
    };

    let repository = match repositories.hierarchy(family) {
        Ok(r) => r,
        Err(e) => return taxonomy_error_response(&e),
    };

    let requested = specs.len();
    match repository.create_many(model_oid, specs).await {
        Ok(edges) => {
            info!(
                family = %family,
                requested,
                created = edges.len(),
                "Hierarchy edges created in model {}",
                model_id
            );
            json_response(StatusCode::CREATED, &edges)
        }
        Err(e) => create_error_response(&e),
    }
}
