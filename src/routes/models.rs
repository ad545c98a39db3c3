//! Model info endpoints

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use tracing::info;

use crate::auth::{Operation, PermissionLevel};
use crate::routes::api::{json_response, parse_json_body, taxonomy_error_response};
use crate::server::AppState;
use crate::taxonomy::NewModelSpec;

/// GET /models
pub async fn handle_list_models(state: &AppState) -> Response<Full<Bytes>> {
    let repositories = match state.registry.get() {
        Ok(r) => r,
        Err(e) => return taxonomy_error_response(&e),
    };

    match repositories.models().list().await {
        Ok(models) => json_response(StatusCode::OK, &models),
        Err(e) => taxonomy_error_response(&e),
    }
}

/// POST /models
pub async fn handle_create_model(
    state: &AppState,
    permission: PermissionLevel,
    body: &Bytes,
) -> Response<Full<Bytes>> {
    if let Err(e) = state.auth.authorize(Operation::CreateModel, permission) {
        return taxonomy_error_response(&e);
    }

    let spec: NewModelSpec = match parse_json_body(body) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let repositories = match state.registry.get() {
        Ok(r) => r,
        Err(e) => return taxonomy_error_response(&e),
    };

    match repositories.models().create(spec).await {
        Ok(model) => {
            info!("Model {} created via API", model.id);
            json_response(StatusCode::CREATED, &model)
        }
        Err(e) => taxonomy_error_response(&e),
    }
}
