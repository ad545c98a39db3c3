//! Taxonomy node endpoints

use bson::oid::ObjectId;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use tracing::{debug, info};

use crate::auth::{Operation, PermissionLevel};
use crate::routes::api::{
    create_error_response, error_response, json_response, model_check_response,
    parse_json_body, parse_query_params, taxonomy_error_response,
};
use crate::server::AppState;
use crate::taxonomy::{NewNodeSpec, NodeView, ObjectType};

/// Body of a paginated listing
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PageResponse {
    data: Vec<NodeView>,
    limit: usize,
    next_cursor: Option<String>,
}

/// Create body: one node or a batch
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum CreateBody {
    Many(Vec<NewNodeSpec>),
    One(Box<NewNodeSpec>),
}

/// Validated listing parameters
#[derive(Debug, PartialEq, Eq)]
struct ListParams {
    limit: usize,
    cursor: Option<String>,
}

fn parse_list_params(query: Option<&str>, default_limit: usize, max_limit: usize) -> Result<ListParams, String> {
    let params = parse_query_params(query.unwrap_or(""));

    let limit = match params.get("limit") {
        None => default_limit,
        Some(raw) => match raw.parse::<usize>() {
            Ok(limit) if (1..=max_limit).contains(&limit) => limit,
            _ => {
                return Err(format!(
                    "limit must be an integer between 1 and {}, got '{}'",
                    max_limit, raw
                ))
            }
        },
    };

    // A literal '+' in a query decodes to a space; base64 never contains one
    let cursor = params
        .get("cursor")
        .filter(|c| !c.is_empty())
        .map(|c| c.replace(' ', "+"));

    Ok(ListParams { limit, cursor })
}

/// GET /models/{modelId}/{entity}
pub async fn handle_list_nodes(
    state: &AppState,
    model_id: &str,
    object_type: ObjectType,
    query: Option<&str>,
) -> Response<Full<Bytes>> {
    let params = match parse_list_params(query, state.args.default_page_limit, state.args.max_page_limit) {
        Ok(p) => p,
        Err(message) => {
            return error_response(StatusCode::BAD_REQUEST, &message, "INVALID_QUERY_PARAMETER")
        }
    };

    let Ok(model_oid) = ObjectId::parse_str(model_id) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            &format!("modelId '{}' is not a valid ObjectId", model_id),
            "INVALID_QUERY_PARAMETER",
        );
    };

    let repositories = match state.registry.get() {
        Ok(r) => r,
        Err(e) => return taxonomy_error_response(&e),
    };
    let repository = match repositories.node(object_type) {
        Ok(r) => r,
        Err(e) => return taxonomy_error_response(&e),
    };

    match repository
        .find_paginated(model_oid, params.cursor.as_deref(), params.limit, true)
        .await
    {
        Ok(page) => {
            debug!(
                object_type = %object_type,
                count = page.items.len(),
                has_next = page.next_cursor.is_some(),
                "Listed page"
            );
            json_response(
                StatusCode::OK,
                &PageResponse {
                    data: page.items,
                    limit: params.limit,
                    next_cursor: page.next_cursor.map(|c| c.encode()),
                },
            )
        }
        Err(e) => taxonomy_error_response(&e),
    }
}

/// GET /models/{modelId}/{entity}/{id}
pub async fn handle_get_node(
    state: &AppState,
    model_id: &str,
    object_type: ObjectType,
    id: &str,
) -> Response<Full<Bytes>> {
    let repositories = match state.registry.get() {
        Ok(r) => r,
        Err(e) => return taxonomy_error_response(&e),
    };
    let repository = match repositories.node(object_type) {
        Ok(r) => r,
        Err(e) => return taxonomy_error_response(&e),
    };

    match repository.find_by_id(id).await {
        // A node from another model is reported as missing
        Ok(Some(view)) if view.node.model_id == model_id => json_response(StatusCode::OK, &view),
        Ok(_) => error_response(
            StatusCode::NOT_FOUND,
            &format!("{} {} not found", object_type, id),
            "NOT_FOUND",
        ),
        Err(e) => taxonomy_error_response(&e),
    }
}

/// POST /models/{modelId}/{entity}
pub async fn handle_create_node(
    state: &AppState,
    permission: PermissionLevel,
    model_id: &str,
    object_type: ObjectType,
    body: &Bytes,
) -> Response<Full<Bytes>> {
    if let Err(e) = state.auth.authorize(Operation::CreateNode, permission) {
        return taxonomy_error_response(&e);
    }

    let body: CreateBody = match parse_json_body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    let batch = matches!(body, CreateBody::Many(_));
    let mut specs = match body {
        CreateBody::Many(specs) => specs,
        CreateBody::One(spec) => vec![*spec],
    };

    for spec in specs.iter_mut() {
        if spec.model_id.is_empty() {
            spec.model_id = model_id.to_string();
        } else if spec.model_id != model_id {
            return error_response(
                StatusCode::BAD_REQUEST,
                "modelId in the body does not match the path",
                "INVALID_JSON_SCHEMA",
            );
        }
    }

    let repositories = match state.registry.get() {
        Ok(r) => r,
        Err(e) => return taxonomy_error_response(&e),
    };

    if let Err(e) = repositories.models().check_writable(model_id).await {
        return model_check_response(e);
    }

    let repository = match repositories.node(object_type) {
        Ok(r) => r,
        Err(e) => return taxonomy_error_response(&e),
    };

    if batch {
        match repository.create_many(specs).await {
            Ok(views) => {
                info!("Created {} {} nodes in model {}", views.len(), object_type, model_id);
                json_response(StatusCode::CREATED, &views)
            }
            Err(e) => create_error_response(&e),
        }
    } else {
        let Some(spec) = specs.pop() else {
            return error_response(StatusCode::BAD_REQUEST, "Empty request body", "INVALID_JSON_SCHEMA");
        };
        match repository.create(spec).await {
            Ok(view) => json_response(StatusCode::CREATED, &view),
            Err(e) => create_error_response(&e),
        }
    }
}
