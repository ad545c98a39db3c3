//! Taxonomy API plumbing
//!
//! ## Routes
//!
//! - `GET  /models` - List models
//! - `POST /models` - Create a model
//! - `GET  /models/{modelId}/{entity}?limit=&cursor=` - Page of nodes
//! - `GET  /models/{modelId}/{entity}/{id}` - Node with parent(s) and children
//! - `POST /models/{modelId}/{entity}` - Create one node (object body) or many (array body)
//! - `POST /models/{modelId}/hierarchies/{family}` - Create hierarchy edges
//!
//! `{entity}` is one of `occupationGroups`, `occupations`, `skillGroups`,
//! `skills`; `{family}` is `occupations` or `skills`.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use tracing::{error, warn};

use crate::taxonomy::{ObjectType, RelationFamily};
use crate::types::{ModelCheckError, TaxonomyError};

/// API error response
#[derive(Debug, Serialize)]
struct ApiError<'a> {
    error: &'a str,
    code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

/// Parsed API route
#[derive(Debug, PartialEq, Eq)]
pub enum ApiRoute<'a> {
    Models,
    Nodes {
        model_id: &'a str,
        object_type: ObjectType,
    },
    Node {
        model_id: &'a str,
        object_type: ObjectType,
        id: &'a str,
    },
    Hierarchy {
        model_id: &'a str,
        family: RelationFamily,
    },
}

impl<'a> ApiRoute<'a> {
    /// Parse a path under `/models`
    pub fn parse(path: &'a str) -> Option<Self> {
        let stripped = path.strip_prefix("/models")?;
        let parts: Vec<&str> = stripped
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        match parts.as_slice() {
            &[] if stripped.is_empty() || stripped == "/" => Some(Self::Models),
            &[model_id, "hierarchies", family] => Some(Self::Hierarchy {
                model_id,
                family: RelationFamily::from_route_segment(family)?,
            }),
            &[model_id, entity] => Some(Self::Nodes {
                model_id,
                object_type: ObjectType::from_route_segment(entity)?,
            }),
            &[model_id, entity, id] => Some(Self::Node {
                model_id,
                object_type: ObjectType::from_route_segment(entity)?,
                id,
            }),
            _ => None,
        }
    }
}

/// Build a JSON error response
pub fn error_response(status: StatusCode, message: &str, code: &str) -> Response<Full<Bytes>> {
    error_with_details(status, message, code, None)
}

fn error_with_details(
    status: StatusCode,
    message: &str,
    code: &str,
    details: Option<serde_json::Value>,
) -> Response<Full<Bytes>> {
    let error = ApiError {
        error: message,
        code,
        details,
    };
    let body = serde_json::to_vec(&error).unwrap_or_default();

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Cache-Control", "no-cache")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| {
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Full::new(Bytes::from(r#"{"error":"Internal error"}"#)))
                .unwrap()
        })
}

/// Map a taxonomy error onto the wire. Server-side failures are logged and
/// answered with a generic message.
pub fn taxonomy_error_response(err: &TaxonomyError) -> Response<Full<Bytes>> {
    let status = err.status_code();
    match err.root() {
        TaxonomyError::InvalidCursor(reason) => {
            warn!("Rejected cursor: {}", reason);
            error_response(status, "Invalid cursor parameter", "INVALID_CURSOR")
        }
        TaxonomyError::Validation(violations) => error_with_details(
            status,
            "Request body failed validation",
            "INVALID_JSON_SCHEMA",
            serde_json::to_value(violations).ok(),
        ),
        _ if status.is_server_error() => {
            error!("Request failed: {}", err);
            error_response(status, "Internal server error", err.error_code())
        }
        _ => error_response(status, &err.to_string(), err.error_code()),
    }
}

/// Same as [`taxonomy_error_response`], reporting store failures during a
/// write as `DB_FAILED_TO_CREATE`
pub fn create_error_response(err: &TaxonomyError) -> Response<Full<Bytes>> {
    match err.root() {
        TaxonomyError::Database(_) | TaxonomyError::Internal(_) => {
            error!("Create failed: {}", err);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create the entity in the database",
                "DB_FAILED_TO_CREATE",
            )
        }
        _ => taxonomy_error_response(err),
    }
}

pub fn model_check_response(err: ModelCheckError) -> Response<Full<Bytes>> {
    error_response(err.status_code(), &err.to_string(), err.code())
}

/// Build a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, data: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(data) {
        Ok(body) => Response::builder()
            .status(status)
            .header("Content-Type", "application/json")
            .header("Cache-Control", "no-cache")
            .header("Access-Control-Allow-Origin", "*")
            .body(Full::new(Bytes::from(body)))
            .unwrap(),
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal serialization error",
                "INTERNAL_SERVER_ERROR",
            )
        }
    }
}

/// Parse a JSON request body
pub fn parse_json_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, Response<Full<Bytes>>> {
    serde_json::from_slice(body).map_err(|e| {
        warn!("Invalid request body: {}", e);
        error_with_details(
            StatusCode::BAD_REQUEST,
            "Request body failed validation",
            "INVALID_JSON_SCHEMA",
            Some(serde_json::Value::String(e.to_string())),
        )
    })
}

/// Parse a query string into a key-value map
pub fn parse_query_params(query: &str) -> HashMap<String, String> {
    serde_urlencoded::from_str::<Vec<(String, String)>>(query)
        .unwrap_or_default()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(resp: Response<Full<Bytes>>) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_parse_routes() {
        assert_eq!(ApiRoute::parse("/models"), Some(ApiRoute::Models));
        assert_eq!(ApiRoute::parse("/models/"), Some(ApiRoute::Models));
        assert_eq!(
            ApiRoute::parse("/models/m1/skillGroups"),
            Some(ApiRoute::Nodes {
                model_id: "m1",
                object_type: ObjectType::SkillGroup
            })
        );
        assert_eq!(
            ApiRoute::parse("/models/m1/occupations/abc"),
            Some(ApiRoute::Node {
                model_id: "m1",
                object_type: ObjectType::Occupation,
                id: "abc"
            })
        );
        assert_eq!(
            ApiRoute::parse("/models/m1/hierarchies/skills"),
            Some(ApiRoute::Hierarchy {
                model_id: "m1",
                family: RelationFamily::Skills
            })
        );
    }

    #[test]
    fn test_parse_unknown_routes() {
        assert_eq!(ApiRoute::parse("/models/m1/users"), None);
        assert_eq!(ApiRoute::parse("/models/m1/hierarchies/users"), None);
        assert_eq!(ApiRoute::parse("/models/m1/skills/a/b"), None);
        assert_eq!(ApiRoute::parse("/modelsx"), None);
        assert_eq!(ApiRoute::parse("/other"), None);
    }

    #[test]
    fn test_parse_query_params_decodes() {
        let params = parse_query_params("limit=50&cursor=YWJj%2Bw%3D%3D");
        assert_eq!(params.get("limit"), Some(&"50".to_string()));
        assert_eq!(params.get("cursor"), Some(&"YWJj+w==".to_string()));
        assert!(parse_query_params("").is_empty());
    }

    #[tokio::test]
    async fn test_invalid_cursor_response() {
        let err = TaxonomyError::InvalidCursor("not base64".into());
        let resp = taxonomy_error_response(&err);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["code"], "INVALID_CURSOR");
        assert_eq!(body["error"], "Invalid cursor parameter");
    }

    #[tokio::test]
    async fn test_server_errors_hide_details() {
        let err = TaxonomyError::Database("mongodb://***@db: boom".into())
            .in_repository("SkillRepository", "findById");
        let resp = taxonomy_error_response(&err);
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "Internal server error");
        assert_eq!(body["code"], "DB_FAILED");
    }

    #[tokio::test]
    async fn test_create_db_failure_code() {
        let err = TaxonomyError::Database("down".into()).in_repository("SkillRepository", "create");
        let body = body_json(create_error_response(&err)).await;
        assert_eq!(body["code"], "DB_FAILED_TO_CREATE");
    }

    #[tokio::test]
    async fn test_model_check_response() {
        let resp = model_check_response(ModelCheckError::Released);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["code"], "MODEL_IS_RELEASED");
    }
}
