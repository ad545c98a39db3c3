//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo; one task per connection. Requests are
//! collected (up to `MAX_BODY_BYTES`) and handed to [`dispatch`], which owns
//! all routing so it can be driven without a socket.

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::header::{HeaderMap, AUTHORIZATION};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::auth::{Authenticator, PermissionLevel, API_KEY_HEADER};
use crate::config::Args;
use crate::routes::{self, api::taxonomy_error_response, error_response, ApiRoute};
use crate::taxonomy::RepositoryRegistry;
use crate::types::TaxonomyError;

/// Boxed body type for responses
pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub registry: Arc<RepositoryRegistry>,
    pub auth: Authenticator,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(args: Args, registry: Arc<RepositoryRegistry>, auth: Authenticator) -> Self {
        Self {
            args,
            registry,
            auth,
            started_at: Instant::now(),
        }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), TaxonomyError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!("Taxonomy API listening on {}", state.args.listen);

    if state.args.dev_mode {
        warn!("Development mode enabled - every caller is a model manager");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    let (parts, body) = req.into_parts();
    let path = parts.uri.path();
    let query = parts.uri.query();

    info!("[{}] {} {}", addr, parts.method, path);

    let body = match Limited::new(body, state.args.max_body_bytes).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            warn!("[{}] Request body exceeds {} bytes", addr, state.args.max_body_bytes);
            return Ok(to_boxed(error_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                "Request body too large",
                "PAYLOAD_TOO_LARGE",
            )));
        }
        Err(e) => {
            warn!("[{}] Request body error: {}", addr, e);
            return Ok(to_boxed(error_response(
                StatusCode::BAD_REQUEST,
                "Failed to read request body",
                "INVALID_JSON_SCHEMA",
            )));
        }
    };

    let response = dispatch(&state, &parts.method, path, query, &parts.headers, body).await;
    debug!("[{}] {} {} -> {}", addr, parts.method, path, response.status());
    Ok(to_boxed(response))
}

/// Route a collected request to its handler
pub async fn dispatch(
    state: &AppState,
    method: &Method,
    path: &str,
    query: Option<&str>,
    headers: &HeaderMap,
    body: Bytes,
) -> Response<Full<Bytes>> {
    match (method, path) {
        (&Method::OPTIONS, _) => return preflight_response(),
        (&Method::GET, "/health" | "/healthz") => return routes::health_check(state),
        _ => {}
    }

    let Some(route) = ApiRoute::parse(path) else {
        return not_found_response(path);
    };

    match (method, route) {
        (&Method::GET, ApiRoute::Models) => routes::handle_list_models(state).await,
        (&Method::POST, ApiRoute::Models) => match caller_permission(state, headers) {
            Ok(permission) => routes::handle_create_model(state, permission, &body).await,
            Err(resp) => resp,
        },
        (
            &Method::GET,
            ApiRoute::Nodes {
                model_id,
                object_type,
            },
        ) => routes::handle_list_nodes(state, model_id, object_type, query).await,
        (
            &Method::POST,
            ApiRoute::Nodes {
                model_id,
                object_type,
            },
        ) => match caller_permission(state, headers) {
            Ok(permission) => {
                routes::handle_create_node(state, permission, model_id, object_type, &body).await
            }
            Err(resp) => resp,
        },
        (
            &Method::GET,
            ApiRoute::Node {
                model_id,
                object_type,
                id,
            },
        ) => routes::handle_get_node(state, model_id, object_type, id).await,
        (&Method::POST, ApiRoute::Hierarchy { model_id, family }) => {
            match caller_permission(state, headers) {
                Ok(permission) => {
                    routes::handle_create_hierarchy(state, permission, model_id, family, &body)
                        .await
                }
                Err(resp) => resp,
            }
        }
        _ => error_response(
            StatusCode::METHOD_NOT_ALLOWED,
            &format!("{} is not supported on {}", method, path),
            "METHOD_NOT_ALLOWED",
        ),
    }
}

/// Permission carried by the request's Authorization or X-API-Key header
fn caller_permission(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<PermissionLevel, Response<Full<Bytes>>> {
    let authorization = headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok());
    let api_key = headers.get(API_KEY_HEADER).and_then(|h| h.to_str().ok());

    state
        .auth
        .permission(authorization, api_key)
        .map_err(|e| {
            debug!("Rejected credentials: {}", e);
            taxonomy_error_response(&e)
        })
}

/// Convert a Full<Bytes> body to BoxBody
fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    error_response(
        StatusCode::NOT_FOUND,
        &format!("No route for {}", path),
        "NOT_FOUND",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{ApiKeyValidator, JwtValidator};
    use crate::db::memory::InMemoryTaxonomyStore;
    use hyper::header::HeaderValue;

    const MANAGER_KEY: &str = "manager-key";

    fn state(dev_mode: bool) -> AppState {
        let registry = Arc::new(RepositoryRegistry::new());
        registry
            .initialize(Arc::new(InMemoryTaxonomyStore::new()))
            .unwrap();
        let auth = Authenticator::new(
            JwtValidator::new_dev(),
            ApiKeyValidator::new(Some(MANAGER_KEY.into())),
            dev_mode,
        );
        let args = Args {
            dev_mode,
            jwt_secret: Some("x".repeat(32)),
            ..Default::default()
        };
        AppState::new(args, registry, auth)
    }

    fn manager_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static(MANAGER_KEY));
        headers
    }

    async fn call(
        state: &AppState,
        method: Method,
        path: &str,
        query: Option<&str>,
        headers: &HeaderMap,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let body = if body.is_null() {
            Bytes::new()
        } else {
            Bytes::from(body.to_string())
        };
        let resp = dispatch(state, &method, path, query, headers, body).await;
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn create_model(state: &AppState) -> String {
        let (status, body) = call(
            state,
            Method::POST,
            "/models",
            None,
            &manager_headers(),
            serde_json::json!({ "name": "ESCO", "locale": "en" }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let state = state(true);
        let (status, body) = call(&state, Method::GET, "/health", None, &HeaderMap::new(), serde_json::Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "online");
        assert_eq!(body["mode"], "development");
        assert_eq!(body["repositories"], true);
    }

    #[tokio::test]
    async fn test_unknown_route_and_method() {
        let state = state(true);
        let (status, body) = call(&state, Method::GET, "/nowhere", None, &HeaderMap::new(), serde_json::Value::Null).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");

        let (status, _) = call(&state, Method::DELETE, "/models", None, &HeaderMap::new(), serde_json::Value::Null).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_writes_require_model_manager() {
        let state = state(false);
        let body = serde_json::json!({ "name": "ESCO", "locale": "en" });

        let (status, _) = call(&state, Method::POST, "/models", None, &HeaderMap::new(), body.clone()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let mut bad_key = HeaderMap::new();
        bad_key.insert(API_KEY_HEADER, HeaderValue::from_static("wrong"));
        let (status, _) = call(&state, Method::POST, "/models", None, &bad_key, body.clone()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let token = JwtValidator::new_dev()
            .generate_token("reader", PermissionLevel::RegisteredUser)
            .unwrap();
        let mut bearer = HeaderMap::new();
        bearer.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        let (status, body_json) = call(&state, Method::POST, "/models", None, &bearer, body.clone()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body_json["code"], "FORBIDDEN");

        let (status, _) = call(&state, Method::POST, "/models", None, &manager_headers(), body).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_create_list_and_get_nodes() {
        let state = state(false);
        let model_id = create_model(&state).await;
        let path = format!("/models/{model_id}/skillGroups");

        let (status, created) = call(
            &state,
            Method::POST,
            &path,
            None,
            &manager_headers(),
            serde_json::json!([
                { "code": "S1", "preferredLabel": "communication" },
                { "code": "S2", "preferredLabel": "information skills" },
                { "code": "bad code", "preferredLabel": "rejected" }
            ]),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created.as_array().unwrap().len(), 2);

        let (status, page) = call(&state, Method::GET, &path, Some("limit=1"), &HeaderMap::new(), serde_json::Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["limit"], 1);
        assert_eq!(page["data"].as_array().unwrap().len(), 1);
        let cursor = page["nextCursor"].as_str().unwrap().to_string();

        let query = format!("limit=1&cursor={}", cursor.replace('+', "%2B").replace('=', "%3D"));
        let (status, page) = call(&state, Method::GET, &path, Some(&query), &HeaderMap::new(), serde_json::Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert!(page["nextCursor"].is_null());

        let id = created[0]["id"].as_str().unwrap();
        let (status, node) = call(
            &state,
            Method::GET,
            &format!("{path}/{id}"),
            None,
            &HeaderMap::new(),
            serde_json::Value::Null,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(node["code"], "S1");
        assert!(node["parents"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_list_parameters() {
        let state = state(true);
        let model_id = create_model(&state).await;
        let path = format!("/models/{model_id}/skills");

        let (status, body) = call(&state, Method::GET, &path, Some("cursor=%%%"), &HeaderMap::new(), serde_json::Value::Null).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_CURSOR");

        let (status, body) = call(&state, Method::GET, &path, Some("limit=500"), &HeaderMap::new(), serde_json::Value::Null).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_QUERY_PARAMETER");
    }

    #[tokio::test]
    async fn test_create_in_unknown_model() {
        let state = state(true);
        let (status, body) = call(
            &state,
            Method::POST,
            "/models/65f1c0ffee0000000000abcd/skills",
            None,
            &HeaderMap::new(),
            serde_json::json!({ "code": "S1.1", "preferredLabel": "x" }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "MODEL_NOT_FOUND_BY_ID");
    }

    #[tokio::test]
    async fn test_node_from_other_model_is_not_found() {
        let state = state(true);
        let model_id = create_model(&state).await;
        let (_, other) = call(
            &state,
            Method::POST,
            "/models",
            None,
            &HeaderMap::new(),
            serde_json::json!({ "name": "Other", "locale": "en" }),
        )
        .await;
        let other_id = other["id"].as_str().unwrap();

        let (_, node) = call(
            &state,
            Method::POST,
            &format!("/models/{model_id}/skills"),
            None,
            &HeaderMap::new(),
            serde_json::json!({ "code": "S1.1", "preferredLabel": "x" }),
        )
        .await;
        let id = node["id"].as_str().unwrap();

        let (status, _) = call(
            &state,
            Method::GET,
            &format!("/models/{other_id}/skills/{id}"),
            None,
            &HeaderMap::new(),
            serde_json::Value::Null,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
