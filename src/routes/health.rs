//! Liveness endpoint

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    /// Always "online" while the process serves requests
    pub status: &'static str,
    pub version: &'static str,
    /// Seconds since the server state was built
    pub uptime: u64,
    pub timestamp: String,
    /// "development" or "production"
    pub mode: &'static str,
    /// Whether the repository registry has been initialized
    pub repositories: bool,
}

fn build_health_response(state: &AppState) -> HealthResponse {
    HealthResponse {
        healthy: true,
        status: "online",
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        mode: if state.args.dev_mode {
            "development"
        } else {
            "production"
        },
        repositories: state.registry.is_initialized(),
    }
}

/// Handle liveness probe (/health, /healthz)
///
/// Returns 200 whenever the process is up, even before the repositories are
/// ready; the body says which.
pub fn health_check(state: &AppState) -> Response<Full<Bytes>> {
    let response = build_health_response(state);

    let body = serde_json::to_string(&response)
        .unwrap_or_else(|_| r#"{"healthy":true,"error":"Serialization failed"}"#.to_string());

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}
