//! Configuration for the taxonomy API
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;

/// Taxonomy API - occupation and skill taxonomy over MongoDB
#[derive(Parser, Debug, Clone)]
#[command(name = "taxonomy-api")]
#[command(about = "REST API for hierarchical occupation and skill taxonomies")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "taxonomy")]
    pub mongodb_db: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format (text or json)
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Enable development mode (every caller is a model manager, MongoDB
    /// optional)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// JWT secret for token signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT token expiry in seconds
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "3600")]
    pub jwt_expiry_seconds: u64,

    /// API key granting model manager access (optional)
    #[arg(long, env = "API_KEY_MODEL_MANAGER")]
    pub api_key_model_manager: Option<String>,

    /// Page size when the request gives no limit
    #[arg(long, env = "DEFAULT_PAGE_LIMIT", default_value = "100")]
    pub default_page_limit: usize,

    /// Largest page size a request may ask for
    #[arg(long, env = "MAX_PAGE_LIMIT", default_value = "100")]
    pub max_page_limit: usize,

    /// Largest accepted request body in bytes
    #[arg(long, env = "MAX_BODY_BYTES", default_value = "1048576")]
    pub max_body_bytes: usize,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8080)),
            mongodb_uri: "mongodb://localhost:27017".to_string(),
            mongodb_db: "taxonomy".to_string(),
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            dev_mode: false,
            jwt_secret: None,
            jwt_expiry_seconds: 3600,
            api_key_model_manager: None,
            default_page_limit: 100,
            max_page_limit: 100,
            max_body_bytes: 1024 * 1024,
        }
    }
}

impl Args {
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.jwt_secret.is_none() {
            return Err("JWT_SECRET is required in production mode".to_string());
        }

        if self.max_page_limit == 0 {
            return Err("MAX_PAGE_LIMIT must be at least 1".to_string());
        }

        if self.default_page_limit == 0 || self.default_page_limit > self.max_page_limit {
            return Err("DEFAULT_PAGE_LIMIT must be between 1 and MAX_PAGE_LIMIT".to_string());
        }

        if !matches!(self.log_format.to_ascii_lowercase().as_str(), "text" | "json") {
            return Err(format!(
                "LOG_FORMAT must be 'text' or 'json', got '{}'",
                self.log_format
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev_args() -> Args {
        Args {
            dev_mode: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_jwt_secret_required_outside_dev_mode() {
        assert!(Args::default().validate().is_err());
        assert!(dev_args().validate().is_ok());

        let args = Args {
            jwt_secret: Some("x".repeat(32)),
            ..Default::default()
        };
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_default_limit_within_max() {
        let args = Args {
            default_page_limit: 200,
            ..dev_args()
        };
        assert!(args.validate().is_err());

        let args = Args {
            default_page_limit: 0,
            ..dev_args()
        };
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_format() {
        let args = Args {
            log_format: "JSON".into(),
            ..dev_args()
        };
        assert!(args.validate().is_ok());
        assert!(args.json_logs());

        let args = Args {
            log_format: "xml".into(),
            ..dev_args()
        };
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_parse_from_cli() {
        let args = Args::try_parse_from([
            "taxonomy-api",
            "--listen",
            "127.0.0.1:9000",
            "--dev-mode",
            "--max-page-limit",
            "50",
            "--default-page-limit",
            "20",
        ])
        .unwrap();
        assert_eq!(args.listen.port(), 9000);
        assert!(args.dev_mode);
        assert_eq!(args.default_page_limit, 20);
    }
}
