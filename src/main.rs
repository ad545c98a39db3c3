//! Taxonomy API server

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use taxonomy_api::{
    auth::{ApiKeyValidator, Authenticator, JwtValidator},
    config::Args,
    db::{InMemoryTaxonomyStore, MongoClient, MongoTaxonomyStore, TaxonomyStore},
    server::{self, AppState},
    taxonomy::RepositoryRegistry,
    types::redact_credentials,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("taxonomy_api={},info", args.log_level).into());
    if args.json_logs() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Taxonomy API v{}", env!("CARGO_PKG_VERSION"));
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {} (db {})", redact_credentials(&args.mongodb_uri), args.mongodb_db);
    info!("Page limit: default {}, max {}", args.default_page_limit, args.max_page_limit);
    info!("======================================");

    // MongoDB is optional in dev mode
    let store: Arc<dyn TaxonomyStore> = match connect_store(&args).await {
        Ok(store) => {
            info!("MongoDB connected successfully");
            store
        }
        Err(e) if args.dev_mode => {
            warn!("MongoDB connection failed (dev mode, using in-memory store): {}", e);
            Arc::new(InMemoryTaxonomyStore::new())
        }
        Err(e) => {
            error!("MongoDB connection failed: {}", e);
            std::process::exit(1);
        }
    };

    let registry = Arc::new(RepositoryRegistry::new());
    registry.initialize(store)?;

    let jwt = match args.jwt_secret.clone() {
        Some(secret) => JwtValidator::new(secret, args.jwt_expiry_seconds)?,
        None => {
            warn!("No JWT_SECRET set, using the development signing key");
            JwtValidator::new_dev()
        }
    };
    let api_keys = ApiKeyValidator::new(args.api_key_model_manager.clone());
    if api_keys.is_configured() {
        info!("Model manager API key configured");
    }
    let auth = Authenticator::new(jwt, api_keys, args.dev_mode);

    let state = Arc::new(AppState::new(args, registry, auth));
    server::run(state).await?;

    Ok(())
}

async fn connect_store(args: &Args) -> taxonomy_api::Result<Arc<dyn TaxonomyStore>> {
    let mongo = MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await?;
    let store = MongoTaxonomyStore::new(&mongo).await?;
    Ok(Arc::new(store))
}
