//! Machine Learning as a Service
//!
//! REST gateway that stores labeled sensor samples per dataset id (dsid),
//! trains a classifier for a dataset on demand and serves predictions.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         MLAAS                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐        ┌──────────────────────────────────┐  │
//! │  │  API      │───────►│  Model Manager                   │  │
//! │  │  Gateway  │        │  (per-dsid cache, train/predict) │  │
//! │  │  (Axum)   │        └──────┬─────────────────┬─────────┘  │
//! │  └─────┬─────┘               │                 │            │
//! │        ▼                     ▼                 ▼            │
//! │  ┌─────────────────────────────────┐   ┌──────────────────┐ │
//! │  │ Sample Store (PostgreSQL / mem) │   │ models/*.bin     │ │
//! │  └─────────────────────────────────┘   └──────────────────┘ │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod db;
mod error;
mod extract;
mod handlers;
mod ml;
mod models;
mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use error::{AppError, AppResult};

use config::{Config, StoreBackend};
use ml::{FitParams, ModelManager, ModelRepository};
use store::{MemorySampleStore, PgSampleStore, SampleStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    init_tracing(config.json_logs);

    tracing::info!("MLaaS server starting...");

    let store: Arc<dyn SampleStore> = match config.store_backend {
        StoreBackend::Postgres => {
            tracing::info!("Database: {}", config.database_url.split('@').last().unwrap_or("***"));

            let pool = db::create_pool(&config.database_url)
                .await
                .context("Failed to create database pool")?;

            tracing::info!("Running database migrations...");
            db::run_migrations(&pool)
                .await
                .context("Failed to run migrations")?;

            Arc::new(PgSampleStore::new(pool))
        }
        StoreBackend::Memory => {
            if config.is_production() {
                tracing::warn!("In-memory sample store in production: samples are lost on restart");
            } else {
                tracing::info!("Using in-memory sample store");
            }
            Arc::new(MemorySampleStore::new())
        }
    };

    let state = AppState::new(store, config.clone());
    tracing::info!(
        "Models directory: {} (default algorithm: {})",
        config.models_dir.display(),
        state.models.default_algorithm()
    );

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mlaas_server=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SampleStore>,
    pub models: Arc<ModelManager>,
    pub config: Config,
}

impl AppState {
    pub fn new(store: Arc<dyn SampleStore>, config: Config) -> Self {
        let models = ModelManager::new(
            Arc::clone(&store),
            ModelRepository::new(config.models_dir.clone()),
            FitParams { knn_neighbors: config.knn_neighbors },
            config.default_algorithm,
        );

        Self {
            store,
            models: Arc::new(models),
            config,
        }
    }
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    // Sample collection
    let data_routes = Router::new()
        .route("/labeled_data/", post(handlers::samples::create))
        .route(
            "/labeled_data/:dsid",
            get(handlers::samples::list).delete(handlers::samples::delete_dataset),
        )
        .route("/max_dsid/", get(handlers::datasets::max_dsid));

    // Training and prediction
    let model_routes = Router::new()
        .route("/train_model/:dsid", get(handlers::training::train))
        .route("/train_model_sklearn/:dsid", get(handlers::training::train_knn))
        .route("/train_model_turi/:dsid", get(handlers::training::train_auto))
        .route("/predict/", post(handlers::training::predict))
        .route("/predict_sklearn/", post(handlers::training::predict))
        .route("/predict_turi/", post(handlers::training::predict))
        .route("/models/:dsid", get(handlers::training::status));

    // Combine all routes
    Router::new()
        .route("/health", get(handlers::health::check))
        .merge(data_routes)
        .merge(model_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
