//! REST API implementation
//!
//! Exposes the metrics pipeline over HTTP.

pub mod handlers;
pub mod routes;

pub use handlers::AppState;
pub use routes::create_router;

use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::error::{Error, Result};
use crate::models::DataSourceConfig;
use crate::pipeline::BatchOrchestrator;

/// HTTP API server
pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(orchestrator: Arc<BatchOrchestrator>, default_source: Option<DataSourceConfig>) -> Self {
        Self {
            state: AppState {
                orchestrator,
                default_source,
            },
        }
    }

    /// Start the HTTP server and run until ctrl-c
    pub async fn serve(self, addr: &str) -> Result<()> {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let app = create_router(self.state).layer(cors);

        let listener = TcpListener::bind(addr).await?;

        info!("HTTP server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                info!("Shutting down HTTP server");
            })
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        Ok(())
    }
}
