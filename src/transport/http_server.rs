use std::net::SocketAddr;

use anyhow::Result;
use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{self, AppState};
use crate::config::ClientConfig;
use crate::github::GithubClient;

/// Builds the `/api/github/*` router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/github/download",
            get(handlers::download_get).post(handlers::download_post),
        )
        .route("/api/github/search", get(handlers::search))
        .route("/api/github/trending", get(handlers::trending))
        .route("/api/github/branches", get(handlers::branches))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub struct HttpServerApp {
    bind_addr: SocketAddr,
    config: ClientConfig,
    enable_cors: bool,
}

impl HttpServerApp {
    pub fn new(bind_addr: SocketAddr, config: ClientConfig) -> Self {
        Self {
            bind_addr,
            config,
            enable_cors: false,
        }
    }

    /// Allow any origin, for browser front ends served from another host
    pub fn with_cors(mut self, enable_cors: bool) -> Self {
        self.enable_cors = enable_cors;
        self
    }

    pub async fn serve(self) -> Result<()> {
        tracing::info!("{}", self.config.auth_status());
        let client = GithubClient::new(self.config)?;

        let mut app = router(AppState::new(client));
        if self.enable_cors {
            app = app.layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));
        }

        let listener = TcpListener::bind(self.bind_addr).await?;
        tracing::info!("Listening on http://{}", listener.local_addr()?);

        // Wait for Ctrl+C signal to gracefully shutdown
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for Ctrl+C: {}", e);
                }
                tracing::info!("Shutting down");
            })
            .await?;

        Ok(())
    }
}
