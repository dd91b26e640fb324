//! HTTP surface of the token server.
//!
//! - `token` - OAuth2 token endpoint (/connect/token)
//! - `health` - Health check endpoint (/healthz)
//! - `openapi` - OpenAPI/Utoipa configuration

pub mod health;
pub mod openapi;
pub mod token;

pub use health::MISC_TAG;
pub use token::TOKEN_TAG;

use crate::grant::GrantDispatcher;
use axum::Router;
use sea_orm::DatabaseConnection;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_redoc::{Redoc, Servable};

/// Shared state of the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<GrantDispatcher>,
    pub db: Arc<DatabaseConnection>,
}

/// Builds the application router with documentation and middleware attached.
pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(openapi::ApiDoc::openapi())
        .routes(routes!(token::token))
        .routes(routes!(health::health))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .split_for_parts();

    router.merge(Redoc::with_url("/api-docs", api))
}

/// Starts the web server on `addr`.
#[tracing::instrument(skip(state))]
pub async fn start_webserver(state: AppState, addr: SocketAddr) -> color_eyre::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Server running");
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| color_eyre::Report::msg(format!("Failed to start server: {e}")))?;

    Ok(())
}
