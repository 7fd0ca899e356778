//! REST surface over the orchestrator.

mod error;
mod extract;
pub mod handlers;
mod state;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use extract::{ApiJson, ApiPath};
pub use state::AppState;

use std::net::SocketAddr;

use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::Result;

/// Build the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Programs
        .route(
            "/programs",
            get(handlers::list_programs).post(handlers::create_program),
        )
        .route("/programs/:program_id", get(handlers::get_program))
        .route(
            "/programs/:program_id/status",
            put(handlers::set_program_status),
        )
        // Catalog
        .route("/programs/:program_id/phases", get(handlers::list_phases))
        .route(
            "/programs/:program_id/phases/:phase_id",
            get(handlers::get_phase),
        )
        // Entities
        .route(
            "/programs/:program_id/entities",
            get(handlers::list_entities).post(handlers::register_entity),
        )
        .route(
            "/programs/:program_id/entities/:entity_id/status",
            put(handlers::set_entity_status),
        )
        .route(
            "/programs/:program_id/entities/:entity_id/phase",
            get(handlers::get_entity_phase).post(handlers::move_entity),
        )
        .route(
            "/programs/:program_id/entities/:entity_id/phase/advance",
            post(handlers::advance_entity),
        )
        .route(
            "/programs/:program_id/entities/:entity_id/phase/retreat",
            post(handlers::retreat_entity),
        )
        // Winner
        .route(
            "/programs/:program_id/winner",
            get(handlers::get_winner).post(handlers::declare_winner),
        )
        // Board + events
        .route("/programs/:program_id/board", get(handlers::get_board))
        .route("/programs/:program_id/events", get(handlers::stream_events))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve the API until `shutdown` resolves.
pub async fn serve(
    addr: SocketAddr,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "api listening");
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
