use crate::handlers;
use crate::middleware::webhook_auth_middleware;
use crate::state::AppState;
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::normalize_path::NormalizePath;
use tower_http::trace::TraceLayer;

/// Build and configure the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Pipefy webhook, guarded by the shared secret
        .route(
            "/webhook/pipefy",
            post(handlers::pipefy_webhook)
                .route_layer(from_fn_with_state(state.clone(), webhook_auth_middleware)),
        )
        // Middleware
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Router wrapped so trailing slashes are trimmed before route matching
pub fn build_app(state: AppState) -> NormalizePath<Router> {
    NormalizePath::trim_trailing_slash(build_router(state))
}
