use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::server::{handlers, state::ApiState};

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))

        // Session lifecycle
        .route("/sessions", post(handlers::create_session))
        .route("/sessions/:id", delete(handlers::close_session))
        .route("/sessions/:id/state", get(handlers::get_state))
        .route("/sessions/:id/changes", get(handlers::wait_for_changes))

        // Actions
        .route("/sessions/:id/fetch", post(handlers::fetch))
        .route("/sessions/:id/analysis", post(handlers::run_analysis))
        .route("/sessions/:id/clusters", post(handlers::run_clustering))
        .route("/sessions/:id/forecast", post(handlers::run_forecast))
        .route("/sessions/:id/compare", post(handlers::compare_models))
        .route("/sessions/:id/readme-tips", post(handlers::readme_tips))
        .route("/sessions/:id/persona", post(handlers::persona))
        .route("/sessions/:id/sentiment", post(handlers::latest_commit_sentiment))

        // Read-only views
        .route("/sessions/:id/overview", get(handlers::overview))

        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
