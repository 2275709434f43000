//! HTTP routes
//!
//! - `GET /dummy` - warm-up no-op
//! - `POST /submit-resumes` - fetch, extract, forward and audit one resume

pub mod health;
pub mod resumes;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::models::AppState;

pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    Router::new()
        .merge(health::router())
        .merge(resumes::router(state))
        .layer(TraceLayer::new_for_http())
}
