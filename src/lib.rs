// Resume ingest - fetch a resume, extract its text (OCR when needed), forward it, audit it

pub mod config;
pub mod db;
pub mod documents;
pub mod models;
pub mod ocr;
pub mod routes;
pub mod types;
pub mod utils;
pub mod webhook;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
