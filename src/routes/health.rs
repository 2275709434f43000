use axum::{routing::get, Json, Router};

pub fn router() -> Router {
    Router::new().route("/dummy", get(dummy))
}

/// Warm-up probe; does no work.
async fn dummy() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
