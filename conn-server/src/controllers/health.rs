use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

pub const SERVING: &str = "SERVING_STATUS_SERVING";

pub fn new_router() -> Router {
    Router::new()
        .route("/__liveness", get(health))
        .route("/__readiness", get(health))
}

async fn health() -> Json<Value> {
    Json(json!({
        "health_check_response": {"status": SERVING}
    }))
}
