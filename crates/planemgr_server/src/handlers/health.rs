use axum::{Router, response::Json, routing::get};
use serde::Serialize;

/// Liveness response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub time: String,
}

/// Create health routes
pub fn health_routes() -> Router {
    Router::new().route("/health", get(get_health))
}

/// GET /api/health - Liveness probe (public endpoint)
async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        time: chrono::Utc::now().to_rfc3339(),
    })
}
