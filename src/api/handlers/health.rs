use crate::AppState;
use axum::{Json, extract::State, response::IntoResponse};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize, ToSchema)]
pub struct InfoResponse {
    pub message: String,
    pub timestamp: String,
    pub status: String,
    pub version: String,
    pub signer: String,
    pub staged_files: u64,
    pub endpoints: Vec<String>,
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service liveness and info", body = InfoResponse)
    ),
    tag = "system"
)]
pub async fn info(State(state): State<AppState>) -> impl IntoResponse {
    Json(InfoResponse {
        message: "MetaLayer Server is running".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        signer: state.uploads.signer().address().to_string(),
        staged_files: state.uploads.staging().active(),
        endpoints: vec![
            "GET /".to_string(),
            "POST /health".to_string(),
            "POST /upload".to_string(),
            "POST /upload-simple".to_string(),
        ],
    })
}

#[utoipa::path(
    post,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}
