use crate::AppState;
use crate::api::error::{AppError, failure_response};
use crate::models::{UploadBody, UploadOutcome, UploadReport, UploadRoute};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub root_hash: Option<String>,
    pub total_chunks: Option<u64>,
    pub tx_hash: Option<String>,
    pub file_name: String,
    pub file_size: u64,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SimpleUploadResponse {
    pub success: bool,
    pub message: String,
    pub identifier: Option<String>,
    pub file_name: String,
    pub file_size: u64,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub message: Option<String>,
}

fn parse_body(payload: Result<Json<UploadBody>, JsonRejection>) -> Result<UploadBody, AppError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        AppError::Validation(format!("Invalid JSON body: {}", rejection.body_text()))
    })
}

#[utoipa::path(
    post,
    path = "/upload",
    request_body = UploadBody,
    responses(
        (status = 200, description = "File uploaded with signed context", body = UploadResponse),
        (status = 400, description = "Missing or malformed fields", body = ErrorResponse),
        (status = 500, description = "Upload failed", body = ErrorResponse)
    ),
    tag = "upload"
)]
pub async fn upload(
    State(state): State<AppState>,
    payload: Result<Json<UploadBody>, JsonRejection>,
) -> Response {
    let body = match parse_body(payload) {
        Ok(body) => body,
        Err(e) => return e.into_response(),
    };

    let report = state
        .uploads
        .handle_upload(body, UploadRoute::WithContext)
        .await;
    render(report, |file_name, file_size, root_hash, chunk_count, transaction_hash| {
        Json(UploadResponse {
            success: true,
            message: "File uploaded successfully".to_string(),
            root_hash,
            total_chunks: chunk_count,
            tx_hash: transaction_hash,
            file_name,
            file_size,
        })
        .into_response()
    })
}

#[utoipa::path(
    post,
    path = "/upload-simple",
    request_body = UploadBody,
    responses(
        (status = 200, description = "File uploaded without context", body = SimpleUploadResponse),
        (status = 400, description = "Missing or malformed fields", body = ErrorResponse),
        (status = 500, description = "Upload failed", body = ErrorResponse)
    ),
    tag = "upload"
)]
pub async fn upload_simple(
    State(state): State<AppState>,
    payload: Result<Json<UploadBody>, JsonRejection>,
) -> Response {
    let body = match parse_body(payload) {
        Ok(body) => body,
        Err(e) => return e.into_response(),
    };

    let report = state.uploads.handle_upload(body, UploadRoute::Direct).await;
    render(report, |file_name, file_size, root_hash, _, _| {
        Json(SimpleUploadResponse {
            success: true,
            message: "File uploaded successfully".to_string(),
            identifier: root_hash,
            file_name,
            file_size,
        })
        .into_response()
    })
}

fn render<F>(report: UploadReport, on_success: F) -> Response
where
    F: FnOnce(String, u64, Option<String>, Option<u64>, Option<String>) -> Response,
{
    match report.outcome {
        UploadOutcome::Success {
            root_hash,
            chunk_count,
            transaction_hash,
        } => on_success(
            report.file_name,
            report.file_size,
            root_hash,
            chunk_count,
            transaction_hash,
        ),
        UploadOutcome::Failure { kind, message } => failure_response(kind, &message),
    }
}
