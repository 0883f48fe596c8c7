use crate::api::error::{AppError, ErrorKind};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Which upload path a request is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadRoute {
    /// Signed creator/metadata context attached before submission
    WithContext,
    /// Raw bytes, no signing
    Direct,
}

impl UploadRoute {
    pub fn required_fields(self) -> &'static [&'static str] {
        match self {
            UploadRoute::WithContext => &["fileName", "creator", "fileData"],
            UploadRoute::Direct => &["fileName", "fileData"],
        }
    }
}

/// JSON body of both upload routes. Every field is optional here so that
/// missing fields are reported in the gateway's own error shape.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UploadBody {
    #[validate(length(max = 255, message = "fileName must be at most 255 characters"))]
    pub file_name: Option<String>,
    #[validate(length(max = 128, message = "creator must be at most 128 characters"))]
    pub creator: Option<String>,
    /// Base64 file contents
    pub file_data: Option<String>,
    /// Accepted in any JSON form and ignored
    #[serde(rename = "fileSize")]
    #[schema(value_type = Option<Object>)]
    pub declared_size: Option<serde_json::Value>,
}

/// A validated upload. `payload.len()` is the only size the gateway trusts.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub creator: Option<String>,
    pub payload: Bytes,
}

impl UploadRequest {
    pub fn declared_size(&self) -> u64 {
        self.payload.len() as u64
    }
}

/// Metadata attached to a context-aware upload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileContext {
    pub file_name: String,
    pub creator: String,
    pub file_size: u64,
    pub mime_type: String,
    pub extension: String,
    pub timestamp: DateTime<Utc>,
}

/// Network parameters passed to the storage client alongside the signer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub indexer_rpc: String,
    pub evm_rpc: String,
}

/// The single result shape returned for every upload path.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Success {
        root_hash: Option<String>,
        chunk_count: Option<u64>,
        transaction_hash: Option<String>,
    },
    Failure {
        kind: ErrorKind,
        message: String,
    },
}

/// Outcome plus the request facts echoed back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadReport {
    pub file_name: String,
    pub file_size: u64,
    pub outcome: UploadOutcome,
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Success { .. })
    }
}

impl From<AppError> for UploadOutcome {
    fn from(err: AppError) -> Self {
        UploadOutcome::Failure {
            kind: err.kind(),
            message: err.message(),
        }
    }
}
