use crate::api::error::AppError;
use crate::models::{
    NetworkConfig, UploadBody, UploadOutcome, UploadReport, UploadRequest, UploadRoute,
};
use crate::services::context::ContextService;
use crate::services::file_adapter::MemoryFile;
use crate::services::normalizer::normalize;
use crate::services::signer::SignerProvisioner;
use crate::services::staging::StagingFileManager;
use crate::services::storage::StorageClient;
use crate::utils::validation::{decode_payload, is_missing};
use std::sync::Arc;
use validator::Validate;

/// Routes a validated upload to the context-aware or direct storage path and
/// normalises the result.
pub struct UploadService {
    storage: Arc<dyn StorageClient>,
    signer: Arc<SignerProvisioner>,
    staging: StagingFileManager,
    network: NetworkConfig,
}

impl UploadService {
    pub fn new(
        storage: Arc<dyn StorageClient>,
        signer: Arc<SignerProvisioner>,
        staging: StagingFileManager,
        network: NetworkConfig,
    ) -> Self {
        Self {
            storage,
            signer,
            staging,
            network,
        }
    }

    pub fn staging(&self) -> &StagingFileManager {
        &self.staging
    }

    pub fn signer(&self) -> &SignerProvisioner {
        &self.signer
    }

    /// Validates, then runs the route's upload path. Validation failures
    /// return before any staging, signing, or downstream work.
    pub async fn handle_upload(&self, body: UploadBody, route: UploadRoute) -> UploadReport {
        let request = match Self::validate(body.clone(), route) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("Rejected upload: {}", e);
                return UploadReport {
                    file_name: body.file_name.unwrap_or_default(),
                    file_size: 0,
                    outcome: e.into(),
                };
            }
        };

        let file_name = request.file_name.clone();
        let file_size = request.declared_size();
        let outcome = match route {
            UploadRoute::WithContext => self.upload_with_context(request).await,
            UploadRoute::Direct => self.upload_simple(request).await,
        };

        match &outcome {
            UploadOutcome::Success { root_hash, .. } => tracing::info!(
                "✅ Uploaded {} ({} bytes), root {}",
                file_name,
                file_size,
                root_hash.as_deref().unwrap_or("-")
            ),
            UploadOutcome::Failure { kind, message } => {
                tracing::error!("❌ Upload of {} failed [{}]: {}", file_name, kind.code(), message)
            }
        }

        UploadReport {
            file_name,
            file_size,
            outcome,
        }
    }

    pub fn validate(mut body: UploadBody, route: UploadRoute) -> Result<UploadRequest, AppError> {
        let missing = is_missing(body.file_name.as_deref())
            || is_missing(body.file_data.as_deref())
            || (route == UploadRoute::WithContext && is_missing(body.creator.as_deref()));
        if missing {
            return Err(AppError::Validation(format!(
                "Missing required fields: {}",
                route.required_fields().join(", ")
            )));
        }

        // The direct route never reads `creator`.
        if route == UploadRoute::Direct {
            body.creator = None;
        }
        body.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let payload = decode_payload(body.file_data.as_deref().unwrap_or_default())
            .map_err(|e| AppError::Validation(e.to_string()))?;

        if let Some(declared) = &body.declared_size {
            tracing::debug!(
                "Ignoring declared fileSize {} (payload is {} bytes)",
                declared,
                payload.len()
            );
        }

        Ok(UploadRequest {
            file_name: body.file_name.unwrap_or_default(),
            creator: body.creator,
            payload,
        })
    }

    /// Context-aware path: in-memory adapter, signed metadata, one signing
    /// session for the duration of the downstream call.
    pub async fn upload_with_context(&self, request: UploadRequest) -> UploadOutcome {
        let Some(creator) = request.creator.as_deref() else {
            return AppError::Validation(format!(
                "Missing required fields: {}",
                UploadRoute::WithContext.required_fields().join(", ")
            ))
            .into();
        };

        let ctx = ContextService::detect(&request.file_name, creator, &request.payload);
        let file = MemoryFile::new(request.payload.clone());

        let signing = match self.signer.get_signer().await {
            Ok(signing) => signing,
            Err(e) => return e.into(),
        };

        tracing::info!(
            "📤 Uploading {} ({} bytes, {}) for {}",
            ctx.file_name,
            ctx.file_size,
            ctx.mime_type,
            creator
        );

        let raw = {
            let mut session = signing.acquire().await;
            self.storage
                .upload_with_context(&file, &ctx, &self.network, &mut session)
                .await
        };

        normalize(raw)
    }

    /// Direct path: the storage client wants a path, so the payload is
    /// staged and released once the call has settled.
    pub async fn upload_simple(&self, request: UploadRequest) -> UploadOutcome {
        let artifact = match self
            .staging
            .stage(&request.payload, &request.file_name)
            .await
        {
            Ok(artifact) => artifact,
            Err(e) => return e.into(),
        };

        tracing::info!(
            "📤 Uploading {} ({} bytes) via staged file",
            request.file_name,
            request.payload.len()
        );

        let raw = self.storage.upload_file(artifact.path()).await;
        self.staging.unstage(artifact).await;

        normalize(raw)
    }
}
