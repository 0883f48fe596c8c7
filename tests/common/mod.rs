#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use metalayer_gateway::config::AppConfig;
use metalayer_gateway::models::{FileContext, NetworkConfig};
use metalayer_gateway::services::file_adapter::SliceReadable;
use metalayer_gateway::services::signer::{SignerProvisioner, SigningSession};
use metalayer_gateway::services::staging::StagingFileManager;
use metalayer_gateway::services::storage::StorageClient;
use metalayer_gateway::services::upload_service::UploadService;
use metalayer_gateway::{AppState, create_app};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Barrier;

pub const TEST_KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

#[derive(Clone)]
pub enum Reply {
    Json(Value),
    Fail(String),
}

impl Reply {
    fn produce(&self) -> anyhow::Result<Value> {
        match self {
            Reply::Json(v) => Ok(v.clone()),
            Reply::Fail(msg) => Err(anyhow::anyhow!(msg.clone())),
        }
    }
}

/// Storage client double that records calls and in-flight windows.
pub struct StubStorage {
    pub context_reply: Reply,
    pub file_reply: Reply,
    pub delay: Duration,
    pub file_barrier: Option<Barrier>,
    pub context_calls: AtomicUsize,
    pub file_calls: AtomicUsize,
    pub next_id: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub events: Mutex<Vec<String>>,
    pub seen_paths: Mutex<Vec<(PathBuf, bool)>>,
    pub seen_contexts: Mutex<Vec<FileContext>>,
}

impl StubStorage {
    pub fn new(context_reply: Reply, file_reply: Reply) -> Self {
        Self {
            context_reply,
            file_reply,
            delay: Duration::ZERO,
            file_barrier: None,
            context_calls: AtomicUsize::new(0),
            file_calls: AtomicUsize::new(0),
            next_id: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            events: Mutex::new(Vec::new()),
            seen_paths: Mutex::new(Vec::new()),
            seen_contexts: Mutex::new(Vec::new()),
        }
    }

    pub fn total_calls(&self) -> usize {
        self.context_calls.load(Ordering::SeqCst) + self.file_calls.load(Ordering::SeqCst)
    }

    fn enter(&self, label: &str) -> usize {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.events.lock().unwrap().push(format!("start:{}:{}", label, id));
        id
    }

    fn leave(&self, label: &str, id: usize) {
        self.events.lock().unwrap().push(format!("end:{}:{}", label, id));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StorageClient for StubStorage {
    async fn upload_with_context(
        &self,
        file: &dyn SliceReadable,
        ctx: &FileContext,
        _network: &NetworkConfig,
        session: &mut SigningSession<'_>,
    ) -> anyhow::Result<Value> {
        let id = self.enter("ctx");
        self.context_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_contexts.lock().unwrap().push(ctx.clone());

        // Exercise the adapter and signer the way a real client would.
        let bytes = file.read_range(0, file.size() as i64).await?;
        assert_eq!(bytes.len() as u64, ctx.file_size);
        session.sign_message(&bytes)?;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.leave("ctx", id);
        self.context_reply.produce()
    }

    async fn upload_file(&self, path: &Path) -> anyhow::Result<Value> {
        let id = self.enter("file");
        self.file_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_paths
            .lock()
            .unwrap()
            .push((path.to_path_buf(), path.exists()));

        if let Some(barrier) = &self.file_barrier {
            barrier.wait().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.leave("file", id);
        self.file_reply.produce()
    }
}

pub struct TestApp {
    pub app: Router,
    pub uploads: Arc<UploadService>,
    pub storage: Arc<StubStorage>,
    pub staging_dir: TempDir,
}

pub fn build_service(storage: Arc<StubStorage>, staging_dir: &Path) -> Arc<UploadService> {
    let mut config = AppConfig::development(TEST_KEY);
    config.staging_dir = staging_dir.to_path_buf();
    build_service_with(storage, &config)
}

pub fn build_service_with(storage: Arc<StubStorage>, config: &AppConfig) -> Arc<UploadService> {
    let signer = Arc::new(SignerProvisioner::new(config).unwrap());
    Arc::new(UploadService::new(
        storage,
        signer,
        StagingFileManager::new(config.staging_dir.clone()),
        NetworkConfig {
            indexer_rpc: config.indexer_rpc.clone(),
            evm_rpc: config.evm_rpc.clone(),
        },
    ))
}

pub fn test_app(storage: StubStorage) -> TestApp {
    let mut config = AppConfig::development(TEST_KEY);
    let staging_dir = tempfile::tempdir().unwrap();
    config.staging_dir = staging_dir.path().to_path_buf();
    test_app_with(storage, config, staging_dir)
}

/// Like [`test_app`] but with caller-tuned configuration.
pub fn test_app_with(storage: StubStorage, config: AppConfig, staging_dir: TempDir) -> TestApp {
    let storage = Arc::new(storage);
    let uploads = build_service_with(storage.clone(), &config);

    let app = create_app(AppState {
        uploads: uploads.clone(),
        config: Arc::new(config),
    });

    TestApp {
        app,
        uploads,
        storage,
        staging_dir,
    }
}
