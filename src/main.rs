use dotenvy::dotenv;
use metalayer_gateway::config::AppConfig;
use metalayer_gateway::models::NetworkConfig;
use metalayer_gateway::services::health_monitor::HealthMonitor;
use metalayer_gateway::services::signer::SignerProvisioner;
use metalayer_gateway::services::staging::StagingFileManager;
use metalayer_gateway::services::storage::IndexerClient;
use metalayer_gateway::services::upload_service::UploadService;
use metalayer_gateway::{AppState, create_app};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Initialize tracing with EnvFilter
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "metalayer_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting MetaLayer gateway...");

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };
    info!(
        "⚙️  Indexer: {}, RPC: {}, Max body: {}MB, Staging: {:?}",
        config.indexer_rpc,
        config.evm_rpc,
        config.max_body_size / 1024 / 1024,
        config.staging_dir
    );

    let signer = Arc::new(SignerProvisioner::new(&config)?);
    let storage = Arc::new(IndexerClient::new(
        &config.indexer_rpc,
        Duration::from_secs(config.rpc_timeout_secs),
    )?);
    let uploads = Arc::new(UploadService::new(
        storage,
        signer,
        StagingFileManager::new(config.staging_dir.clone()),
        NetworkConfig {
            indexer_rpc: config.indexer_rpc.clone(),
            evm_rpc: config.evm_rpc.clone(),
        },
    ));

    // Setup Shutdown Channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    if let Some(url) = config.self_check_url.clone() {
        let monitor = HealthMonitor::new(
            url,
            Duration::from_secs(config.self_check_interval_secs),
            shutdown_rx,
        );
        tokio::spawn(monitor.run());
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let state = AppState {
        uploads,
        config: Arc::new(config),
    };

    let app = create_app(state);

    info!("✅ Server ready at http://{}", addr);
    info!("📖 Swagger UI: http://{}/swagger-ui", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .await?;

    info!("🛑 Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, starting graceful shutdown...");
        },
    }
}
