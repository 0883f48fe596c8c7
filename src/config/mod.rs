use crate::api::error::AppError;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_EVM_RPC: &str = "https://evmrpc-testnet.0g.ai";
pub const DEFAULT_INDEXER_RPC: &str = "https://indexer-storage-turbo.0g.ai";
pub const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "https://metalayer-indexer.lovable.app",
    "http://localhost:3000",
];

/// Gateway configuration, read once at start-up.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Hex secp256k1 secret key for the process wallet (required)
    pub private_key: String,

    /// JSON-RPC endpoint of the ledger network
    pub evm_rpc: String,

    /// Storage-network indexer endpoint
    pub indexer_rpc: String,

    /// Chain id; fetched with `eth_chainId` on first signer use when unset
    pub chain_id: Option<u64>,

    pub host: String,
    pub port: u16,

    /// Maximum request body in bytes (default: 50 MB)
    pub max_body_size: usize,

    /// Directory for staged upload artifacts
    pub staging_dir: PathBuf,

    pub cors_origins: Vec<String>,

    /// Public URL of this service's `/health`; enables the periodic self check
    pub self_check_url: Option<String>,

    /// Self check period in seconds (default: 30 minutes)
    pub self_check_interval_secs: u64,

    /// Timeout for outbound RPC and indexer calls
    pub rpc_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            private_key: String::new(),
            evm_rpc: DEFAULT_EVM_RPC.to_string(),
            indexer_rpc: DEFAULT_INDEXER_RPC.to_string(),
            chain_id: None,
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_body_size: 50 * 1024 * 1024, // 50 MB
            staging_dir: env::temp_dir().join("metalayer-staging"),
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect(),
            self_check_url: None,
            self_check_interval_secs: 30 * 60,
            rpc_timeout_secs: 60,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// A missing `PRIVATE_KEY` is fatal.
    pub fn from_env() -> Result<Self, AppError> {
        let default = Self::default();

        let private_key = env::var("PRIVATE_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                AppError::Configuration("Missing PRIVATE_KEY in environment".to_string())
            })?;

        Ok(Self {
            private_key,

            evm_rpc: env::var("EVM_RPC").unwrap_or(default.evm_rpc),

            indexer_rpc: env::var("INDEXER_RPC").unwrap_or(default.indexer_rpc),

            chain_id: env::var("CHAIN_ID").ok().and_then(|v| v.parse().ok()),

            host: env::var("HOST").unwrap_or(default.host),

            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),

            max_body_size: env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_body_size),

            staging_dir: env::var("STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.staging_dir),

            cors_origins: env::var("CORS_ORIGINS")
                .map(|v| parse_origins(&v))
                .unwrap_or(default.cors_origins),

            self_check_url: env::var("SELF_CHECK_URL")
                .ok()
                .filter(|v| !v.is_empty()),

            self_check_interval_secs: parse_positive(
                env::var("SELF_CHECK_INTERVAL_SECS").ok(),
                default.self_check_interval_secs,
            ),

            rpc_timeout_secs: env::var("RPC_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.rpc_timeout_secs),
        })
    }

    /// Config for tests and local runs against a fixed chain id.
    pub fn development(private_key: &str) -> Self {
        Self {
            private_key: private_key.to_string(),
            chain_id: Some(16602),
            ..Self::default()
        }
    }
}

/// Parses a non-zero count, falling back to `default` for anything else.
fn parse_positive(raw: Option<String>, default: u64) -> u64 {
    raw.and_then(|v| v.trim().parse().ok())
        .filter(|&v| v > 0)
        .unwrap_or(default)
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.max_body_size, 50 * 1024 * 1024);
        assert_eq!(config.indexer_rpc, DEFAULT_INDEXER_RPC);
        assert_eq!(config.self_check_interval_secs, 1800);
        assert!(config.chain_id.is_none());
        assert_eq!(config.cors_origins.len(), 2);
    }

    #[test]
    fn test_development_config() {
        let config = AppConfig::development("0xabc");
        assert_eq!(config.private_key, "0xabc");
        assert!(config.chain_id.is_some());
    }

    #[test]
    fn test_parse_positive_rejects_zero() {
        assert_eq!(parse_positive(Some("0".to_string()), 1800), 1800);
        assert_eq!(parse_positive(Some("abc".to_string()), 1800), 1800);
        assert_eq!(parse_positive(None, 1800), 1800);
        assert_eq!(parse_positive(Some(" 60 ".to_string()), 1800), 60);
    }

    #[test]
    fn test_parse_origins() {
        let origins = parse_origins(" https://a.example , ,http://b.example");
        assert_eq!(origins, vec!["https://a.example", "http://b.example"]);
    }
}
