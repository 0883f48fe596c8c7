use crate::api::error::AppError;
use crate::config::AppConfig;
use crate::utils::hash::keccak256;
use anyhow::{Context, Result, anyhow};
use k256::ecdsa::SigningKey;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard, OnceCell};

/// secp256k1 wallet with an Ethereum-style address.
#[derive(Clone)]
pub struct WalletSigner {
    key: SigningKey,
    address: String,
}

impl std::fmt::Debug for WalletSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl WalletSigner {
    pub fn from_hex(secret: &str) -> Result<Self, AppError> {
        let bytes = hex::decode(secret.trim().trim_start_matches("0x"))
            .map_err(|_| AppError::Configuration("PRIVATE_KEY is not valid hex".to_string()))?;
        if bytes.len() != 32 {
            return Err(AppError::Configuration(
                "PRIVATE_KEY must be 32 bytes".to_string(),
            ));
        }
        let key = SigningKey::from_slice(&bytes).map_err(|_| {
            AppError::Configuration("PRIVATE_KEY is not a valid secp256k1 key".to_string())
        })?;

        let point = key.verifying_key().to_encoded_point(false);
        let digest = keccak256(&point.as_bytes()[1..]);
        let address = format!("0x{}", hex::encode(&digest[12..]));

        Ok(Self { key, address })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// EIP-191 personal-message signature, hex encoded as `r || s || v`.
    pub fn sign_message(&self, message: &[u8]) -> Result<String, AppError> {
        let digest = personal_message_hash(message);
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(&digest)
            .map_err(|e| AppError::Signer(format!("Signing failed: {}", e)))?;

        let mut out = Vec::with_capacity(65);
        out.extend_from_slice(&signature.to_bytes());
        out.push(27 + recovery_id.to_byte());
        Ok(format!("0x{}", hex::encode(out)))
    }
}

pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
    let mut prefixed = format!("\x19Ethereum Signed Message:\n{}", message.len()).into_bytes();
    prefixed.extend_from_slice(message);
    keccak256(&prefixed)
}

/// JSON-RPC client for the ledger network.
#[derive(Debug, Clone)]
pub struct RpcProvider {
    client: reqwest::Client,
    url: String,
    next_id: Arc<AtomicU64>,
}

impl RpcProvider {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build RPC client")?;
        Ok(Self {
            client,
            url: url.to_string(),
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({"jsonrpc": "2.0", "method": method, "params": params, "id": id});

        let response: Value = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("{} request failed", method))?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = response.get("error").filter(|e| !e.is_null()) {
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown RPC error");
            return Err(anyhow!("{} failed: {}", method, message));
        }
        response
            .get("result")
            .cloned()
            .ok_or_else(|| anyhow!("{} returned no result", method))
    }

    pub async fn chain_id(&self) -> Result<u64> {
        let result = self.call("eth_chainId", json!([])).await?;
        parse_quantity(&result)
    }

    pub async fn transaction_count(&self, address: &str) -> Result<u64> {
        let result = self
            .call("eth_getTransactionCount", json!([address, "pending"]))
            .await?;
        parse_quantity(&result)
    }
}

fn parse_quantity(value: &Value) -> Result<u64> {
    let hex_str = value
        .as_str()
        .ok_or_else(|| anyhow!("expected hex quantity, got {}", value))?;
    u64::from_str_radix(hex_str.trim_start_matches("0x"), 16)
        .with_context(|| format!("invalid hex quantity {}", hex_str))
}

#[derive(Debug, Default)]
struct NonceCursor {
    next: Option<u64>,
}

/// The process-wide provider and signer. Only reachable through
/// [`SigningContext::acquire`], which admits one session at a time.
#[derive(Debug)]
pub struct SigningContext {
    provider: RpcProvider,
    signer: WalletSigner,
    chain_id: u64,
    slot: Mutex<NonceCursor>,
}

impl SigningContext {
    pub fn new(provider: RpcProvider, signer: WalletSigner, chain_id: u64) -> Self {
        Self {
            provider,
            signer,
            chain_id,
            slot: Mutex::new(NonceCursor::default()),
        }
    }

    /// Waits for the signing slot. The slot is held until the session drops.
    pub async fn acquire(&self) -> SigningSession<'_> {
        let cursor = self.slot.lock().await;
        SigningSession { ctx: self, cursor }
    }
}

/// Exclusive use of the signer for one signed operation.
pub struct SigningSession<'a> {
    ctx: &'a SigningContext,
    cursor: MutexGuard<'a, NonceCursor>,
}

impl SigningSession<'_> {
    pub fn address(&self) -> &str {
        self.ctx.signer.address()
    }

    pub fn chain_id(&self) -> u64 {
        self.ctx.chain_id
    }

    pub fn sign_message(&self, message: &[u8]) -> Result<String, AppError> {
        self.ctx.signer.sign_message(message)
    }

    /// Next transaction sequence number. Fetched from the network on first
    /// use (or after a reset), then advanced locally.
    pub async fn next_nonce(&mut self) -> Result<u64, AppError> {
        let nonce = match self.cursor.next {
            Some(n) => n,
            None => self
                .ctx
                .provider
                .transaction_count(self.ctx.signer.address())
                .await
                .map_err(|e| AppError::Signer(format!("Failed to fetch nonce: {}", e)))?,
        };
        self.cursor.next = Some(nonce + 1);
        Ok(nonce)
    }

    /// Forget the local nonce so the next session re-reads it from the
    /// network. Call after a submission fails.
    pub fn reset_nonce(&mut self) {
        self.cursor.next = None;
    }
}

/// Builds the [`SigningContext`] at most once per process.
pub struct SignerProvisioner {
    signer: WalletSigner,
    evm_rpc: String,
    chain_id: Option<u64>,
    timeout: Duration,
    context: OnceCell<Arc<SigningContext>>,
    constructions: AtomicUsize,
}

impl SignerProvisioner {
    /// Fails with a configuration error when the secret key is absent or
    /// malformed. Nothing touches the network here.
    pub fn new(config: &AppConfig) -> Result<Self, AppError> {
        if config.private_key.trim().is_empty() {
            return Err(AppError::Configuration(
                "Missing PRIVATE_KEY in environment".to_string(),
            ));
        }
        let signer = WalletSigner::from_hex(&config.private_key)?;
        tracing::info!("🔑 Wallet signer configured for {}", signer.address());

        Ok(Self {
            signer,
            evm_rpc: config.evm_rpc.clone(),
            chain_id: config.chain_id,
            timeout: Duration::from_secs(config.rpc_timeout_secs),
            context: OnceCell::new(),
            constructions: AtomicUsize::new(0),
        })
    }

    pub fn address(&self) -> &str {
        self.signer.address()
    }

    pub async fn get_signer(&self) -> Result<Arc<SigningContext>, AppError> {
        self.context
            .get_or_try_init(|| async {
                self.constructions.fetch_add(1, Ordering::SeqCst);

                let provider = RpcProvider::new(&self.evm_rpc, self.timeout)
                    .map_err(|e| AppError::Signer(e.to_string()))?;
                let chain_id = match self.chain_id {
                    Some(id) => id,
                    None => provider
                        .chain_id()
                        .await
                        .map_err(|e| AppError::Signer(format!("Provider unavailable: {}", e)))?,
                };

                tracing::info!(
                    "⛓️  Signing context ready (chain {}, rpc {})",
                    chain_id,
                    provider.url()
                );
                Ok::<_, AppError>(Arc::new(SigningContext::new(
                    provider,
                    self.signer.clone(),
                    chain_id,
                )))
            })
            .await
            .cloned()
    }

    /// Number of times the signing context has been built (at most one
    /// success).
    pub fn constructions(&self) -> usize {
        self.constructions.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

    const KEY_ONE: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";

    #[test]
    fn test_address_derivation() {
        let signer = WalletSigner::from_hex(KEY_ONE).unwrap();
        assert_eq!(
            signer.address(),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn test_invalid_keys_are_configuration_errors() {
        let zero = "00".repeat(32);
        for bad in ["", "0xzz", "0x1234", zero.as_str()] {
            let err = WalletSigner::from_hex(bad).unwrap_err();
            assert!(matches!(err, AppError::Configuration(_)), "{}", bad);
        }
    }

    #[test]
    fn test_signature_recovers_to_signer() {
        let signer = WalletSigner::from_hex(KEY_ONE).unwrap();
        let sig_hex = signer.sign_message(b"metalayer").unwrap();
        let raw = hex::decode(sig_hex.trim_start_matches("0x")).unwrap();
        assert_eq!(raw.len(), 65);

        let signature = Signature::from_slice(&raw[..64]).unwrap();
        let recovery_id = RecoveryId::from_byte(raw[64] - 27).unwrap();
        let recovered = VerifyingKey::recover_from_prehash(
            &personal_message_hash(b"metalayer"),
            &signature,
            recovery_id,
        )
        .unwrap();
        assert_eq!(&recovered, signer.key.verifying_key());
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity(&json!("0x10")).unwrap(), 16);
        assert!(parse_quantity(&json!(16)).is_err());
    }

    #[test]
    fn test_missing_key_is_fatal() {
        let config = AppConfig::default();
        let err = SignerProvisioner::new(&config).err().unwrap();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_get_signer_builds_once() {
        let provisioner = SignerProvisioner::new(&AppConfig::development(KEY_ONE)).unwrap();

        let first = provisioner.get_signer().await.unwrap();
        let second = provisioner.get_signer().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(provisioner.constructions(), 1);
        let session = first.acquire().await;
        assert_eq!(session.address(), provisioner.address());
        assert_eq!(session.chain_id(), 16602);
    }

    #[tokio::test]
    async fn test_sessions_are_exclusive() {
        let provisioner = SignerProvisioner::new(&AppConfig::development(KEY_ONE)).unwrap();
        let ctx = provisioner.get_signer().await.unwrap();

        let session = ctx.acquire().await;
        assert!(ctx.slot.try_lock().is_err());
        drop(session);
        assert!(ctx.slot.try_lock().is_ok());
    }

    #[tokio::test]
    async fn test_nonce_advances_locally() {
        let provisioner = SignerProvisioner::new(&AppConfig::development(KEY_ONE)).unwrap();
        let ctx = provisioner.get_signer().await.unwrap();

        {
            let mut session = ctx.acquire().await;
            session.cursor.next = Some(7);
            assert_eq!(session.next_nonce().await.unwrap(), 7);
            assert_eq!(session.next_nonce().await.unwrap(), 8);
        }
        let mut session = ctx.acquire().await;
        assert_eq!(session.cursor.next, Some(9));
        session.reset_nonce();
        assert_eq!(session.cursor.next, None);
    }
}
