use crate::models::{FileContext, NetworkConfig};
use crate::services::file_adapter::{SliceReadable, StagedFileSource};
use crate::services::signer::SigningSession;
use crate::utils::hash::{keccak256, merkle_root};
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use std::path::Path;
use std::time::Duration;

/// Storage-network chunk size in bytes.
pub const CHUNK_SIZE: u64 = 256;
/// Chunks are shipped to the indexer in segments of this many bytes.
pub const SEGMENT_SIZE: u64 = 1024 * CHUNK_SIZE;

/// Downstream storage client. Implementations return the raw result shape;
/// callers run it through the normalizer.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Upload with signed creator/metadata context. The session is held for
    /// the whole call.
    async fn upload_with_context(
        &self,
        file: &dyn SliceReadable,
        ctx: &FileContext,
        network: &NetworkConfig,
        session: &mut SigningSession<'_>,
    ) -> Result<Value>;

    /// Raw upload of a file on disk. No signing.
    async fn upload_file(&self, path: &Path) -> Result<Value>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileLayout {
    pub root_hash: String,
    pub total_chunks: u64,
    pub segments: u64,
}

pub fn total_chunks(size: u64) -> u64 {
    size.div_ceil(CHUNK_SIZE)
}

/// Reads the file segment by segment and derives its merkle root.
pub async fn compute_layout(file: &dyn SliceReadable) -> Result<FileLayout> {
    let size = file.size();
    let segments = size.div_ceil(SEGMENT_SIZE);
    let mut leaves = Vec::with_capacity(segments as usize);

    for index in 0..segments {
        let (start, end) = segment_bounds(index, size);
        let segment = file.read_range(start, end).await?;
        leaves.push(keccak256(&segment));
    }

    Ok(FileLayout {
        root_hash: format!("0x{}", hex::encode(merkle_root(&leaves))),
        total_chunks: total_chunks(size),
        segments,
    })
}

fn segment_bounds(index: u64, size: u64) -> (i64, i64) {
    let start = index * SEGMENT_SIZE;
    let end = (start + SEGMENT_SIZE).min(size);
    (start as i64, end as i64)
}

/// HTTP client for the storage-network indexer.
#[derive(Debug, Clone)]
pub struct IndexerClient {
    client: reqwest::Client,
    endpoint: String,
}

impl IndexerClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build indexer client")?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// POSTs JSON. A rejected request comes back as `{"error": ...}` rather
    /// than `Err`; transport failures are `Err`.
    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{}", self.endpoint, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Indexer request to {} failed", url))?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Ok(json!({ "error": format!("Indexer returned {}: {}", status, text) }));
        }
        if text.trim().is_empty() {
            return Ok(json!({}));
        }
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }

    /// Ships every segment. Returns the indexer's rejection, if any.
    async fn upload_segments(
        &self,
        file: &dyn SliceReadable,
        layout: &FileLayout,
    ) -> Result<Option<Value>> {
        let size = file.size();
        for index in 0..layout.segments {
            let (start, end) = segment_bounds(index, size);
            let data = file.read_range(start, end).await?;
            let reply = self
                .post(
                    "/file/segment",
                    &json!({
                        "root": layout.root_hash,
                        "index": index,
                        "data": STANDARD.encode(&data),
                    }),
                )
                .await?;
            if reply.get("error").is_some() {
                return Ok(Some(reply));
            }
        }
        tracing::debug!(
            "Uploaded {} segments for {}",
            layout.segments,
            layout.root_hash
        );
        Ok(None)
    }
}

#[async_trait]
impl StorageClient for IndexerClient {
    async fn upload_with_context(
        &self,
        file: &dyn SliceReadable,
        ctx: &FileContext,
        network: &NetworkConfig,
        session: &mut SigningSession<'_>,
    ) -> Result<Value> {
        let layout = compute_layout(file).await?;
        let nonce = session.next_nonce().await?;

        let submission = json!({
            "rootHash": layout.root_hash,
            "totalChunks": layout.total_chunks,
            "context": ctx,
            "network": network,
            "chainId": session.chain_id(),
            "nonce": nonce,
            "signer": session.address(),
        });
        let signature = session.sign_message(&serde_json::to_vec(&submission)?)?;

        let receipt = self
            .post(
                "/metadata/submit",
                &json!({ "submission": submission, "signature": signature }),
            )
            .await;
        let receipt = match receipt {
            Ok(r) if r.get("error").is_none() => r,
            other => {
                // The submission never landed, so the nonce may be reused.
                session.reset_nonce();
                return other;
            }
        };

        if let Some(rejection) = self.upload_segments(file, &layout).await? {
            return Ok(rejection);
        }

        Ok(json!({
            "rootHash": layout.root_hash,
            "totalChunks": layout.total_chunks,
            "txHash": receipt.get("txHash").cloned().unwrap_or(Value::Null),
        }))
    }

    async fn upload_file(&self, path: &Path) -> Result<Value> {
        let source = StagedFileSource::open(path)
            .await
            .with_context(|| format!("Failed to open {:?}", path))?;
        let layout = compute_layout(&source).await?;

        if let Some(rejection) = self.upload_segments(&source, &layout).await? {
            return Ok(rejection);
        }
        Ok(Value::String(layout.root_hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::file_adapter::MemoryFile;
    use bytes::Bytes;

    #[test]
    fn test_total_chunks() {
        assert_eq!(total_chunks(0), 0);
        assert_eq!(total_chunks(1), 1);
        assert_eq!(total_chunks(256), 1);
        assert_eq!(total_chunks(257), 2);
    }

    #[tokio::test]
    async fn test_layout_small_file() {
        let file = MemoryFile::new(Bytes::from_static(b"hello"));
        let layout = compute_layout(&file).await.unwrap();
        assert_eq!(layout.total_chunks, 1);
        assert_eq!(layout.segments, 1);
        assert_eq!(
            layout.root_hash,
            format!("0x{}", hex::encode(keccak256(b"hello")))
        );
    }

    #[tokio::test]
    async fn test_layout_multi_segment() {
        let data = vec![1u8; (SEGMENT_SIZE + 10) as usize];
        let file = MemoryFile::new(Bytes::from(data));
        let layout = compute_layout(&file).await.unwrap();
        assert_eq!(layout.segments, 2);
        assert_eq!(layout.total_chunks, 1024 + 1);
    }

    #[tokio::test]
    async fn test_layout_same_for_both_backings() {
        use std::io::Write;
        let data = vec![9u8; 4000];
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&data).unwrap();
        tmp.flush().unwrap();

        let staged = StagedFileSource::open(tmp.path()).await.unwrap();
        let memory = MemoryFile::new(Bytes::from(data));
        assert_eq!(
            compute_layout(&staged).await.unwrap(),
            compute_layout(&memory).await.unwrap()
        );
    }

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let client = IndexerClient::new("http://indexer.local/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.endpoint, "http://indexer.local");
    }
}
