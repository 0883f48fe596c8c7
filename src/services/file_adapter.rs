use async_trait::async_trait;
use bytes::Bytes;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Minimal file capability the storage client reads from: a known size and
/// ranged reads.
#[async_trait]
pub trait SliceReadable: Send + Sync {
    fn size(&self) -> u64;

    /// Returns bytes `[start, end)` after clamping both bounds into
    /// `[0, size]` (`end` never below `start`). Out-of-range input yields a
    /// shorter or empty slice, never an error.
    async fn read_range(&self, start: i64, end: i64) -> std::io::Result<Bytes>;
}

/// Clamps a requested range against `size`, returning absolute offsets.
pub fn clamp_range(start: i64, end: i64, size: u64) -> (u64, u64) {
    let size = i64::try_from(size).unwrap_or(i64::MAX);
    let s = start.clamp(0, size);
    let e = end.clamp(s, size);
    (s as u64, e as u64)
}

/// In-memory backing. Reads are views into the shared buffer.
#[derive(Debug, Clone)]
pub struct MemoryFile {
    buffer: Bytes,
}

impl MemoryFile {
    pub fn new(buffer: Bytes) -> Self {
        Self { buffer }
    }

    pub fn slice(&self, start: i64, end: i64) -> Bytes {
        let (s, e) = clamp_range(start, end, self.buffer.len() as u64);
        self.buffer.slice(s as usize..e as usize)
    }
}

#[async_trait]
impl SliceReadable for MemoryFile {
    fn size(&self) -> u64 {
        self.buffer.len() as u64
    }

    async fn read_range(&self, start: i64, end: i64) -> std::io::Result<Bytes> {
        Ok(self.slice(start, end))
    }
}

/// Backing over a staged artifact on disk.
#[derive(Debug, Clone)]
pub struct StagedFileSource {
    path: PathBuf,
    size: u64,
}

impl StagedFileSource {
    pub async fn open(path: &Path) -> std::io::Result<Self> {
        let meta = tokio::fs::metadata(path).await?;
        Ok(Self {
            path: path.to_path_buf(),
            size: meta.len(),
        })
    }
}

#[async_trait]
impl SliceReadable for StagedFileSource {
    fn size(&self) -> u64 {
        self.size
    }

    async fn read_range(&self, start: i64, end: i64) -> std::io::Result<Bytes> {
        let (s, e) = clamp_range(start, end, self.size);
        if s == e {
            return Ok(Bytes::new());
        }

        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(s)).await?;

        let mut buffer = vec![0u8; (e - s) as usize];
        file.read_exact(&mut buffer).await?;
        Ok(Bytes::from(buffer))
    }
}
