use anyhow::{Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use std::path::Path;

/// Longest name component kept in a staging file name (bytes).
pub const MAX_STAGED_NAME_LEN: usize = 100;

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
}

/// Reduces a caller-supplied file name to a single safe path component for
/// use inside staging file names.
pub fn sanitize_filename(filename: &str) -> Result<String> {
    // Get only the filename component (remove any path)
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if name.is_empty() {
        return Err(anyhow!(ValidationError {
            message: "Filename cannot be empty".to_string(),
        }));
    }

    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::warn!("Path traversal attempt detected: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control()
                || c == '/'
                || c == '\\'
                || c == ':'
                || c == '*'
                || c == '?'
                || c == '"'
                || c == '<'
                || c == '>'
                || c == '|'
                || c == ';'
            {
                '_'
            } else {
                c
            }
        })
        .collect();

    // Limit length safely for UTF-8, keeping the tail so the extension survives
    let sanitized = if sanitized.len() > MAX_STAGED_NAME_LEN {
        let mut start = sanitized.len() - MAX_STAGED_NAME_LEN;
        while !sanitized.is_char_boundary(start) {
            start += 1;
        }
        sanitized[start..].to_string()
    } else {
        sanitized
    };

    // Staged files must never be hidden
    match sanitized.strip_prefix('.') {
        Some(rest) => Ok(format!("_{}", rest)),
        None => Ok(sanitized),
    }
}

/// Returns `true` when an optional request field is absent or empty.
pub fn is_missing(field: Option<&str>) -> bool {
    field.is_none_or(str::is_empty)
}

/// Decodes the transport encoding of `fileData`.
pub fn decode_payload(encoded: &str) -> Result<Bytes> {
    let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(cleaned.as_bytes())
        .map(Bytes::from)
        .map_err(|e| {
            anyhow!(ValidationError {
                message: format!("Invalid base64 in fileData: {}", e),
            })
        })
}
