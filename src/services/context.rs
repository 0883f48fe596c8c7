use crate::models::FileContext;
use chrono::Utc;

/// Extension → MIME fallbacks for formats `infer` cannot sniff (mostly text).
const EXTENSION_MIME_TYPES: &[(&str, &str)] = &[
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("csv", "text/csv"),
    ("json", "application/json"),
    ("xml", "application/xml"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("js", "text/javascript"),
    ("ts", "text/typescript"),
    ("yaml", "application/yaml"),
    ("yml", "application/yaml"),
    ("toml", "application/toml"),
    ("svg", "image/svg+xml"),
    ("pdf", "application/pdf"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("mp3", "audio/mpeg"),
    ("mp4", "video/mp4"),
    ("zip", "application/zip"),
];

pub struct ContextService;

impl ContextService {
    /// Builds the metadata attached to a context-aware upload.
    pub fn detect(file_name: &str, creator: &str, bytes: &[u8]) -> FileContext {
        let extension = Self::extension(file_name);
        let mime_type = Self::mime_type(bytes, &extension);

        FileContext {
            file_name: file_name.to_string(),
            creator: creator.to_string(),
            file_size: bytes.len() as u64,
            mime_type,
            extension,
            timestamp: Utc::now(),
        }
    }

    pub fn extension(file_name: &str) -> String {
        match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => ext.to_lowercase(),
            _ => String::new(),
        }
    }

    /// Magic bytes win over the extension; unknown content is octet-stream.
    pub fn mime_type(bytes: &[u8], extension: &str) -> String {
        if let Some(kind) = infer::get(bytes) {
            return kind.mime_type().to_string();
        }

        EXTENSION_MIME_TYPES
            .iter()
            .find(|(ext, _)| *ext == extension)
            .map(|(_, mime)| mime.to_string())
            .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string())
    }
}
