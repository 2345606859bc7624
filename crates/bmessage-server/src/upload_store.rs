use std::path::{Component, Path, PathBuf};

use bmessage_shared::constants::UPLOADS_URL_PREFIX;
use bmessage_store::FileAttachment;
use serde::Serialize;
use tokio::fs;
use tracing::{debug, info};

use crate::error::ServerError;

const MAX_STEM_LEN: usize = 64;
const MAX_EXT_LEN: usize = 10;

/// Verify that a resolved path stays within the expected base directory.
fn ensure_within(base: &Path, target: &Path) -> Result<PathBuf, ServerError> {
    let canonical_base = base.canonicalize().unwrap_or_else(|_| base.to_path_buf());
    let mut resolved = canonical_base.clone();
    for component in target.strip_prefix(base).unwrap_or(target).components() {
        match component {
            Component::Normal(c) => resolved.push(c),
            Component::ParentDir => {
                return Err(ServerError::BadRequest("Path traversal detected".to_string()));
            }
            _ => {}
        }
    }
    if !resolved.starts_with(&canonical_base) {
        return Err(ServerError::BadRequest("Path traversal detected".to_string()));
    }
    Ok(resolved)
}

/// Turn an uploaded file name into `(stem, extension)` made of safe characters.
fn sanitize_name(original: &str) -> (String, String) {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let path = Path::new(base);

    let stem: String = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(MAX_STEM_LEN)
        .collect();
    let stem = if stem.trim_matches('_').is_empty() {
        "file".to_string()
    } else {
        stem
    };

    let ext: String = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(MAX_EXT_LEN)
        .collect::<String>()
        .to_ascii_lowercase();
    let ext = if ext.is_empty() { ext } else { format!(".{ext}") };

    (stem, ext)
}

/// Number of stored files and their total size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUsage {
    pub uploads_count: u64,
    pub uploads_size: u64,
}

/// Stores uploaded attachments and avatars as plain files.
///
/// Files are never deleted by the messaging layer; a tombstoned message
/// keeps its file on disk.
#[derive(Debug, Clone)]
pub struct UploadStore {
    base_path: PathBuf,
    max_size: usize,
}

impl UploadStore {
    pub async fn new(base_path: PathBuf, max_size: usize) -> Result<Self, ServerError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            ServerError::UploadStorage(format!(
                "Failed to create upload directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        info!(path = %base_path.display(), "Upload store initialized");

        Ok(Self {
            base_path,
            max_size,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Write `data` under a fresh name and describe it as an attachment.
    pub async fn store(
        &self,
        original_name: &str,
        mime: &str,
        data: &[u8],
    ) -> Result<FileAttachment, ServerError> {
        if data.is_empty() {
            return Err(ServerError::BadRequest("Empty file".to_string()));
        }
        if data.len() > self.max_size {
            return Err(ServerError::PayloadTooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let (stem, ext) = sanitize_name(original_name);
        let filename = format!(
            "{}-{:08x}-{}{}",
            chrono::Utc::now().timestamp_millis(),
            rand::random::<u32>(),
            stem,
            ext
        );
        let path = ensure_within(&self.base_path, &self.base_path.join(&filename))?;

        fs::write(&path, data).await.map_err(|e| {
            ServerError::UploadStorage(format!("Failed to write upload {}: {}", filename, e))
        })?;

        debug!(file = %filename, size = data.len(), mime = %mime, "Stored upload");

        let mime = if mime.is_empty() {
            "application/octet-stream"
        } else {
            mime
        };
        let kind = mime.split('/').next().unwrap_or(mime).to_string();

        Ok(FileAttachment {
            url: format!("{UPLOADS_URL_PREFIX}/{filename}"),
            name: original_name.to_string(),
            kind,
            mime: mime.to_string(),
            size: data.len() as u64,
            filename,
        })
    }

    pub async fn usage(&self) -> Result<UploadUsage, ServerError> {
        let mut usage = UploadUsage::default();
        let mut entries = fs::read_dir(&self.base_path)
            .await
            .map_err(|e| ServerError::UploadStorage(format!("Failed to list uploads: {}", e)))?;

        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            ServerError::UploadStorage(format!("Failed to read directory entry: {}", e))
        })? {
            if let Ok(meta) = entry.metadata().await {
                if meta.is_file() {
                    usage.uploads_count += 1;
                    usage.uploads_size += meta.len();
                }
            }
        }

        Ok(usage)
    }
}
