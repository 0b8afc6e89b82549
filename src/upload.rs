use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

const MAX_EXTENSION_LEN: usize = 8;

/// An uploaded file persisted under a request-unique name. The file is
/// removed when this value is dropped.
pub struct ScopedUpload {
    file: NamedTempFile,
}

impl ScopedUpload {
    pub async fn persist(dir: &Path, filename: &str, bytes: Vec<u8>) -> std::io::Result<Self> {
        let dir = dir.to_path_buf();
        let suffix = extension_suffix(filename);
        tokio::task::spawn_blocking(move || {
            let mut file = tempfile::Builder::new()
                .prefix("upload-")
                .suffix(&suffix)
                .tempfile_in(&dir)?;
            file.write_all(&bytes)?;
            file.flush()?;
            Ok::<_, std::io::Error>(Self { file })
        })
        .await
        .map_err(std::io::Error::other)?
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Keep a short alphanumeric extension from the client's filename; anything
/// else is dropped so the client never controls the path.
fn extension_suffix(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

pub async fn ensure_dir(dir: &Path) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    Ok(dir.to_path_buf())
}
