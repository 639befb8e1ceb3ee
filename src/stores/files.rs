use crate::stores::traits::{ImageStore, StoreResult};
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use tracing::{debug, warn};

/// URL prefix under which the upload directory is served
pub const UPLOAD_ROUTE: &str = "/uploads";

/// Writes listing images under a directory on the local filesystem and
/// hands out `/uploads/<file>` URLs for them
pub struct FsImageStore {
    root: PathBuf,
}

impl FsImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// File on disk behind a URL returned by `save_image`
    fn file_for(&self, url: &str) -> Option<PathBuf> {
        let name = url.strip_prefix(UPLOAD_ROUTE)?.strip_prefix('/')?;
        if name.is_empty() || sanitize_file_name(name) != name {
            return None;
        }
        Some(self.root.join(name))
    }
}

/// Keep only the characters that are safe in a file name
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned.to_string()
    }
}

#[async_trait]
impl ImageStore for FsImageStore {
    async fn save_image(&self, file_name: &str, bytes: &[u8]) -> StoreResult<String> {
        tokio::fs::create_dir_all(&self.root).await?;

        let stored_name = format!(
            "{}_{:08x}_{}",
            Utc::now().timestamp_millis(),
            rand::random::<u32>(),
            sanitize_file_name(file_name)
        );
        let path = self.root.join(&stored_name);
        tokio::fs::write(&path, bytes).await?;

        debug!(path = %path.display(), size = bytes.len(), "Saved listing image");
        Ok(format!("{UPLOAD_ROUTE}/{stored_name}"))
    }

    async fn remove_image(&self, url: &str) -> StoreResult<()> {
        let Some(path) = self.file_for(url) else {
            warn!(url, "Refusing to remove image outside the upload directory");
            return Ok(());
        };

        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Failed to remove listing image");
                return Err(e.into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_directories_and_odd_characters() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\photos\\lot 1.png"), "lot_1.png");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name(""), "image");
    }

    #[tokio::test]
    async fn save_then_remove() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("uploads");
        let store = FsImageStore::new(&root);

        let url = store.save_image("front.jpg", b"jpeg bytes").await.unwrap();
        assert!(url.starts_with("/uploads/"));
        assert!(url.ends_with("_front.jpg"));

        let file = root.join(url.trim_start_matches("/uploads/"));
        assert_eq!(tokio::fs::read(&file).await.unwrap(), b"jpeg bytes");

        store.remove_image(&url).await.unwrap();
        assert!(tokio::fs::metadata(&file).await.is_err());

        // removing twice is fine
        store.remove_image(&url).await.unwrap();
    }

    #[tokio::test]
    async fn remove_ignores_urls_outside_the_upload_dir() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().join("keep.txt");
        tokio::fs::write(&outside, b"keep").await.unwrap();
        let store = FsImageStore::new(dir.path().join("uploads"));

        store.remove_image("/uploads/../keep.txt").await.unwrap();
        store.remove_image(outside.to_str().unwrap()).await.unwrap();
        assert!(tokio::fs::metadata(&outside).await.is_ok());
    }
}
