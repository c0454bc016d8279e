use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncRead;

use crate::error::Result;

/// Blob written to storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub path: PathBuf,
    pub size: u64,
}

/// Raw byte storage, one blob per identifier
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Copy `reader` into a new blob named after `identifier` and `extension`.
    /// The data is durable once this returns.
    async fn write(
        &self,
        identifier: &str,
        extension: Option<&str>,
        reader: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<StoredBlob>;

    /// Open a blob for streaming
    async fn open(&self, path: &Path) -> Result<tokio::fs::File>;

    /// Remove a blob; a blob that is already gone counts as removed
    async fn delete(&self, path: &Path) -> Result<()>;

    /// Get the storage type name
    fn storage_type(&self) -> &'static str;
}

/// Extension of a client-supplied filename, passed through as-is
pub fn extension_of(filename: &str) -> Option<&str> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("a.txt"), Some("txt"));
        assert_eq!(extension_of("photo.JPG"), Some("JPG"));
        assert_eq!(extension_of("archive.tar.gz"), Some("gz"));
        assert_eq!(extension_of("README"), None);
        assert_eq!(extension_of("trailing."), None);
        assert_eq!(extension_of("../../etc/passwd.conf"), Some("conf"));
    }
}
