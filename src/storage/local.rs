use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use crate::error::{AppError, Result};
use crate::storage::{BlobStore, StoredBlob};

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Local file system blob store
pub struct LocalBlobStore {
    base_path: PathBuf,
}

impl LocalBlobStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn blob_path(&self, identifier: &str, extension: Option<&str>) -> PathBuf {
        match extension {
            Some(ext) => self.base_path.join(format!("{}.{}", identifier, ext)),
            None => self.base_path.join(identifier),
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn write(
        &self,
        identifier: &str,
        extension: Option<&str>,
        reader: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<StoredBlob> {
        fs::create_dir_all(&self.base_path).await?;

        let full_path = self.blob_path(identifier, extension);
        let mut file = fs::File::create(&full_path).await.map_err(|e| {
            AppError::Storage(format!("Failed to create {:?}: {}", full_path, e))
        })?;

        let mut buf = vec![0u8; COPY_BUFFER_SIZE];
        let mut size: u64 = 0;
        loop {
            let n = match reader.read(&mut buf).await {
                Ok(n) => n,
                Err(e) => {
                    // Source failed mid-stream; drop the truncated blob
                    drop(file);
                    let _ = fs::remove_file(&full_path).await;
                    return Err(AppError::BadRequest(format!(
                        "Failed to read upload: {}",
                        e
                    )));
                }
            };
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n]).await.map_err(|e| {
                AppError::Storage(format!("Failed to write {:?}: {}", full_path, e))
            })?;
            size += n as u64;
        }

        file.flush().await?;
        file.sync_all().await?;

        tracing::debug!("Saved {} bytes to {:?}", size, full_path);
        Ok(StoredBlob {
            path: full_path,
            size,
        })
    }

    async fn open(&self, path: &Path) -> Result<fs::File> {
        fs::File::open(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::NotFound("File not found".to_string())
            } else {
                AppError::Storage(format!("Failed to open file: {}", e))
            }
        })
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => {
                tracing::debug!("Deleted file {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("File {:?} already absent", path);
                Ok(())
            }
            Err(e) => Err(AppError::Storage(format!(
                "Failed to delete file from disk: {}",
                e
            ))),
        }
    }

    fn storage_type(&self) -> &'static str {
        "local"
    }
}
