use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncRead;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{FileRecord, NewFileRecord};
use crate::services::Catalog;
use crate::storage::{extension_of, BlobStore};
use crate::thumbnail::ThumbnailCache;

/// A record together with an open handle on its blob
pub struct Download {
    pub record: FileRecord,
    pub file: tokio::fs::File,
}

/// File service
#[derive(Clone)]
pub struct FileService {
    catalog: Catalog,
    blobs: Arc<dyn BlobStore>,
    thumbnails: ThumbnailCache,
}

impl FileService {
    pub fn new(catalog: Catalog, blobs: Arc<dyn BlobStore>, thumbnails: ThumbnailCache) -> Self {
        Self {
            catalog,
            blobs,
            thumbnails,
        }
    }

    /// Store a new file. The blob is written before the record; a failed
    /// catalog insert leaves the blob behind.
    pub async fn upload(
        &self,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        file_name: &str,
        mime_type: &str,
    ) -> Result<FileRecord> {
        if file_name.is_empty() {
            return Err(AppError::BadRequest("No file name provided".to_string()));
        }

        let uuid = Uuid::new_v4().to_string();
        let blob = self
            .blobs
            .write(&uuid, extension_of(file_name), reader)
            .await?;

        let size = i64::try_from(blob.size)
            .map_err(|_| AppError::BadRequest("File too large".to_string()))?;

        let record = self
            .catalog
            .create(NewFileRecord {
                uuid,
                filename: file_name.to_string(),
                size,
                mime_type: mime_type.to_string(),
                storage_path: blob.path.to_string_lossy().into_owned(),
                created_at: Utc::now(),
            })
            .await?;

        tracing::info!(
            "Stored {} as {} ({} bytes, {})",
            record.filename,
            record.uuid,
            record.size,
            self.blobs.storage_type()
        );
        Ok(record)
    }

    /// All files, newest first
    pub async fn list(&self) -> Result<Vec<FileRecord>> {
        self.catalog.list_all().await
    }

    pub async fn get_file(&self, identifier: &str) -> Result<FileRecord> {
        check_identifier(identifier)?;
        self.catalog.find_by_identifier(identifier).await
    }

    pub async fn download(&self, identifier: &str) -> Result<Download> {
        let record = self.get_file(identifier).await?;
        let file = self.blobs.open(Path::new(&record.storage_path)).await?;
        Ok(Download { record, file })
    }

    /// Unlink the blob, then drop the record. An unlink failure other than
    /// absence aborts and leaves the record in place.
    pub async fn delete(&self, identifier: &str) -> Result<()> {
        let record = self.get_file(identifier).await?;

        self.blobs.delete(Path::new(&record.storage_path)).await?;
        self.catalog.delete(&record).await?;

        tracing::info!("Deleted {} ({})", record.uuid, record.filename);
        Ok(())
    }

    /// JPEG preview, generated on first request and cached thereafter
    pub async fn thumbnail(&self, identifier: &str) -> Result<Vec<u8>> {
        check_identifier(identifier)?;

        if let Some(bytes) = self.thumbnails.get(identifier).await? {
            return Ok(bytes);
        }

        let record = self.catalog.find_by_identifier(identifier).await?;
        self.thumbnails
            .put(
                &record.uuid,
                Path::new(&record.storage_path),
                &record.mime_type,
            )
            .await
    }
}

/// Identifiers are UUIDs; anything else cannot name a stored file
fn check_identifier(identifier: &str) -> Result<()> {
    Uuid::parse_str(identifier)
        .map(|_| ())
        .map_err(|_| AppError::NotFound("File not found".to_string()))
}
