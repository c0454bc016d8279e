use chrono::SecondsFormat;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{FileRecord, NewFileRecord};

/// Metadata store: one row per stored file
#[derive(Clone)]
pub struct Catalog {
    db: Database,
}

impl Catalog {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a record; a reused identifier is a conflict
    pub async fn create(&self, record: NewFileRecord) -> Result<FileRecord> {
        // Fixed-width timestamps keep textual order chronological
        let created_at = record
            .created_at
            .to_rfc3339_opts(SecondsFormat::Micros, true);

        let result = sqlx::query(
            r#"
            INSERT INTO files (uuid, filename, size, mime_type, storage_path, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.uuid)
        .bind(&record.filename)
        .bind(record.size)
        .bind(&record.mime_type)
        .bind(&record.storage_path)
        .bind(&created_at)
        .execute(self.db.pool())
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(AppError::Conflict(format!(
                    "Identifier already exists: {}",
                    record.uuid
                )));
            }
            Err(e) => return Err(e.into()),
        }

        self.find_by_identifier(&record.uuid).await
    }

    /// All records, newest first
    pub async fn list_all(&self) -> Result<Vec<FileRecord>> {
        let files: Vec<FileRecord> =
            sqlx::query_as("SELECT * FROM files ORDER BY created_at DESC, id DESC")
                .fetch_all(self.db.pool())
                .await?;

        Ok(files)
    }

    pub async fn find_by_identifier(&self, uuid: &str) -> Result<FileRecord> {
        let file: FileRecord = sqlx::query_as("SELECT * FROM files WHERE uuid = ?")
            .bind(uuid)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

        Ok(file)
    }

    pub async fn delete(&self, record: &FileRecord) -> Result<()> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(record.id)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("File not found".to_string()));
        }

        Ok(())
    }
}
