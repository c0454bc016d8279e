use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Catalog row for one stored file
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct FileRecord {
    #[serde(skip)]
    pub id: i64,
    pub uuid: String,
    pub filename: String,
    pub size: i64,
    pub mime_type: String,
    #[serde(skip)]
    pub storage_path: String,
    pub created_at: DateTime<Utc>,
}

/// Record about to be inserted; the store assigns `id`
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub uuid: String,
    pub filename: String,
    pub size: i64,
    pub mime_type: String,
    pub storage_path: String,
    pub created_at: DateTime<Utc>,
}

/// Download query parameters
#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    pub preview: Option<String>,
}

impl DownloadQuery {
    /// Only the literal `true` switches to inline disposition
    pub fn is_preview(&self) -> bool {
        self.preview.as_deref() == Some("true")
    }
}
