use axum::{
    body::Body,
    extract::{
        multipart::MultipartRejection,
        rejection::{PathRejection, QueryRejection},
        Multipart, Path, Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::TryStreamExt;
use tokio_util::io::{ReaderStream, StreamReader};

use crate::error::{AppError, Result};
use crate::models::{DownloadQuery, FileRecord};
use crate::AppState;

/// Stored when the multipart part carries no content type
const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Upload a file
/// POST /upload
pub async fn upload_file(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<FileRecord>> {
    let mut multipart =
        multipart.map_err(|e| AppError::BadRequest(format!("Failed to parse file: {}", e)))?;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::BadRequest(format!("Failed to process multipart: {}", e))
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field
            .content_type()
            .unwrap_or(DEFAULT_MIME_TYPE)
            .to_string();

        // Stream the part straight into the blob store
        let body = field.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        let reader = StreamReader::new(body);
        tokio::pin!(reader);

        let file = state
            .files
            .upload(&mut reader, &file_name, &content_type)
            .await?;
        return Ok(Json(file));
    }

    Err(AppError::BadRequest("No file provided".to_string()))
}

/// List all files, newest first
/// GET /files
pub async fn list_files(State(state): State<AppState>) -> Result<Json<Vec<FileRecord>>> {
    let files = state.files.list().await?;
    Ok(Json(files))
}

/// Download a file
/// GET /download/:uuid?preview=true
pub async fn download_file(
    State(state): State<AppState>,
    path: std::result::Result<Path<String>, PathRejection>,
    query: std::result::Result<Query<DownloadQuery>, QueryRejection>,
) -> Result<Response> {
    let uuid = identifier(path)?;
    let Query(query) =
        query.map_err(|e| AppError::BadRequest(format!("Invalid query: {}", e)))?;

    let download = state.files.download(&uuid).await?;
    let file = download.record;
    let length = download.file.metadata().await?.len();

    let disposition = if query.is_preview() { "inline" } else { "attachment" };

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, &file.mime_type)
        .header(header::CONTENT_LENGTH, length)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition(disposition, &file.filename),
        )
        .body(Body::from_stream(ReaderStream::new(download.file)))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;

    Ok(response)
}

/// Delete a file
/// DELETE /files/:uuid
pub async fn delete_file(
    State(state): State<AppState>,
    path: std::result::Result<Path<String>, PathRejection>,
) -> Result<impl IntoResponse> {
    let uuid = identifier(path)?;
    state.files.delete(&uuid).await?;
    Ok(StatusCode::OK)
}

/// Thumbnail preview
/// GET /thumbnail/:uuid
pub async fn thumbnail(
    State(state): State<AppState>,
    path: std::result::Result<Path<String>, PathRejection>,
) -> Result<impl IntoResponse> {
    let uuid = identifier(path)?;
    let bytes = state.files.thumbnail(&uuid).await?;
    Ok(([(header::CONTENT_TYPE, "image/jpeg")], bytes))
}

fn identifier(path: std::result::Result<Path<String>, PathRejection>) -> Result<String> {
    let Path(uuid) = path.map_err(|e| AppError::BadRequest(format!("Invalid path: {}", e)))?;
    Ok(uuid)
}

/// `Content-Disposition` with a quoted ASCII name plus the exact UTF-8 name
fn content_disposition(disposition: &str, file_name: &str) -> String {
    let fallback_name: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();
    let encoded_name = urlencoding::encode(file_name);

    format!(
        "{}; filename=\"{}\"; filename*=UTF-8''{}",
        disposition, fallback_name, encoded_name
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_plain() {
        assert_eq!(
            content_disposition("attachment", "a.txt"),
            "attachment; filename=\"a.txt\"; filename*=UTF-8''a.txt"
        );
    }

    #[test]
    fn test_content_disposition_escapes() {
        let value = content_disposition("inline", "r\u{e9}sum\u{e9} \"v2\".pdf");
        assert!(value.starts_with("inline; filename=\"r_sum_ _v2_.pdf\""));
        assert!(value.ends_with("filename*=UTF-8''r%C3%A9sum%C3%A9%20%22v2%22.pdf"));
    }
}
