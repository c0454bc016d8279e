//! On-disk cache of JPEG thumbnails.
//!
//! Entries are keyed by file identifier and are never expired or invalidated:
//! blobs are immutable after upload, and an entry left behind by a deleted file
//! is simply never requested again.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageReader};
use tokio::fs;
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Edge length of the square thumbnail
pub const THUMBNAIL_SIZE: u32 = 200;

const JPEG_QUALITY: u8 = 95;

#[derive(Debug, Clone)]
pub struct ThumbnailCache {
    dir: PathBuf,
}

impl ThumbnailCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, identifier: &str) -> PathBuf {
        self.dir.join(format!("{}.jpg", identifier))
    }

    /// Cached thumbnail bytes, or `None` on a miss
    pub async fn get(&self, identifier: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.entry_path(identifier)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Generate the thumbnail for `source_path`, store it, and return its bytes
    pub async fn put(
        &self,
        identifier: &str,
        source_path: &Path,
        source_mime_type: &str,
    ) -> Result<Vec<u8>> {
        if !source_mime_type.starts_with("image/") {
            return Err(AppError::UnsupportedMediaType("Not an image".to_string()));
        }

        let source = source_path.to_path_buf();
        let bytes = tokio::task::spawn_blocking(move || render_thumbnail(&source))
            .await
            .map_err(|e| AppError::Internal(format!("Thumbnail task failed: {}", e)))??;

        fs::create_dir_all(&self.dir).await?;
        let path = self.entry_path(identifier);

        // Readers only ever see a complete entry: stage, then rename over it
        let staging = self
            .dir
            .join(format!("{}.jpg.{}.tmp", identifier, Uuid::new_v4()));
        if let Err(e) = fs::write(&staging, &bytes).await {
            let _ = fs::remove_file(&staging).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&staging, &path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(e.into());
        }

        tracing::debug!("Cached thumbnail {:?} ({} bytes)", path, bytes.len());
        Ok(bytes)
    }
}

/// Decode, auto-orient, center-crop to a square and encode as JPEG
fn render_thumbnail(source: &Path) -> Result<Vec<u8>> {
    let mut decoder = ImageReader::open(source)?
        .with_guessed_format()?
        .into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut img = DynamicImage::from_decoder(decoder)?;
    img.apply_orientation(orientation);

    let thumb = img.resize_to_fill(THUMBNAIL_SIZE, THUMBNAIL_SIZE, FilterType::Lanczos3);

    // JPEG carries no alpha channel
    let rgb = DynamicImage::ImageRgb8(thumb.to_rgb8());
    let mut out = Cursor::new(Vec::new());
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY))?;

    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use image::{ExtendedColorType, GenericImageView, ImageBuffer, ImageEncoder, Rgb, Rgba};
    use tempfile::TempDir;

    fn write_png(dir: &Path, width: u32, height: u32) -> PathBuf {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
        });
        let path = dir.join("source.png");
        img.save(&path).unwrap();
        path
    }

    /// Landscape JPEG, red left half and blue right half, tagged EXIF
    /// Orientation 6 (display rotated 90° clockwise)
    fn write_rotated_jpeg(dir: &Path) -> PathBuf {
        let (width, height) = (300, 200);
        let img = ImageBuffer::from_fn(width, height, |x, _| {
            if x < width / 2 {
                Rgb([255u8, 0, 0])
            } else {
                Rgb([0u8, 0, 255])
            }
        });

        // Big-endian TIFF header, one IFD entry: 0x0112 SHORT 1 = 6
        let exif: Vec<u8> = vec![
            b'M', b'M', 0x00, 0x2A, 0x00, 0x00, 0x00, 0x08, //
            0x00, 0x01, //
            0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01, 0x00, 0x06, 0x00, 0x00, //
            0x00, 0x00, 0x00, 0x00,
        ];

        let mut out = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut out, 95);
        encoder.set_exif_metadata(exif).unwrap();
        encoder
            .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
            .unwrap();

        let path = dir.join("rotated.jpg");
        std::fs::write(&path, out).unwrap();
        path
    }

    fn is_red(pixel: Rgba<u8>) -> bool {
        pixel[0] > 180 && pixel[2] < 80
    }

    fn is_blue(pixel: Rgba<u8>) -> bool {
        pixel[2] > 180 && pixel[0] < 80
    }

    #[tokio::test]
    async fn test_miss_then_put_then_hit() {
        let dir = TempDir::new().unwrap();
        let cache = ThumbnailCache::new(dir.path().join("thumbs"));
        let source = write_png(dir.path(), 400, 300);

        assert!(cache.get("img").await.unwrap().is_none());

        let generated = cache.put("img", &source, "image/png").await.unwrap();
        assert!(cache.dir().join("img.jpg").exists());

        let cached = cache.get("img").await.unwrap().unwrap();
        assert_eq!(cached, generated);
    }

    #[tokio::test]
    async fn test_output_is_square_jpeg() {
        let dir = TempDir::new().unwrap();
        let cache = ThumbnailCache::new(dir.path().join("thumbs"));
        let source = write_png(dir.path(), 640, 120);

        let bytes = cache.put("wide", &source, "image/png").await.unwrap();

        assert_eq!(
            image::guess_format(&bytes).unwrap(),
            image::ImageFormat::Jpeg
        );
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (THUMBNAIL_SIZE, THUMBNAIL_SIZE));
    }

    #[tokio::test]
    async fn test_rejects_non_image_without_decoding() {
        let dir = TempDir::new().unwrap();
        let cache = ThumbnailCache::new(dir.path().join("thumbs"));
        // Not readable as anything; must not be touched
        let missing = dir.path().join("does-not-exist.txt");

        let result = cache.put("doc", &missing, "text/plain").await;

        assert!(matches!(result, Err(AppError::UnsupportedMediaType(_))));
        assert!(!cache.dir().exists());
    }

    #[tokio::test]
    async fn test_undecodable_image_is_an_error() {
        let dir = TempDir::new().unwrap();
        let cache = ThumbnailCache::new(dir.path().join("thumbs"));
        let source = dir.path().join("fake.png");
        std::fs::write(&source, b"definitely not a png").unwrap();

        let result = cache.put("fake", &source, "image/png").await;

        assert!(matches!(result, Err(AppError::Image(_))));
        assert!(cache.get("fake").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_exif_orientation_is_applied() {
        let dir = TempDir::new().unwrap();
        let cache = ThumbnailCache::new(dir.path().join("thumbs"));
        let source = write_rotated_jpeg(dir.path());

        let bytes = cache.put("photo", &source, "image/jpeg").await.unwrap();
        let thumb = image::load_from_memory(&bytes).unwrap();
        assert_eq!(thumb.dimensions(), (THUMBNAIL_SIZE, THUMBNAIL_SIZE));

        // Rotated clockwise the red left half becomes the top half; read
        // as stored it would stay on the left
        let top_right = thumb.get_pixel(THUMBNAIL_SIZE - 10, 10);
        let bottom_left = thumb.get_pixel(10, THUMBNAIL_SIZE - 10);
        assert!(is_red(top_right), "top-right was {:?}", top_right);
        assert!(is_blue(bottom_left), "bottom-left was {:?}", bottom_left);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_put_never_serves_partial_entry() {
        let dir = TempDir::new().unwrap();
        let cache = ThumbnailCache::new(dir.path().join("thumbs"));
        let source = write_png(dir.path(), 800, 600);
        let full = cache.put("busy", &source, "image/png").await.unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let mut readers = Vec::new();
        for _ in 0..3 {
            let cache = cache.clone();
            let stop = stop.clone();
            let full = full.clone();
            readers.push(tokio::spawn(async move {
                let mut hits = 0usize;
                while !stop.load(Ordering::Relaxed) {
                    if let Some(bytes) = cache.get("busy").await.unwrap() {
                        assert_eq!(bytes.len(), full.len());
                        assert_eq!(bytes, full);
                        hits += 1;
                    }
                    tokio::task::yield_now().await;
                }
                hits
            }));
        }

        for _ in 0..30 {
            cache.put("busy", &source, "image/png").await.unwrap();
        }
        stop.store(true, Ordering::Relaxed);

        for reader in readers {
            assert!(reader.await.unwrap() > 0);
        }

        let leftovers: Vec<_> = std::fs::read_dir(cache.dir())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .filter(|name| name.to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "staging files left: {:?}", leftovers);
    }
}
