use std::io::Cursor;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::core::errors::{AppError, AppResult};
use crate::core::types::{Orientation, PhotoInput, PhotoMetadata};

const ORIENTATION_TOLERANCE: f64 = 1.05;

pub fn checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?;
    reader.into_dimensions().ok()
}

pub fn orientation(width: u32, height: u32) -> Orientation {
    let (width, height) = (f64::from(width), f64::from(height));
    if width > height * ORIENTATION_TOLERANCE {
        Orientation::Landscape
    } else if height > width * ORIENTATION_TOLERANCE {
        Orientation::Portrait
    } else {
        Orientation::Square
    }
}

pub fn aspect_ratio(width: u32, height: u32) -> f64 {
    if width == 0 || height == 0 {
        return 1.0;
    }
    let ratio = f64::from(width) / f64::from(height);
    (ratio * 10_000.0).round() / 10_000.0
}

/// Local facts about one photo. Undecodable bytes yield zero dimensions, a
/// square aspect ratio and landscape orientation rather than an error.
pub fn extract_photo_metadata(photo_index: u32, photo: &PhotoInput) -> PhotoMetadata {
    let (width, height, orientation) = match dimensions(&photo.bytes) {
        Some((width, height)) => (width, height, orientation(width, height)),
        None => {
            warn!(file = %photo.file_name, "could not read image dimensions");
            (0, 0, Orientation::Landscape)
        }
    };
    PhotoMetadata {
        photo_index,
        original_filename: photo.file_name.clone(),
        width,
        height,
        aspect_ratio: aspect_ratio(width, height),
        orientation,
        checksum: checksum(&photo.bytes),
    }
}

pub fn extract_all_metadata(photos: &[PhotoInput]) -> Vec<PhotoMetadata> {
    photos
        .iter()
        .enumerate()
        .map(|(index, photo)| extract_photo_metadata(index as u32, photo))
        .collect()
}

pub fn mime_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "bmp" => "image/bmp",
        _ => "image/jpeg",
    }
}

pub async fn load_photos_from_paths(paths: &[PathBuf]) -> AppResult<Vec<PhotoInput>> {
    let mut photos = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(path).await.map_err(|err| {
            AppError::InvalidInput(format!("cannot read photo {}: {err}", path.display()))
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        debug!(file = %file_name, bytes = bytes.len(), "loaded photo");
        photos.push(PhotoInput {
            mime_type: mime_type_for(path).to_string(),
            file_name,
            bytes,
        });
    }
    Ok(photos)
}
