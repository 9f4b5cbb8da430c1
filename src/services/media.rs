//! Cover image storage on the local filesystem

use std::path::{Component, Path, PathBuf};

use crate::{
    config::MediaConfig,
    error::{AppError, AppResult, FieldErrors},
};

const COVERS_DIR: &str = "book_covers";

/// Image format recognised from the file signature, not from the client's content type
pub fn sniff_image(bytes: &[u8]) -> Option<(&'static str, &'static str)> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(("jpg", "image/jpeg"))
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some(("png", "image/png"))
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some(("gif", "image/gif"))
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some(("webp", "image/webp"))
    } else {
        None
    }
}

/// Content type served for a stored file
pub fn content_type_for(path: &str) -> &'static str {
    match Path::new(path).extension().and_then(|e| e.to_str()) {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

#[derive(Clone)]
pub struct MediaService {
    root: PathBuf,
}

impl MediaService {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            root: PathBuf::from(&config.root),
        }
    }

    /// Absolute location of a stored relative path; paths escaping the root are refused
    fn resolve(&self, relative: &str) -> AppResult<PathBuf> {
        let path = Path::new(relative);
        if path.components().all(|c| matches!(c, Component::Normal(_))) {
            Ok(self.root.join(path))
        } else {
            Err(AppError::Internal(format!("Refusing media path {}", relative)))
        }
    }

    /// Write an uploaded cover and return its path relative to the media root
    pub async fn store_cover(&self, bytes: &[u8]) -> AppResult<String> {
        let (extension, _) = sniff_image(bytes).ok_or_else(|| {
            AppError::Validation(FieldErrors::single(
                "cover_image",
                "Upload a valid image (JPEG, PNG, GIF or WebP)",
            ))
        })?;

        let relative = format!("{}/{}.{}", COVERS_DIR, uuid::Uuid::new_v4(), extension);
        let target = self.resolve(&relative)?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to create media directory: {}", e)))?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to store cover image: {}", e)))?;

        tracing::debug!("Stored cover image {} ({} bytes)", relative, bytes.len());
        Ok(relative)
    }

    /// Read a stored file with its content type
    pub async fn read(&self, relative: &str) -> AppResult<(Vec<u8>, &'static str)> {
        let path = self.resolve(relative)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok((bytes, content_type_for(relative))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::NotFound(format!("Media file {} not found", relative)))
            }
            Err(e) => Err(AppError::Internal(format!("Failed to read {}: {}", relative, e))),
        }
    }

    /// Remove stored files; failures are logged, the owning rows are already gone
    pub async fn remove_all<I, S>(&self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for relative in paths {
            let relative = relative.as_ref();
            let path = match self.resolve(relative) {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!("{}", e);
                    continue;
                }
            };
            match tokio::fs::remove_file(&path).await {
                Ok(()) => tracing::debug!("Removed media file {}", relative),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Failed to remove media file {}: {}", relative, e),
            }
        }
    }
}
