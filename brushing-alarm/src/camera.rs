//! Photo capture.
//!
//! A [`PhotoSource`] yields exactly one image per call, or `None` when
//! the user backed out without taking a picture.

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("camera permission denied")]
    PermissionDenied,

    #[error("captured photo is empty")]
    Empty,

    #[error("failed to read photo: {0}")]
    Io(io::Error),
}

impl From<io::Error> for CaptureError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => CaptureError::PermissionDenied,
            _ => CaptureError::Io(err),
        }
    }
}

#[async_trait]
pub trait PhotoSource: Send + Sync {
    async fn capture(&self) -> Result<Option<Bytes>, CaptureError>;
}

/// Reads a photo that was already taken and saved to disk.
///
/// The path `-` stands for "no photo" and captures nothing, which lets
/// scripts express a cancelled capture.
#[derive(Debug, Clone)]
pub struct FilePhotoSource {
    path: PathBuf,
}

impl FilePhotoSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PhotoSource for FilePhotoSource {
    async fn capture(&self) -> Result<Option<Bytes>, CaptureError> {
        if self.path.as_os_str() == "-" {
            return Ok(None);
        }

        let data = tokio::fs::read(&self.path).await?;
        if data.is_empty() {
            return Err(CaptureError::Empty);
        }
        Ok(Some(Bytes::from(data)))
    }
}
