//! Error types for store operations

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while talking to the document or blob store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid store path: {0}")]
    InvalidPath(String),
    #[error("Write rejected: {0}")]
    WriteRejected(String),
    #[error("Upload failed: {0}")]
    UploadFailed(String),
    #[error("Download URL unavailable: {0}")]
    UrlUnavailable(String),
    #[error("Blob root not usable: {}", .0.display())]
    BlobRoot(PathBuf),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
