//! Error types for chat operations

use pingtalk_store::StoreError;
use thiserror::Error;

/// Errors that can occur while sending into or entering a room.
///
/// Every variant is scoped to a single send or entry attempt; none of them
/// leaves the room view in an unusable state.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Message is empty")]
    EmptyMessage,
    #[error("Image processing failed: {0}")]
    ImageProcessing(String),
    #[error("Upload failed: {0}")]
    Upload(#[source] StoreError),
    #[error("Storage URL unavailable for {key}: {source}")]
    Storage {
        key: String,
        #[source]
        source: StoreError,
    },
    #[error("Record write failed: {0}")]
    RecordWrite(#[source] StoreError),
    #[error("Wrong password for room: {0}")]
    WrongPassword(String),
    #[error("Room not found: {0}")]
    RoomNotFound(String),
    #[error("Invalid room: {0}")]
    InvalidRoom(String),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, ChatError>;
