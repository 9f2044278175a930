//! Image publish pipeline: resize, upload, resolve URL, write record
//!
//! Each stage is a terminal failure point for the send attempt and nothing is
//! retried. A failure after the upload leaves the blob orphaned; the store
//! has no cross-object transactions, so no compensating delete is attempted.

use std::sync::Arc;

use pingtalk_store::{BlobStore, DocumentStore, MessageRecord};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::composer::{write_message, Author};
use crate::error::{ChatError, Result};
use crate::resize::resize_to_jpeg;
use crate::timestamp::TimestampAllocator;
use crate::ChatConfig;

const JPEG_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Clone)]
pub struct ImagePublisher {
    documents: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    allocator: Arc<TimestampAllocator>,
    config: ChatConfig,
}

impl ImagePublisher {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        allocator: Arc<TimestampAllocator>,
        config: ChatConfig,
    ) -> Self {
        Self {
            documents,
            blobs,
            allocator,
            config,
        }
    }

    /// Fresh blob key under the configured prefix.
    pub fn blob_key(&self) -> String {
        format!("{}/{}.jpg", self.config.image_key_prefix, Uuid::new_v4())
    }

    /// Publish `raw` as an image message from `author` into `room_id`.
    ///
    /// Success is only observable through the next snapshot carrying the new
    /// record; the returned id is the store-assigned document id.
    #[instrument(skip(self, raw, author), fields(author = %author.nickname, size = raw.len()))]
    pub async fn publish(&self, raw: Vec<u8>, room_id: &str, author: &Author) -> Result<String> {
        // Allocated now so the message sorts where the user sent it, not
        // where the upload finished.
        let ordering_key = self.allocator.allocate();

        let resized = resize_to_jpeg(raw, self.config.max_image_edge, self.config.jpeg_quality)
            .await
            .inspect_err(|e| warn!("Image resize failed: {}", e))?;

        let key = self.blob_key();
        self.blobs
            .upload(&key, resized.bytes, JPEG_CONTENT_TYPE)
            .await
            .map_err(|e| {
                warn!("Upload of {} failed: {}", key, e);
                ChatError::Upload(e)
            })?;

        let url = self.blobs.download_url(&key).await.map_err(|e| {
            warn!("Blob {} is orphaned, URL resolution failed: {}", key, e);
            ChatError::Storage {
                key: key.clone(),
                source: e,
            }
        })?;

        let record = MessageRecord::image(&author.nickname, url.as_str(), ordering_key)
            .with_profile_image(author.profile_image_url.clone());
        let doc_id = write_message(self.documents.as_ref(), room_id, record)
            .await
            .map_err(|e| {
                warn!("Blob {} is orphaned, record write failed: {}", key, e);
                ChatError::RecordWrite(e)
            })?;

        info!(
            "Published {}x{} image {} to room '{}'",
            resized.width, resized.height, key, room_id
        );
        Ok(doc_id)
    }
}
