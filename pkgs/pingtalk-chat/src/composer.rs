//! Outbound message composition
//!
//! Every message document leaves the client through [`write_message`], which
//! forces `isDateSeparator = false` so no separator can ever be persisted.

use std::sync::Arc;

use pingtalk_store::{
    paths, BlobStore, DocumentStore, MessageRecord, RoomDirectory, SYSTEM_SENDER,
};
use tracing::{debug, info, instrument};

use crate::error::{ChatError, Result};
use crate::pipeline::ImagePublisher;
use crate::timestamp::TimestampAllocator;
use crate::ChatConfig;

/// App store link appended to the share invitation.
pub const INSTALL_URL: &str =
    "https://play.google.com/store/apps/details?id=com.example.pingtolk";

/// The local user as seen on outbound messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub nickname: String,
    pub profile_image_url: Option<String>,
}

impl Author {
    pub fn new(nickname: impl Into<String>) -> Self {
        Self {
            nickname: nickname.into(),
            profile_image_url: None,
        }
    }

    pub fn with_profile_image(mut self, url: impl Into<String>) -> Self {
        self.profile_image_url = Some(url.into());
        self
    }
}

/// System notices the client may post on a user's behalf
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Joined,
}

impl NoticeKind {
    pub fn text(self, subject: &str) -> String {
        match self {
            NoticeKind::Joined => format!("{}님이 입장하셨습니다", subject),
        }
    }
}

/// Share text inviting others to the app.
pub fn invite_text(nickname: &str) -> String {
    format!(
        "{}님이 PingTalk에 참여 중입니다.\n\n앱 설치하기: {}",
        nickname, INSTALL_URL
    )
}

pub(crate) async fn write_message(
    store: &dyn DocumentStore,
    room_id: &str,
    mut record: MessageRecord,
) -> pingtalk_store::Result<String> {
    record.is_date_separator = false;
    let doc_id = store
        .add_document(&paths::room_messages(room_id), record.to_document()?)
        .await?;
    debug!("Wrote message {} to room '{}'", doc_id, room_id);
    Ok(doc_id)
}

pub struct OutboundComposer {
    documents: Arc<dyn DocumentStore>,
    directory: RoomDirectory,
    allocator: Arc<TimestampAllocator>,
    publisher: ImagePublisher,
}

impl OutboundComposer {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        config: ChatConfig,
    ) -> Self {
        Self::with_allocator(documents, blobs, Arc::new(TimestampAllocator::new()), config)
    }

    /// Composer sharing `allocator` with its image pipeline.
    pub fn with_allocator(
        documents: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        allocator: Arc<TimestampAllocator>,
        config: ChatConfig,
    ) -> Self {
        let publisher =
            ImagePublisher::new(documents.clone(), blobs, allocator.clone(), config);
        Self {
            directory: RoomDirectory::new(documents.clone()),
            documents,
            allocator,
            publisher,
        }
    }

    pub fn allocator(&self) -> &TimestampAllocator {
        &self.allocator
    }

    /// Send a text message. Empty text is rejected without touching the store;
    /// whitespace-only text is sent as is.
    #[instrument(skip(self, text, author), fields(author = %author.nickname))]
    pub async fn send_text(&self, text: &str, room_id: &str, author: &Author) -> Result<String> {
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let record = MessageRecord::text(&author.nickname, text, self.allocator.allocate())
            .with_profile_image(author.profile_image_url.clone());
        write_message(self.documents.as_ref(), room_id, record)
            .await
            .map_err(ChatError::RecordWrite)
    }

    /// Post a notice from the reserved `SYSTEM` sender about `subject`.
    #[instrument(skip(self))]
    pub async fn send_system_notice(
        &self,
        kind: NoticeKind,
        room_id: &str,
        subject: &str,
    ) -> Result<String> {
        let record = MessageRecord::text(SYSTEM_SENDER, kind.text(subject), self.allocator.allocate());
        write_message(self.documents.as_ref(), room_id, record)
            .await
            .map_err(ChatError::RecordWrite)
    }

    /// Send an image through the publish pipeline.
    pub async fn send_image(&self, raw: Vec<u8>, room_id: &str, author: &Author) -> Result<String> {
        self.publisher.publish(raw, room_id, author).await
    }

    /// Post the join notice unless `nickname` has entered `room_id` before.
    ///
    /// Returns whether a notice was written. The check and the marker write
    /// are not atomic, so two simultaneous first entries may both announce.
    #[instrument(skip(self))]
    pub async fn announce_entry(&self, room_id: &str, nickname: &str) -> Result<bool> {
        if self.directory.has_entered(room_id, nickname).await? {
            debug!("{} already announced in room '{}'", nickname, room_id);
            return Ok(false);
        }
        self.send_system_notice(NoticeKind::Joined, room_id, nickname)
            .await?;
        self.directory.mark_entered(room_id, nickname).await?;
        info!("Announced {} in room '{}'", nickname, room_id);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_notice_text() {
        assert_eq!(NoticeKind::Joined.text("민수"), "민수님이 입장하셨습니다");
    }

    #[test]
    fn test_invite_text_mentions_nickname_and_link() {
        let text = invite_text("민수");
        assert!(text.starts_with("민수님이 PingTalk에 참여 중입니다."));
        assert!(text.ends_with(INSTALL_URL));
    }
}
