//! PingTalk Chat - message stream engine for room-based chat
//!
//! This crate turns the full-snapshot message feed of a room into an ordered,
//! date-segmented display list, and drives outbound text and image sends.
//!
//! # Architecture
//!
//! - **TimestampAllocator**: ordering keys (`now_ms + jitter`) for outbound messages
//! - **RoomSubscriptionManager**: at most one live room subscription, with
//!   room-tagged deliveries so late snapshots of a torn-down room are dropped
//! - **StreamReconciler**: rebuilds the display list from each snapshot
//! - **ImagePublisher**: resize, upload, URL resolution and record write
//! - **OutboundComposer**: text messages, system notices and join announcements
//! - **PresentationAdapter**: display rows to bubbles and date headers
//! - **RoomView**: owns the active subscription and the current display list
//! - **RoomLobby**: room creation, password entry and the room list
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pingtalk_chat::{Author, ChatConfig, OutboundComposer, RoomView, StreamReconciler};
//! use pingtalk_store::{MemoryBlobStore, MemoryDocumentStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ChatConfig::default();
//! let documents = Arc::new(MemoryDocumentStore::new());
//! let blobs = Arc::new(MemoryBlobStore::new());
//!
//! let mut view = RoomView::new(documents.clone(), StreamReconciler::from_config(&config));
//! view.open_room("family").await?;
//!
//! let composer = OutboundComposer::new(documents, blobs, config);
//! composer.send_text("hi", "family", &Author::new("alice")).await?;
//!
//! while let Some(applied) = view.next_update().await {
//!     if applied {
//!         println!("{} rows", view.rows().len());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod composer;
pub mod error;
pub mod lobby;
pub mod pipeline;
pub mod presentation;
pub mod reconciler;
pub mod resize;
pub mod room_view;
pub mod rows;
pub mod subscription;
pub mod timestamp;

pub use composer::{invite_text, Author, NoticeKind, OutboundComposer};
pub use error::{ChatError, Result};
pub use lobby::RoomLobby;
pub use pipeline::ImagePublisher;
pub use presentation::{Alignment, Avatar, Bubble, BubbleBody, PresentationAdapter, RenderRow};
pub use reconciler::StreamReconciler;
pub use room_view::RoomView;
pub use rows::{ChatMessage, DisplayRow};
pub use subscription::{RoomSubscriptionManager, SubscriptionState, TaggedSnapshot};
pub use timestamp::TimestampAllocator;

use chrono::{FixedOffset, Offset, Utc};

/// Configuration for the chat engine
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Longer edge cap for uploaded images in pixels (default: 800)
    pub max_image_edge: u32,

    /// JPEG quality for uploaded images, 1-100 (default: 50)
    pub jpeg_quality: u8,

    /// Blob key prefix for uploaded images (default: "images")
    pub image_key_prefix: String,

    /// UTC offset in seconds used for calendar dates and time labels
    /// (default: UTC+9)
    pub display_offset_seconds: i32,
}

impl ChatConfig {
    /// Display offset; out-of-range values fall back to UTC.
    pub fn display_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.display_offset_seconds).unwrap_or_else(|| Utc.fix())
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_image_edge: 800,
            jpeg_quality: 50,
            image_key_prefix: "images".to_string(),
            display_offset_seconds: 9 * 3600,
        }
    }
}
