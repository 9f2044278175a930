//! Display rows produced by the reconciler

use chrono::NaiveDate;
use pingtalk_store::{OrderingKey, SYSTEM_SENDER};
use serde::Serialize;

/// A persisted message after normalization
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    /// Store-assigned document id
    pub id: String,
    pub sender: String,
    /// Message text, or the image URL when `is_image` is set
    pub content: String,
    pub ordering_key: OrderingKey,
    pub is_image: bool,
    /// `None` means the default avatar
    pub sender_avatar_url: Option<String>,
}

impl ChatMessage {
    pub fn is_system(&self) -> bool {
        self.sender == SYSTEM_SENDER
    }
}

/// One entry of the rendered message list; never persisted
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisplayRow {
    /// Synthetic marker of a calendar day boundary
    DateSeparator { date: NaiveDate },
    Message(ChatMessage),
}

impl DisplayRow {
    pub fn is_date_separator(&self) -> bool {
        matches!(self, Self::DateSeparator { .. })
    }

    pub fn as_message(&self) -> Option<&ChatMessage> {
        match self {
            Self::Message(message) => Some(message),
            Self::DateSeparator { .. } => None,
        }
    }
}
