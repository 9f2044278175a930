//! Record types exchanged with the remote document store

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Arbitrary key/value fields of one stored document
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Reserved sender identity for synthetic notices
pub const SYSTEM_SENDER: &str = "SYSTEM";

/// Message document field names
pub mod fields {
    pub const SENDER: &str = "sender";
    pub const TEXT: &str = "text";
    pub const IMAGE_URL: &str = "imageUrl";
    pub const TIMESTAMP: &str = "timestamp";
    pub const IS_DATE_SEPARATOR: &str = "isDateSeparator";
    pub const IS_IMAGE: &str = "isImage";
    pub const PROFILE_IMAGE_URL: &str = "profileImageUrl";
}

/// One document of a snapshot, together with its store-assigned id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    pub id: String,
    pub fields: Document,
}

impl RawDocument {
    pub fn new(id: impl Into<String>, fields: Document) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}

/// The complete current document set of one collection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub documents: Vec<RawDocument>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Sort key of a message: epoch milliseconds plus a fractional tie-breaker.
///
/// Comparison uses `f64::total_cmp`, so keys form a total order even if a
/// NaN slips through from a foreign writer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderingKey(pub f64);

impl OrderingKey {
    pub fn from_millis(millis: i64) -> Self {
        Self(millis as f64)
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Wall-clock instant of the key, truncated to whole milliseconds.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        if !self.0.is_finite() {
            return None;
        }
        DateTime::from_timestamp_millis(self.0.floor() as i64)
    }
}

impl PartialEq for OrderingKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OrderingKey {}

impl PartialOrd for OrderingKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderingKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Outbound message document as written to `rooms/{roomId}/messages`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub sender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub timestamp: OrderingKey,
    #[serde(default)]
    pub is_date_separator: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_image: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
}

impl MessageRecord {
    pub fn text(sender: impl Into<String>, text: impl Into<String>, timestamp: OrderingKey) -> Self {
        Self {
            sender: sender.into(),
            text: Some(text.into()),
            image_url: None,
            timestamp,
            is_date_separator: false,
            is_image: None,
            profile_image_url: None,
        }
    }

    pub fn image(sender: impl Into<String>, url: impl Into<String>, timestamp: OrderingKey) -> Self {
        Self {
            sender: sender.into(),
            text: None,
            image_url: Some(url.into()),
            timestamp,
            is_date_separator: false,
            is_image: Some(true),
            profile_image_url: None,
        }
    }

    pub fn with_profile_image(mut self, url: Option<String>) -> Self {
        self.profile_image_url = url;
        self
    }

    pub fn to_document(&self) -> Result<Document> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(StoreError::WriteRejected(format!(
                "message record serialized to non-object: {}",
                other
            ))),
        }
    }
}

/// Room document body as stored at `rooms/{roomId}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct RoomDocument {
    title: String,
    created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    #[serde(default, deserialize_with = "lenient_created_at")]
    created_at: Option<DateTime<Utc>>,
}

/// Accepts RFC 3339 strings and epoch milliseconds; anything else reads as
/// unknown instead of failing the whole room.
fn lenient_created_at<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(text)) => DateTime::parse_from_rfc3339(&text)
            .ok()
            .map(|instant| instant.with_timezone(&Utc)),
        Some(serde_json::Value::Number(millis)) => millis
            .as_f64()
            .and_then(|millis| DateTime::from_timestamp_millis(millis as i64)),
        _ => None,
    })
}

/// A chat room; the id doubles as the user-facing join code
#[derive(Debug, Clone, PartialEq)]
pub struct RoomInfo {
    pub id: String,
    pub title: String,
    pub created_by: String,
    /// `None` when the stored room has no password; such rooms admit nobody.
    pub password: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl RoomInfo {
    pub fn from_document(id: &str, document: &Document) -> Option<Self> {
        let body: RoomDocument =
            serde_json::from_value(serde_json::Value::Object(document.clone())).ok()?;
        Some(Self {
            id: id.to_string(),
            title: body.title,
            created_by: body.created_by,
            password: body.password,
            created_at: body.created_at,
        })
    }

    pub fn to_document(&self) -> Result<Document> {
        let body = RoomDocument {
            title: self.title.clone(),
            created_by: self.created_by.clone(),
            password: self.password.clone(),
            created_at: self.created_at,
        };
        match serde_json::to_value(body)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(StoreError::WriteRejected(format!(
                "room document serialized to non-object: {}",
                other
            ))),
        }
    }
}
