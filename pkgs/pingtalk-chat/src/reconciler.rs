//! Stream reconciliation: raw snapshot in, ordered display list out
//!
//! The remote store only ever delivers full snapshots, so the display list is
//! rebuilt from scratch on every delivery instead of being patched. The
//! output is a pure function of the input set:
//!
//! 1. Deduplicate by document id
//! 2. Drop documents missing `sender` or a finite `timestamp`
//! 3. Infer `isImage` from the image URL suffix when the flag is absent
//! 4. Drop non-image documents whose content is empty (whitespace counts as content)
//! 5. Sort ascending by ordering key (document id breaks exact ties)
//! 6. Emit a date separator before the first message of each calendar day

use std::collections::BTreeMap;

use chrono::{FixedOffset, NaiveDate};
use pingtalk_store::{fields, OrderingKey, RawDocument};
use serde_json::Value;
use tracing::{debug, warn};

use crate::rows::{ChatMessage, DisplayRow};
use crate::ChatConfig;

/// Why a document was left out of the display list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingSender,
    MissingTimestamp,
    /// Separators are client-side only; a persisted one is foreign garbage.
    PersistedSeparator,
}

/// Image URL suffixes recognised when a document carries no `isImage` flag
const IMAGE_SUFFIXES: [&str; 2] = [".jpg", ".png"];

/// Compatibility fallback for documents written without an explicit flag.
pub fn looks_like_image_url(url: &str) -> bool {
    IMAGE_SUFFIXES.iter().any(|suffix| url.ends_with(suffix))
}

fn string_field<'a>(doc: &'a RawDocument, name: &str) -> Option<&'a str> {
    doc.fields.get(name).and_then(Value::as_str)
}

/// Normalize one raw document into a message.
pub fn parse_message(doc: &RawDocument) -> Result<ChatMessage, Rejection> {
    let sender = string_field(doc, fields::SENDER).ok_or(Rejection::MissingSender)?;
    let timestamp = doc
        .fields
        .get(fields::TIMESTAMP)
        .and_then(Value::as_f64)
        .filter(|t| t.is_finite())
        .ok_or(Rejection::MissingTimestamp)?;

    if doc
        .fields
        .get(fields::IS_DATE_SEPARATOR)
        .and_then(Value::as_bool)
        .unwrap_or(false)
    {
        return Err(Rejection::PersistedSeparator);
    }

    let image_url = string_field(doc, fields::IMAGE_URL).unwrap_or_default();
    let text = string_field(doc, fields::TEXT).unwrap_or_default();
    let content = if image_url.is_empty() { text } else { image_url };
    let is_image = doc
        .fields
        .get(fields::IS_IMAGE)
        .and_then(Value::as_bool)
        .unwrap_or_else(|| looks_like_image_url(image_url));
    let sender_avatar_url = string_field(doc, fields::PROFILE_IMAGE_URL)
        .filter(|url| !url.is_empty())
        .map(str::to_string);

    Ok(ChatMessage {
        id: doc.id.clone(),
        sender: sender.to_string(),
        content: content.to_string(),
        ordering_key: OrderingKey(timestamp),
        is_image,
        sender_avatar_url,
    })
}

#[derive(Debug, Clone)]
pub struct StreamReconciler {
    offset: FixedOffset,
}

impl StreamReconciler {
    /// Reconciler that cuts days at midnight in `offset`.
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn from_config(config: &ChatConfig) -> Self {
        Self::new(config.display_offset())
    }

    /// Calendar date of `key` in the display offset.
    pub fn display_date(&self, key: OrderingKey) -> Option<NaiveDate> {
        key.to_datetime()
            .map(|instant| instant.with_timezone(&self.offset).date_naive())
    }

    pub fn reconcile(&self, documents: &[RawDocument]) -> Vec<DisplayRow> {
        // Later duplicates of an id replace earlier ones.
        let unique: BTreeMap<&str, &RawDocument> = documents
            .iter()
            .map(|doc| (doc.id.as_str(), doc))
            .collect();

        let mut messages: Vec<(NaiveDate, ChatMessage)> = Vec::with_capacity(unique.len());
        for doc in unique.values() {
            let message = match parse_message(doc) {
                Ok(message) => message,
                Err(reason) => {
                    warn!("Dropping malformed message document {}: {:?}", doc.id, reason);
                    continue;
                }
            };
            if !message.is_image && message.content.is_empty() {
                debug!("Dropping empty message document {}", doc.id);
                continue;
            }
            let Some(date) = self.display_date(message.ordering_key) else {
                warn!(
                    "Dropping message document {} with out-of-range timestamp {}",
                    doc.id,
                    message.ordering_key.value()
                );
                continue;
            };
            messages.push((date, message));
        }

        messages.sort_by(|(_, a), (_, b)| {
            a.ordering_key
                .cmp(&b.ordering_key)
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut rows = Vec::with_capacity(messages.len() * 2);
        let mut current_date: Option<NaiveDate> = None;
        for (date, message) in messages {
            if current_date != Some(date) {
                rows.push(DisplayRow::DateSeparator { date });
                current_date = Some(date);
            }
            rows.push(DisplayRow::Message(message));
        }

        debug!(
            "Reconciled {} documents into {} rows",
            documents.len(),
            rows.len()
        );
        rows
    }
}

impl Default for StreamReconciler {
    fn default() -> Self {
        Self::from_config(&ChatConfig::default())
    }
}
