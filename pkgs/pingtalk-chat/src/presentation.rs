//! Display rows to render-ready view models

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Timelike};
use pingtalk_store::OrderingKey;
use serde::Serialize;
use url::Url;

use crate::rows::{ChatMessage, DisplayRow};
use crate::ChatConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    /// Messages from other users
    Leading,
    /// The viewer's own messages
    Trailing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "url", rename_all = "snake_case")]
pub enum Avatar {
    /// Built-in app logo used for `SYSTEM` notices
    SystemLogo,
    Url(String),
    /// Placeholder shown when the sender has no profile image
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum BubbleBody {
    Text(String),
    Image(Url),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bubble {
    pub message_id: String,
    pub alignment: Alignment,
    /// Sender nickname; hidden on the viewer's own messages
    pub sender_label: Option<String>,
    /// Hidden on the viewer's own messages
    pub avatar: Option<Avatar>,
    pub body: BubbleBody,
    pub time_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderRow {
    DateHeader { label: String },
    Bubble(Bubble),
}

/// `2025년 04월 09일`
pub fn date_label(date: NaiveDate) -> String {
    format!("{}년 {:02}월 {:02}일", date.year(), date.month(), date.day())
}

/// `오후 03:07`
pub fn time_label(at: DateTime<FixedOffset>) -> String {
    let (pm, hour) = at.hour12();
    format!(
        "{} {:02}:{:02}",
        if pm { "오후" } else { "오전" },
        hour,
        at.minute()
    )
}

pub struct PresentationAdapter {
    offset: FixedOffset,
    viewer: String,
}

impl PresentationAdapter {
    pub fn new(viewer: impl Into<String>, offset: FixedOffset) -> Self {
        Self {
            offset,
            viewer: viewer.into(),
        }
    }

    pub fn from_config(viewer: impl Into<String>, config: &ChatConfig) -> Self {
        Self::new(viewer, config.display_offset())
    }

    pub fn render(&self, rows: &[DisplayRow]) -> Vec<RenderRow> {
        rows.iter()
            .map(|row| match row {
                DisplayRow::DateSeparator { date } => RenderRow::DateHeader {
                    label: date_label(*date),
                },
                DisplayRow::Message(message) => RenderRow::Bubble(self.bubble(message)),
            })
            .collect()
    }

    pub fn bubble(&self, message: &ChatMessage) -> Bubble {
        let own = message.sender == self.viewer;
        let avatar = if own {
            None
        } else if message.is_system() {
            Some(Avatar::SystemLogo)
        } else {
            Some(
                message
                    .sender_avatar_url
                    .clone()
                    .map_or(Avatar::Placeholder, Avatar::Url),
            )
        };

        // An image whose URL does not parse falls back to plain text
        let body = match message.is_image.then(|| Url::parse(&message.content)) {
            Some(Ok(url)) => BubbleBody::Image(url),
            _ => BubbleBody::Text(message.content.clone()),
        };

        Bubble {
            message_id: message.id.clone(),
            alignment: if own {
                Alignment::Trailing
            } else {
                Alignment::Leading
            },
            sender_label: (!own).then(|| message.sender.clone()),
            avatar,
            body,
            time_label: self.time_label_for(message.ordering_key),
        }
    }

    fn time_label_for(&self, key: OrderingKey) -> String {
        key.to_datetime()
            .map(|at| time_label(at.with_timezone(&self.offset)))
            .unwrap_or_default()
    }
}
