// Copyright 2024 PingTalk Team.
//
// Display-list reconciliation over raw snapshot documents

use chrono::{FixedOffset, NaiveDate, TimeZone};
use pingtalk_chat::{DisplayRow, StreamReconciler};
use pingtalk_store::RawDocument;
use serde_json::{json, Value};

fn kst() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).unwrap()
}

/// Epoch millis of a KST wall-clock time, plus a fractional jitter.
fn key(y: i32, m: u32, d: u32, h: u32, jitter: f64) -> f64 {
    kst()
        .with_ymd_and_hms(y, m, d, h, 0, 0)
        .unwrap()
        .timestamp_millis() as f64
        + jitter
}

fn text_doc(id: &str, sender: &str, text: &str, timestamp: f64) -> RawDocument {
    raw(
        id,
        json!({
            "sender": sender,
            "text": text,
            "timestamp": timestamp,
            "isDateSeparator": false,
        }),
    )
}

fn raw(id: &str, value: Value) -> RawDocument {
    RawDocument::new(id, value.as_object().cloned().unwrap())
}

fn message_ids(rows: &[DisplayRow]) -> Vec<&str> {
    rows.iter()
        .filter_map(|row| row.as_message())
        .map(|message| message.id.as_str())
        .collect()
}

fn separator_dates(rows: &[DisplayRow]) -> Vec<NaiveDate> {
    rows.iter()
        .filter_map(|row| match row {
            DisplayRow::DateSeparator { date } => Some(*date),
            DisplayRow::Message(_) => None,
        })
        .collect()
}

#[test]
fn test_empty_input_yields_empty_output() {
    let reconciler = StreamReconciler::default();
    assert!(reconciler.reconcile(&[]).is_empty());
}

#[test]
fn test_single_message_gets_one_separator() {
    let reconciler = StreamReconciler::default();
    let rows = reconciler.reconcile(&[text_doc("m1", "a", "hi", key(2025, 4, 9, 10, 0.2))]);

    assert_eq!(rows.len(), 2);
    assert_eq!(
        rows[0],
        DisplayRow::DateSeparator {
            date: NaiveDate::from_ymd_opt(2025, 4, 9).unwrap()
        }
    );
    assert_eq!(rows[1].as_message().unwrap().content, "hi");
}

#[test]
fn test_reconcile_is_idempotent() {
    let reconciler = StreamReconciler::default();
    let docs = vec![
        text_doc("b", "a", "second", key(2025, 4, 9, 11, 0.5)),
        text_doc("a", "b", "first", key(2025, 4, 9, 10, 0.1)),
        text_doc("c", "a", "third", key(2025, 4, 10, 8, 0.9)),
    ];

    let first = reconciler.reconcile(&docs);
    let second = reconciler.reconcile(&docs);
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_arrival_order_does_not_matter() {
    let reconciler = StreamReconciler::default();
    let mut docs = vec![
        text_doc("1", "a", "one", key(2025, 4, 9, 9, 0.0)),
        text_doc("2", "a", "two", key(2025, 4, 9, 9, 0.3)),
        text_doc("3", "b", "three", key(2025, 4, 9, 9, 0.7)),
        text_doc("4", "b", "four", key(2025, 4, 11, 9, 0.1)),
    ];
    let expected = reconciler.reconcile(&docs);

    docs.reverse();
    assert_eq!(reconciler.reconcile(&docs), expected);
    docs.swap(0, 2);
    assert_eq!(reconciler.reconcile(&docs), expected);
    assert_eq!(message_ids(&expected), vec!["1", "2", "3", "4"]);
}

#[test]
fn test_sub_millisecond_jitter_orders_messages() {
    let reconciler = StreamReconciler::default();
    let base = key(2025, 4, 9, 12, 0.0);
    let rows = reconciler.reconcile(&[
        text_doc("late", "a", "late", base + 0.75),
        text_doc("early", "b", "early", base + 0.25),
    ]);
    assert_eq!(message_ids(&rows), vec!["early", "late"]);
}

#[test]
fn test_one_separator_per_calendar_day() {
    let reconciler = StreamReconciler::default();
    let docs = vec![
        text_doc("1", "a", "d1 morning", key(2025, 4, 9, 8, 0.1)),
        text_doc("2", "a", "d1 evening", key(2025, 4, 9, 22, 0.1)),
        text_doc("3", "b", "d2 morning", key(2025, 4, 10, 7, 0.1)),
        text_doc("4", "b", "d2 noon", key(2025, 4, 10, 12, 0.1)),
        text_doc("5", "a", "d3", key(2025, 4, 12, 9, 0.1)),
    ];
    let rows = reconciler.reconcile(&docs);

    assert_eq!(
        separator_dates(&rows),
        vec![
            NaiveDate::from_ymd_opt(2025, 4, 9).unwrap(),
            NaiveDate::from_ymd_opt(2025, 4, 10).unwrap(),
            NaiveDate::from_ymd_opt(2025, 4, 12).unwrap(),
        ]
    );

    // Each separator immediately precedes the first message of its day
    let kinds: Vec<&str> = rows
        .iter()
        .map(|row| match row {
            DisplayRow::DateSeparator { .. } => "sep",
            DisplayRow::Message(message) => message.id.as_str(),
        })
        .collect();
    assert_eq!(kinds, vec!["sep", "1", "2", "sep", "3", "4", "sep", "5"]);
}

#[test]
fn test_day_boundary_follows_display_offset() {
    // 23:30 and 00:30 KST straddle midnight locally but share a UTC date
    let evening = key(2025, 4, 9, 23, 0.0) + 30.0 * 60_000.0;
    let after_midnight = key(2025, 4, 10, 0, 0.0) + 30.0 * 60_000.0;
    let docs = vec![
        text_doc("1", "a", "late", evening),
        text_doc("2", "a", "later", after_midnight),
    ];

    let kst_rows = StreamReconciler::new(kst()).reconcile(&docs);
    assert_eq!(separator_dates(&kst_rows).len(), 2);

    let utc_rows = StreamReconciler::new(FixedOffset::east_opt(0).unwrap()).reconcile(&docs);
    assert_eq!(separator_dates(&utc_rows).len(), 1);
}

#[test]
fn test_empty_content_filtering() {
    let reconciler = StreamReconciler::default();
    let t = key(2025, 4, 9, 10, 0.0);
    let docs = vec![
        text_doc("empty", "a", "", t + 0.1),
        text_doc("blank", "a", "   ", t + 0.2),
        raw(
            "image-no-url",
            json!({ "sender": "a", "text": "", "timestamp": t + 0.3, "isImage": true }),
        ),
        raw("no-content", json!({ "sender": "a", "timestamp": t + 0.4 })),
    ];
    let rows = reconciler.reconcile(&docs);
    assert_eq!(message_ids(&rows), vec!["blank", "image-no-url"]);
}

#[test]
fn test_whitespace_message_is_shown() {
    let reconciler = StreamReconciler::default();
    let rows = reconciler.reconcile(&[text_doc("1", "a", "   ", key(2025, 4, 9, 10, 0.0))]);
    assert_eq!(rows.len(), 2);
    assert!(matches!(rows[0], DisplayRow::DateSeparator { .. }));
    assert_eq!(rows[1].as_message().unwrap().content, "   ");
}

#[test]
fn test_malformed_documents_are_dropped() {
    let reconciler = StreamReconciler::default();
    let t = key(2025, 4, 9, 10, 0.0);
    let docs = vec![
        text_doc("ok", "a", "fine", t),
        raw("no-sender", json!({ "text": "x", "timestamp": t })),
        raw("no-timestamp", json!({ "sender": "a", "text": "x" })),
        raw("string-timestamp", json!({ "sender": "a", "text": "x", "timestamp": "soon" })),
        raw("numeric-sender", json!({ "sender": 7, "text": "x", "timestamp": t })),
        raw(
            "persisted-separator",
            json!({ "sender": "", "text": "", "timestamp": t, "isDateSeparator": true }),
        ),
    ];
    let rows = reconciler.reconcile(&docs);
    assert_eq!(message_ids(&rows), vec!["ok"]);
    assert_eq!(separator_dates(&rows).len(), 1);
}

#[test]
fn test_image_flag_inferred_from_url_suffix() {
    let reconciler = StreamReconciler::default();
    let t = key(2025, 4, 9, 10, 0.0);
    let docs = vec![
        raw(
            "jpg",
            json!({ "sender": "a", "imageUrl": "https://cdn/images/a.jpg", "timestamp": t + 0.1 }),
        ),
        raw(
            "webp",
            json!({ "sender": "a", "imageUrl": "https://cdn/images/a.webp", "timestamp": t + 0.2 }),
        ),
    ];
    let rows = reconciler.reconcile(&docs);
    let messages: Vec<_> = rows.iter().filter_map(|row| row.as_message()).collect();

    assert_eq!(messages.len(), 2);
    assert!(messages[0].is_image);
    assert_eq!(messages[0].content, "https://cdn/images/a.jpg");
    // Not a recognised suffix: kept as a text row showing the URL
    assert!(!messages[1].is_image);
}

#[test]
fn test_later_snapshot_replaces_earlier_view() {
    let reconciler = StreamReconciler::default();
    let t = key(2025, 4, 9, 10, 0.0);
    let first = vec![text_doc("1", "a", "one", t)];
    let second = vec![
        text_doc("1", "a", "one", t),
        text_doc("2", "b", "two", t + 1.0),
    ];

    let before = reconciler.reconcile(&first);
    let after = reconciler.reconcile(&second);
    assert_eq!(message_ids(&before), vec!["1"]);
    assert_eq!(message_ids(&after), vec!["1", "2"]);

    // A snapshot that shrank (document deleted) shrinks the view too
    assert_eq!(reconciler.reconcile(&first), before);
}
