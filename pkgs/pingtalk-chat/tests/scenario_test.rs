// Copyright 2024 PingTalk Team.
//
// End-to-end room scenarios over the in-memory stores

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use image::{DynamicImage, ImageFormat, RgbImage};
use pingtalk_chat::{
    Author, ChatConfig, ChatError, DisplayRow, OutboundComposer, RoomView, StreamReconciler,
    TaggedSnapshot, TimestampAllocator,
};
use pingtalk_store::{paths, MemoryBlobStore, MemoryDocumentStore, Snapshot};

// 2025-04-09 10:00:00 KST
const NOW: i64 = 1_744_160_400_000;

struct Harness {
    documents: Arc<MemoryDocumentStore>,
    blobs: Arc<MemoryBlobStore>,
    composer: OutboundComposer,
    view: RoomView,
}

fn harness() -> Harness {
    let config = ChatConfig::default();
    let documents = Arc::new(MemoryDocumentStore::new());
    let blobs = Arc::new(MemoryBlobStore::new());
    let allocator = Arc::new(TimestampAllocator::with_clock(|| NOW));
    let composer = OutboundComposer::with_allocator(
        documents.clone(),
        blobs.clone(),
        allocator,
        config.clone(),
    );
    let view = RoomView::new(documents.clone(), StreamReconciler::from_config(&config));
    Harness {
        documents,
        blobs,
        composer,
        view,
    }
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40])));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

async fn next_update(view: &mut RoomView) -> bool {
    tokio::time::timeout(Duration::from_secs(2), view.next_update())
        .await
        .expect("Timed out waiting for a snapshot")
        .expect("Delivery channel closed")
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 4, 9).unwrap()
}

#[tokio::test]
async fn test_text_then_image_then_room_switch() {
    let mut h = harness();
    let alice = Author::new("alice");
    let bob = Author::new("bob").with_profile_image("https://cdn.example.com/bob.png");

    h.view.open_room("family").await.unwrap();
    let family_generation = h.view.active_generation().unwrap();
    assert!(next_update(&mut h.view).await);
    assert!(h.view.rows().is_empty());

    h.composer.send_text("hi", "family", &alice).await.unwrap();
    assert!(next_update(&mut h.view).await);
    let rows = h.view.rows().to_vec();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], DisplayRow::DateSeparator { date: today() });
    let hi = rows[1].as_message().unwrap();
    assert_eq!(hi.content, "hi");
    assert_eq!(hi.sender, "alice");
    assert!(!hi.is_image);

    h.composer
        .send_image(png_bytes(1200, 900), "family", &bob)
        .await
        .unwrap();
    assert!(next_update(&mut h.view).await);
    let rows = h.view.rows().to_vec();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1].as_message().unwrap().content, "hi");
    let image = rows[2].as_message().unwrap();
    assert!(image.is_image);
    assert_eq!(image.sender, "bob");
    assert!(image.content.starts_with("memory://blobs/images/"));
    assert!(image.content.ends_with(".jpg"));
    assert_eq!(
        image.sender_avatar_url.as_deref(),
        Some("https://cdn.example.com/bob.png")
    );
    assert!(image.ordering_key > rows[1].as_message().unwrap().ordering_key);
    assert_eq!(h.blobs.len(), 1);

    // Switch rooms: the list is cleared, then filled by the new room only
    h.view.open_room("work").await.unwrap();
    assert!(h.view.rows().is_empty());
    assert!(next_update(&mut h.view).await);
    assert!(h.view.rows().is_empty());

    // A late delivery for the old room must not touch the display
    let stale = TaggedSnapshot {
        room_id: "family".to_string(),
        generation: family_generation,
        snapshot: h
            .documents
            .snapshot(&paths::room_messages("family"), "timestamp"),
    };
    assert_eq!(stale.snapshot.len(), 2);
    let before = h.view.rows().to_vec();
    assert!(!h.view.apply(stale));
    assert_eq!(h.view.rows(), before.as_slice());
}

#[tokio::test]
async fn test_torn_down_room_stops_delivering() {
    let mut h = harness();
    let alice = Author::new("alice");

    h.view.open_room("family").await.unwrap();
    next_update(&mut h.view).await;
    h.view.open_room("work").await.unwrap();
    next_update(&mut h.view).await;

    h.composer.send_text("anyone?", "family", &alice).await.unwrap();
    let waited = tokio::time::timeout(Duration::from_millis(200), h.view.next_update()).await;
    assert!(waited.is_err(), "old room must not deliver after teardown");
    assert!(h.view.rows().is_empty());
    assert_eq!(h.view.active_room(), Some("work"));
}

#[tokio::test]
async fn test_reopening_the_active_room_keeps_the_list() {
    let mut h = harness();
    h.view.open_room("family").await.unwrap();
    next_update(&mut h.view).await;
    h.composer
        .send_text("hello", "family", &Author::new("alice"))
        .await
        .unwrap();
    next_update(&mut h.view).await;

    h.view.open_room("family").await.unwrap();
    assert_eq!(h.view.rows().len(), 2);
}

#[tokio::test]
async fn test_upload_failure_never_shows_a_message() {
    let mut h = harness();
    h.view.open_room("family").await.unwrap();
    next_update(&mut h.view).await;

    h.blobs.fail_next_uploads(1);
    let writes_before = h.documents.accepted_writes();
    let err = h
        .composer
        .send_image(png_bytes(64, 64), "family", &Author::new("alice"))
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::Upload(_)));
    assert_eq!(h.documents.accepted_writes(), writes_before);
    assert!(h.blobs.is_empty());

    // The room stays usable; the next send is the only message
    h.composer
        .send_text("still here", "family", &Author::new("alice"))
        .await
        .unwrap();
    next_update(&mut h.view).await;
    let messages: Vec<_> = h
        .view
        .rows()
        .iter()
        .filter_map(|row| row.as_message())
        .collect();
    assert_eq!(messages.len(), 1);
    assert!(!messages[0].is_image);
}

#[tokio::test]
async fn test_close_room_returns_to_idle() {
    let mut h = harness();
    h.view.open_room("family").await.unwrap();
    next_update(&mut h.view).await;
    let generation = h.view.active_generation().unwrap();
    h.view.close_room();
    assert_eq!(h.view.active_room(), None);
    assert!(!h.view.apply(TaggedSnapshot {
        room_id: "family".to_string(),
        generation,
        snapshot: Snapshot::default(),
    }));
}

/// Wait until a delivery from the active subscription has been applied.
async fn next_applied(view: &mut RoomView) {
    while !next_update(view).await {}
}

#[tokio::test]
async fn test_late_snapshot_from_earlier_visit_is_ignored() {
    let mut h = harness();
    let alice = Author::new("alice");

    h.view.open_room("family").await.unwrap();
    let first_visit = h.view.active_generation().unwrap();
    next_applied(&mut h.view).await;
    h.composer.send_text("hi", "family", &alice).await.unwrap();
    next_applied(&mut h.view).await;
    let old_snapshot = h
        .documents
        .snapshot(&paths::room_messages("family"), "timestamp");

    // family -> work -> family
    h.view.open_room("work").await.unwrap();
    h.view.open_room("family").await.unwrap();
    assert_ne!(h.view.active_generation(), Some(first_visit));
    next_applied(&mut h.view).await;
    h.composer.send_text("again", "family", &alice).await.unwrap();
    next_applied(&mut h.view).await;
    let current = h.view.rows().to_vec();
    assert_eq!(current.iter().filter_map(|row| row.as_message()).count(), 2);

    // The first visit's task may still flush an older snapshot
    assert!(!h.view.apply(TaggedSnapshot {
        room_id: "family".to_string(),
        generation: first_visit,
        snapshot: old_snapshot,
    }));
    assert_eq!(h.view.rows(), current.as_slice());
}
