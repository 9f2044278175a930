//! Room view controller
//!
//! Owns the active subscription and the current display list. All mutation
//! happens through `&mut self`, so deliveries are applied one at a time in
//! the order the owning task pulls them.

use std::sync::Arc;

use pingtalk_store::DocumentStore;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::reconciler::StreamReconciler;
use crate::rows::DisplayRow;
use crate::subscription::{RoomSubscriptionManager, TaggedSnapshot};

pub struct RoomView {
    subscriptions: RoomSubscriptionManager,
    deliveries: mpsc::UnboundedReceiver<TaggedSnapshot>,
    reconciler: StreamReconciler,
    rows: Vec<DisplayRow>,
}

impl RoomView {
    pub fn new(store: Arc<dyn DocumentStore>, reconciler: StreamReconciler) -> Self {
        let (subscriptions, deliveries) = RoomSubscriptionManager::channel(store);
        Self {
            subscriptions,
            deliveries,
            reconciler,
            rows: Vec::new(),
        }
    }

    /// Switch to `room_id`. The display list is cleared before the new
    /// subscription delivers anything.
    pub async fn open_room(&mut self, room_id: &str) -> Result<()> {
        if self.subscriptions.active_room() == Some(room_id) {
            return Ok(());
        }
        self.rows.clear();
        self.subscriptions.subscribe(room_id).await
    }

    pub fn close_room(&mut self) {
        self.subscriptions.unsubscribe();
        self.rows.clear();
    }

    pub fn active_room(&self) -> Option<&str> {
        self.subscriptions.active_room()
    }

    /// Generation of the active subscription; see [`TaggedSnapshot::generation`].
    pub fn active_generation(&self) -> Option<u64> {
        self.subscriptions.active_generation()
    }

    pub fn rows(&self) -> &[DisplayRow] {
        &self.rows
    }

    /// Apply one delivery. Returns `false` when it came from a subscription
    /// other than the active one.
    pub fn apply(&mut self, delivery: TaggedSnapshot) -> bool {
        if !self.subscriptions.accepts(&delivery) {
            warn!(
                "Dropping stale snapshot for room '{}' generation {} ({} documents)",
                delivery.room_id,
                delivery.generation,
                delivery.snapshot.len()
            );
            return false;
        }
        self.rows = self.reconciler.reconcile(&delivery.snapshot.documents);
        debug!(
            "Room '{}' now shows {} rows",
            delivery.room_id,
            self.rows.len()
        );
        true
    }

    /// Wait for the next delivery and apply it.
    ///
    /// Returns `None` once the delivery channel is closed.
    pub async fn next_update(&mut self) -> Option<bool> {
        let delivery = self.deliveries.recv().await?;
        Some(self.apply(delivery))
    }

    /// Apply every delivery already queued without waiting.
    pub fn drain_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(delivery) = self.deliveries.try_recv() {
            if self.apply(delivery) {
                applied += 1;
            }
        }
        applied
    }
}
