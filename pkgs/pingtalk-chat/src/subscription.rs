//! At most one live message subscription per client
//!
//! Every delivery is tagged with the room and the generation of the
//! subscription that produced it. Tearing down a subscription aborts its
//! forwarding task, but the abort is asynchronous and a snapshot already
//! queued on the sink may still arrive afterwards, even after the same room
//! was subscribed again. Consumers must check
//! [`RoomSubscriptionManager::accepts`] before applying a delivery.

use std::sync::Arc;

use futures::StreamExt;
use pingtalk_store::{fields, paths, DocumentStore, Snapshot};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use crate::error::Result;

/// A snapshot delivery together with the room it belongs to
#[derive(Debug, Clone)]
pub struct TaggedSnapshot {
    pub room_id: String,
    /// Generation of the subscription; unique per manager and never reused.
    pub generation: u64,
    pub snapshot: Snapshot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionState {
    Idle,
    Subscribed(String),
}

struct SubscriptionHandle {
    room_id: String,
    generation: u64,
    task: JoinHandle<()>,
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct RoomSubscriptionManager {
    store: Arc<dyn DocumentStore>,
    sink: mpsc::UnboundedSender<TaggedSnapshot>,
    active: Option<SubscriptionHandle>,
    last_generation: u64,
}

impl RoomSubscriptionManager {
    /// Create a manager forwarding deliveries into `sink`.
    pub fn new(store: Arc<dyn DocumentStore>, sink: mpsc::UnboundedSender<TaggedSnapshot>) -> Self {
        Self {
            store,
            sink,
            active: None,
            last_generation: 0,
        }
    }

    /// Create a manager along with the receiving end of its delivery channel.
    pub fn channel(
        store: Arc<dyn DocumentStore>,
    ) -> (Self, mpsc::UnboundedReceiver<TaggedSnapshot>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(store, tx), rx)
    }

    pub fn state(&self) -> SubscriptionState {
        match &self.active {
            Some(handle) => SubscriptionState::Subscribed(handle.room_id.clone()),
            None => SubscriptionState::Idle,
        }
    }

    pub fn active_room(&self) -> Option<&str> {
        self.active.as_ref().map(|handle| handle.room_id.as_str())
    }

    /// Generation of the active subscription, if any.
    pub fn active_generation(&self) -> Option<u64> {
        self.active.as_ref().map(|handle| handle.generation)
    }

    /// Whether `delivery` belongs to the currently active subscription.
    pub fn accepts(&self, delivery: &TaggedSnapshot) -> bool {
        self.active.as_ref().is_some_and(|handle| {
            handle.generation == delivery.generation && handle.room_id == delivery.room_id
        })
    }

    /// Subscribe to `room_id`, replacing any prior subscription.
    ///
    /// Subscribing to the room that is already active keeps the existing
    /// subscription. On error the manager is left idle.
    #[instrument(skip(self))]
    pub async fn subscribe(&mut self, room_id: &str) -> Result<()> {
        if self.active_room() == Some(room_id) {
            debug!("Already subscribed to room '{}'", room_id);
            return Ok(());
        }
        self.unsubscribe();

        let mut stream = self
            .store
            .subscribe(&paths::room_messages(room_id), fields::TIMESTAMP)
            .await?;

        self.last_generation += 1;
        let generation = self.last_generation;
        let sink = self.sink.clone();
        let tag = room_id.to_string();
        let task = tokio::spawn(async move {
            while let Some(snapshot) = stream.next().await {
                let delivery = TaggedSnapshot {
                    room_id: tag.clone(),
                    generation,
                    snapshot,
                };
                if sink.send(delivery).is_err() {
                    debug!("Snapshot sink closed, stopping subscription to '{}'", tag);
                    break;
                }
            }
        });

        self.active = Some(SubscriptionHandle {
            room_id: room_id.to_string(),
            generation,
            task,
        });
        info!("Subscribed to room '{}' (generation {})", room_id, generation);
        Ok(())
    }

    /// Tear down the active subscription, if any.
    pub fn unsubscribe(&mut self) {
        if let Some(handle) = self.active.take() {
            info!("Unsubscribed from room '{}'", handle.room_id);
        }
    }
}
