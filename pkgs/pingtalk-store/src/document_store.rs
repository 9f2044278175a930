//! Remote ordered document store seam and an in-process implementation
//!
//! The store is a black box with at-least-once delivery: writes carry no
//! ordering guarantee on acknowledgement and there are no multi-document
//! transactions. A subscription delivers the *entire* current set of a
//! collection whenever any document in it changes, never a diff.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::models::{Document, RawDocument, Snapshot};
use crate::paths::is_valid_segment;

/// Live feed of full snapshots for one collection. Dropping it ends interest.
pub type SnapshotStream = BoxStream<'static, Snapshot>;

/// Capacity of the change notification channel
const CHANGE_CHANNEL_CAPACITY: usize = 256;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Write a new document under a fresh store-assigned id.
    async fn add_document(&self, collection: &str, fields: Document) -> Result<String>;

    /// Create or overwrite the document `doc_id`.
    async fn set_document(&self, collection: &str, doc_id: &str, fields: Document) -> Result<()>;

    async fn get_document(&self, collection: &str, doc_id: &str) -> Result<Option<Document>>;

    async fn delete_document(&self, collection: &str, doc_id: &str) -> Result<()>;

    async fn list_documents(&self, collection: &str) -> Result<Vec<RawDocument>>;

    /// Subscribe to `collection` ordered by the numeric field `order_by`.
    ///
    /// The stream yields the current set immediately and again after every
    /// change to the collection.
    async fn subscribe(&self, collection: &str, order_by: &str) -> Result<SnapshotStream>;
}

/// In-process document store with snapshot fan-out.
///
/// Each change publishes the collection path on a broadcast channel; every
/// live subscription rebuilds a full snapshot when its collection is named.
#[derive(Clone)]
pub struct MemoryDocumentStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    collections: Mutex<HashMap<String, BTreeMap<String, Document>>>,
    changes: broadcast::Sender<String>,
    failing_writes: AtomicUsize,
    accepted_writes: AtomicUsize,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(MemoryInner {
                collections: Mutex::new(HashMap::new()),
                changes,
                failing_writes: AtomicUsize::new(0),
                accepted_writes: AtomicUsize::new(0),
            }),
        }
    }

    /// Reject the next `count` writes with `StoreError::WriteRejected`.
    pub fn fail_next_writes(&self, count: usize) {
        self.inner.failing_writes.store(count, AtomicOrdering::SeqCst);
    }

    /// Number of writes (add/set/delete) that reached the store.
    pub fn accepted_writes(&self) -> usize {
        self.inner.accepted_writes.load(AtomicOrdering::SeqCst)
    }

    /// Current ordered set of `collection`, as a subscriber would see it.
    pub fn snapshot(&self, collection: &str, order_by: &str) -> Snapshot {
        self.inner.snapshot(collection, order_by)
    }

    fn admit_write(&self, collection: &str) -> Result<()> {
        validate_collection(collection)?;
        let rejected = self
            .inner
            .failing_writes
            .fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |n| {
                n.checked_sub(1)
            })
            .is_ok();
        if rejected {
            warn!("Injected write failure on {}", collection);
            return Err(StoreError::WriteRejected(collection.to_string()));
        }
        self.inner.accepted_writes.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(())
    }

    fn notify(&self, collection: &str) {
        // No receivers is fine: nobody is subscribed yet.
        let _ = self.inner.changes.send(collection.to_string());
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryInner {
    fn snapshot(&self, collection: &str, order_by: &str) -> Snapshot {
        let collections = self.collections.lock();
        let mut documents: Vec<RawDocument> = collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| RawDocument::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default();
        drop(collections);

        // Documents without a numeric sort field trail the ordered ones.
        documents.sort_by(|a, b| {
            let ka = a.fields.get(order_by).and_then(|v| v.as_f64());
            let kb = b.fields.get(order_by).and_then(|v| v.as_f64());
            match (ka, kb) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
            .then_with(|| a.id.cmp(&b.id))
        });

        Snapshot { documents }
    }
}

fn validate_collection(collection: &str) -> Result<()> {
    let segments: Vec<&str> = collection.split('/').collect();
    if segments.len() % 2 == 0 || !segments.iter().all(|s| is_valid_segment(s)) {
        return Err(StoreError::InvalidPath(collection.to_string()));
    }
    Ok(())
}

fn validate_doc_id(doc_id: &str) -> Result<()> {
    if !is_valid_segment(doc_id) {
        return Err(StoreError::InvalidPath(doc_id.to_string()));
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn add_document(&self, collection: &str, fields: Document) -> Result<String> {
        self.admit_write(collection)?;
        let doc_id = Uuid::new_v4().to_string();
        self.inner
            .collections
            .lock()
            .entry(collection.to_string())
            .or_default()
            .insert(doc_id.clone(), fields);
        debug!("Added document {}/{}", collection, doc_id);
        self.notify(collection);
        Ok(doc_id)
    }

    async fn set_document(&self, collection: &str, doc_id: &str, fields: Document) -> Result<()> {
        validate_doc_id(doc_id)?;
        self.admit_write(collection)?;
        self.inner
            .collections
            .lock()
            .entry(collection.to_string())
            .or_default()
            .insert(doc_id.to_string(), fields);
        debug!("Set document {}/{}", collection, doc_id);
        self.notify(collection);
        Ok(())
    }

    async fn get_document(&self, collection: &str, doc_id: &str) -> Result<Option<Document>> {
        validate_collection(collection)?;
        validate_doc_id(doc_id)?;
        Ok(self
            .inner
            .collections
            .lock()
            .get(collection)
            .and_then(|docs| docs.get(doc_id).cloned()))
    }

    async fn delete_document(&self, collection: &str, doc_id: &str) -> Result<()> {
        validate_doc_id(doc_id)?;
        self.admit_write(collection)?;
        let removed = self
            .inner
            .collections
            .lock()
            .get_mut(collection)
            .and_then(|docs| docs.remove(doc_id))
            .is_some();
        if removed {
            debug!("Deleted document {}/{}", collection, doc_id);
            self.notify(collection);
        }
        Ok(())
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<RawDocument>> {
        validate_collection(collection)?;
        Ok(self
            .inner
            .collections
            .lock()
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| RawDocument::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn subscribe(&self, collection: &str, order_by: &str) -> Result<SnapshotStream> {
        validate_collection(collection)?;

        // Subscribe before taking the first snapshot so no change slips between.
        let changes = self.inner.changes.subscribe();
        let initial = self.inner.snapshot(collection, order_by);

        let state = FeedState {
            inner: self.inner.clone(),
            changes,
            collection: collection.to_string(),
            order_by: order_by.to_string(),
            pending: Some(initial),
        };

        let feed = stream::unfold(state, |mut state| async move {
            if let Some(first) = state.pending.take() {
                return Some((first, state));
            }
            loop {
                match state.changes.recv().await {
                    Ok(changed) if changed == state.collection => {
                        let snapshot = state.inner.snapshot(&state.collection, &state.order_by);
                        return Some((snapshot, state));
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // A full snapshot supersedes whatever was skipped.
                        warn!(
                            "Subscription on {} lagged by {} changes, resyncing",
                            state.collection, skipped
                        );
                        let snapshot = state.inner.snapshot(&state.collection, &state.order_by);
                        return Some((snapshot, state));
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });

        Ok(feed.boxed())
    }
}

struct FeedState {
    inner: Arc<MemoryInner>,
    changes: broadcast::Receiver<String>,
    collection: String,
    order_by: String,
    pending: Option<Snapshot>,
}
