//! PingTalk Store - remote store seams for room-based chat
//!
//! This crate describes the two external collaborators the chat engine talks
//! to and ships process-local implementations of both:
//!
//! - **DocumentStore**: key/value documents grouped in collections, with a
//!   persistent per-collection subscription that re-delivers the *entire*
//!   ordered set on every change
//! - **BlobStore**: binary uploads that resolve to a durable fetch URL
//!
//! # Collections
//!
//! - `rooms/{roomId}`: `title`, `created_by`, `password`, `created_at`
//! - `rooms/{roomId}/messages/{docId}`: message records, ordered by `timestamp`
//! - `rooms/{roomId}/enteredUsers/{nickname}`: presence-only marker
//! - `users/{nickname}/favorites/{roomId}`: presence-only marker
//!
//! Neither store offers multi-document transactions or ordered write
//! acknowledgement; callers must tolerate both.

pub mod blob_store;
pub mod document_store;
pub mod entered_rooms;
pub mod error;
pub mod models;
pub mod paths;
pub mod room_directory;

pub use blob_store::{BlobStore, FsBlobStore, MemoryBlobStore, StoredBlob};
pub use document_store::{DocumentStore, MemoryDocumentStore, SnapshotStream};
pub use entered_rooms::EnteredRooms;
pub use error::{Result, StoreError};
pub use models::{
    fields, Document, MessageRecord, OrderingKey, RawDocument, RoomInfo, Snapshot, SYSTEM_SENDER,
};
pub use room_directory::{filter_rooms, RoomDirectory, RoomFilter};
