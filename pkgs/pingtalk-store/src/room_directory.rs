//! Room, favorite and presence-marker documents

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::document_store::DocumentStore;
use crate::entered_rooms::EnteredRooms;
use crate::error::Result;
use crate::models::{Document, RoomInfo};
use crate::paths;

/// Room list filter toggles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoomFilter {
    pub favorites_only: bool,
    pub entered_only: bool,
}

/// Thin access layer over the room-related collections
#[derive(Clone)]
pub struct RoomDirectory {
    store: Arc<dyn DocumentStore>,
}

impl RoomDirectory {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Write `room` at `rooms/{room.id}`, overwriting an existing room of that id.
    pub async fn create_room(&self, room: &RoomInfo) -> Result<()> {
        self.store
            .set_document(paths::ROOMS, &room.id, room.to_document()?)
            .await?;
        info!("Created room '{}' by {}", room.id, room.created_by);
        Ok(())
    }

    pub async fn get_room(&self, room_id: &str) -> Result<Option<RoomInfo>> {
        let document = self.store.get_document(paths::ROOMS, room_id).await?;
        Ok(document.and_then(|doc| RoomInfo::from_document(room_id, &doc)))
    }

    /// All well-formed rooms; documents lacking a title or creator are skipped.
    pub async fn list_rooms(&self) -> Result<Vec<RoomInfo>> {
        let documents = self.store.list_documents(paths::ROOMS).await?;
        let rooms: Vec<RoomInfo> = documents
            .iter()
            .filter_map(|doc| {
                let room = RoomInfo::from_document(&doc.id, &doc.fields);
                if room.is_none() {
                    warn!("Skipping malformed room document '{}'", doc.id);
                }
                room
            })
            .collect();
        debug!("Listed {} rooms", rooms.len());
        Ok(rooms)
    }

    pub async fn favorites(&self, nickname: &str) -> Result<BTreeSet<String>> {
        let documents = self
            .store
            .list_documents(&paths::user_favorites(nickname))
            .await?;
        Ok(documents.into_iter().map(|doc| doc.id).collect())
    }

    /// Flip the favorite marker; returns whether the room is now a favorite.
    pub async fn toggle_favorite(&self, nickname: &str, room_id: &str) -> Result<bool> {
        let collection = paths::user_favorites(nickname);
        let exists = self.store.get_document(&collection, room_id).await?.is_some();
        if exists {
            self.store.delete_document(&collection, room_id).await?;
        } else {
            self.store
                .set_document(&collection, room_id, Document::new())
                .await?;
        }
        debug!("Favorite {} for {}: {}", room_id, nickname, !exists);
        Ok(!exists)
    }

    /// Whether `nickname` has a presence marker in the room.
    pub async fn has_entered(&self, room_id: &str, nickname: &str) -> Result<bool> {
        Ok(self
            .store
            .get_document(&paths::room_entered_users(room_id), nickname)
            .await?
            .is_some())
    }

    pub async fn mark_entered(&self, room_id: &str, nickname: &str) -> Result<()> {
        let marker = json!({ "entered": true })
            .as_object()
            .cloned()
            .unwrap_or_default();
        self.store
            .set_document(&paths::room_entered_users(room_id), nickname, marker)
            .await
    }
}

/// Apply the list toggles of the room screen.
pub fn filter_rooms<'a>(
    rooms: &'a [RoomInfo],
    favorites: &BTreeSet<String>,
    entered: &EnteredRooms,
    filter: RoomFilter,
) -> Vec<&'a RoomInfo> {
    rooms
        .iter()
        .filter(|room| !filter.favorites_only || favorites.contains(&room.id))
        .filter(|room| !filter.entered_only || entered.contains(&room.id))
        .collect()
}
