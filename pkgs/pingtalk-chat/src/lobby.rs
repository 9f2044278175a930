//! Room entry, creation and the room list

use std::sync::Arc;

use chrono::Utc;
use pingtalk_store::{
    filter_rooms, paths, DocumentStore, EnteredRooms, RoomDirectory, RoomFilter, RoomInfo,
};
use tracing::{info, instrument, warn};

use crate::error::{ChatError, Result};

/// Room passwords are exactly this many ASCII digits.
pub const PASSWORD_LEN: usize = 4;

/// Check the rules a new room must satisfy.
pub fn validate_new_room(title: &str, password: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(ChatError::InvalidRoom("title is empty".to_string()));
    }
    if !paths::is_valid_segment(title) {
        return Err(ChatError::InvalidRoom(format!(
            "title '{}' cannot be used as a room code",
            title
        )));
    }
    if password.len() != PASSWORD_LEN || !password.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ChatError::InvalidRoom(format!(
            "password must be {} digits",
            PASSWORD_LEN
        )));
    }
    Ok(())
}

pub struct RoomLobby {
    directory: RoomDirectory,
    entered: EnteredRooms,
    nickname: String,
}

impl RoomLobby {
    pub fn new(store: Arc<dyn DocumentStore>, entered: EnteredRooms, nickname: impl Into<String>) -> Self {
        Self {
            directory: RoomDirectory::new(store),
            entered,
            nickname: nickname.into(),
        }
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn entered(&self) -> &EnteredRooms {
        &self.entered
    }

    /// Create a room titled `title`; the title doubles as the room code.
    #[instrument(skip(self, password))]
    pub async fn create_room(&self, title: &str, password: &str) -> Result<RoomInfo> {
        validate_new_room(title, password)?;
        let room = RoomInfo {
            id: title.to_string(),
            title: title.to_string(),
            created_by: self.nickname.clone(),
            password: Some(password.to_string()),
            created_at: Some(Utc::now()),
        };
        self.directory.create_room(&room).await?;
        Ok(room)
    }

    /// Enter `room_id`.
    ///
    /// Rooms already in the entered set need no password. Otherwise
    /// `password` must match the room's password; a mismatch changes nothing.
    /// A room stored without a password cannot be entered this way.
    #[instrument(skip(self, password))]
    pub async fn enter(&mut self, room_id: &str, password: Option<&str>) -> Result<RoomInfo> {
        let room = self
            .directory
            .get_room(room_id)
            .await?
            .ok_or_else(|| ChatError::RoomNotFound(room_id.to_string()))?;

        if self.entered.contains(room_id) {
            return Ok(room);
        }

        let Some(expected) = room.password.as_deref() else {
            warn!("Rejected entry to room '{}': room has no password", room_id);
            return Err(ChatError::WrongPassword(room_id.to_string()));
        };
        if password != Some(expected) {
            warn!("Rejected entry to room '{}': wrong password", room_id);
            return Err(ChatError::WrongPassword(room_id.to_string()));
        }

        let mut entered = self.entered.clone();
        entered.insert(room_id);
        entered.save()?;
        self.entered = entered;
        info!("{} entered room '{}'", self.nickname, room_id);
        Ok(room)
    }

    pub async fn toggle_favorite(&self, room_id: &str) -> Result<bool> {
        Ok(self
            .directory
            .toggle_favorite(&self.nickname, room_id)
            .await?)
    }

    /// Rooms visible under `filter`, in directory order.
    pub async fn visible_rooms(&self, filter: RoomFilter) -> Result<Vec<RoomInfo>> {
        let rooms = self.directory.list_rooms().await?;
        let favorites = if filter.favorites_only {
            self.directory.favorites(&self.nickname).await?
        } else {
            Default::default()
        };
        Ok(filter_rooms(&rooms, &favorites, &self.entered, filter)
            .into_iter()
            .cloned()
            .collect())
    }
}
