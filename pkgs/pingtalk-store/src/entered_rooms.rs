//! Locally persisted set of rooms this device has already been admitted to
//!
//! Membership here lets a user re-enter a room without typing the shared
//! password again. State is only read in [`EnteredRooms::load`] and only
//! written in [`EnteredRooms::save`].

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;

#[derive(Debug, Default, Serialize, Deserialize)]
struct EnteredRoomsFile {
    rooms: BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub struct EnteredRooms {
    path: Option<PathBuf>,
    rooms: BTreeSet<String>,
}

impl EnteredRooms {
    /// A set that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            rooms: BTreeSet::new(),
        }
    }

    /// Load the set from `path`; a missing file yields an empty set.
    ///
    /// Besides the JSON format written by [`save`](Self::save), the legacy
    /// comma-delimited form (`"room1,room2"`) is accepted and migrated on the
    /// next save.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Ok(Self {
                path: Some(path),
                rooms: BTreeSet::new(),
            });
        }

        let content = std::fs::read_to_string(&path)?;
        let trimmed = content.trim();
        let rooms = if trimmed.starts_with('{') {
            serde_json::from_str::<EnteredRoomsFile>(trimmed)?.rooms
        } else {
            trimmed
                .split(',')
                .map(str::trim)
                .filter(|code| !code.is_empty())
                .map(str::to_string)
                .collect()
        };

        info!("Loaded {} entered rooms from {}", rooms.len(), path.display());
        Ok(Self {
            path: Some(path),
            rooms,
        })
    }

    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = EnteredRoomsFile {
            rooms: self.rooms.clone(),
        };
        std::fs::write(path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }

    pub fn contains(&self, room_id: &str) -> bool {
        self.rooms.contains(room_id)
    }

    /// Returns `true` if the room was not present before.
    pub fn insert(&mut self, room_id: &str) -> bool {
        self.rooms.insert(room_id.to_string())
    }

    pub fn remove(&mut self, room_id: &str) -> bool {
        self.rooms.remove(room_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.rooms.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
