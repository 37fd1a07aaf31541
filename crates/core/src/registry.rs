//! Room registry - the process-wide set of live rooms
//!
//! Each room sits behind its own mutex; the registry lock only guards the
//! id → room mapping. Lock order is always room → registry: code holding a
//! room lock may call into the registry, but the registry never locks a
//! room while holding its own lock.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::error::{Error, Result};
use crate::models::{Participant, ParticipantId, Room, RoomDetail, RoomSettings, RoomSummary};

/// Shared handle to one room's exclusive-access container
pub type RoomHandle = Arc<Mutex<Room>>;

/// Registry of live rooms keyed by room id
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, RoomHandle>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a room with the creator seated as host.
    ///
    /// Fails with `AlreadyExists` if the id maps to a live room; the
    /// existing room is left untouched. The new room is returned already
    /// locked, so the creator is served before any other handler sees it.
    pub async fn create_room(
        &self,
        id: &str,
        host_id: ParticipantId,
        host_name: &str,
        settings: RoomSettings,
    ) -> Result<(RoomHandle, OwnedMutexGuard<Room>)> {
        let room = Room::new(id, Participant::host(host_id, host_name), settings);
        let handle = Arc::new(Mutex::new(room));
        let guard = handle.clone().lock_owned().await;

        let mut rooms = self.rooms.write().await;
        match rooms.entry(id.to_string()) {
            Entry::Occupied(_) => Err(Error::AlreadyExists(id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(handle.clone());
                tracing::info!(room_id = %id, host_id = %host_id, "Room created");
                Ok((handle, guard))
            }
        }
    }

    /// Look up a room by id
    pub async fn get(&self, id: &str) -> Result<RoomHandle> {
        self.rooms
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Remove `id` only if it still maps to `handle`.
    ///
    /// Callers end the room (under its lock) before deleting it so that
    /// anyone still holding the handle sees it as Ended.
    pub async fn delete_if_same(&self, id: &str, handle: &RoomHandle) -> bool {
        let mut rooms = self.rooms.write().await;
        match rooms.get(id) {
            Some(current) if Arc::ptr_eq(current, handle) => {
                rooms.remove(id);
                tracing::info!(room_id = %id, "Room deleted");
                true
            }
            _ => false,
        }
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.rooms.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rooms.read().await.is_empty()
    }

    /// Snapshot of all handles; the registry lock is released on return
    pub async fn handles(&self) -> Vec<(String, RoomHandle)> {
        self.rooms
            .read()
            .await
            .iter()
            .map(|(id, handle)| (id.clone(), handle.clone()))
            .collect()
    }

    /// Delete every empty room older than `threshold`. Returns the reaped ids.
    pub async fn sweep_idle(&self, threshold: Duration) -> Vec<String> {
        let mut reaped = Vec::new();
        for (id, handle) in self.handles().await {
            let mut room = handle.lock().await;
            if !room.is_live() || !room.is_idle(Utc::now(), threshold) {
                continue;
            }
            room.end();
            if self.delete_if_same(&id, &handle).await {
                reaped.push(id);
            }
        }
        reaped
    }

    /// Read-only listing of live rooms
    pub async fn summaries(&self) -> Vec<RoomSummary> {
        let mut list = Vec::new();
        for (_, handle) in self.handles().await {
            let room = handle.lock().await;
            if room.is_live() {
                list.push(room.summary());
            }
        }
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        list
    }

    /// Read-only detail of a single room
    pub async fn detail(&self, id: &str) -> Result<RoomDetail> {
        let handle = self.get(id).await?;
        let room = handle.lock().await;
        if !room.is_live() {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(room.detail())
    }
}
