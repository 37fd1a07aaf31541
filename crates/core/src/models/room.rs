//! Room model - one isolated collaboration session

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::AbortHandle;

use super::{ArtifactStore, Participant, ParticipantDirectory, ParticipantId, Role};
use crate::error::{Error, Result};
use crate::lifecycle::LifecycleState;
use crate::limits::DEFAULT_MAX_PARTICIPANTS;

/// Per-room settings and permission flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomSettings {
    pub host_can_clear: bool,
    pub host_can_mute: bool,
    pub participants_can_draw: bool,
    pub participants_can_chat: bool,
    pub max_participants: usize,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            host_can_clear: true,
            host_can_mute: true,
            participants_can_draw: true,
            participants_can_chat: true,
            max_participants: DEFAULT_MAX_PARTICIPANTS,
        }
    }
}

/// Listing entry for the read-only query surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: String,
    pub state: LifecycleState,
    pub participant_count: usize,
    pub max_participants: usize,
    pub created_at: DateTime<Utc>,
    pub host_name: Option<String>,
}

/// Full detail for the read-only query surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDetail {
    #[serde(flatten)]
    pub summary: RoomSummary,
    pub participants: Vec<Participant>,
    pub settings: RoomSettings,
}

/// A room: directory, artifacts, settings and lifecycle as one unit
#[derive(Debug)]
pub struct Room {
    id: String,
    host_id: ParticipantId,
    state: LifecycleState,
    directory: ParticipantDirectory,
    artifacts: ArtifactStore,
    settings: RoomSettings,
    created_at: DateTime<Utc>,
    /// Delayed "session started" announcement, aborted when the room ends
    announcement: Option<AbortHandle>,
}

impl Room {
    /// Create a room in Lobby with `host` seated and ready
    pub fn new(id: impl Into<String>, mut host: Participant, settings: RoomSettings) -> Self {
        host.role = Role::Host;
        host.ready = true;
        let host_id = host.id;
        let mut directory = ParticipantDirectory::new();
        directory.insert(host);

        Self {
            id: id.into(),
            host_id,
            state: LifecycleState::Lobby,
            directory,
            artifacts: ArtifactStore::new(),
            settings,
            created_at: Utc::now(),
            announcement: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn host_id(&self) -> ParticipantId {
        self.host_id
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_live(&self) -> bool {
        self.state.is_live()
    }

    pub fn settings(&self) -> &RoomSettings {
        &self.settings
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn directory(&self) -> &ParticipantDirectory {
        &self.directory
    }

    pub fn participant(&self, id: &ParticipantId) -> Option<&Participant> {
        self.directory.get(id)
    }

    pub fn participants(&self) -> Vec<Participant> {
        self.directory.snapshot()
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn artifacts_mut(&mut self) -> &mut ArtifactStore {
        &mut self.artifacts
    }

    pub fn is_full(&self) -> bool {
        self.directory.len() >= self.settings.max_participants
    }

    /// Seat a non-host participant
    pub fn seat(&mut self, participant: Participant) -> Result<()> {
        if !self.is_live() {
            return Err(Error::NotFound(self.id.clone()));
        }
        if self.is_full() {
            return Err(Error::RoomFull {
                room_id: self.id.clone(),
                capacity: self.settings.max_participants,
            });
        }
        let participant = Participant {
            role: Role::Participant,
            ready: false,
            ..participant
        };
        if !self.directory.insert(participant) {
            return Err(Error::InvalidRequest("Already in this room".into()));
        }
        Ok(())
    }

    pub fn remove(&mut self, id: &ParticipantId) -> Option<Participant> {
        self.directory.remove(id)
    }

    pub fn set_ready(&mut self, id: &ParticipantId, ready: bool) -> Option<&Participant> {
        self.directory.set_ready(id, ready)
    }

    /// Lobby → Active. Host only; readiness is not a precondition.
    pub fn start_session(&mut self, actor: &ParticipantId) -> Result<()> {
        if *actor != self.host_id {
            return Err(Error::PermissionDenied("Only the host can start the session".into()));
        }
        if !self.state.can_transition_to(LifecycleState::Active) {
            return Err(Error::InvalidState(format!(
                "Cannot start a session from {}",
                self.state
            )));
        }
        self.state = LifecycleState::Active;
        Ok(())
    }

    /// Transition to Ended and cancel any pending announcement
    pub fn end(&mut self) {
        self.state = LifecycleState::Ended;
        if let Some(handle) = self.announcement.take() {
            handle.abort();
        }
    }

    pub fn set_announcement(&mut self, handle: AbortHandle) {
        if let Some(previous) = self.announcement.replace(handle) {
            previous.abort();
        }
    }

    pub fn clear_announcement(&mut self) {
        self.announcement = None;
    }

    pub fn toggle_participant_drawing(&mut self) -> &RoomSettings {
        self.settings.participants_can_draw = !self.settings.participants_can_draw;
        &self.settings
    }

    pub fn toggle_participant_chat(&mut self) -> &RoomSettings {
        self.settings.participants_can_chat = !self.settings.participants_can_chat;
        &self.settings
    }

    /// Empty and older than `threshold` at `now`
    pub fn is_idle(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.directory.is_empty() && now - self.created_at > threshold
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id.clone(),
            state: self.state,
            participant_count: self.directory.len(),
            max_participants: self.settings.max_participants,
            created_at: self.created_at,
            host_name: self
                .directory
                .get(&self.host_id)
                .map(|p| p.display_name.clone()),
        }
    }

    pub fn detail(&self) -> RoomDetail {
        RoomDetail {
            summary: self.summary(),
            participants: self.participants(),
            settings: self.settings.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn backdate(&mut self, by: Duration) {
        self.created_at = self.created_at - by;
    }
}
