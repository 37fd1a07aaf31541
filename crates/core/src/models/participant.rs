//! Participant and directory models

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identity of a live connection, unique per connection
pub type ParticipantId = Uuid;

/// Role within a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Room creator - holds the control actions
    Host,
    /// Any other member
    Participant,
}

impl Role {
    pub fn is_host(self) -> bool {
        matches!(self, Role::Host)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Host => write!(f, "host"),
            Role::Participant => write!(f, "participant"),
        }
    }
}

/// A member seated in a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
    pub role: Role,
    /// Readiness in the lobby. Always true for the host.
    pub ready: bool,
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    pub fn host(id: ParticipantId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            role: Role::Host,
            ready: true,
            joined_at: Utc::now(),
        }
    }

    pub fn guest(id: ParticipantId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            role: Role::Participant,
            ready: false,
            joined_at: Utc::now(),
        }
    }
}

/// Per-room membership keyed by connection identity
#[derive(Debug, Clone, Default)]
pub struct ParticipantDirectory {
    entries: HashMap<ParticipantId, Participant>,
}

impl ParticipantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seat a participant. Returns false if the identity is already seated.
    pub fn insert(&mut self, participant: Participant) -> bool {
        if self.entries.contains_key(&participant.id) {
            return false;
        }
        self.entries.insert(participant.id, participant);
        true
    }

    pub fn remove(&mut self, id: &ParticipantId) -> Option<Participant> {
        self.entries.remove(id)
    }

    pub fn get(&self, id: &ParticipantId) -> Option<&Participant> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.entries.contains_key(id)
    }

    /// Update readiness. The host stays ready regardless of the request.
    pub fn set_ready(&mut self, id: &ParticipantId, ready: bool) -> Option<&Participant> {
        let participant = self.entries.get_mut(id)?;
        participant.ready = participant.role.is_host() || ready;
        Some(participant)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn host_count(&self) -> usize {
        self.entries.values().filter(|p| p.role.is_host()).count()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ParticipantId> {
        self.entries.keys()
    }

    /// Participants ordered by join time, for display and snapshots
    pub fn snapshot(&self) -> Vec<Participant> {
        let mut list: Vec<Participant> = self.entries.values().cloned().collect();
        list.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.id.cmp(&b.id)));
        list
    }
}
