//! Session lifecycle state machine
//!
//! ```text
//! Lobby ──(host: start-session)──► Active ──(host left / empty)──► Ended
//!   └──────────────(host left / empty / reaped)──────────────────────┘
//! ```
//!
//! There is no way back from Active to Lobby. Ended is terminal and a room
//! in that state is removed from the registry in the same step.

use serde::{Deserialize, Serialize};

/// Lifecycle phase of a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Lobby,
    Active,
    Ended,
}

/// Event classes as far as state gating is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventClass {
    /// Freehand stroke start/draw/stop
    Stroke,
    /// Everything else: chat, membership, readiness, host controls, content
    General,
}

impl LifecycleState {
    /// Whether a transition from `self` to `next` is legal
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        matches!(
            (self, next),
            (LifecycleState::Lobby, LifecycleState::Active)
                | (LifecycleState::Lobby, LifecycleState::Ended)
                | (LifecycleState::Active, LifecycleState::Ended)
        )
    }

    /// Whether events of `class` are accepted in this state.
    ///
    /// Only strokes are gated; everything else is accepted in any live state.
    pub fn accepts(self, class: EventClass) -> bool {
        match self {
            LifecycleState::Ended => false,
            LifecycleState::Active => true,
            LifecycleState::Lobby => class != EventClass::Stroke,
        }
    }

    pub fn is_live(self) -> bool {
        self != LifecycleState::Ended
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Lobby => write!(f, "lobby"),
            LifecycleState::Active => write!(f, "active"),
            LifecycleState::Ended => write!(f, "ended"),
        }
    }
}
