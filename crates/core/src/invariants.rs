//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use crate::models::{ArtifactStore, Room};

/// Validate that a live room's state is internally consistent
pub fn assert_room_invariants(room: &Room) {
    if !room.is_live() {
        return;
    }

    // Exactly one host while the room exists
    debug_assert_eq!(
        room.directory().host_count(),
        1,
        "Room {} has {} hosts, expected exactly 1",
        room.id(),
        room.directory().host_count()
    );

    debug_assert!(
        room.participant(&room.host_id())
            .is_some_and(|p| p.role.is_host()),
        "Room {} host {} is not seated as host",
        room.id(),
        room.host_id()
    );

    // The host's readiness flag is pinned
    debug_assert!(
        room.participant(&room.host_id()).map_or(true, |p| p.ready),
        "Room {} host is not marked ready",
        room.id()
    );

    debug_assert!(
        room.directory().len() <= room.settings().max_participants,
        "Room {} exceeds its cap: {} > {}",
        room.id(),
        room.directory().len(),
        room.settings().max_participants
    );

    assert_artifact_invariants(room.id(), room.artifacts());
}

/// Validate the slide position against the deck
pub fn assert_artifact_invariants(room_id: &str, artifacts: &ArtifactStore) {
    debug_assert!(
        artifacts.is_valid_slide(artifacts.current_slide()),
        "Room {} current slide {} is outside a deck of {}",
        room_id,
        artifacts.current_slide(),
        artifacts.slides().len()
    );
}
