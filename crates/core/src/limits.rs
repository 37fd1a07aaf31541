//! Input limits and request validation

use crate::error::{Error, Result};

/// Longest accepted room identifier (after trimming)
pub const MAX_ROOM_ID_LEN: usize = 64;

/// Longest accepted display name (after trimming)
pub const MAX_DISPLAY_NAME_LEN: usize = 32;

/// Default participant cap for a new room
pub const DEFAULT_MAX_PARTICIPANTS: usize = 10;

/// Default delay between "session starting" and "session started"
pub const DEFAULT_START_DELAY_MS: u64 = 3000;

/// Upper bound accepted for the start delay
pub const MAX_START_DELAY_MS: u64 = 60_000;

/// Validate and normalize a room identifier
pub fn validate_room_id(raw: &str) -> Result<String> {
    let id = raw.trim();
    if id.is_empty() {
        return Err(Error::InvalidRequest("Room ID is required".into()));
    }
    if id.chars().count() > MAX_ROOM_ID_LEN {
        return Err(Error::InvalidRequest(format!(
            "Room ID must be at most {} characters",
            MAX_ROOM_ID_LEN
        )));
    }
    Ok(id.to_string())
}

/// Validate and normalize a display name
pub fn validate_display_name(raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(Error::InvalidRequest("Display name is required".into()));
    }
    if name.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(Error::InvalidRequest(format!(
            "Display name must be at most {} characters",
            MAX_DISPLAY_NAME_LEN
        )));
    }
    Ok(name.to_string())
}
