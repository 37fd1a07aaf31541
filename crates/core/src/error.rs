//! Error types for Easel Core

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Room already exists: {0}")]
    AlreadyExists(String),

    #[error("Room not found: {0}")]
    NotFound(String),

    #[error("Room {room_id} is full ({capacity} participants)")]
    RoomFull { room_id: String, capacity: usize },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    /// Whether this error is reported back to the actor.
    ///
    /// Gate failures are dropped without a reply.
    pub fn is_reportable(&self) -> bool {
        !matches!(self, Error::PermissionDenied(_) | Error::InvalidState(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_errors_are_silent() {
        assert!(!Error::PermissionDenied("draw".into()).is_reportable());
        assert!(!Error::InvalidState("lobby".into()).is_reportable());
        assert!(Error::NotFound("R1".into()).is_reportable());
        assert!(Error::RoomFull { room_id: "R1".into(), capacity: 2 }.is_reportable());
    }
}
