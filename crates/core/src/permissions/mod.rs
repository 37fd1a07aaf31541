//! Permission gate for room actions

use crate::models::{Role, RoomSettings};

/// Actions that can be attempted inside a room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomAction {
    // Shared surface
    Draw,
    Text,
    ClearCanvas,

    // Chat
    Chat,

    // Host controls
    StartSession,
    ToggleParticipantDrawing,
    ToggleParticipantChat,
    Kick,
}

/// Pure permission decisions
pub struct PermissionGate;

impl PermissionGate {
    /// Decide whether `role` may perform `action` under `settings`
    pub fn allows(settings: &RoomSettings, role: Role, action: RoomAction) -> bool {
        if role.is_host() {
            return true;
        }

        match action {
            RoomAction::Draw | RoomAction::Text => {
                settings.participants_can_draw
            }
            RoomAction::Chat => settings.participants_can_chat,
            // Literal flag semantics: when the host-clear flag is off, anyone may clear.
            RoomAction::ClearCanvas => !settings.host_can_clear,
            RoomAction::StartSession
            | RoomAction::ToggleParticipantDrawing
            | RoomAction::ToggleParticipantChat
            | RoomAction::Kick => false,
        }
    }
}
