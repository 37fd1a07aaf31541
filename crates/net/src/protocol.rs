//! Network protocol message types
//!
//! One JSON object per WebSocket text frame. The `type` field carries the
//! event name in kebab-case; all other fields are camelCase.

use chrono::{DateTime, Utc};
use easel_core::{
    ArtifactSnapshot, Background, ChatMessage, LifecycleState, Participant, ParticipantId, Role,
    Room, RoomSettings, StrokeRecord,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Phase of a freehand stroke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrokePhase {
    /// Pen down - relayed only
    Start,
    /// Committed segment - relayed and persisted
    Draw,
    /// Pen up - relayed only
    Stop,
}

/// Kind of a shared file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SharedFileKind {
    /// Becomes the background
    Image,
    /// Becomes a single-slide deck
    Document,
}

/// Messages sent by clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    CreateRoom {
        #[serde(default, rename = "id", alias = "roomId")]
        room_id: String,
        #[serde(default)]
        display_name: String,
    },
    JoinRoom {
        #[serde(default, rename = "id", alias = "roomId")]
        room_id: String,
        #[serde(default)]
        display_name: String,
    },
    ToggleReady {
        ready: bool,
    },
    StartSession,
    Drawing {
        stroke_payload: Value,
        kind: StrokePhase,
        #[serde(default)]
        slide_index: Option<usize>,
    },
    ChatMessage {
        text: String,
    },
    FileUploadStarted {
        #[serde(default)]
        meta: Value,
    },
    BackgroundImageSet {
        image_data: String,
        filename: String,
    },
    BackgroundCleared,
    FileShared {
        kind: SharedFileKind,
        data: String,
        #[serde(default)]
        filename: Option<String>,
    },
    PresentationShared {
        slides: Vec<String>,
        #[serde(default)]
        current_slide: Option<usize>,
        filename: String,
    },
    SlideChanged {
        slide_index: usize,
    },
    SlideDrawingsCleared {
        slide_index: usize,
    },
    /// Live typing, never persisted
    TextUpdate {
        payload: Value,
    },
    TextAdded {
        payload: Value,
    },
    ClearCanvas,
    ToggleParticipantDrawing,
    ToggleParticipantChat,
    KickParticipant {
        target_identity: ParticipantId,
    },
    LeaveRoom,
    Ping,
}

impl ClientMessage {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Attribution attached to relayed events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sender {
    pub id: ParticipantId,
    pub display_name: String,
    pub role: Role,
}

impl From<&Participant> for Sender {
    fn from(p: &Participant) -> Self {
        Self {
            id: p.id,
            display_name: p.display_name.clone(),
            role: p.role,
        }
    }
}

/// Reply to a successful create or join
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomWelcome {
    pub room_id: String,
    pub you: Participant,
    pub state: LifecycleState,
    pub settings: RoomSettings,
    pub participants: Vec<Participant>,
    /// Current surface, present only when the session is active
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<ArtifactSnapshot>,
}

impl RoomWelcome {
    /// Build the welcome for `you` from the room as it stands
    pub fn new(room: &Room, you: &Participant) -> Self {
        let artifacts =
            (room.state() == LifecycleState::Active).then(|| room.artifacts().snapshot());
        Self {
            room_id: room.id().to_string(),
            you: you.clone(),
            state: room.state(),
            settings: room.settings().clone(),
            participants: room.participants(),
            artifacts,
        }
    }
}

/// Messages sent by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    // Replies to the actor only
    RoomCreated(RoomWelcome),
    RoomJoined(RoomWelcome),
    RoomExists {
        room_id: String,
    },
    RoomNotFound {
        room_id: String,
    },
    RoomFull {
        room_id: String,
        capacity: usize,
    },
    Error {
        message: String,
    },
    Pong,

    // Membership and lifecycle
    LobbyUpdated {
        participants: Vec<Participant>,
    },
    SessionStarting {
        room_id: String,
    },
    SessionStarted {
        state: LifecycleState,
        settings: RoomSettings,
        participants: Vec<Participant>,
    },
    PermissionsUpdated {
        settings: RoomSettings,
        updated_by: String,
    },
    RoomEnded {
        reason: String,
    },
    UserLeft {
        display_name: String,
        role: Role,
    },
    ParticipantLeftSession {
        display_name: String,
        role: Role,
        participants: Vec<Participant>,
    },
    Kicked {
        by: String,
        reason: String,
    },

    // Live content
    Drawing {
        sender: Sender,
        stroke_payload: Value,
        kind: StrokePhase,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        slide_index: Option<usize>,
        timestamp: DateTime<Utc>,
    },
    ChatMessage {
        sender: Sender,
        message: ChatMessage,
    },
    FileUploadStarted {
        sender: Sender,
        meta: Value,
        timestamp: DateTime<Utc>,
    },
    BackgroundImageSet {
        sender: Sender,
        background: Background,
        timestamp: DateTime<Utc>,
    },
    BackgroundCleared {
        sender: Sender,
        timestamp: DateTime<Utc>,
    },
    FileShared {
        sender: Sender,
        kind: SharedFileKind,
        data: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
        timestamp: DateTime<Utc>,
    },
    PresentationShared {
        sender: Sender,
        slides: Vec<String>,
        current_slide: usize,
        filename: String,
        timestamp: DateTime<Utc>,
    },
    SlideChanged {
        sender: Sender,
        slide_index: usize,
        timestamp: DateTime<Utc>,
    },
    SlideDrawingsCleared {
        sender: Sender,
        slide_index: usize,
        timestamp: DateTime<Utc>,
    },
    TextUpdate {
        sender: Sender,
        payload: Value,
        timestamp: DateTime<Utc>,
    },
    TextAdded {
        sender: Sender,
        record: StrokeRecord,
    },
    CanvasCleared {
        sender: Sender,
        timestamp: DateTime<Utc>,
    },
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Actor-only reply for a failed create or join, if the error is reportable
    pub fn for_rejection(err: &easel_core::Error) -> Option<Self> {
        use easel_core::Error;
        match err {
            Error::InvalidRequest(message) => Some(ServerMessage::Error {
                message: message.clone(),
            }),
            Error::AlreadyExists(room_id) => Some(ServerMessage::RoomExists {
                room_id: room_id.clone(),
            }),
            Error::NotFound(room_id) => Some(ServerMessage::RoomNotFound {
                room_id: room_id.clone(),
            }),
            Error::RoomFull { room_id, capacity } => Some(ServerMessage::RoomFull {
                room_id: room_id.clone(),
                capacity: *capacity,
            }),
            Error::PermissionDenied(_) | Error::InvalidState(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn test_client_wire_names() {
        let msg = ClientMessage::from_json(
            r#"{"type":"create-room","id":"R1","displayName":"Alice"}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::CreateRoom {
                room_id: "R1".into(),
                display_name: "Alice".into()
            }
        );

        let msg =
            ClientMessage::from_json(r#"{"type":"join-room","id":"R1","displayName":"Bob"}"#)
                .unwrap();
        assert_eq!(
            msg,
            ClientMessage::JoinRoom {
                room_id: "R1".into(),
                display_name: "Bob".into()
            }
        );
        let value: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["id"], "R1");

        let msg = ClientMessage::from_json(r#"{"type":"start-session"}"#).unwrap();
        assert_eq!(msg, ClientMessage::StartSession);

        let msg = ClientMessage::from_json(
            r#"{"type":"drawing","strokePayload":{"points":[[1,2]]},"kind":"draw","slideIndex":2}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::Drawing { kind, slide_index, stroke_payload } => {
                assert_eq!(kind, StrokePhase::Draw);
                assert_eq!(slide_index, Some(2));
                assert_eq!(stroke_payload["points"][0][1], 2);
            }
            other => panic!("Wrong message type: {other:?}"),
        }
    }

    #[test]
    fn test_room_id_accepts_camel_case_alias() {
        let msg = ClientMessage::from_json(
            r#"{"type":"join-room","roomId":"R1","displayName":"Bob"}"#,
        )
        .unwrap();
        assert!(matches!(msg, ClientMessage::JoinRoom { room_id, .. } if room_id == "R1"));
    }

    #[test]
    fn test_missing_join_fields_still_parse() {
        // Field validation happens in the lifecycle manager, not the decoder
        let msg = ClientMessage::from_json(r#"{"type":"join-room"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::JoinRoom {
                room_id: String::new(),
                display_name: String::new()
            }
        );
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(ClientMessage::from_json(r#"{"type":"launch-missiles"}"#).is_err());
        assert!(ClientMessage::from_json("not json").is_err());
    }

    #[test]
    fn test_server_message_shape() {
        let sender = Sender {
            id: Uuid::new_v4(),
            display_name: "Bob".into(),
            role: Role::Participant,
        };
        let msg = ServerMessage::Drawing {
            sender,
            stroke_payload: json!({"color": "#000"}),
            kind: StrokePhase::Draw,
            slide_index: None,
            timestamp: Utc::now(),
        };
        let value: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "drawing");
        assert_eq!(value["sender"]["displayName"], "Bob");
        assert_eq!(value["sender"]["role"], "participant");
        assert!(value.get("slideIndex").is_none());
    }

    #[test]
    fn test_rejection_replies() {
        use easel_core::Error;
        assert!(matches!(
            ServerMessage::for_rejection(&Error::AlreadyExists("R1".into())),
            Some(ServerMessage::RoomExists { .. })
        ));
        assert!(matches!(
            ServerMessage::for_rejection(&Error::RoomFull { room_id: "R1".into(), capacity: 3 }),
            Some(ServerMessage::RoomFull { capacity: 3, .. })
        ));
        assert!(ServerMessage::for_rejection(&Error::PermissionDenied("kick".into())).is_none());
    }
}
