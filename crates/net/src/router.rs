//! Event router: gate, mutate, fan out
//!
//! Every inbound event is resolved against the sender's binding, checked
//! against the lifecycle state and the permission gate, applied to the
//! room under its lock, and then fanned out either to the whole room or
//! to everyone but the sender. Events that fail a gate are dropped
//! without a reply.

use std::sync::Arc;

use chrono::Utc;
use easel_core::invariants::assert_room_invariants;
use easel_core::{
    Background, ChatMessage, Error, EventClass, LifecycleState, Participant, PermissionGate,
    RecordKind, Result, Room, RoomAction, RoomHandle, RoomRegistry, StrokeRecord,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::connection::ConnectionManager;
use crate::peers::{ConnectionId, Outbound, PeerTable};
use crate::protocol::{ClientMessage, Sender, ServerMessage, SharedFileKind, StrokePhase};

/// Who receives an accepted event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Audience {
    /// Every member, the actor included
    Room,
    /// Every member except the actor
    Others,
}

/// Routes inbound events for all connections
pub struct Router {
    registry: Arc<RoomRegistry>,
    peers: Arc<PeerTable>,
    connections: ConnectionManager,
    config: Arc<ServerConfig>,
}

impl Router {
    pub fn new(registry: Arc<RoomRegistry>, peers: Arc<PeerTable>, config: Arc<ServerConfig>) -> Self {
        let connections =
            ConnectionManager::new(registry.clone(), peers.clone(), config.room.settings());
        Self {
            registry,
            peers,
            connections,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    pub fn peers(&self) -> &Arc<PeerTable> {
        &self.peers
    }

    /// Register a transport connection
    pub async fn connect(&self) -> (ConnectionId, mpsc::UnboundedReceiver<Outbound>) {
        let (conn, rx) = self.peers.register().await;
        debug!(conn_id = %conn, "Connection registered");
        (conn, rx)
    }

    /// Transport is gone: same path as an explicit leave
    pub async fn disconnect(&self, conn: ConnectionId) {
        self.connections.leave(conn).await;
        self.peers.unregister(&conn).await;
        debug!(conn_id = %conn, "Connection unregistered");
    }

    /// Decode one text frame and route it
    pub async fn handle_frame(&self, conn: ConnectionId, text: &str) -> crate::Result<()> {
        let msg = ClientMessage::from_json(text)
            .map_err(|e| crate::Error::Protocol(format!("Invalid JSON: {}", e)))?;
        self.handle(conn, msg).await;
        Ok(())
    }

    /// Route one decoded event
    pub async fn handle(&self, conn: ConnectionId, msg: ClientMessage) {
        match msg {
            ClientMessage::CreateRoom {
                room_id,
                display_name,
            } => {
                let result = self
                    .connections
                    .create_room(conn, &room_id, &display_name)
                    .await;
                self.reply_on_rejection(conn, result).await;
            }
            ClientMessage::JoinRoom {
                room_id,
                display_name,
            } => {
                let result = self.connections.join_room(conn, &room_id, &display_name).await;
                self.reply_on_rejection(conn, result).await;
            }
            ClientMessage::LeaveRoom => self.connections.leave(conn).await,
            ClientMessage::Ping => {
                self.peers.send(&conn, &ServerMessage::Pong).await;
            }
            event => {
                if let Err(e) = self.route_room_event(conn, event).await {
                    debug!(conn_id = %conn, reason = %e, "Event dropped");
                }
            }
        }
    }

    async fn reply_on_rejection(&self, conn: ConnectionId, result: Result<()>) {
        if let Err(e) = result {
            info!(conn_id = %conn, reason = %e, "Join rejected");
            if let Some(reply) = ServerMessage::for_rejection(&e) {
                self.peers.send(&conn, &reply).await;
            }
        }
    }

    async fn route_room_event(&self, conn: ConnectionId, event: ClientMessage) -> Result<()> {
        let binding = self
            .peers
            .binding(&conn)
            .await
            .ok_or_else(|| Error::InvalidState("Connection is not in a room".into()))?;
        if binding.revoked {
            return Err(Error::PermissionDenied("Connection was kicked".into()));
        }

        let handle = self.registry.get(&binding.room_id).await?;
        let mut room = handle.lock().await;
        if !room.is_live() {
            return Err(Error::NotFound(binding.room_id));
        }
        let actor = room
            .participant(&conn)
            .cloned()
            .ok_or_else(|| Error::InvalidState("Sender is not seated".into()))?;

        self.apply(&mut room, &handle, &actor, event).await?;
        assert_room_invariants(&room);
        Ok(())
    }

    async fn apply(
        &self,
        room: &mut Room,
        handle: &RoomHandle,
        actor: &Participant,
        event: ClientMessage,
    ) -> Result<()> {
        let sender = Sender::from(actor);
        let now = Utc::now();

        match event {
            ClientMessage::ToggleReady { ready } => {
                room.set_ready(&actor.id, ready);
                let msg = ServerMessage::LobbyUpdated {
                    participants: room.participants(),
                };
                self.fan_out(room, actor, &msg, Audience::Room).await;
            }

            ClientMessage::StartSession => {
                authorize(room, actor, RoomAction::StartSession)?;
                room.start_session(&actor.id)?;
                info!(room_id = %room.id(), "Session starting");
                let msg = ServerMessage::SessionStarting {
                    room_id: room.id().to_string(),
                };
                self.fan_out(room, actor, &msg, Audience::Room).await;
                self.schedule_session_started(room, handle.clone());
            }

            ClientMessage::Drawing {
                stroke_payload,
                kind,
                slide_index,
            } => {
                require_state(room, EventClass::Stroke)?;
                authorize(room, actor, RoomAction::Draw)?;
                if kind == StrokePhase::Draw {
                    let record = StrokeRecord::new(
                        actor,
                        RecordKind::Stroke,
                        stroke_payload.clone(),
                        slide_index,
                    );
                    if !room.artifacts_mut().record(record) {
                        return Err(Error::InvalidRequest("Slide index out of range".into()));
                    }
                }
                let msg = ServerMessage::Drawing {
                    sender,
                    stroke_payload,
                    kind,
                    slide_index,
                    timestamp: now,
                };
                self.fan_out(room, actor, &msg, Audience::Others).await;
            }

            ClientMessage::ChatMessage { text } => {
                authorize(room, actor, RoomAction::Chat)?;
                let text = text.trim();
                if text.is_empty() {
                    return Err(Error::InvalidRequest("Empty chat message".into()));
                }
                let msg = ServerMessage::ChatMessage {
                    sender,
                    message: ChatMessage::new(actor, text),
                };
                self.fan_out(room, actor, &msg, Audience::Room).await;
            }

            ClientMessage::FileUploadStarted { meta } => {
                let msg = ServerMessage::FileUploadStarted {
                    sender,
                    meta,
                    timestamp: now,
                };
                self.fan_out(room, actor, &msg, Audience::Others).await;
            }

            ClientMessage::BackgroundImageSet {
                image_data,
                filename,
            } => {
                let background = Background {
                    image_data,
                    filename,
                    set_by: actor.display_name.clone(),
                };
                room.artifacts_mut().set_background(background.clone());
                let msg = ServerMessage::BackgroundImageSet {
                    sender,
                    background,
                    timestamp: now,
                };
                self.fan_out(room, actor, &msg, Audience::Others).await;
            }

            ClientMessage::BackgroundCleared => {
                room.artifacts_mut().clear_background();
                let msg = ServerMessage::BackgroundCleared {
                    sender,
                    timestamp: now,
                };
                self.fan_out(room, actor, &msg, Audience::Others).await;
            }

            ClientMessage::FileShared {
                kind,
                data,
                filename,
            } => {
                match kind {
                    SharedFileKind::Image => room.artifacts_mut().set_background(Background {
                        image_data: data.clone(),
                        filename: filename.clone().unwrap_or_default(),
                        set_by: actor.display_name.clone(),
                    }),
                    SharedFileKind::Document => {
                        room.artifacts_mut().replace_deck(vec![data.clone()])
                    }
                }
                let msg = ServerMessage::FileShared {
                    sender,
                    kind,
                    data,
                    filename,
                    timestamp: now,
                };
                self.fan_out(room, actor, &msg, Audience::Others).await;
            }

            ClientMessage::PresentationShared {
                slides,
                current_slide: _,
                filename,
            } => {
                room.artifacts_mut().replace_deck(slides.clone());
                let msg = ServerMessage::PresentationShared {
                    sender,
                    slides,
                    current_slide: room.artifacts().current_slide(),
                    filename,
                    timestamp: now,
                };
                self.fan_out(room, actor, &msg, Audience::Others).await;
            }

            ClientMessage::SlideChanged { slide_index } => {
                if !room.artifacts_mut().change_slide(slide_index) {
                    return Err(Error::InvalidRequest("Slide index out of range".into()));
                }
                let msg = ServerMessage::SlideChanged {
                    sender,
                    slide_index,
                    timestamp: now,
                };
                self.fan_out(room, actor, &msg, Audience::Others).await;
            }

            ClientMessage::SlideDrawingsCleared { slide_index } => {
                authorize(room, actor, RoomAction::ClearCanvas)?;
                if !room.artifacts_mut().clear_slide(slide_index) {
                    return Err(Error::InvalidRequest("Slide index out of range".into()));
                }
                let msg = ServerMessage::SlideDrawingsCleared {
                    sender,
                    slide_index,
                    timestamp: now,
                };
                self.fan_out(room, actor, &msg, Audience::Others).await;
            }

            ClientMessage::TextUpdate { payload } => {
                authorize(room, actor, RoomAction::Text)?;
                let msg = ServerMessage::TextUpdate {
                    sender,
                    payload,
                    timestamp: now,
                };
                self.fan_out(room, actor, &msg, Audience::Others).await;
            }

            ClientMessage::TextAdded { payload } => {
                authorize(room, actor, RoomAction::Text)?;
                let slide_index = (!room.artifacts().slides().is_empty())
                    .then(|| room.artifacts().current_slide());
                let record = StrokeRecord::new(actor, RecordKind::Text, payload, slide_index);
                room.artifacts_mut().record(record.clone());
                let msg = ServerMessage::TextAdded { sender, record };
                self.fan_out(room, actor, &msg, Audience::Others).await;
            }

            ClientMessage::ClearCanvas => {
                authorize(room, actor, RoomAction::ClearCanvas)?;
                room.artifacts_mut().clear_canvas();
                let msg = ServerMessage::CanvasCleared {
                    sender,
                    timestamp: now,
                };
                self.fan_out(room, actor, &msg, Audience::Room).await;
            }

            ClientMessage::ToggleParticipantDrawing => {
                authorize(room, actor, RoomAction::ToggleParticipantDrawing)?;
                let settings = room.toggle_participant_drawing().clone();
                let msg = ServerMessage::PermissionsUpdated {
                    settings,
                    updated_by: actor.display_name.clone(),
                };
                self.fan_out(room, actor, &msg, Audience::Room).await;
            }

            ClientMessage::ToggleParticipantChat => {
                authorize(room, actor, RoomAction::ToggleParticipantChat)?;
                let settings = room.toggle_participant_chat().clone();
                let msg = ServerMessage::PermissionsUpdated {
                    settings,
                    updated_by: actor.display_name.clone(),
                };
                self.fan_out(room, actor, &msg, Audience::Room).await;
            }

            ClientMessage::KickParticipant { target_identity } => {
                authorize(room, actor, RoomAction::Kick)?;
                self.connections.kick(room, actor, target_identity).await?;
            }

            ClientMessage::CreateRoom { .. }
            | ClientMessage::JoinRoom { .. }
            | ClientMessage::LeaveRoom
            | ClientMessage::Ping => {
                warn!("Connection event reached the room router");
            }
        }
        Ok(())
    }

    async fn fan_out(&self, room: &Room, actor: &Participant, msg: &ServerMessage, audience: Audience) {
        let except = match audience {
            Audience::Room => None,
            Audience::Others => Some(actor.id),
        };
        self.peers.broadcast(room.directory().ids(), msg, except).await;
    }

    /// Announce "session started" after the configured delay.
    ///
    /// The task is aborted if the room ends first; the snapshot reflects
    /// the directory when the announcement fires.
    fn schedule_session_started(&self, room: &mut Room, handle: RoomHandle) {
        let peers = self.peers.clone();
        let delay = self.config.start_delay();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut room = handle.lock().await;
            room.clear_announcement();
            if room.state() != LifecycleState::Active {
                return;
            }
            let msg = ServerMessage::SessionStarted {
                state: room.state(),
                settings: room.settings().clone(),
                participants: room.participants(),
            };
            peers.broadcast(room.directory().ids(), &msg, None).await;
            info!(room_id = %room.id(), "Session started");
        });
        room.set_announcement(task.abort_handle());
    }
}

fn authorize(room: &Room, actor: &Participant, action: RoomAction) -> Result<()> {
    if PermissionGate::allows(room.settings(), actor.role, action) {
        Ok(())
    } else {
        Err(Error::PermissionDenied(format!("{:?} not allowed for {}", action, actor.role)))
    }
}

fn require_state(room: &Room, class: EventClass) -> Result<()> {
    if room.state().accepts(class) {
        Ok(())
    } else {
        Err(Error::InvalidState(format!("{:?} events are not accepted in {}", class, room.state())))
    }
}
