//! Connection lifecycle: join, leave and kick
//!
//! Binds a transport connection to a (room, participant) pair and tears
//! it down again. Explicit leave, transport disconnect and the close that
//! follows a kick all land in [`ConnectionManager::leave`].

use std::sync::Arc;

use easel_core::limits::{validate_display_name, validate_room_id};
use easel_core::{
    Error, LifecycleState, Participant, ParticipantId, Result, Role, Room, RoomHandle,
    RoomRegistry, RoomSettings,
};
use tracing::{debug, info};

use crate::peers::{Binding, ConnectionId, PeerTable};
use crate::protocol::{RoomWelcome, ServerMessage};

/// Reason carried by `room-ended` when the host departs
pub const HOST_LEFT_REASON: &str = "The host has left the room";

/// Reason carried by `kicked`
pub const KICK_REASON: &str = "Removed by the host";

/// Joins, leaves and kicks against the registry
pub struct ConnectionManager {
    registry: Arc<RoomRegistry>,
    peers: Arc<PeerTable>,
    defaults: RoomSettings,
}

impl ConnectionManager {
    pub fn new(registry: Arc<RoomRegistry>, peers: Arc<PeerTable>, defaults: RoomSettings) -> Self {
        Self {
            registry,
            peers,
            defaults,
        }
    }

    /// Create a room with `conn` as host.
    ///
    /// On failure nothing is mutated and the caller replies to the actor.
    pub async fn create_room(
        &self,
        conn: ConnectionId,
        room_id: &str,
        display_name: &str,
    ) -> Result<()> {
        self.ensure_unbound(&conn).await?;
        let room_id = validate_room_id(room_id)?;
        let display_name = validate_display_name(display_name)?;

        let (_, room) = self
            .registry
            .create_room(&room_id, conn, &display_name, self.defaults.clone())
            .await?;
        self.peers
            .bind(&conn, Binding::new(&room_id, &display_name, Role::Host))
            .await;

        if let Some(you) = room.participant(&conn) {
            let welcome = RoomWelcome::new(&room, you);
            self.peers.send(&conn, &ServerMessage::RoomCreated(welcome)).await;
        }
        self.broadcast_lobby(&room).await;
        Ok(())
    }

    /// Seat `conn` as a participant of an existing room
    pub async fn join_room(
        &self,
        conn: ConnectionId,
        room_id: &str,
        display_name: &str,
    ) -> Result<()> {
        self.ensure_unbound(&conn).await?;
        let room_id = validate_room_id(room_id)?;
        let display_name = validate_display_name(display_name)?;

        let handle = self.registry.get(&room_id).await?;
        let mut room = handle.lock().await;
        room.seat(Participant::guest(conn, &display_name))?;
        self.peers
            .bind(&conn, Binding::new(&room_id, &display_name, Role::Participant))
            .await;

        info!(
            room_id = %room_id,
            conn_id = %conn,
            participants = room.directory().len(),
            "Participant joined"
        );

        if let Some(you) = room.participant(&conn) {
            let welcome = RoomWelcome::new(&room, you);
            self.peers.send(&conn, &ServerMessage::RoomJoined(welcome)).await;
        }
        self.broadcast_lobby(&room).await;
        Ok(())
    }

    /// Remove `conn` from its room. Safe to call more than once.
    pub async fn leave(&self, conn: ConnectionId) {
        let Some(binding) = self.peers.unbind(&conn).await else {
            return;
        };
        let Ok(handle) = self.registry.get(&binding.room_id).await else {
            return;
        };

        let mut room = handle.lock().await;
        if !room.is_live() {
            return;
        }
        let Some(departed) = room.remove(&conn) else {
            debug!(room_id = %binding.room_id, conn_id = %conn, "Leave for unseated connection");
            return;
        };

        if departed.role.is_host() {
            info!(room_id = %binding.room_id, name = %binding.display_name, "Host left");
            self.end_for_host_departure(&mut room, &handle).await;
            return;
        }

        info!(
            room_id = %binding.room_id,
            conn_id = %conn,
            name = %binding.display_name,
            role = %binding.role,
            "Participant left"
        );

        let participants = room.participants();
        let members: Vec<ParticipantId> = room.directory().ids().copied().collect();
        self.peers
            .broadcast(
                members.iter(),
                &ServerMessage::LobbyUpdated {
                    participants: participants.clone(),
                },
                None,
            )
            .await;

        let notice = if room.state() == LifecycleState::Active {
            ServerMessage::ParticipantLeftSession {
                display_name: departed.display_name,
                role: departed.role,
                participants,
            }
        } else {
            ServerMessage::UserLeft {
                display_name: departed.display_name,
                role: departed.role,
            }
        };
        self.peers.broadcast(members.iter(), &notice, None).await;

        if room.directory().is_empty() {
            room.end();
            self.registry.delete_if_same(room.id(), &handle).await;
        }
    }

    /// Host departure: notify, evict everyone, delete the room
    async fn end_for_host_departure(&self, room: &mut Room, handle: &RoomHandle) {
        let members: Vec<ParticipantId> = room.directory().ids().copied().collect();
        room.end();

        self.peers
            .broadcast(
                members.iter(),
                &ServerMessage::RoomEnded {
                    reason: HOST_LEFT_REASON.to_string(),
                },
                None,
            )
            .await;
        for id in &members {
            room.remove(id);
            self.peers.unbind(id).await;
        }

        self.registry.delete_if_same(room.id(), handle).await;
        info!(room_id = %room.id(), evicted = members.len(), "Room ended: host left");
    }

    /// Notify and disconnect `target`. The close runs the ordinary leave.
    ///
    /// Called with the room locked and the host already authorized.
    pub async fn kick(&self, room: &Room, host: &Participant, target: ParticipantId) -> Result<()> {
        if target == host.id {
            return Err(Error::InvalidRequest("The host cannot kick themselves".into()));
        }
        if !room.directory().contains(&target) {
            return Err(Error::NotFound(target.to_string()));
        }
        match self.peers.binding(&target).await {
            Some(binding) if binding.room_id == room.id() && !binding.revoked => {}
            _ => return Err(Error::NotFound(target.to_string())),
        }

        self.peers
            .send(
                &target,
                &ServerMessage::Kicked {
                    by: host.display_name.clone(),
                    reason: KICK_REASON.to_string(),
                },
            )
            .await;
        self.peers.revoke(&target).await;
        self.peers.terminate(&target).await;

        info!(room_id = %room.id(), target = %target, "Participant kicked");
        Ok(())
    }

    async fn ensure_unbound(&self, conn: &ConnectionId) -> Result<()> {
        if self.peers.binding(conn).await.is_some() {
            return Err(Error::InvalidRequest("Already in a room".into()));
        }
        Ok(())
    }

    async fn broadcast_lobby(&self, room: &Room) {
        let msg = ServerMessage::LobbyUpdated {
            participants: room.participants(),
        };
        self.peers.broadcast(room.directory().ids(), &msg, None).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peers::Outbound;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Harness {
        registry: Arc<RoomRegistry>,
        peers: Arc<PeerTable>,
        manager: ConnectionManager,
    }

    fn harness(cap: usize) -> Harness {
        let registry = Arc::new(RoomRegistry::new());
        let peers = Arc::new(PeerTable::new());
        let settings = RoomSettings {
            max_participants: cap,
            ..RoomSettings::default()
        };
        let manager = ConnectionManager::new(registry.clone(), peers.clone(), settings);
        Harness {
            registry,
            peers,
            manager,
        }
    }

    fn drain(rx: &mut UnboundedReceiver<Outbound>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(item) = rx.try_recv() {
            if let Outbound::Frame(json) = item {
                out.push(ServerMessage::from_json(&json).unwrap());
            }
        }
        out
    }

    #[tokio::test]
    async fn test_invalid_create_mutates_nothing() {
        let h = harness(4);
        let (conn, _rx) = h.peers.register().await;
        let err = h.manager.create_room(conn, "", "alice").await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert!(h.registry.is_empty().await);
        assert!(h.peers.binding(&conn).await.is_none());
    }

    #[tokio::test]
    async fn test_full_room_rejects_join() {
        let h = harness(2);
        let (host, _h_rx) = h.peers.register().await;
        let (bob, _b_rx) = h.peers.register().await;
        let (carol, _c_rx) = h.peers.register().await;

        h.manager.create_room(host, "R1", "alice").await.unwrap();
        h.manager.join_room(bob, "R1", "bob").await.unwrap();
        let err = h.manager.join_room(carol, "R1", "carol").await.unwrap_err();
        assert!(matches!(err, Error::RoomFull { capacity: 2, .. }));

        let handle = h.registry.get("R1").await.unwrap();
        assert_eq!(handle.lock().await.directory().len(), 2);
        assert!(h.peers.binding(&carol).await.is_none());
    }

    #[tokio::test]
    async fn test_creator_welcomed_before_concurrent_join() {
        let h = harness(4);
        let (host, mut h_rx) = h.peers.register().await;
        let (bob, _b_rx) = h.peers.register().await;

        let (created, joined) = tokio::join!(
            h.manager.create_room(host, "R1", "alice"),
            h.manager.join_room(bob, "R1", "bob"),
        );
        created.unwrap();

        let msgs = drain(&mut h_rx);
        assert!(matches!(msgs.first(), Some(ServerMessage::RoomCreated(_))));
        if joined.is_ok() {
            assert!(matches!(
                msgs.last(),
                Some(ServerMessage::LobbyUpdated { participants }) if participants.len() == 2
            ));
        }
    }

    #[tokio::test]
    async fn test_bound_connection_cannot_join_twice() {
        let h = harness(4);
        let (host, _rx) = h.peers.register().await;
        h.manager.create_room(host, "R1", "alice").await.unwrap();
        let err = h.manager.create_room(host, "R2", "alice").await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert!(!h.registry.contains("R2").await);
    }

    #[tokio::test]
    async fn test_host_departure_evicts_everyone() {
        let h = harness(4);
        let (host, _h_rx) = h.peers.register().await;
        let (bob, mut b_rx) = h.peers.register().await;
        h.manager.create_room(host, "R1", "alice").await.unwrap();
        h.manager.join_room(bob, "R1", "bob").await.unwrap();
        let handle = h.registry.get("R1").await.unwrap();
        drain(&mut b_rx);

        h.manager.leave(host).await;

        assert!(!h.registry.contains("R1").await);
        assert!(h.peers.binding(&bob).await.is_none());
        assert_eq!(handle.lock().await.directory().host_count(), 0);
        let msgs = drain(&mut b_rx);
        assert!(matches!(msgs.as_slice(), [ServerMessage::RoomEnded { .. }]));
    }

    #[tokio::test]
    async fn test_leave_is_idempotent() {
        let h = harness(4);
        let (host, mut h_rx) = h.peers.register().await;
        let (bob, _b_rx) = h.peers.register().await;
        h.manager.create_room(host, "R1", "alice").await.unwrap();
        h.manager.join_room(bob, "R1", "bob").await.unwrap();
        drain(&mut h_rx);

        h.manager.leave(bob).await;
        h.manager.leave(bob).await;

        let msgs = drain(&mut h_rx);
        assert_eq!(msgs.len(), 2);
        assert!(matches!(&msgs[0], ServerMessage::LobbyUpdated { participants } if participants.len() == 1));
        assert!(matches!(&msgs[1], ServerMessage::UserLeft { display_name, .. } if display_name == "bob"));
        assert!(h.registry.contains("R1").await);
    }

    #[tokio::test]
    async fn test_active_leave_uses_session_notice() {
        let h = harness(4);
        let (host, mut h_rx) = h.peers.register().await;
        let (bob, _b_rx) = h.peers.register().await;
        h.manager.create_room(host, "R1", "alice").await.unwrap();
        h.manager.join_room(bob, "R1", "bob").await.unwrap();
        h.registry
            .get("R1")
            .await
            .unwrap()
            .lock()
            .await
            .start_session(&host)
            .unwrap();
        drain(&mut h_rx);

        h.manager.leave(bob).await;
        let msgs = drain(&mut h_rx);
        assert!(matches!(
            msgs.last(),
            Some(ServerMessage::ParticipantLeftSession { participants, .. }) if participants.len() == 1
        ));
    }
}
