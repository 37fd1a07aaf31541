//! Per-connection outbound channels and room bindings
//!
//! Every transport connection registers here and gets back a receiver of
//! pre-encoded frames. Binding a connection to a room is an explicit
//! record on the table, looked up on every inbound event.

use std::collections::HashMap;
use std::sync::Arc;

use easel_core::{ParticipantId, Role};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::protocol::ServerMessage;

/// Identity of a live connection. Doubles as the participant identity.
pub type ConnectionId = ParticipantId;

/// Commands delivered to a connection's writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Encoded JSON frame
    Frame(Arc<str>),
    /// Close the transport
    Close,
}

/// Which room a connection is seated in, and as whom
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub room_id: String,
    pub display_name: String,
    pub role: Role,
    /// Set on kick; events are dropped until the transport closes
    pub revoked: bool,
}

impl Binding {
    pub fn new(room_id: impl Into<String>, display_name: impl Into<String>, role: Role) -> Self {
        Self {
            room_id: room_id.into(),
            display_name: display_name.into(),
            role,
            revoked: false,
        }
    }
}

struct PeerSlot {
    tx: mpsc::UnboundedSender<Outbound>,
    binding: Option<Binding>,
}

/// Table of live connections
#[derive(Default)]
pub struct PeerTable {
    peers: RwLock<HashMap<ConnectionId, PeerSlot>>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection and return its identity and frame receiver
    pub async fn register(&self) -> (ConnectionId, mpsc::UnboundedReceiver<Outbound>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.peers
            .write()
            .await
            .insert(id, PeerSlot { tx, binding: None });
        (id, rx)
    }

    /// Forget a connection entirely
    pub async fn unregister(&self, id: &ConnectionId) -> Option<Binding> {
        self.peers.write().await.remove(id).and_then(|slot| slot.binding)
    }

    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.peers.read().await.is_empty()
    }

    pub async fn binding(&self, id: &ConnectionId) -> Option<Binding> {
        self.peers.read().await.get(id).and_then(|slot| slot.binding.clone())
    }

    /// Bind a connection to a room. Returns false for an unknown connection.
    pub async fn bind(&self, id: &ConnectionId, binding: Binding) -> bool {
        match self.peers.write().await.get_mut(id) {
            Some(slot) => {
                slot.binding = Some(binding);
                true
            }
            None => false,
        }
    }

    /// Clear and return a connection's binding
    pub async fn unbind(&self, id: &ConnectionId) -> Option<Binding> {
        self.peers
            .write()
            .await
            .get_mut(id)
            .and_then(|slot| slot.binding.take())
    }

    /// Mark a binding revoked so its further events are ignored
    pub async fn revoke(&self, id: &ConnectionId) {
        if let Some(binding) = self
            .peers
            .write()
            .await
            .get_mut(id)
            .and_then(|slot| slot.binding.as_mut())
        {
            binding.revoked = true;
        }
    }

    /// Point-to-point send
    pub async fn send(&self, id: &ConnectionId, msg: &ServerMessage) -> bool {
        let Some(frame) = encode(msg) else {
            return false;
        };
        let peers = self.peers.read().await;
        match peers.get(id) {
            Some(slot) => slot.tx.send(Outbound::Frame(frame)).is_ok(),
            None => false,
        }
    }

    /// Room-scoped group send, optionally excluding one member.
    /// Returns the number of connections the frame was queued for.
    pub async fn broadcast<'a, I>(
        &self,
        members: I,
        msg: &ServerMessage,
        except: Option<ConnectionId>,
    ) -> usize
    where
        I: IntoIterator<Item = &'a ConnectionId>,
    {
        let Some(frame) = encode(msg) else {
            return 0;
        };
        let peers = self.peers.read().await;
        let mut delivered = 0;
        for id in members {
            if except == Some(*id) {
                continue;
            }
            match peers.get(id) {
                Some(slot) if slot.tx.send(Outbound::Frame(frame.clone())).is_ok() => {
                    delivered += 1;
                }
                _ => debug!(conn_id = %id, "Failed to queue frame for peer"),
            }
        }
        delivered
    }

    /// Ask the connection's transport to close
    pub async fn terminate(&self, id: &ConnectionId) -> bool {
        match self.peers.read().await.get(id) {
            Some(slot) => slot.tx.send(Outbound::Close).is_ok(),
            None => false,
        }
    }
}

fn encode(msg: &ServerMessage) -> Option<Arc<str>> {
    match msg.to_json() {
        Ok(json) => Some(Arc::from(json)),
        Err(e) => {
            warn!(error = %e, "Failed to encode server message");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(out: Outbound) -> ServerMessage {
        match out {
            Outbound::Frame(json) => ServerMessage::from_json(&json).unwrap(),
            Outbound::Close => panic!("Expected a frame"),
        }
    }

    #[tokio::test]
    async fn test_binding_lifecycle() {
        let table = PeerTable::new();
        let (id, _rx) = table.register().await;
        assert!(table.binding(&id).await.is_none());

        assert!(table.bind(&id, Binding::new("R1", "alice", Role::Host)).await);
        assert_eq!(table.binding(&id).await.unwrap().room_id, "R1");

        table.revoke(&id).await;
        assert!(table.binding(&id).await.unwrap().revoked);

        assert!(table.unbind(&id).await.is_some());
        assert!(table.unbind(&id).await.is_none());
        assert!(!table.bind(&Uuid::new_v4(), Binding::new("R1", "x", Role::Participant)).await);
    }

    #[tokio::test]
    async fn test_broadcast_except_sender() {
        let table = PeerTable::new();
        let (a, mut rx_a) = table.register().await;
        let (b, mut rx_b) = table.register().await;

        let members = [a, b];
        let sent = table.broadcast(members.iter(), &ServerMessage::Pong, Some(a)).await;
        assert_eq!(sent, 1);
        assert!(rx_a.try_recv().is_err());
        assert_eq!(decode(rx_b.try_recv().unwrap()), ServerMessage::Pong);

        let sent = table.broadcast(members.iter(), &ServerMessage::Pong, None).await;
        assert_eq!(sent, 2);
        assert!(rx_a.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_terminate_queues_close_after_frames() {
        let table = PeerTable::new();
        let (id, mut rx) = table.register().await;
        table.send(&id, &ServerMessage::Pong).await;
        assert!(table.terminate(&id).await);

        assert!(matches!(rx.try_recv().unwrap(), Outbound::Frame(_)));
        assert_eq!(rx.try_recv().unwrap(), Outbound::Close);
    }

    #[tokio::test]
    async fn test_unregister_returns_binding() {
        let table = PeerTable::new();
        let (id, _rx) = table.register().await;
        table.bind(&id, Binding::new("R1", "bob", Role::Participant)).await;
        assert_eq!(table.unregister(&id).await.unwrap().display_name, "bob");
        assert!(table.is_empty().await);
        assert!(!table.send(&id, &ServerMessage::Pong).await);
    }
}
