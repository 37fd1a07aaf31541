//! WebSocket server for collaboration rooms
//!
//! Accepts connections, decodes one JSON event per text frame and hands it
//! to the [`Router`]. Each connection task also drains its outbound queue,
//! so frames are written in the order the router queued them.

use std::net::SocketAddr;
use std::sync::Arc;

use easel_core::RoomRegistry;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::Result;
use crate::peers::{Outbound, PeerTable};
use crate::reaper;
use crate::router::Router;

/// Running server handle
pub struct Server {
    addr: SocketAddr,
    router: Arc<Router>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Bind and start serving with `config`
    pub async fn start(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        let listener = TcpListener::bind(config.bind_addr.as_str()).await?;
        let bound_addr = listener.local_addr()?;

        let config = Arc::new(config);
        let registry = Arc::new(RoomRegistry::new());
        let peers = Arc::new(PeerTable::new());
        let router = Arc::new(Router::new(registry.clone(), peers, config.clone()));

        let (shutdown_tx, _) = broadcast::channel(1);

        tokio::spawn(accept_loop(listener, router.clone(), shutdown_tx.subscribe()));
        tokio::spawn(reaper::run(
            registry,
            config.reaper_interval(),
            config.idle_threshold(),
            shutdown_tx.subscribe(),
        ));

        info!(addr = %bound_addr, start_delay_ms = config.start_delay_ms, "Server started");

        Ok(Server {
            addr: bound_addr,
            router,
            shutdown_tx,
        })
    }

    /// Get the server's bound address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        self.router.registry()
    }

    /// Stop accepting connections and stop the reaper
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        info!("Server shutdown initiated");
    }
}

async fn accept_loop(
    listener: TcpListener,
    router: Arc<Router>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        debug!(addr = %addr, "New connection");
                        tokio::spawn(handle_connection(stream, addr, router.clone()));
                    }
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Accept loop shutting down");
                break;
            }
        }
    }
}

/// Handle a single client connection
async fn handle_connection(stream: TcpStream, addr: SocketAddr, router: Arc<Router>) {
    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(addr = %addr, error = %e, "WebSocket handshake failed");
            return;
        }
    };
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (conn, mut outbound) = router.connect().await;
    info!(addr = %addr, conn_id = %conn, "Connection established");

    loop {
        tokio::select! {
            incoming = ws_receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Err(e) = router.handle_frame(conn, text.as_str()).await {
                            warn!(conn_id = %conn, error = %e, "Dropped malformed frame");
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if ws_sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(conn_id = %conn, "Connection closed by peer");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(conn_id = %conn, error = %e, "WebSocket error");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
            queued = outbound.recv() => {
                match queued {
                    Some(Outbound::Frame(json)) => {
                        if let Err(e) = ws_sender.send(Message::Text(json.to_string().into())).await {
                            debug!(conn_id = %conn, error = %e, "Write failed");
                            break;
                        }
                    }
                    Some(Outbound::Close) | None => {
                        let _ = ws_sender.send(Message::Close(None)).await;
                        debug!(conn_id = %conn, "Connection closed by server");
                        break;
                    }
                }
            }
        }
    }

    router.disconnect(conn).await;
    info!(addr = %addr, conn_id = %conn, "Connection finished");
}
