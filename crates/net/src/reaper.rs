//! Idle room reaper
//!
//! Periodically ends and removes rooms that are empty and older than the
//! configured threshold.

use std::sync::Arc;
use std::time::Duration;

use easel_core::RoomRegistry;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Sweep every `interval` until shutdown
pub async fn run(
    registry: Arc<RoomRegistry>,
    interval: Duration,
    threshold: chrono::Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                let reaped = registry.sweep_idle(threshold).await;
                if reaped.is_empty() {
                    debug!("Reaper found no idle rooms");
                } else {
                    info!(count = reaped.len(), rooms = ?reaped, "Reaped idle rooms");
                }
            }
            _ = shutdown_rx.recv() => {
                debug!("Reaper shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use easel_core::RoomSettings;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_reaper_removes_empty_rooms_and_stops() {
        let registry = Arc::new(RoomRegistry::new());
        let host = Uuid::new_v4();
        let handle = registry
            .create_room("R1", host, "alice", RoomSettings::default())
            .await
            .unwrap()
            .0;
        handle.lock().await.remove(&host);

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(run(
            registry.clone(),
            Duration::from_millis(10),
            chrono::Duration::zero(),
            shutdown_rx,
        ));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!registry.contains("R1").await);

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_reaper_keeps_occupied_rooms() {
        let registry = Arc::new(RoomRegistry::new());
        registry
            .create_room("R1", Uuid::new_v4(), "alice", RoomSettings::default())
            .await
            .unwrap();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        tokio::spawn(run(
            registry.clone(),
            Duration::from_millis(10),
            chrono::Duration::zero(),
            shutdown_rx,
        ));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(registry.contains("R1").await);
        let _ = shutdown_tx.send(());
    }
}
