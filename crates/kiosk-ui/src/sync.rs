//! Keeps the stored window geometry in step with a live window.
//!
//! One spawned task consumes both the window's event stream and explicit
//! save requests. It captures the bounds right before each save and awaits
//! the save before looking at the next trigger, so read-modify-write cycles
//! on the configuration file never overlap.

use kiosk_persistence::{ConfigStore, WindowGeometry};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::window::{WindowEvent, WindowHandle};
use crate::UiError;

/// Outcome counters of one sync session
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncStats {
    pub saved: u64,
    pub failed: u64,
    /// Triggers that found no window bounds
    pub skipped: u64,
}

enum SyncCommand {
    SaveNow {
        trigger: WindowEvent,
        reply: oneshot::Sender<Result<WindowGeometry, UiError>>,
    },
}

pub struct WindowStateSync {
    commands: mpsc::UnboundedSender<SyncCommand>,
    worker: JoinHandle<SyncStats>,
}

impl WindowStateSync {
    /// Subscribe to `window` and start saving its geometry into `store`
    pub fn attach(window: Arc<dyn WindowHandle>, store: Arc<ConfigStore>) -> Self {
        let events = window.subscribe();
        let (commands, command_rx) = mpsc::unbounded_channel();

        let worker = tokio::spawn(async move {
            info!("Starting window state sync");
            let stats = run(window.as_ref(), &store, events, command_rx).await;
            info!(
                saved = stats.saved,
                failed = stats.failed,
                skipped = stats.skipped,
                "Window state sync terminated"
            );
            stats
        });

        Self { commands, worker }
    }

    /// Save the current geometry and wait for the write to finish
    pub async fn save_now(&self, trigger: WindowEvent) -> Result<WindowGeometry, UiError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(SyncCommand::SaveNow { trigger, reply })
            .map_err(|_| UiError::ChannelError)?;
        response.await.map_err(|_| UiError::ChannelError)?
    }

    /// Stop accepting requests and wait until the window's event stream
    /// has ended and every queued event has been saved
    pub async fn finish(self) -> SyncStats {
        drop(self.commands);
        match self.worker.await {
            Ok(stats) => stats,
            Err(e) => {
                error!("Window state sync task failed: {}", e);
                SyncStats::default()
            }
        }
    }
}

async fn run(
    window: &dyn WindowHandle,
    store: &ConfigStore,
    mut events: mpsc::UnboundedReceiver<WindowEvent>,
    mut commands: mpsc::UnboundedReceiver<SyncCommand>,
) -> SyncStats {
    let mut stats = SyncStats::default();
    let mut events_open = true;
    let mut commands_open = true;

    while events_open || commands_open {
        tokio::select! {
            biased;

            event = events.recv(), if events_open => match event {
                Some(event) => {
                    // Failures are already logged and counted
                    let _ = persist(window, store, event, &mut stats).await;
                }
                None => {
                    debug!("Window event stream closed");
                    events_open = false;
                }
            },
            command = commands.recv(), if commands_open => match command {
                Some(SyncCommand::SaveNow { trigger, reply }) => {
                    let result = persist(window, store, trigger, &mut stats).await;
                    let _ = reply.send(result);
                }
                None => commands_open = false,
            },
        }
    }

    stats
}

async fn persist(
    window: &dyn WindowHandle,
    store: &ConfigStore,
    trigger: WindowEvent,
    stats: &mut SyncStats,
) -> Result<WindowGeometry, UiError> {
    let Some(geometry) = window.bounds() else {
        debug!(?trigger, "Window has no bounds, skipping save");
        stats.skipped += 1;
        return Err(UiError::WindowUnavailable);
    };

    match store.save_window_state(geometry).await {
        Ok(()) => {
            debug!(?trigger, ?geometry, "Window state saved");
            stats.saved += 1;
            Ok(geometry)
        }
        Err(e) => {
            stats.failed += 1;
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::HeadlessWindow;
    use kiosk_persistence::InstanceId;
    use kiosk_settings::StorageLocation;

    async fn store_in(dir: &std::path::Path) -> Arc<ConfigStore> {
        let store = ConfigStore::new(&StorageLocation::at(dir), InstanceId::generate());
        store.initialize().await.unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn saves_once_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path()).await;
        let window = Arc::new(HeadlessWindow::new(WindowGeometry::default()));
        let sync = WindowStateSync::attach(window.clone(), store.clone());

        window.move_to(10, 20);
        window.resize(900, 700);
        window.request_shutdown();
        window.close();

        let stats = sync.finish().await;
        assert_eq!(stats.saved, 4);
        assert_eq!(stats.failed, 0);
        assert_eq!(store.window_state().await, WindowGeometry::new(10, 20, 900, 700));
    }

    #[tokio::test]
    async fn save_now_returns_captured_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path()).await;
        let window = Arc::new(HeadlessWindow::new(WindowGeometry::new(-1280, 0, 1280, 1024)));
        let sync = WindowStateSync::attach(window.clone(), store.clone());

        let saved = sync.save_now(WindowEvent::ShutdownRequested).await.unwrap();
        assert_eq!(saved, WindowGeometry::new(-1280, 0, 1280, 1024));
        assert_eq!(store.window_state().await, saved);

        window.close();
        assert_eq!(sync.finish().await.saved, 2);
    }

    #[tokio::test]
    async fn destroyed_window_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path()).await;
        let window = Arc::new(HeadlessWindow::new(WindowGeometry::default()));
        let sync = WindowStateSync::attach(window.clone(), store.clone());

        window.destroy();
        let result = sync.save_now(WindowEvent::Closing).await;
        assert!(matches!(result, Err(UiError::WindowUnavailable)));

        let stats = sync.finish().await;
        assert_eq!(stats, SyncStats { saved: 0, failed: 0, skipped: 1 });
        assert_eq!(store.window_state().await, WindowGeometry::default());
    }

    #[tokio::test]
    async fn write_failures_are_counted() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path()).await;
        let window = Arc::new(HeadlessWindow::new(WindowGeometry::default()));
        let sync = WindowStateSync::attach(window.clone(), store.clone());

        // A directory squatting on the temp path makes the staging write fail
        let mut temp = store.path().as_os_str().to_owned();
        temp.push(".tmp");
        std::fs::create_dir(&temp).unwrap();

        let result = sync.save_now(WindowEvent::Moved).await;
        assert!(matches!(result, Err(UiError::Persistence(_))));

        window.close();
        let stats = sync.finish().await;
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.saved, 0);
    }
}
