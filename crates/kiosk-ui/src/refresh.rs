//! Periodic page reload

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};

use crate::window::WindowHandle;

/// Reloads the window's page on a fixed interval.
///
/// Must be configured from within a tokio runtime.
pub struct RefreshScheduler {
    window: Arc<dyn WindowHandle>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshScheduler {
    pub fn new(window: Arc<dyn WindowHandle>) -> Self {
        Self {
            window,
            timer: Mutex::new(None),
        }
    }

    /// Replace the running timer; 0 disables auto-refresh
    pub fn configure(&self, seconds: u64) {
        let mut timer = self.timer.lock();
        if let Some(handle) = timer.take() {
            handle.abort();
        }

        if seconds == 0 {
            info!("Auto-refresh disabled");
            return;
        }

        // The first two deadlines must be representable or the timer panics
        let period = Duration::from_secs(seconds);
        let Some(start) = Instant::now()
            .checked_add(period)
            .filter(|start| start.checked_add(period).is_some())
        else {
            warn!(seconds, "Refresh interval out of range, auto-refresh disabled");
            return;
        };

        let window = Arc::clone(&self.window);
        *timer = Some(tokio::spawn(async move {
            let mut ticker = interval_at(start, period);
            loop {
                ticker.tick().await;
                debug!("Auto-refreshing page");
                window.reload();
            }
        }));
        info!(seconds, "Auto-refresh enabled");
    }

    pub fn stop(&self) {
        self.configure(0);
    }

    pub fn is_active(&self) -> bool {
        self.timer
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.timer.get_mut().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::HeadlessWindow;
    use kiosk_persistence::WindowGeometry;

    #[tokio::test(start_paused = true)]
    async fn reloads_on_interval_until_disabled() {
        let window = Arc::new(HeadlessWindow::new(WindowGeometry::default()));
        let scheduler = RefreshScheduler::new(window.clone());

        scheduler.configure(2);
        assert!(scheduler.is_active());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(window.reload_count(), 2);

        scheduler.configure(0);
        assert!(!scheduler.is_active());
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(window.reload_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn reconfiguring_restarts_the_timer() {
        let window = Arc::new(HeadlessWindow::new(WindowGeometry::default()));
        let scheduler = RefreshScheduler::new(window.clone());

        scheduler.configure(60);
        tokio::time::sleep(Duration::from_secs(30)).await;
        scheduler.configure(10);
        tokio::time::sleep(Duration::from_secs(35)).await;

        // Three ticks of the new timer, none from the old one
        assert_eq!(window.reload_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_interval_disables_refresh() {
        let window = Arc::new(HeadlessWindow::new(WindowGeometry::default()));
        let scheduler = RefreshScheduler::new(window.clone());

        scheduler.configure(u64::MAX);
        assert!(!scheduler.is_active());
        assert!(scheduler.timer.lock().is_none());

        // A later valid interval still works
        scheduler.configure(1);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(window.reload_count(), 1);
    }

    #[tokio::test]
    async fn zero_never_starts_a_timer() {
        let window = Arc::new(HeadlessWindow::new(WindowGeometry::default()));
        let scheduler = RefreshScheduler::new(window);

        scheduler.configure(0);
        assert!(!scheduler.is_active());
    }
}
