//! Window abstraction and the in-memory headless window

use kiosk_persistence::WindowGeometry;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

use crate::navigation::StartPage;

/// Window lifecycle events that should persist the current geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    Moved,
    Resized,
    Closing,
    /// The application is about to quit
    ShutdownRequested,
}

/// A live window owned by the UI layer.
///
/// `bounds` returns `None` once the native window is gone. The event stream
/// returned by `subscribe` ends when the window is closed.
pub trait WindowHandle: Send + Sync {
    fn bounds(&self) -> Option<WindowGeometry>;
    fn set_bounds(&self, geometry: WindowGeometry);
    fn subscribe(&self) -> mpsc::UnboundedReceiver<WindowEvent>;
    fn reload(&self);
    fn load(&self, page: &StartPage);
}

/// Window without native chrome, used by the headless build and by tests
pub struct HeadlessWindow {
    bounds: Mutex<Option<WindowGeometry>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<WindowEvent>>>,
    page: Mutex<Option<StartPage>>,
    reloads: AtomicU64,
}

impl HeadlessWindow {
    pub fn new(bounds: WindowGeometry) -> Self {
        Self {
            bounds: Mutex::new(Some(bounds)),
            subscribers: Mutex::new(Vec::new()),
            page: Mutex::new(None),
            reloads: AtomicU64::new(0),
        }
    }

    pub fn move_to(&self, x: i32, y: i32) {
        if let Some(bounds) = self.bounds.lock().as_mut() {
            bounds.x = x;
            bounds.y = y;
        }
        self.emit(WindowEvent::Moved);
    }

    pub fn resize(&self, width: i32, height: i32) {
        if let Some(bounds) = self.bounds.lock().as_mut() {
            bounds.width = width;
            bounds.height = height;
        }
        self.emit(WindowEvent::Resized);
    }

    pub fn request_shutdown(&self) {
        self.emit(WindowEvent::ShutdownRequested);
    }

    /// Emit `Closing` and end every subscriber's event stream.
    /// Bounds stay readable so the closing save still sees them.
    pub fn close(&self) {
        self.emit(WindowEvent::Closing);
        self.subscribers.lock().clear();
    }

    /// Drop the native window; later `bounds` calls return `None`
    pub fn destroy(&self) {
        *self.bounds.lock() = None;
        self.subscribers.lock().clear();
    }

    pub fn current_page(&self) -> Option<StartPage> {
        self.page.lock().clone()
    }

    pub fn reload_count(&self) -> u64 {
        self.reloads.load(Ordering::SeqCst)
    }

    fn emit(&self, event: WindowEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event).is_ok());
        debug!(?event, listeners = subscribers.len(), "Window event emitted");
    }
}

impl WindowHandle for HeadlessWindow {
    fn bounds(&self) -> Option<WindowGeometry> {
        *self.bounds.lock()
    }

    fn set_bounds(&self, geometry: WindowGeometry) {
        let mut bounds = self.bounds.lock();
        let Some(current) = *bounds else {
            return;
        };
        let moved = current.x != geometry.x || current.y != geometry.y;
        let resized = current.width != geometry.width || current.height != geometry.height;
        *bounds = Some(geometry);
        drop(bounds);

        if moved {
            self.emit(WindowEvent::Moved);
        }
        if resized {
            self.emit(WindowEvent::Resized);
        }
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<WindowEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    fn reload(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        debug!("Headless window reloaded");
    }

    fn load(&self, page: &StartPage) {
        debug!(?page, "Headless window loading page");
        *self.page.lock() = Some(page.clone());
    }
}
