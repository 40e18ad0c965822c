//! Kiosk Shell window integration
//!
//! This crate connects a live window to the persistence layer: it keeps the
//! stored window geometry in step with the window, drives the auto-refresh
//! timer, resolves the start page, and answers the settings commands sent by
//! the settings UI.

use kiosk_persistence::PersistenceError;

pub mod navigation;
pub mod refresh;
pub mod service;
pub mod sync;
pub mod window;

pub use navigation::StartPage;
pub use refresh::RefreshScheduler;
pub use service::{SettingsPayload, SettingsRequest, SettingsResponse, SettingsService};
pub use sync::{SyncStats, WindowStateSync};
pub use window::{HeadlessWindow, WindowEvent, WindowHandle};

/// UI-related errors
#[derive(Debug, thiserror::Error)]
pub enum UiError {
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("Channel communication error")]
    ChannelError,
    #[error("Window has no bounds to save")]
    WindowUnavailable,
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
}
