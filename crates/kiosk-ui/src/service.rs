//! Commands issued by the settings UI

use kiosk_persistence::{
    ConfigStore, InstanceIdentity, InstanceRecord, StartupData, WindowGeometry,
};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::navigation::StartPage;
use crate::refresh::RefreshScheduler;
use crate::window::WindowHandle;
use crate::UiError;

/// Accepted window position on either axis
pub const POSITION_RANGE: RangeInclusive<i32> = -20_000..=20_000;
/// Accepted window width and height
pub const SIZE_RANGE: RangeInclusive<i32> = 16..=20_000;
pub const MAX_REFRESH_INTERVAL_SECONDS: u64 = 3600;

/// A settings command as sent over IPC
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum SettingsRequest {
    /// Live bounds of the window, not the stored ones
    GetCurrentBounds,
    SaveSettings {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        #[serde(default)]
        url: Option<String>,
        #[serde(default, rename = "refreshIntervalSeconds")]
        refresh_interval_seconds: Option<u64>,
    },
    GetInstanceInfo,
    GetWindowState,
    SaveWindowState {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    GetSystemName,
    SaveSystemName {
        #[serde(rename = "systemName")]
        system_name: String,
    },
    GetUrl,
    SaveUrl {
        url: String,
    },
    GetRefreshInterval,
    SaveRefreshInterval {
        seconds: u64,
    },
    GetStartupData,
}

impl SettingsRequest {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetCurrentBounds => "get-current-bounds",
            Self::SaveSettings { .. } => "save-settings",
            Self::GetInstanceInfo => "get-instance-info",
            Self::GetWindowState => "get-window-state",
            Self::SaveWindowState { .. } => "save-window-state",
            Self::GetSystemName => "get-system-name",
            Self::SaveSystemName { .. } => "save-system-name",
            Self::GetUrl => "get-url",
            Self::SaveUrl { .. } => "save-url",
            Self::GetRefreshInterval => "get-refresh-interval",
            Self::SaveRefreshInterval { .. } => "save-refresh-interval",
            Self::GetStartupData => "get-startup-data",
        }
    }
}

/// Data carried by a successful response
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SettingsPayload {
    Bounds(WindowGeometry),
    InstanceInfo(InstanceRecord),
    WindowState(WindowGeometry),
    SystemName(String),
    Url(String),
    RefreshInterval(u64),
    StartupData(StartupData),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<SettingsPayload>,
}

impl SettingsResponse {
    pub fn ok(data: Option<SettingsPayload>) -> Self {
        Self {
            success: true,
            error: None,
            data,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            data: None,
        }
    }
}

/// Answers settings commands against the store and the live window
pub struct SettingsService {
    identity: Arc<InstanceIdentity>,
    store: Arc<ConfigStore>,
    window: Arc<dyn WindowHandle>,
    refresh: Arc<RefreshScheduler>,
}

impl SettingsService {
    pub fn new(
        identity: Arc<InstanceIdentity>,
        store: Arc<ConfigStore>,
        window: Arc<dyn WindowHandle>,
        refresh: Arc<RefreshScheduler>,
    ) -> Self {
        Self {
            identity,
            store,
            window,
            refresh,
        }
    }

    /// Run one command. Failures become `success: false` responses.
    pub async fn handle(&self, request: SettingsRequest) -> SettingsResponse {
        let command = request.name();
        match self.dispatch(request).await {
            Ok(data) => SettingsResponse::ok(data),
            Err(e @ UiError::InvalidSettings(_)) => {
                warn!(command, "Settings command rejected: {}", e);
                SettingsResponse::failure(e.to_string())
            }
            Err(e) => {
                error!(command, "Settings command failed: {}", e);
                SettingsResponse::failure(e.to_string())
            }
        }
    }

    async fn dispatch(&self, request: SettingsRequest) -> Result<Option<SettingsPayload>, UiError> {
        use SettingsPayload as P;

        let data = match request {
            SettingsRequest::GetCurrentBounds => {
                Some(P::Bounds(self.window.bounds().unwrap_or_default()))
            }
            SettingsRequest::SaveSettings {
                x,
                y,
                width,
                height,
                url,
                refresh_interval_seconds,
            } => {
                let bounds = WindowGeometry::new(x, y, width, height);
                let mut problems = geometry_problems(&bounds);
                if let Some(seconds) = refresh_interval_seconds {
                    problems.extend(interval_problem(seconds));
                }
                reject(problems)?;

                self.window.set_bounds(bounds);
                self.store.save_window_state(bounds).await?;

                if let Some(url) = url {
                    self.apply_url(&url).await?;
                }
                if let Some(seconds) = refresh_interval_seconds {
                    self.apply_refresh_interval(seconds).await?;
                }
                info!("Settings saved");
                None
            }
            SettingsRequest::GetInstanceInfo => Some(P::InstanceInfo(
                self.identity.instance_info(self.store.instance_id()).await,
            )),
            SettingsRequest::GetWindowState => Some(P::WindowState(self.store.window_state().await)),
            SettingsRequest::SaveWindowState {
                x,
                y,
                width,
                height,
            } => {
                let bounds = WindowGeometry::new(x, y, width, height);
                reject(geometry_problems(&bounds))?;
                self.store.save_window_state(bounds).await?;
                None
            }
            SettingsRequest::GetSystemName => Some(P::SystemName(self.store.system_name().await)),
            SettingsRequest::SaveSystemName { system_name } => {
                self.store.save_system_name(&system_name).await?;
                None
            }
            SettingsRequest::GetUrl => Some(P::Url(self.store.url().await)),
            SettingsRequest::SaveUrl { url } => {
                self.apply_url(&url).await?;
                None
            }
            SettingsRequest::GetRefreshInterval => {
                Some(P::RefreshInterval(self.store.refresh_interval().await))
            }
            SettingsRequest::SaveRefreshInterval { seconds } => {
                reject(interval_problem(seconds).into_iter().collect())?;
                self.apply_refresh_interval(seconds).await?;
                None
            }
            SettingsRequest::GetStartupData => Some(P::StartupData(self.store.startup_data().await)),
        };

        Ok(data)
    }

    async fn apply_url(&self, url: &str) -> Result<(), UiError> {
        self.store.save_url(url).await?;
        self.window.load(&StartPage::from_url(url));
        Ok(())
    }

    async fn apply_refresh_interval(&self, seconds: u64) -> Result<(), UiError> {
        self.store.save_refresh_interval(seconds).await?;
        self.refresh.configure(seconds);
        Ok(())
    }
}

fn geometry_problems(bounds: &WindowGeometry) -> Vec<String> {
    let mut problems = Vec::new();
    for (name, value) in [("x", bounds.x), ("y", bounds.y)] {
        if !POSITION_RANGE.contains(&value) {
            problems.push(format!(
                "{name} must be between {} and {}, got {value}",
                POSITION_RANGE.start(),
                POSITION_RANGE.end()
            ));
        }
    }
    for (name, value) in [("width", bounds.width), ("height", bounds.height)] {
        if !SIZE_RANGE.contains(&value) {
            problems.push(format!(
                "{name} must be between {} and {}, got {value}",
                SIZE_RANGE.start(),
                SIZE_RANGE.end()
            ));
        }
    }
    problems
}

fn interval_problem(seconds: u64) -> Option<String> {
    (seconds > MAX_REFRESH_INTERVAL_SECONDS).then(|| {
        format!(
            "refresh interval must be between 0 and {MAX_REFRESH_INTERVAL_SECONDS} seconds, got {seconds}"
        )
    })
}

fn reject(problems: Vec<String>) -> Result<(), UiError> {
    if problems.is_empty() {
        Ok(())
    } else {
        Err(UiError::InvalidSettings(problems.join("; ")))
    }
}
