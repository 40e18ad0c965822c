use anyhow::{Context, Result};
use kiosk_persistence::{
    ConfigStore, InitOutcome, InstanceId, InstanceIdentity, Resolution, WindowGeometry,
};
use kiosk_settings::StorageLocation;
use kiosk_ui::{
    HeadlessWindow, RefreshScheduler, SettingsRequest, SettingsService, StartPage, WindowHandle,
    WindowStateSync,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a headless session ran with, printed as one JSON line on exit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub instance_id: InstanceId,
    pub resolution: Resolution,
    pub system_name: String,
    pub url: String,
    pub refresh_interval_seconds: u64,
    pub window_state: WindowGeometry,
}

/// Central initialization point: builds the identity resolver and the store
/// once and hands them to every consumer
pub struct KioskShell {
    identity: Arc<InstanceIdentity>,
    store: Arc<ConfigStore>,
    resolution: Resolution,
}

impl KioskShell {
    pub async fn bootstrap(location: &StorageLocation) -> Result<Self> {
        info!("Kiosk Shell initialization started");

        let identity = Arc::new(InstanceIdentity::new(location));
        let resolved = identity
            .resolve()
            .await
            .context("Failed to resolve instance identity")?;
        if resolved.resolution == Resolution::Unsaved {
            warn!("Instance id could not be saved; a new one will be generated next start");
        }

        let store = Arc::new(ConfigStore::new(location, resolved.id));
        match store
            .initialize()
            .await
            .context("Failed to initialize configuration store")?
        {
            InitOutcome::WriteFailed => {
                warn!("Configuration document could not be written; settings may not persist")
            }
            outcome => debug!(?outcome, "Configuration store ready"),
        }

        info!("Kiosk Shell initialization completed");
        Ok(Self {
            identity,
            store,
            resolution: resolved.resolution,
        })
    }

    /// Run one window session without native chrome: open at the stored
    /// geometry, then shut down the way a user quitting the app would
    pub async fn run_headless(&self) -> Result<SessionSummary> {
        let startup = self.store.startup_data().await;
        info!(
            system = %startup.system_name,
            url = %startup.url,
            refresh = startup.refresh_interval_seconds,
            "Opening headless window"
        );

        let window = Arc::new(HeadlessWindow::new(startup.window_state));
        window.load(&StartPage::from_url(&startup.url));

        let refresh = Arc::new(RefreshScheduler::new(window.clone()));
        refresh.configure(startup.refresh_interval_seconds);

        let sync = WindowStateSync::attach(window.clone(), Arc::clone(&self.store));
        let settings = SettingsService::new(
            Arc::clone(&self.identity),
            Arc::clone(&self.store),
            window.clone(),
            Arc::clone(&refresh),
        );

        let info = settings.handle(SettingsRequest::GetInstanceInfo).await;
        debug!(?info, "Instance info");

        window.request_shutdown();
        refresh.stop();
        window.close();

        let stats = sync.finish().await;
        if stats.failed > 0 {
            warn!(failed = stats.failed, "Some window state saves failed");
        }

        Ok(SessionSummary {
            instance_id: self.store.instance_id().clone(),
            resolution: self.resolution,
            system_name: startup.system_name,
            url: startup.url,
            refresh_interval_seconds: startup.refresh_interval_seconds,
            window_state: self.store.window_state().await,
        })
    }
}
