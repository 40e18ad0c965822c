//! A full window session against a real storage directory
use kiosk_persistence::{ConfigStore, InstanceIdentity, WindowGeometry};
use kiosk_settings::StorageLocation;
use kiosk_ui::{
    HeadlessWindow, RefreshScheduler, SettingsRequest, SettingsService, StartPage, WindowHandle,
    WindowStateSync,
};
use std::sync::Arc;

struct Session {
    window: Arc<HeadlessWindow>,
    service: SettingsService,
    sync: WindowStateSync,
    startup_page: StartPage,
}

async fn open(location: &StorageLocation) -> Session {
    let identity = Arc::new(InstanceIdentity::new(location));
    let resolved = identity.resolve().await.expect("resolve");
    let store = Arc::new(ConfigStore::new(location, resolved.id));
    store.initialize().await.expect("init");

    let startup = store.startup_data().await;
    let window = Arc::new(HeadlessWindow::new(startup.window_state));
    let startup_page = StartPage::from_url(&startup.url);
    window.load(&startup_page);

    let refresh = Arc::new(RefreshScheduler::new(window.clone()));
    refresh.configure(startup.refresh_interval_seconds);

    let sync = WindowStateSync::attach(window.clone(), store.clone());
    let service = SettingsService::new(identity, store, window.clone(), refresh);

    Session {
        window,
        service,
        sync,
        startup_page,
    }
}

#[tokio::test]
async fn geometry_and_settings_survive_a_restart() {
    let dir = tempfile::tempdir().expect("tmp");
    let location = StorageLocation::at(dir.path());

    let first = open(&location).await;
    assert_eq!(first.startup_page, StartPage::LocalDefault);

    first.window.move_to(1920, 0);
    first.window.resize(1080, 1920);
    let response = first
        .service
        .handle(SettingsRequest::SaveUrl {
            url: "signage.example.org".to_string(),
        })
        .await;
    assert!(response.success);

    first.window.request_shutdown();
    first.window.close();
    let stats = first.sync.finish().await;
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.saved, 4);

    let second = open(&location).await;
    assert_eq!(
        second.window.bounds(),
        Some(WindowGeometry::new(1920, 0, 1080, 1920))
    );
    assert_eq!(
        second.startup_page,
        StartPage::Remote("https://signage.example.org".to_string())
    );
    second.window.close();
    second.sync.finish().await;
}
