//! JSON configuration store keyed by instance id.
//!
//! Every operation reads the whole document, and every save writes the whole
//! document back through the atomic temp-then-rename path. Reads never fail:
//! a missing or corrupt file behaves like an empty document. Only the
//! storage directory check in [`ConfigStore::initialize`] is fatal.
//!
//! Read-modify-write cycles from this process are serialized by an internal
//! lock. Other processes sharing the file are not coordinated; the last
//! rename wins.

use kiosk_settings::StorageLocation;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::atomic;
use crate::identity::InstanceId;
use crate::model::{
    timestamp, ConfigDocument, InstanceConfig, StartupData, WindowGeometry,
    DEFAULT_REFRESH_INTERVAL_SECONDS, DEFAULT_SYSTEM_NAME, DEFAULT_URL,
};
use crate::schema::{self, Backfill};
use crate::PersistenceError;

/// What `initialize` had to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// File existed with every field present; nothing was written
    Unchanged,
    /// File was created, repaired or back-filled and written
    Written,
    /// A write was needed but failed; the error was logged
    WriteFailed,
}

pub struct ConfigStore {
    instance_id: InstanceId,
    dir: PathBuf,
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ConfigStore {
    pub fn new(location: &StorageLocation, instance_id: InstanceId) -> Self {
        Self {
            instance_id,
            dir: location.dir().to_path_buf(),
            path: location.config_file(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Make sure the directory, the file and this instance's complete entry exist.
    ///
    /// Writes only when something was missing, so repeated calls are free.
    pub async fn initialize(&self) -> Result<InitOutcome, PersistenceError> {
        fs::create_dir_all(&self.dir).await.map_err(|source| {
            error!(dir = %self.dir.display(), error = %source, "Failed to create config directory");
            PersistenceError::Directory {
                path: self.dir.clone(),
                source,
            }
        })?;

        let _guard = self.write_lock.lock().await;

        let (mut document, mut dirty) = match self.load().await {
            Ok(loaded) => {
                let dirty = loaded.changed();
                if dirty {
                    info!(fields = ?loaded.filled, "Back-filling configuration document");
                }
                (loaded.document, dirty)
            }
            Err(err) => {
                if err.is_not_found() {
                    info!(path = %self.path.display(), "Creating configuration document");
                } else {
                    warn!(error = %err, "Configuration document unreadable, recreating");
                }
                (ConfigDocument::default(), true)
            }
        };

        let (_, created) = document.entry_or_default(self.instance_id.as_str(), timestamp::now());
        if created {
            info!(instance = %self.instance_id, "Default settings created for instance");
            dirty = true;
        }

        if !dirty {
            debug!(instance = %self.instance_id, "Configuration document already complete");
            return Ok(InitOutcome::Unchanged);
        }

        match atomic::write_json(&self.path, &document).await {
            Ok(()) => Ok(InitOutcome::Written),
            Err(err) => {
                error!(error = %err, "Failed to write configuration document");
                Ok(InitOutcome::WriteFailed)
            }
        }
    }

    /// Read and back-fill the document, reporting why it could not be read
    pub async fn load_document(&self) -> Result<ConfigDocument, PersistenceError> {
        self.load().await.map(|loaded| loaded.document)
    }

    pub async fn window_state(&self) -> WindowGeometry {
        self.read_instance()
            .await
            .map(|config| config.window_state.geometry())
            .unwrap_or_default()
    }

    pub async fn save_window_state(&self, geometry: WindowGeometry) -> Result<(), PersistenceError> {
        self.mutate("windowState", |config| {
            config.window_state.set_geometry(geometry)
        })
        .await
    }

    pub async fn system_name(&self) -> String {
        self.read_instance()
            .await
            .map(|config| config.display_name().to_string())
            .unwrap_or_else(|| DEFAULT_SYSTEM_NAME.to_string())
    }

    pub async fn save_system_name(&self, name: &str) -> Result<(), PersistenceError> {
        self.mutate("systemName", |config| config.system_name = name.to_string())
            .await
    }

    pub async fn url(&self) -> String {
        self.read_instance()
            .await
            .map(|config| config.url)
            .unwrap_or_else(|| DEFAULT_URL.to_string())
    }

    pub async fn save_url(&self, url: &str) -> Result<(), PersistenceError> {
        self.mutate("url", |config| config.url = url.to_string()).await
    }

    pub async fn refresh_interval(&self) -> u64 {
        self.read_instance()
            .await
            .map(|config| config.refresh_interval_seconds)
            .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECONDS)
    }

    pub async fn save_refresh_interval(&self, seconds: u64) -> Result<(), PersistenceError> {
        self.mutate("refreshIntervalSeconds", |config| {
            config.refresh_interval_seconds = seconds
        })
        .await
    }

    /// All startup fields from a single read
    pub async fn startup_data(&self) -> StartupData {
        self.read_instance()
            .await
            .map(|config| StartupData::from(&config))
            .unwrap_or_default()
    }

    async fn load(&self) -> Result<Backfill, PersistenceError> {
        let raw = fs::read(&self.path)
            .await
            .map_err(|source| PersistenceError::Read {
                path: self.path.clone(),
                source,
            })?;

        let parse_err = |source| PersistenceError::Parse {
            path: self.path.clone(),
            source,
        };
        let value = serde_json::from_slice(&raw).map_err(parse_err)?;
        schema::backfill(value, timestamp::now()).map_err(parse_err)
    }

    /// Document for reading; any failure yields an empty one
    async fn read_document(&self) -> ConfigDocument {
        match self.load().await {
            Ok(loaded) => loaded.document,
            Err(err) if err.is_not_found() => {
                debug!(path = %self.path.display(), "No configuration document yet");
                ConfigDocument::default()
            }
            Err(err) => {
                warn!(error = %err, "Using empty configuration document");
                ConfigDocument::default()
            }
        }
    }

    async fn read_instance(&self) -> Option<InstanceConfig> {
        self.read_document()
            .await
            .instances
            .remove(self.instance_id.as_str())
    }

    async fn mutate<F>(&self, field: &'static str, apply: F) -> Result<(), PersistenceError>
    where
        F: FnOnce(&mut InstanceConfig),
    {
        let _guard = self.write_lock.lock().await;

        let mut document = self.read_document().await;
        let now = timestamp::now();
        let (config, created) = document.entry_or_default(self.instance_id.as_str(), now);
        apply(config);
        if !created {
            config.window_state.updated_at = timestamp::advance(config.window_state.updated_at, now);
        }

        match atomic::write_json(&self.path, &document).await {
            Ok(()) => {
                debug!(instance = %self.instance_id, field, "Configuration saved");
                Ok(())
            }
            Err(err) => {
                error!(instance = %self.instance_id, field, error = %err, "Failed to save configuration");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn store_in(tmp: &TempDir) -> ConfigStore {
        ConfigStore::new(&StorageLocation::at(tmp.path()), InstanceId::generate())
    }

    fn read_json(path: &Path) -> Value {
        serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn fresh_store_reports_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);

        assert_eq!(store.initialize().await.unwrap(), InitOutcome::Written);

        assert_eq!(store.system_name().await, "Unnamed");
        assert_eq!(store.url().await, "");
        assert_eq!(store.refresh_interval().await, 0);
        assert_eq!(store.window_state().await, WindowGeometry::new(100, 100, 800, 600));
        assert_eq!(store.startup_data().await, StartupData::default());
    }

    #[tokio::test]
    async fn getters_default_without_initialize() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);

        assert_eq!(store.system_name().await, "Unnamed");
        assert_eq!(store.window_state().await, WindowGeometry::default());
        assert!(store.load_document().await.unwrap_err().is_not_found());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn window_state_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        store.initialize().await.unwrap();

        store
            .save_window_state(WindowGeometry::new(10, 20, 900, 700))
            .await
            .unwrap();

        assert_eq!(store.window_state().await, WindowGeometry::new(10, 20, 900, 700));
    }

    #[tokio::test]
    async fn second_initialize_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        store.initialize().await.unwrap();
        let before = std::fs::read(store.path()).unwrap();
        let modified = std::fs::metadata(store.path()).unwrap().modified().unwrap();

        assert_eq!(store.initialize().await.unwrap(), InitOutcome::Unchanged);

        assert_eq!(std::fs::read(store.path()).unwrap(), before);
        assert_eq!(
            std::fs::metadata(store.path()).unwrap().modified().unwrap(),
            modified
        );
    }

    #[tokio::test]
    async fn initialize_backfills_missing_fields_once() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        let id = store.instance_id().to_string();
        let mut instances = serde_json::Map::new();
        instances.insert(
            id.clone(),
            json!({"systemName": "Lobby", "windowSettings": {
                "x": 1, "y": 2, "width": 300, "height": 200,
                "updatedAt": "2025-01-01T00:00:00.000Z"
            }}),
        );
        std::fs::write(store.path(), json!({ "instances": instances }).to_string()).unwrap();

        assert_eq!(store.initialize().await.unwrap(), InitOutcome::Written);
        let written = read_json(store.path());
        let entry = &written["instances"][id.as_str()];
        assert_eq!(entry["systemName"], "Lobby");
        assert_eq!(entry["url"], "");
        assert_eq!(entry["refreshIntervalSeconds"], 0);
        assert_eq!(entry["windowState"]["width"], 300);
        assert!(entry.get("windowSettings").is_none());

        assert_eq!(store.initialize().await.unwrap(), InitOutcome::Unchanged);
    }

    #[tokio::test]
    async fn corrupt_file_is_replaced_on_initialize() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        std::fs::write(store.path(), "{ not json").unwrap();

        assert_eq!(store.url().await, "");
        assert_eq!(store.initialize().await.unwrap(), InitOutcome::Written);

        let written = read_json(store.path());
        assert!(written["instances"][store.instance_id().as_str()].is_object());
    }

    #[tokio::test]
    async fn save_creates_entry_when_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);

        store.save_system_name("Front desk").await.unwrap();

        assert_eq!(store.system_name().await, "Front desk");
        assert_eq!(store.window_state().await, WindowGeometry::default());
    }

    #[tokio::test]
    async fn saves_do_not_touch_other_instances() {
        let tmp = tempfile::tempdir().unwrap();
        let location = StorageLocation::at(tmp.path());
        let a = ConfigStore::new(&location, InstanceId::generate());
        let b = ConfigStore::new(&location, InstanceId::generate());
        a.initialize().await.unwrap();
        b.initialize().await.unwrap();
        b.save_system_name("B").await.unwrap();
        b.save_window_state(WindowGeometry::new(1, 2, 3, 4)).await.unwrap();
        let b_before = read_json(b.path())["instances"][b.instance_id().as_str()].clone();

        a.save_url("a.example").await.unwrap();

        let after = read_json(a.path());
        assert_eq!(after["instances"][b.instance_id().as_str()], b_before);
        assert_eq!(a.url().await, "a.example");
        assert_eq!(b.url().await, "");
    }

    #[tokio::test]
    async fn updated_at_strictly_increases() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        store.initialize().await.unwrap();

        let mut last = store.load_document().await.unwrap().instances
            [store.instance_id().as_str()]
        .window_state
        .updated_at;

        for i in 0..5 {
            store.save_refresh_interval(i).await.unwrap();
            let current = store.load_document().await.unwrap().instances
                [store.instance_id().as_str()]
            .window_state
            .updated_at;
            assert!(current > last);
            last = current;
        }
    }

    #[tokio::test]
    async fn concurrent_saves_in_process_are_not_lost() {
        let tmp = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(store_in(&tmp));
        store.initialize().await.unwrap();

        let name = {
            let store = store.clone();
            tokio::spawn(async move { store.save_system_name("Kiosk 7").await })
        };
        let url = {
            let store = store.clone();
            tokio::spawn(async move { store.save_url("example.com").await })
        };
        name.await.unwrap().unwrap();
        url.await.unwrap().unwrap();

        assert_eq!(store.system_name().await, "Kiosk 7");
        assert_eq!(store.url().await, "example.com");
    }

    #[tokio::test]
    async fn failed_write_is_reported_not_panicked() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store_in(&tmp);
        store.initialize().await.unwrap();
        // A directory squatting on the temp path makes staging fail
        std::fs::create_dir(tmp.path().join("database.json.tmp")).unwrap();

        let err = store.save_url("example.com").await.unwrap_err();

        assert_eq!(err.kind(), crate::ErrorKind::Write);
        assert_eq!(store.url().await, "");
    }

    #[tokio::test]
    async fn initialize_reports_directory_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("occupied");
        std::fs::write(&blocker, b"").unwrap();
        let store = ConfigStore::new(&StorageLocation::at(&blocker), InstanceId::generate());

        let err = store.initialize().await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Directory);
    }
}
