//! Storage directory resolution.
//!
//! Both the identity file and the configuration document live in one
//! directory, chosen once at startup:
//!
//! 1. `PORTABLE_EXECUTABLE_DIR`, when the shell runs as a portable build
//! 2. the user's profile configuration directory
//! 3. the directory holding the running executable

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::SettingsError;

/// Environment variable set by portable launchers
pub const PORTABLE_DIR_ENV: &str = "PORTABLE_EXECUTABLE_DIR";

/// Directory name used under the profile configuration directory
pub const APP_DIR_NAME: &str = "kiosk-shell";

pub const IDENTITY_FILE_NAME: &str = "instance-id.json";
pub const CONFIG_FILE_NAME: &str = "database.json";
pub const SETTINGS_FILE_NAME: &str = "settings.toml";
pub const LOG_DIR_NAME: &str = "logs";

/// Where the storage directory came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageSource {
    /// Portable-mode environment override
    Portable,
    /// User-writable profile directory
    Profile,
    /// Directory of the installed executable
    Installation,
    /// Caller-supplied directory (tests, embedding)
    Explicit,
}

/// Resolved storage directory, fixed for the lifetime of the process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLocation {
    dir: PathBuf,
    source: StorageSource,
}

impl StorageLocation {
    /// Resolve the storage directory from the process environment
    pub fn detect() -> Result<Self, SettingsError> {
        let portable = std::env::var_os(PORTABLE_DIR_ENV);
        let profile = dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME));
        let installation = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));

        let location = Self::resolve_with(portable, profile, installation)
            .ok_or(SettingsError::NoStorageLocation)?;

        tracing::info!(
            dir = %location.dir.display(),
            source = ?location.source,
            "Storage location resolved"
        );
        Ok(location)
    }

    /// Apply the precedence rules to already-gathered candidates
    pub fn resolve_with(
        portable: Option<OsString>,
        profile: Option<PathBuf>,
        installation: Option<PathBuf>,
    ) -> Option<Self> {
        if let Some(dir) = portable.filter(|value| !value.is_empty()) {
            return Some(Self {
                dir: PathBuf::from(dir),
                source: StorageSource::Portable,
            });
        }
        if let Some(dir) = profile {
            return Some(Self {
                dir,
                source: StorageSource::Profile,
            });
        }
        installation.map(|dir| Self {
            dir,
            source: StorageSource::Installation,
        })
    }

    /// Use a specific directory
    pub fn at<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            source: StorageSource::Explicit,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn source(&self) -> StorageSource {
        self.source
    }

    pub fn identity_file(&self) -> PathBuf {
        self.dir.join(IDENTITY_FILE_NAME)
    }

    pub fn config_file(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE_NAME)
    }

    pub fn settings_file(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE_NAME)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.dir.join(LOG_DIR_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn portable_override_wins() {
        let location = StorageLocation::resolve_with(
            Some(OsString::from("/portable")),
            Some(PathBuf::from("/home/user/.config/kiosk-shell")),
            Some(PathBuf::from("/opt/kiosk")),
        )
        .unwrap();

        assert_eq!(location.dir(), Path::new("/portable"));
        assert_eq!(location.source(), StorageSource::Portable);
    }

    #[test]
    fn empty_portable_value_is_ignored() {
        let location = StorageLocation::resolve_with(
            Some(OsString::new()),
            Some(PathBuf::from("/profile")),
            None,
        )
        .unwrap();

        assert_eq!(location.source(), StorageSource::Profile);
    }

    #[test]
    fn installation_dir_is_last_resort() {
        let location =
            StorageLocation::resolve_with(None, None, Some(PathBuf::from("/opt/kiosk"))).unwrap();
        assert_eq!(location.source(), StorageSource::Installation);
        assert_eq!(location.config_file(), Path::new("/opt/kiosk/database.json"));

        assert!(StorageLocation::resolve_with(None, None, None).is_none());
    }

    #[test]
    fn files_share_one_directory() {
        let location = StorageLocation::at("/srv/kiosk");

        assert_eq!(location.source(), StorageSource::Explicit);
        assert_eq!(location.identity_file(), Path::new("/srv/kiosk/instance-id.json"));
        assert_eq!(location.settings_file(), Path::new("/srv/kiosk/settings.toml"));
        assert_eq!(location.log_dir(), Path::new("/srv/kiosk/logs"));
    }
}
