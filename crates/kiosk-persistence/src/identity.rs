//! Per-installation identity.
//!
//! The identity file holds a UUID v4 that keys this installation's entry in
//! the configuration document. It is generated once and reused on every
//! start; only a missing, unreadable or invalid file causes a new id.

use kiosk_settings::StorageLocation;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, info, warn};
use uuid::{Uuid, Variant, Version};

use crate::atomic;
use crate::model::{timestamp, InstanceRecord};
use crate::PersistenceError;

/// Validated instance identifier (hyphenated UUID v4)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstanceId(String);

impl InstanceId {
    /// Fresh random id, lowercase hyphenated
    pub fn generate() -> Self {
        Self(Uuid::new_v4().hyphenated().to_string())
    }

    /// Accept `value` if it is a hyphenated UUID with version 4 and the RFC 4122 variant.
    /// Hex digits may be in either case; the string is kept as given.
    pub fn parse(value: &str) -> Result<Self, PersistenceError> {
        let invalid = || PersistenceError::InvalidIdentity(value.to_string());

        if value.len() != 36 {
            return Err(invalid());
        }
        let uuid = Uuid::parse_str(value).map_err(|_| invalid())?;
        if uuid.get_version() != Some(Version::Random) || uuid.get_variant() != Variant::RFC4122 {
            return Err(invalid());
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for InstanceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for InstanceId {
    type Error = PersistenceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<InstanceId> for String {
    fn from(id: InstanceId) -> Self {
        id.0
    }
}

/// How `resolve` arrived at the id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Resolution {
    /// Existing identity file was valid
    Loaded,
    /// No identity file existed; a new one was written
    Created,
    /// Identity file was unreadable or invalid; it was overwritten
    Regenerated,
    /// A new id was generated but could not be written; it lives in memory only
    Unsaved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub id: InstanceId,
    pub resolution: Resolution,
}

/// Resolves and persists the installation's identity
#[derive(Debug, Clone)]
pub struct InstanceIdentity {
    dir: PathBuf,
    path: PathBuf,
}

impl InstanceIdentity {
    pub fn new(location: &StorageLocation) -> Self {
        Self {
            dir: location.dir().to_path_buf(),
            path: location.identity_file(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return this installation's id, creating it on first use.
    ///
    /// Only a failure to create the storage directory is reported as an error.
    pub async fn resolve(&self) -> Result<ResolvedIdentity, PersistenceError> {
        fs::create_dir_all(&self.dir).await.map_err(|source| {
            error!(dir = %self.dir.display(), error = %source, "Failed to create identity directory");
            PersistenceError::Directory {
                path: self.dir.clone(),
                source,
            }
        })?;

        let previous = match self.load().await {
            Ok((id, fields)) => {
                info!(instance = %id, "Loaded existing instance id");
                if let Err(err) = self.write_touched(fields).await {
                    warn!(error = %err, "Failed to update last used timestamp");
                }
                return Ok(ResolvedIdentity {
                    id,
                    resolution: Resolution::Loaded,
                });
            }
            Err(err) if err.is_not_found() => {
                info!(path = %self.path.display(), "No instance id found, creating one");
                None
            }
            Err(err) => {
                warn!(error = %err, "Instance id unusable, regenerating");
                Some(err)
            }
        };

        let id = InstanceId::generate();
        let record = InstanceRecord::new(id.as_str(), timestamp::now());
        let resolution = match atomic::write_json(&self.path, &record).await {
            Ok(()) if previous.is_some() => Resolution::Regenerated,
            Ok(()) => Resolution::Created,
            Err(err) => {
                error!(instance = %id, error = %err, "Failed to persist new instance id");
                Resolution::Unsaved
            }
        };

        info!(instance = %id, resolution = ?resolution, "Instance id resolved");
        Ok(ResolvedIdentity { id, resolution })
    }

    /// Update `lastUsed` in the identity file (best-effort)
    pub async fn touch(&self) -> Result<(), PersistenceError> {
        let (_, fields) = self.load().await?;
        self.write_touched(fields).await
    }

    /// Identity record for the settings UI; synthesized if the file is unreadable
    pub async fn instance_info(&self, id: &InstanceId) -> InstanceRecord {
        let loaded = match fs::read(&self.path).await {
            Ok(raw) => serde_json::from_slice::<InstanceRecord>(&raw).ok(),
            Err(_) => None,
        };

        loaded.unwrap_or_else(|| {
            debug!(instance = %id, "Identity file unreadable, synthesizing record");
            InstanceRecord::new(id.as_str(), timestamp::now())
        })
    }

    async fn load(&self) -> Result<(InstanceId, Map<String, Value>), PersistenceError> {
        let raw = fs::read(&self.path)
            .await
            .map_err(|source| PersistenceError::Read {
                path: self.path.clone(),
                source,
            })?;

        let value: Value =
            serde_json::from_slice(&raw).map_err(|source| PersistenceError::Parse {
                path: self.path.clone(),
                source,
            })?;

        let Value::Object(fields) = value else {
            return Err(PersistenceError::InvalidIdentity(
                "identity file is not a JSON object".to_string(),
            ));
        };

        let id = match fields.get("instanceId").and_then(Value::as_str) {
            Some(raw_id) => InstanceId::parse(raw_id)?,
            None => {
                return Err(PersistenceError::InvalidIdentity(
                    "missing instanceId".to_string(),
                ))
            }
        };

        Ok((id, fields))
    }

    async fn write_touched(&self, mut fields: Map<String, Value>) -> Result<(), PersistenceError> {
        let now = timestamp::format(&timestamp::now());

        let created_valid = fields
            .get("createdAt")
            .and_then(Value::as_str)
            .and_then(timestamp::parse)
            .is_some();
        if !created_valid {
            fields.insert("createdAt".to_string(), Value::from(now.clone()));
        }
        fields.insert("lastUsed".to_string(), Value::from(now));

        atomic::write_json(&self.path, &Value::Object(fields)).await
    }
}
