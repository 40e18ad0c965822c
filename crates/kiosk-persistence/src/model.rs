//! On-disk data model for the identity file and the configuration document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const DEFAULT_SYSTEM_NAME: &str = "Unnamed";
pub const DEFAULT_URL: &str = "";
pub const DEFAULT_REFRESH_INTERVAL_SECONDS: u64 = 0;

/// Window position and size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowGeometry {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl WindowGeometry {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

impl Default for WindowGeometry {
    fn default() -> Self {
        Self::new(100, 100, 800, 600)
    }
}

/// Persisted window geometry plus the time of the last save
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowState {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WindowState {
    pub fn new(geometry: WindowGeometry, updated_at: DateTime<Utc>) -> Self {
        Self {
            x: geometry.x,
            y: geometry.y,
            width: geometry.width,
            height: geometry.height,
            updated_at,
            extra: Map::new(),
        }
    }

    pub fn geometry(&self) -> WindowGeometry {
        WindowGeometry::new(self.x, self.y, self.width, self.height)
    }

    pub fn set_geometry(&mut self, geometry: WindowGeometry) {
        self.x = geometry.x;
        self.y = geometry.y;
        self.width = geometry.width;
        self.height = geometry.height;
    }
}

/// Configuration of one instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceConfig {
    pub system_name: String,
    /// Empty means the local default page
    pub url: String,
    /// 0 disables auto-refresh
    pub refresh_interval_seconds: u64,
    pub window_state: WindowState,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InstanceConfig {
    pub fn with_defaults(now: DateTime<Utc>) -> Self {
        Self {
            system_name: DEFAULT_SYSTEM_NAME.to_string(),
            url: DEFAULT_URL.to_string(),
            refresh_interval_seconds: DEFAULT_REFRESH_INTERVAL_SECONDS,
            window_state: WindowState::new(WindowGeometry::default(), now),
            extra: Map::new(),
        }
    }

    /// Name shown to the user; a blank stored name counts as unset
    pub fn display_name(&self) -> &str {
        if self.system_name.trim().is_empty() {
            DEFAULT_SYSTEM_NAME
        } else {
            &self.system_name
        }
    }
}

/// The whole configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    #[serde(default)]
    pub instances: BTreeMap<String, InstanceConfig>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConfigDocument {
    pub fn instance(&self, instance_id: &str) -> Option<&InstanceConfig> {
        self.instances.get(instance_id)
    }

    /// Get the entry for `instance_id`, creating a default one if absent.
    /// The flag is true when the entry was created.
    pub fn entry_or_default(
        &mut self,
        instance_id: &str,
        now: DateTime<Utc>,
    ) -> (&mut InstanceConfig, bool) {
        let created = !self.instances.contains_key(instance_id);
        let entry = self
            .instances
            .entry(instance_id.to_string())
            .or_insert_with(|| InstanceConfig::with_defaults(now));
        (entry, created)
    }
}

/// Everything the window needs at cold start, from a single read
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartupData {
    pub window_state: WindowGeometry,
    pub system_name: String,
    pub url: String,
    pub refresh_interval_seconds: u64,
}

impl Default for StartupData {
    fn default() -> Self {
        Self {
            window_state: WindowGeometry::default(),
            system_name: DEFAULT_SYSTEM_NAME.to_string(),
            url: DEFAULT_URL.to_string(),
            refresh_interval_seconds: DEFAULT_REFRESH_INTERVAL_SECONDS,
        }
    }
}

impl From<&InstanceConfig> for StartupData {
    fn from(config: &InstanceConfig) -> Self {
        Self {
            window_state: config.window_state.geometry(),
            system_name: config.display_name().to_string(),
            url: config.url.clone(),
            refresh_interval_seconds: config.refresh_interval_seconds,
        }
    }
}

/// Contents of the identity file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRecord {
    pub instance_id: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub last_used: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InstanceRecord {
    pub fn new(instance_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            created_at: now,
            last_used: now,
            extra: Map::new(),
        }
    }
}

/// RFC 3339 timestamps with millisecond precision and a `Z` suffix
pub mod timestamp {
    use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Current time, truncated to what the file format can represent
    pub fn now() -> DateTime<Utc> {
        Utc::now().trunc_subsecs(3)
    }

    /// A timestamp strictly later than `previous`
    pub fn advance(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
        if now > previous {
            now
        } else {
            previous + Duration::milliseconds(1)
        }
    }

    pub fn format(value: &DateTime<Utc>) -> String {
        value.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|value| value.with_timezone(&Utc))
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{raw}'")))
    }
}
