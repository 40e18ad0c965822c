//! Versioned backfill of the configuration document.
//!
//! Every load runs the raw JSON through [`backfill`] before it is turned into
//! a [`ConfigDocument`]. Each step owns one field, knows the schema version
//! that introduced it, and fills it (or upgrades its legacy spelling) when it
//! is absent or has the wrong type. The caller persists the result once if
//! anything was filled.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::model::{
    timestamp, ConfigDocument, WindowGeometry, DEFAULT_REFRESH_INTERVAL_SECONDS,
    DEFAULT_SYSTEM_NAME, DEFAULT_URL,
};

/// Latest schema version understood by this build
pub const SCHEMA_VERSION: u32 = 3;

struct SchemaStep {
    introduced_in: u32,
    field: &'static str,
    apply: fn(&mut Map<String, Value>, &str) -> bool,
}

const STEPS: &[SchemaStep] = &[
    SchemaStep {
        introduced_in: 1,
        field: "systemName",
        apply: fill_system_name,
    },
    SchemaStep {
        introduced_in: 1,
        field: "windowState",
        apply: fill_window_state,
    },
    SchemaStep {
        introduced_in: 2,
        field: "url",
        apply: fill_url,
    },
    SchemaStep {
        introduced_in: 3,
        field: "refreshIntervalSeconds",
        apply: fill_refresh_interval,
    },
];

/// Result of running the backfill over a parsed document
#[derive(Debug)]
pub struct Backfill {
    pub document: ConfigDocument,
    /// `<instance>.<field>` for every field that had to be filled
    pub filled: Vec<String>,
}

impl Backfill {
    pub fn changed(&self) -> bool {
        !self.filled.is_empty()
    }
}

/// Produce a fully-populated document from whatever JSON was on disk
pub fn backfill(raw: Value, now: DateTime<Utc>) -> Result<Backfill, serde_json::Error> {
    let stamp = timestamp::format(&now);
    let mut filled = Vec::new();

    let mut root = match raw {
        Value::Object(root) => root,
        _ => {
            filled.push("instances".to_string());
            Map::new()
        }
    };

    if !matches!(root.get("instances"), Some(Value::Object(_))) {
        if !filled.iter().any(|name| name == "instances") {
            filled.push("instances".to_string());
        }
        root.insert("instances".to_string(), Value::Object(Map::new()));
    }

    if let Some(Value::Object(instances)) = root.get_mut("instances") {
        for (instance_id, entry) in instances.iter_mut() {
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
                filled.push(instance_id.clone());
            }
            if let Value::Object(fields) = entry {
                for step in STEPS {
                    if (step.apply)(fields, &stamp) {
                        tracing::debug!(
                            instance = %instance_id,
                            field = step.field,
                            since = step.introduced_in,
                            "Backfilled configuration field"
                        );
                        filled.push(format!("{instance_id}.{}", step.field));
                    }
                }
            }
        }
    }

    let document = serde_json::from_value(Value::Object(root))?;
    Ok(Backfill { document, filled })
}

/// Insert `default` under `key` unless the current value passes `valid`
fn ensure(
    fields: &mut Map<String, Value>,
    key: &str,
    valid: impl Fn(&Value) -> bool,
    default: impl FnOnce() -> Value,
) -> bool {
    match fields.get(key) {
        Some(value) if valid(value) => false,
        _ => {
            fields.insert(key.to_string(), default());
            true
        }
    }
}

/// Move a legacy key to its current name when the current one is absent
fn rename_legacy(fields: &mut Map<String, Value>, legacy: &str, current: &str) -> bool {
    if fields.contains_key(current) {
        return false;
    }
    match fields.remove(legacy) {
        Some(value) => {
            fields.insert(current.to_string(), value);
            true
        }
        None => false,
    }
}

fn is_i32(value: &Value) -> bool {
    value.as_i64().is_some_and(|n| i32::try_from(n).is_ok())
}

fn is_timestamp(value: &Value) -> bool {
    value.as_str().and_then(timestamp::parse).is_some()
}

fn fill_system_name(fields: &mut Map<String, Value>, _now: &str) -> bool {
    ensure(fields, "systemName", Value::is_string, || {
        Value::from(DEFAULT_SYSTEM_NAME)
    })
}

fn fill_url(fields: &mut Map<String, Value>, _now: &str) -> bool {
    ensure(fields, "url", Value::is_string, || Value::from(DEFAULT_URL))
}

fn fill_refresh_interval(fields: &mut Map<String, Value>, _now: &str) -> bool {
    let renamed = rename_legacy(fields, "refreshInterval", "refreshIntervalSeconds");
    let defaulted = ensure(fields, "refreshIntervalSeconds", Value::is_u64, || {
        Value::from(DEFAULT_REFRESH_INTERVAL_SECONDS)
    });
    renamed || defaulted
}

fn fill_window_state(fields: &mut Map<String, Value>, now: &str) -> bool {
    let mut changed = rename_legacy(fields, "windowSettings", "windowState");

    let state = fields
        .entry("windowState".to_string())
        .or_insert(Value::Null);
    if !state.is_object() {
        *state = Value::Object(Map::new());
        changed = true;
    }

    if let Value::Object(state) = state {
        let defaults = WindowGeometry::default();
        for (key, value) in [
            ("x", defaults.x),
            ("y", defaults.y),
            ("width", defaults.width),
            ("height", defaults.height),
        ] {
            changed |= ensure(state, key, is_i32, || Value::from(value));
        }
        changed |= ensure(state, "updatedAt", is_timestamp, || Value::from(now));
    }

    changed
}
