//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`SerialWsSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `SERIALWS_*` environment overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{DisconnectPolicy, EventDelivery, LogFormat, SerialWsSettings};

/// Resolve the default settings file (`~/.serialws/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".serialws").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<SerialWsSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from `path` with env var overrides.
///
/// A missing file yields defaults; a file with invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<SerialWsSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Defaults with the file at `path` merged over them, without env overrides.
pub fn load_file_layer(path: &Path) -> Result<SerialWsSettings> {
    let defaults = serde_json::to_value(SerialWsSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `SERIALWS_*` environment overrides. Invalid values are ignored with a warning.
pub fn apply_env_overrides(settings: &mut SerialWsSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`, which maps a variable name to its value.
pub fn apply_overrides<F>(settings: &mut SerialWsSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let string = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = string("SERIALWS_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = string("SERIALWS_PORT")
        .and_then(|v| checked("SERIALWS_PORT", &v, parse_u16_range(&v, 0, u16::MAX)))
    {
        settings.server.port = v;
    }
    if let Some(v) = string("SERIALWS_DELIVERY")
        .and_then(|v| keyword::<EventDelivery>("SERIALWS_DELIVERY", &v))
    {
        settings.bridge.delivery = v;
    }
    if let Some(v) = string("SERIALWS_DISCONNECT")
        .and_then(|v| keyword::<DisconnectPolicy>("SERIALWS_DISCONNECT", &v))
    {
        settings.bridge.disconnect = v;
    }
    if let Some(v) = string("SERIALWS_DEFAULT_BAUD")
        .and_then(|v| checked("SERIALWS_DEFAULT_BAUD", &v, parse_u32_range(&v, 1, 4_000_000)))
    {
        settings.serial.default_baud_rate = v;
    }
    if let Some(v) = string("SERIALWS_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = string("SERIALWS_LOG_FORMAT")
        .and_then(|v| keyword::<LogFormat>("SERIALWS_LOG_FORMAT", &v))
    {
        settings.logging.format = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u32` within a range.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

fn checked<T>(name: &str, raw: &str, parsed: Option<T>) -> Option<T> {
    if parsed.is_none() {
        warn!(key = name, value = %raw, "invalid numeric env var, ignoring");
    }
    parsed
}

fn keyword<T: FromStr>(name: &str, raw: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    match raw.parse() {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(key = name, value = %raw, error = %e, "invalid env var, ignoring");
            None
        }
    }
}
