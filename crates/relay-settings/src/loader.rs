//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`RelaySettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply environment variable overrides
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::RelaySettings;

/// Resolve the default settings file path (`~/.relay/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".relay").join("settings.json")
}

/// Load settings from the default path with env var overrides.
///
/// A missing default file is not an error.
pub fn load_settings() -> Result<RelaySettings> {
    let path = settings_path();
    let mut settings = if path.exists() {
        load_file(&path)?
    } else {
        debug!(?path, "settings file not found, using defaults");
        RelaySettings::default()
    };
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Load settings from an explicit path with env var overrides.
///
/// Unlike [`load_settings`], the file must exist.
pub fn load_settings_from_path(path: &Path) -> Result<RelaySettings> {
    let mut settings = load_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

fn load_file(path: &Path) -> Result<RelaySettings> {
    debug!(?path, "loading settings from file");
    let defaults = serde_json::to_value(RelaySettings::default())?;
    let content = std::fs::read_to_string(path)?;
    let user: Value = serde_json::from_str(&content)?;
    Ok(serde_json::from_value(deep_merge(defaults, user))?)
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

/// Apply process environment overrides to loaded settings.
pub fn apply_env_overrides(settings: &mut RelaySettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary variable source.
///
/// `PORT` is the platform convention and yields `0.0.0.0:<PORT>`;
/// `RELAY_ADDR` is more specific and wins when both are set. Invalid values
/// are logged and ignored.
pub fn apply_overrides(settings: &mut RelaySettings, lookup: impl Fn(&str) -> Option<String>) {
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = read("PORT") {
        match parse_u64_range(&v, 1, u64::from(u16::MAX)) {
            Some(port) => settings.server.addr = format!("0.0.0.0:{port}"),
            None => warn!(key = "PORT", value = %v, "invalid port env var, ignoring"),
        }
    }
    if let Some(v) = read("RELAY_ADDR") {
        settings.server.addr = v;
    }
    if let Some(v) = read("RELAY_HUB_CAPACITY") {
        match parse_u64_range(&v, 1, 1_000_000).and_then(|n| usize::try_from(n).ok()) {
            Some(n) => settings.server.hub_capacity = n,
            None => warn!(key = "RELAY_HUB_CAPACITY", value = %v, "invalid env var, ignoring"),
        }
    }
    if let Some(v) = read("RELAY_HANDSHAKE_TIMEOUT_MS") {
        match parse_u64_range(&v, 1, 3_600_000) {
            Some(n) => settings.server.handshake_timeout_ms = n,
            None => warn!(key = "RELAY_HANDSHAKE_TIMEOUT_MS", value = %v, "invalid env var, ignoring"),
        }
    }
    if let Some(v) = read("RELAY_WRITE_TIMEOUT_MS") {
        match parse_u64_range(&v, 1, 3_600_000) {
            Some(n) => settings.server.write_timeout_ms = n,
            None => warn!(key = "RELAY_WRITE_TIMEOUT_MS", value = %v, "invalid env var, ignoring"),
        }
    }
    if let Some(v) = read("RELAY_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read("RELAY_LOG_JSON") {
        match parse_bool(&v) {
            Some(b) => settings.logging.json = b,
            None => warn!(key = "RELAY_LOG_JSON", value = %v, "invalid boolean env var, ignoring"),
        }
    }
}

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}
