//! Configuration – reads/writes `~/.rosua/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use rosua_sync::RawScopeLists;

/// Optional allow/exclude lists as they appear in the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilterLists {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_topics: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded_topics: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_services: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded_services: Option<Vec<String>>,
}

impl FilterLists {
    /// Convert the file-sourced lists into the raw form the scope resolver
    /// validates.
    pub fn to_raw(&self) -> RawScopeLists {
        fn lift(list: &Option<Vec<String>>) -> Option<serde_json::Value> {
            list.as_ref().map(|v| serde_json::json!(v))
        }
        RawScopeLists {
            allowed_topics: lift(&self.allowed_topics),
            excluded_topics: lift(&self.excluded_topics),
            allowed_services: lift(&self.allowed_services),
            excluded_services: lift(&self.excluded_services),
        }
    }
}

/// Persisted configuration stored in `~/.rosua/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Listen address for the address-space browse server.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// WebSocket URL of the rosbridge instance exposing the robot graph.
    #[serde(default = "default_rosbridge_url")]
    pub rosbridge_url: String,

    /// Only entities under this name prefix are mirrored.
    #[serde(default = "default_namespace_root")]
    pub namespace_root: String,

    /// Seconds between graph scan cycles.
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,

    /// Seconds between liveness sweeps.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Allow/exclude scope lists.
    #[serde(default)]
    pub filters: FilterLists,
}

fn default_endpoint() -> String {
    "0.0.0.0:4840".to_string()
}
fn default_rosbridge_url() -> String {
    "ws://localhost:9090".to_string()
}
fn default_namespace_root() -> String {
    "/".to_string()
}
fn default_scan_interval_secs() -> u64 {
    60
}
fn default_sweep_interval_secs() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            rosbridge_url: default_rosbridge_url(),
            namespace_root: default_namespace_root(),
            scan_interval_secs: default_scan_interval_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            filters: FilterLists::default(),
        }
    }
}

/// Return the path to `~/.rosua/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
/// Extracted for testability without mutating environment variables.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".rosua").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `ROSUA_*` environment variable overrides to `cfg`.
///
/// Supported variables:
///
/// | Variable | Config field |
/// |---|---|
/// | `ROSUA_ENDPOINT` | `endpoint` |
/// | `ROSUA_ROSBRIDGE_URL` | `rosbridge_url` |
/// | `ROSUA_NAMESPACE_ROOT` | `namespace_root` |
/// | `ROSUA_SCAN_INTERVAL` | `scan_interval_secs` |
/// | `ROSUA_SWEEP_INTERVAL` | `sweep_interval_secs` |
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides_from(cfg, |key| std::env::var(key).ok());
}

/// Apply overrides through an arbitrary lookup.
/// Extracted for testability without mutating environment variables.
pub(crate) fn apply_overrides_from(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("ROSUA_ENDPOINT") {
        cfg.endpoint = v;
    }
    if let Some(v) = lookup("ROSUA_ROSBRIDGE_URL") {
        cfg.rosbridge_url = v;
    }
    if let Some(v) = lookup("ROSUA_NAMESPACE_ROOT") {
        cfg.namespace_root = v;
    }
    if let Some(v) = lookup("ROSUA_SCAN_INTERVAL")
        && let Ok(secs) = v.parse::<u64>() {
            cfg.scan_interval_secs = secs;
        }
    if let Some(v) = lookup("ROSUA_SWEEP_INTERVAL")
        && let Ok(secs) = v.parse::<u64>() {
            cfg.sweep_interval_secs = secs;
        }
}

/// Save the config to disk, creating `~/.rosua/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &PathBuf) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw).map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let cfg = Config::default();
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.endpoint, "0.0.0.0:4840");
        assert_eq!(loaded.rosbridge_url, "ws://localhost:9090");
        assert_eq!(loaded.namespace_root, "/");
        assert_eq!(loaded.scan_interval_secs, 60);
        assert_eq!(loaded.sweep_interval_secs, 60);
    }

    #[test]
    fn config_path_points_to_rosua_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".rosua"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        let result = load_from(&path).expect("no error");
        assert!(result.is_none());
    }

    #[test]
    fn filter_lists_survive_roundtrip() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let mut cfg = Config::default();
        cfg.filters.allowed_topics = Some(vec!["/robot/cmd_vel".to_string()]);
        cfg.filters.excluded_services = Some(vec!["/rosout/get_loggers".to_string()]);
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.filters, cfg.filters);
    }

    #[test]
    fn to_raw_lifts_only_present_lists() {
        let mut filters = FilterLists::default();
        filters.excluded_topics = Some(vec!["/rosout".to_string()]);
        let raw = filters.to_raw();
        assert!(raw.allowed_topics.is_none());
        assert_eq!(raw.excluded_topics, Some(serde_json::json!(["/rosout"])));
    }

    fn lookup_of<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn overrides_replace_configured_values() {
        let mut cfg = Config::default();
        apply_overrides_from(
            &mut cfg,
            lookup_of(&[
                ("ROSUA_ROSBRIDGE_URL", "ws://robot-host:9090"),
                ("ROSUA_SCAN_INTERVAL", "5"),
            ]),
        );
        assert_eq!(cfg.rosbridge_url, "ws://robot-host:9090");
        assert_eq!(cfg.scan_interval_secs, 5);
        // Untouched fields keep their defaults.
        assert_eq!(cfg.endpoint, "0.0.0.0:4840");
    }

    #[test]
    fn invalid_interval_override_is_ignored() {
        let mut cfg = Config::default();
        apply_overrides_from(&mut cfg, lookup_of(&[("ROSUA_SCAN_INTERVAL", "not-a-number")]));
        assert_eq!(cfg.scan_interval_secs, 60);
    }

    #[test]
    fn absent_overrides_leave_config_untouched() {
        let mut cfg = Config::default();
        apply_overrides_from(&mut cfg, |_| None);
        assert_eq!(cfg, Config::default());
    }
}
