//! Configuration file – reads `~/.telerelay/config.toml` (or an explicit
//! path) into [`Config`].
//!
//! ```toml
//! [transport]
//! leader_bind = "0.0.0.0:5555"
//! leader_url = "ws://jetson.local:5555"
//! follower_bind = "0.0.0.0:5556"
//! follower_url = "ws://127.0.0.1:5556"
//!
//! [leader]
//! rate_hz = 100.0
//!
//! [relay]
//! source_joints = 2
//! staleness_ms = 500
//! limits = [
//!   { index = 0, name = "base", min = -3.14, max = 3.14 },
//!   { index = 1, name = "shoulder", min = -1.57, max = 1.57 },
//! ]
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use telerelay_kernel::RelayConfig;
use telerelay_middleware::{FOLLOWER_COMMANDS_TOPIC, LEADER_JOINTS_TOPIC};
use telerelay_runtime::DEFAULT_RATE_HZ;
use telerelay_types::JointLimit;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "TELERELAY_CONFIG";

// ─────────────────────────────────────────────────────────────────────────────
// Sections
// ─────────────────────────────────────────────────────────────────────────────

/// Where each process binds and connects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Address the leader process publishes on.
    #[serde(default = "default_leader_bind")]
    pub leader_bind: String,

    /// URL the master subscribes to for leader joints.
    #[serde(default = "default_leader_url")]
    pub leader_url: String,

    /// Address the master publishes follower commands on.
    #[serde(default = "default_follower_bind")]
    pub follower_bind: String,

    /// URL the follower subscribes to.
    #[serde(default = "default_follower_url")]
    pub follower_url: String,

    #[serde(default = "default_leader_topic")]
    pub leader_topic: String,

    #[serde(default = "default_follower_topic")]
    pub follower_topic: String,

    /// Delay between subscriber reconnect attempts.
    #[serde(default = "default_reconnect_ms")]
    pub reconnect_ms: u64,
}

/// Settings of the leader process and the simulated leader arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderConfig {
    #[serde(default = "default_rate_hz")]
    pub rate_hz: f64,

    /// Joint count of the simulated leader.
    #[serde(default = "default_sim_joints")]
    pub sim_joints: usize,

    /// Peak sweep displacement of the simulated leader, radians.
    #[serde(default = "default_sim_amplitude")]
    pub sim_amplitude: f64,

    #[serde(default = "default_sim_frequency_hz")]
    pub sim_frequency_hz: f64,
}

/// Full contents of the config file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub leader: LeaderConfig,

    /// Required by `master`; the other commands ignore it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay: Option<RelayConfig>,
}

fn default_leader_bind() -> String {
    "0.0.0.0:5555".to_string()
}
fn default_leader_url() -> String {
    "ws://127.0.0.1:5555".to_string()
}
fn default_follower_bind() -> String {
    "0.0.0.0:5556".to_string()
}
fn default_follower_url() -> String {
    "ws://127.0.0.1:5556".to_string()
}
fn default_leader_topic() -> String {
    LEADER_JOINTS_TOPIC.to_string()
}
fn default_follower_topic() -> String {
    FOLLOWER_COMMANDS_TOPIC.to_string()
}
fn default_reconnect_ms() -> u64 {
    500
}
fn default_rate_hz() -> f64 {
    DEFAULT_RATE_HZ
}
fn default_sim_joints() -> usize {
    6
}
fn default_sim_amplitude() -> f64 {
    1.2
}
fn default_sim_frequency_hz() -> f64 {
    0.25
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            leader_bind: default_leader_bind(),
            leader_url: default_leader_url(),
            follower_bind: default_follower_bind(),
            follower_url: default_follower_url(),
            leader_topic: default_leader_topic(),
            follower_topic: default_follower_topic(),
            reconnect_ms: default_reconnect_ms(),
        }
    }
}

impl Default for LeaderConfig {
    fn default() -> Self {
        Self {
            rate_hz: default_rate_hz(),
            sim_joints: default_sim_joints(),
            sim_amplitude: default_sim_amplitude(),
            sim_frequency_hz: default_sim_frequency_hz(),
        }
    }
}

impl Config {
    /// The `[relay]` section, which `master` cannot run without.
    pub fn require_relay(&self) -> Result<&RelayConfig, String> {
        self.relay
            .as_ref()
            .ok_or_else(|| "config has no [relay] section; joint limits are required".to_string())
    }

    /// Relay settings for `telerelay demo`: the configured `[relay]`, or
    /// `±1 rad` limits on every simulated joint.
    pub fn demo_relay(&self) -> RelayConfig {
        self.relay.clone().unwrap_or_else(|| {
            RelayConfig::with_limits(
                (0..self.leader.sim_joints)
                    .map(|i| JointLimit::new(i, format!("joint{i}"), -1.0, 1.0))
                    .collect(),
            )
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Locating and loading
// ─────────────────────────────────────────────────────────────────────────────

/// Return the path to `~/.telerelay/config.toml`.
pub fn default_config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".telerelay").join("config.toml")
}

/// Pick the config file: `--config`, then `TELERELAY_CONFIG`, then the
/// default location.
pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    match std::env::var(CONFIG_ENV) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v),
        _ => default_config_path(),
    }
}

/// Load the config from `path`.  Returns `None` if the file does not exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg = parse(&raw)?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Load the file at `path`, falling back to defaults (plus environment
/// overrides) when it does not exist.
pub fn load_or_default(path: &Path) -> Result<Config, String> {
    match load_from(path)? {
        Some(cfg) => Ok(cfg),
        None => {
            let mut cfg = Config::default();
            apply_env_overrides(&mut cfg);
            Ok(cfg)
        }
    }
}

pub(crate) fn parse(raw: &str) -> Result<Config, String> {
    toml::from_str(raw).map_err(|e| format!("Failed to parse config: {}", e))
}

/// Apply `TELERELAY_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `TELERELAY_LEADER_BIND` | `transport.leader_bind` |
/// | `TELERELAY_LEADER_URL` | `transport.leader_url` |
/// | `TELERELAY_FOLLOWER_BIND` | `transport.follower_bind` |
/// | `TELERELAY_FOLLOWER_URL` | `transport.follower_url` |
/// | `TELERELAY_RATE_HZ` | `leader.rate_hz` |
/// | `TELERELAY_STALENESS_MS` | `relay.staleness_ms` (when a `[relay]` section exists) |
///
/// Unparseable numbers are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("TELERELAY_LEADER_BIND") {
        cfg.transport.leader_bind = v;
    }
    if let Ok(v) = std::env::var("TELERELAY_LEADER_URL") {
        cfg.transport.leader_url = v;
    }
    if let Ok(v) = std::env::var("TELERELAY_FOLLOWER_BIND") {
        cfg.transport.follower_bind = v;
    }
    if let Ok(v) = std::env::var("TELERELAY_FOLLOWER_URL") {
        cfg.transport.follower_url = v;
    }
    if let Ok(v) = std::env::var("TELERELAY_RATE_HZ")
        && let Ok(rate) = v.parse::<f64>()
    {
        cfg.leader.rate_hz = rate;
    }
    if let Ok(v) = std::env::var("TELERELAY_STALENESS_MS")
        && let Ok(ms) = v.parse::<u64>()
        && let Some(relay) = cfg.relay.as_mut()
    {
        relay.staleness_ms = ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use telerelay_kernel::UnmappedPolicy;

    const SAMPLE: &str = r#"
[transport]
leader_url = "ws://jetson.local:5555"

[leader]
rate_hz = 50.0

[relay]
source_joints = 2
staleness_ms = 250
unmapped_policy = "pass_through"
mapping = [
  { source = 0, destination = 1 },
  { source = 1, destination = 0 },
]
limits = [
  { index = 0, name = "base", min = -3.14, max = 3.14 },
  { index = 1, name = "shoulder", min = -1.57, max = 1.57 },
]
"#;

    fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = config_path_for_home(&dir.path().to_string_lossy());
        fs::create_dir_all(path.parent().unwrap()).expect("mkdir");
        fs::write(&path, body).expect("write");
        path
    }

    #[test]
    fn sample_config_parses() {
        let cfg = parse(SAMPLE).expect("parse");
        assert_eq!(cfg.transport.leader_url, "ws://jetson.local:5555");
        assert_eq!(cfg.transport.follower_bind, "0.0.0.0:5556");
        assert_eq!(cfg.leader.rate_hz, 50.0);

        let relay = cfg.require_relay().expect("relay section");
        assert_eq!(relay.source_joints, 2);
        assert_eq!(relay.staleness_ms, 250);
        assert!(relay.limits_enabled);
        assert_eq!(relay.unmapped_policy, UnmappedPolicy::PassThrough);
        assert_eq!(relay.limits[1].name, "shoulder");
        assert_eq!(relay.mapping.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = parse("").expect("parse");
        assert_eq!(cfg, Config::default());
        assert!(cfg.require_relay().is_err());
        assert_eq!(cfg.transport.leader_topic, "leader_joints");
        assert_eq!(cfg.transport.follower_topic, "follower_commands");
    }

    #[test]
    fn demo_relay_falls_back_to_unit_limits() {
        let relay = Config::default().demo_relay();
        assert_eq!(relay.source_joints, 6);
        assert!(relay.limits.iter().all(|l| l.min == -1.0 && l.max == 1.0));
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(parse("[relay\nsource_joints = ").is_err());
    }

    #[test]
    fn load_from_reads_file() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = write_config(&dir, SAMPLE);
        let cfg = load_from(&path).expect("load ok").expect("some");
        assert_eq!(cfg.leader.rate_hz, 50.0);
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
        assert_eq!(load_or_default(&path).expect("defaults").leader.sim_joints, 6);
    }

    #[test]
    fn config_path_points_to_telerelay_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".telerelay"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn explicit_path_wins() {
        let p = resolve_path(Some(Path::new("/etc/telerelay.toml")));
        assert_eq!(p, PathBuf::from("/etc/telerelay.toml"));
    }

    #[test]
    fn apply_env_overrides_changes_leader_url() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("TELERELAY_LEADER_URL", "ws://robot-host:5555") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.transport.leader_url, "ws://robot-host:5555");
        unsafe { std::env::remove_var("TELERELAY_LEADER_URL") };
    }

    #[test]
    fn apply_env_overrides_changes_staleness() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("TELERELAY_STALENESS_MS", "900") };
        let mut cfg = parse(SAMPLE).expect("parse");
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.relay.as_ref().map(|r| r.staleness_ms), Some(900));
        unsafe { std::env::remove_var("TELERELAY_STALENESS_MS") };
    }

    #[test]
    fn apply_env_overrides_ignores_invalid_rate() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("TELERELAY_RATE_HZ", "fast") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.leader.rate_hz, 100.0);
        unsafe { std::env::remove_var("TELERELAY_RATE_HZ") };
    }
}
