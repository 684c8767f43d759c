//! Daemon configuration
//!
//! Every section is optional. Values are layered with increasing precedence:
//!
//! 1. Hardcoded defaults
//! 2. TOML configuration file (`--config`)
//! 3. Environment variables (`POD_CHECKPOINT_*`)
//! 4. Command line flags

pub mod loader;

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use humantime_serde::re::humantime::{parse_duration, DurationError};
use thiserror::Error;

use crate::abstractions::{Workload, WorkloadPhase};
use crate::checkpoint::ConflictPolicy;

pub use loader::{load_config, ENV_PREFIX};

/// Configuration loading and validation failures
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {field}: {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub checkpoint: CheckpointSettings,

    #[serde(default)]
    pub runtime: RuntimeSettings,

    /// Static workload table served by the in-memory registry
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workloads: Vec<WorkloadEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Address the HTTP API binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:10255".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointSettings {
    /// Node root; artifacts go to `<root_dir>/checkpoint/<pod>/<container>`
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// Upper bound on waiting for the runtime; `"none"` waits without a deadline
    #[serde(with = "completion_timeout", default = "default_completion_timeout")]
    pub completion_timeout: Option<Duration>,

    #[serde(default)]
    pub conflict_policy: ConflictPolicy,
}

impl Default for CheckpointSettings {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            completion_timeout: default_completion_timeout(),
            conflict_policy: ConflictPolicy::default(),
        }
    }
}

fn default_root_dir() -> PathBuf {
    PathBuf::from("/var/lib/kubelet")
}

fn default_completion_timeout() -> Option<Duration> {
    Some(Duration::from_secs(300)) // 5 minutes
}

/// Parse a completion timeout; `none` or `off` disables the deadline
pub fn parse_completion_timeout(value: &str) -> Result<Option<Duration>, DurationError> {
    match value.trim() {
        "none" | "off" => Ok(None),
        value => parse_duration(value).map(Some),
    }
}

/// Serde adapter writing an absent timeout as `"none"`
mod completion_timeout {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    use humantime_serde::re::humantime::format_duration;

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(timeout) => serializer.collect_str(&format_duration(*timeout)),
            None => serializer.serialize_str("none"),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_completion_timeout(&raw).map_err(|e| {
            D::Error::custom(format!("invalid completion timeout {raw:?}: {e}, expected a duration or \"none\""))
        })
    }
}

/// Settings of the simulated container runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeSettings {
    #[serde(with = "humantime_serde", default = "default_snapshot_delay")]
    pub snapshot_delay: Duration,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            snapshot_delay: default_snapshot_delay(),
        }
    }
}

fn default_snapshot_delay() -> Duration {
    Duration::from_millis(250)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadEntry {
    pub uid: String,
    pub name: String,
    #[serde(default)]
    pub phase: WorkloadPhase,
}

impl From<&WorkloadEntry> for Workload {
    fn from(entry: &WorkloadEntry) -> Self {
        Workload::new(entry.uid.as_str(), entry.name.as_str(), entry.phase)
    }
}

impl DaemonConfig {
    /// Parse the listen address
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .listen_addr
            .parse()
            .map_err(|e| ConfigError::invalid("server.listen_addr", format!("{e}")))
    }

    pub fn workloads(&self) -> Vec<Workload> {
        self.workloads.iter().map(Workload::from).collect()
    }

    /// Check the values that cannot be expressed in the types
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_addr()?;

        if self.checkpoint.root_dir.as_os_str().is_empty() {
            return Err(ConfigError::invalid("checkpoint.root_dir", "must not be empty"));
        }

        if self.checkpoint.completion_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::invalid(
                "checkpoint.completion_timeout",
                "must be greater than zero, use \"none\" for an unbounded wait",
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for entry in &self.workloads {
            if entry.uid.is_empty() || entry.name.is_empty() {
                return Err(ConfigError::invalid("workloads", "uid and name are required"));
            }
            if !seen.insert(entry.uid.as_str()) {
                return Err(ConfigError::invalid(
                    "workloads",
                    format!("duplicate uid {}", entry.uid),
                ));
            }
        }

        Ok(())
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DaemonConfig::default();

        assert_eq!(config.server.listen_addr, "127.0.0.1:10255");
        assert_eq!(config.checkpoint.root_dir, PathBuf::from("/var/lib/kubelet"));
        assert_eq!(config.checkpoint.completion_timeout, Some(Duration::from_secs(300)));
        assert_eq!(config.checkpoint.conflict_policy, ConflictPolicy::Reject);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_file() {
        let config: DaemonConfig = toml::from_str(
            r#"
            [server]
            listen_addr = "0.0.0.0:9000"

            [checkpoint]
            root_dir = "/ckpt"
            completion_timeout = "90s"
            conflict_policy = "preempt"

            [runtime]
            snapshot_delay = "10ms"

            [[workloads]]
            uid = "uid-1"
            name = "pod1"

            [[workloads]]
            uid = "uid-2"
            name = "pod2"
            phase = "pending"
            "#,
        )
        .unwrap();

        assert_eq!(config.listen_addr().unwrap().port(), 9000);
        assert_eq!(config.checkpoint.completion_timeout, Some(Duration::from_secs(90)));
        assert_eq!(config.checkpoint.conflict_policy, ConflictPolicy::Preempt);
        assert_eq!(config.runtime.snapshot_delay, Duration::from_millis(10));

        let workloads = config.workloads();
        assert_eq!(workloads.len(), 2);
        assert_eq!(workloads[0].phase, WorkloadPhase::Running);
        assert_eq!(workloads[1].phase, WorkloadPhase::Pending);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: DaemonConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.listen_addr, default_listen_addr());
        assert!(config.workloads.is_empty());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = DaemonConfig::default();
        config.server.listen_addr = "not an address".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { ref field, .. }) if field == "server.listen_addr"
        ));

        let mut config = DaemonConfig::default();
        config.checkpoint.completion_timeout = Some(Duration::ZERO);
        assert!(config.validate().is_err());

        let mut config = DaemonConfig::default();
        config.workloads = vec![
            WorkloadEntry {
                uid: "same".into(),
                name: "a".into(),
                phase: WorkloadPhase::Running,
            },
            WorkloadEntry {
                uid: "same".into(),
                name: "b".into(),
                phase: WorkloadPhase::Running,
            },
        ];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip_keeps_timeout() {
        let rendered = DaemonConfig::default().to_toml().unwrap();
        assert!(rendered.contains("completion_timeout = \"5m\""));

        let parsed: DaemonConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.checkpoint.completion_timeout, Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_unbounded_timeout_survives_round_trip() {
        let mut config = DaemonConfig::default();
        config.checkpoint.completion_timeout = None;

        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("completion_timeout = \"none\""));

        let parsed: DaemonConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.checkpoint.completion_timeout, None);
    }

    #[test]
    fn test_timeout_can_be_disabled_in_file() {
        for value in ["none", "off"] {
            let config: DaemonConfig =
                toml::from_str(&format!("[checkpoint]\ncompletion_timeout = \"{value}\"\n"))
                    .unwrap();
            assert_eq!(config.checkpoint.completion_timeout, None, "{value}");
        }

        let err = toml::from_str::<DaemonConfig>("[checkpoint]\ncompletion_timeout = \"soon\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("completion timeout"));
    }
}
