//! `~/.deepfreeze/config.toml` loading.
//!
//! Every section is optional; a missing file means defaults everywhere. String
//! values that name paths or devices support `${VAR}` environment expansion.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use deepfreeze_types::{Remediation, UnitId};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_MONITOR_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_MONITOR_BACKOFF_MS: u64 = 10_000;
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1_000;
pub const DEFAULT_RESTRICTED_SETTLE_DELAY_MS: u64 = 800;
pub const DEFAULT_WAKE_DELAY_MS: u64 = 500;
pub const DEFAULT_RECENT_TASK_LIMIT: usize = 5;
pub const DEFAULT_SELF_UNIT: &str = "com.asadbyte.deepfreezer";

#[derive(Debug, Default, Deserialize)]
pub struct DeepfreezeConfig {
    pub device: Option<DeviceConfig>,
    pub safeguard: Option<SafeguardConfig>,
    pub ledger: Option<LedgerConfig>,
    pub monitor: Option<MonitorConfig>,
    pub launch: Option<LaunchConfig>,
    pub troubleshoot: Option<TroubleshootConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// `adb [-s serial] shell ...` from a host machine.
    #[default]
    Adb,
    /// `sh -c ...` when running on the device itself.
    Local,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeviceConfig {
    #[serde(default)]
    pub transport: Transport,
    pub serial: Option<String>,
    /// Our own unit id; always protected from suspension.
    pub self_unit: Option<UnitId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SafeguardConfig {
    /// Default telephony handler. Protected in addition to the fixed members.
    pub telephony_unit: Option<UnitId>,
    #[serde(default)]
    pub critical_units: Vec<UnitId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LedgerConfig {
    pub path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MonitorConfig {
    pub interval_ms: Option<u64>,
    pub backoff_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemActionConfig {
    pub action: String,
    pub data: Option<String>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LaunchConfig {
    pub settle_delay_ms: Option<u64>,
    pub restricted_settle_delay_ms: Option<u64>,
    pub wake_delay_ms: Option<u64>,
    pub recent_task_limit: Option<usize>,
    #[serde(default)]
    pub deep_links: BTreeMap<UnitId, Vec<String>>,
    #[serde(default)]
    pub system_actions: BTreeMap<UnitId, SystemActionConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TroubleshootConfig {
    #[serde(default)]
    pub remediations: BTreeMap<UnitId, Vec<Remediation>>,
    #[serde(default)]
    pub alternatives: BTreeMap<UnitId, Vec<Remediation>>,
}

/// Replace `${VAR}` references with the variable's value (empty when unset).
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let var = &after[..end];
                if !var.is_empty() {
                    out.push_str(&env::var(var).unwrap_or_default());
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

impl DeepfreezeConfig {
    /// Load from the default location. `Ok(None)` when no config file exists.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    #[must_use]
    pub fn transport(&self) -> Transport {
        self.device.as_ref().map(|d| d.transport).unwrap_or_default()
    }

    #[must_use]
    pub fn serial(&self) -> Option<String> {
        self.device
            .as_ref()
            .and_then(|d| d.serial.as_deref())
            .map(expand_env_vars)
            .filter(|s| !s.is_empty())
    }

    #[must_use]
    pub fn self_unit(&self) -> UnitId {
        self.device
            .as_ref()
            .and_then(|d| d.self_unit.clone())
            .unwrap_or_else(|| UnitId::from_static(DEFAULT_SELF_UNIT))
    }

    #[must_use]
    pub fn telephony_unit(&self) -> Option<UnitId> {
        self.safeguard.as_ref().and_then(|s| s.telephony_unit.clone())
    }

    #[must_use]
    pub fn extra_critical_units(&self) -> Vec<UnitId> {
        self.safeguard
            .as_ref()
            .map(|s| s.critical_units.clone())
            .unwrap_or_default()
    }

    /// Ledger location: configured path, else `~/.deepfreeze/ledger.json`.
    #[must_use]
    pub fn ledger_path(&self) -> Option<PathBuf> {
        if let Some(path) = self.ledger.as_ref().and_then(|l| l.path.as_deref()) {
            return Some(PathBuf::from(expand_env_vars(path)));
        }
        data_dir().map(|dir| dir.join("ledger.json"))
    }

    #[must_use]
    pub fn monitor_interval(&self) -> Duration {
        let ms = self.monitor.as_ref().and_then(|m| m.interval_ms);
        Duration::from_millis(ms.unwrap_or(DEFAULT_MONITOR_INTERVAL_MS))
    }

    #[must_use]
    pub fn monitor_backoff(&self) -> Duration {
        let ms = self.monitor.as_ref().and_then(|m| m.backoff_ms);
        Duration::from_millis(ms.unwrap_or(DEFAULT_MONITOR_BACKOFF_MS))
    }

    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        let ms = self.launch.as_ref().and_then(|l| l.settle_delay_ms);
        Duration::from_millis(ms.unwrap_or(DEFAULT_SETTLE_DELAY_MS))
    }

    #[must_use]
    pub fn restricted_settle_delay(&self) -> Duration {
        let ms = self.launch.as_ref().and_then(|l| l.restricted_settle_delay_ms);
        Duration::from_millis(ms.unwrap_or(DEFAULT_RESTRICTED_SETTLE_DELAY_MS))
    }

    #[must_use]
    pub fn wake_delay(&self) -> Duration {
        let ms = self.launch.as_ref().and_then(|l| l.wake_delay_ms);
        Duration::from_millis(ms.unwrap_or(DEFAULT_WAKE_DELAY_MS))
    }

    #[must_use]
    pub fn recent_task_limit(&self) -> usize {
        self.launch
            .as_ref()
            .and_then(|l| l.recent_task_limit)
            .unwrap_or(DEFAULT_RECENT_TASK_LIMIT)
    }
}

/// `~/.deepfreeze`
#[must_use]
pub fn data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".deepfreeze"))
}

fn config_path() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join("config.toml"))
}
