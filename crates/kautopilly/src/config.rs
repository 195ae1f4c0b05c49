//! `kautopilly.toml` loading.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use smol_str::SmolStr;

use crate::autopilot::AutopilotTuning;
use crate::connection::Endpoint;
use crate::error::PilotError;

pub const DEFAULT_CONFIG_FILE: &str = "kautopilly.toml";
pub const DEFAULT_CLIENT_NAME: &str = "KautoPilly";
pub const DEFAULT_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_RPC_PORT: u16 = 50000;
pub const DEFAULT_STREAM_PORT: u16 = 50001;

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

#[derive(Debug, Clone, PartialEq)]
pub struct PilotConfig {
    pub connection: ConnectionConfig,
    pub autopilot: AutopilotTuning,
    pub console: ConsoleConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub name: SmolStr,
    pub endpoint: Endpoint,
    pub connect_timeout: Duration,
    pub io_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleConfig {
    pub refresh: Duration,
    /// Zero means tick as often as the remote answers.
    pub tick_interval: Duration,
    pub log_level: SmolStr,
    pub log_file: Option<PathBuf>,
}

impl Default for PilotConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig {
                name: SmolStr::new(DEFAULT_CLIENT_NAME),
                endpoint: Endpoint {
                    address: SmolStr::new(DEFAULT_ADDRESS),
                    rpc_port: DEFAULT_RPC_PORT,
                    stream_port: DEFAULT_STREAM_PORT,
                },
                connect_timeout: Duration::from_millis(3000),
                io_timeout: Duration::from_millis(5000),
            },
            autopilot: AutopilotTuning::default(),
            console: ConsoleConfig {
                refresh: Duration::from_millis(100),
                tick_interval: Duration::ZERO,
                log_level: SmolStr::new("info"),
                log_file: None,
            },
        }
    }
}

impl PilotConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PilotError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            PilotError::InvalidConfig(
                format!("{}: failed to read config: {err}", path.display()).into(),
            )
        })?;
        Self::from_toml_str(&text).map_err(|err| match err {
            PilotError::InvalidConfig(message) => {
                PilotError::InvalidConfig(format!("{}: {message}", path.display()).into())
            }
            other => other,
        })
    }

    /// Defaults when the file does not exist.
    pub fn load_optional(path: impl AsRef<Path>) -> Result<Self, PilotError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, PilotError> {
        let raw: PilotToml = toml::from_str(text)
            .map_err(|err| PilotError::InvalidConfig(format!("invalid config: {err}").into()))?;
        raw.into_config()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PilotToml {
    connection: Option<ConnectionSection>,
    autopilot: Option<AutopilotSection>,
    console: Option<ConsoleSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConnectionSection {
    name: Option<String>,
    address: Option<String>,
    rpc_port: Option<i64>,
    stream_port: Option<i64>,
    connect_timeout_ms: Option<u64>,
    io_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct AutopilotSection {
    rotation_speed_multiplier: Option<f64>,
    max_rotation_speed: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConsoleSection {
    refresh_ms: Option<u64>,
    tick_interval_ms: Option<u64>,
    log_level: Option<String>,
    log_file: Option<PathBuf>,
}

impl PilotToml {
    fn into_config(self) -> Result<PilotConfig, PilotError> {
        let defaults = PilotConfig::default();
        let connection = self.connection.unwrap_or_default();
        let autopilot = self.autopilot.unwrap_or_default();
        let console = self.console.unwrap_or_default();

        let endpoint = Endpoint::parse(
            connection
                .address
                .as_deref()
                .unwrap_or(defaults.connection.endpoint.address.as_str()),
            connection
                .rpc_port
                .unwrap_or(i64::from(defaults.connection.endpoint.rpc_port)),
            connection
                .stream_port
                .unwrap_or(i64::from(defaults.connection.endpoint.stream_port)),
        )
        .map_err(|err| PilotError::InvalidConfig(format!("connection: {err}").into()))?;
        let name = connection
            .name
            .map_or(defaults.connection.name, SmolStr::new);
        if name.trim().is_empty() {
            return Err(PilotError::InvalidConfig(
                "connection.name must not be empty".into(),
            ));
        }

        let tuning = AutopilotTuning {
            rotation_speed_multiplier: positive(
                "autopilot.rotation_speed_multiplier",
                autopilot.rotation_speed_multiplier,
                defaults.autopilot.rotation_speed_multiplier,
            )?,
            max_rotation_speed: positive(
                "autopilot.max_rotation_speed",
                autopilot.max_rotation_speed,
                defaults.autopilot.max_rotation_speed,
            )?,
        };

        let log_level = console
            .log_level
            .map_or(defaults.console.log_level, |level| {
                SmolStr::new(level.trim().to_ascii_lowercase())
            });
        if !LOG_LEVELS.contains(&log_level.as_str()) {
            return Err(PilotError::InvalidConfig(
                format!("invalid console.log_level '{log_level}'").into(),
            ));
        }

        Ok(PilotConfig {
            connection: ConnectionConfig {
                name,
                endpoint,
                connect_timeout: millis(
                    "connection.connect_timeout_ms",
                    connection.connect_timeout_ms,
                    defaults.connection.connect_timeout,
                )?,
                io_timeout: millis(
                    "connection.io_timeout_ms",
                    connection.io_timeout_ms,
                    defaults.connection.io_timeout,
                )?,
            },
            autopilot: tuning,
            console: ConsoleConfig {
                refresh: millis(
                    "console.refresh_ms",
                    console.refresh_ms,
                    defaults.console.refresh,
                )?,
                tick_interval: console
                    .tick_interval_ms
                    .map_or(defaults.console.tick_interval, Duration::from_millis),
                log_level,
                log_file: console.log_file,
            },
        })
    }
}

fn positive(key: &str, value: Option<f64>, default: f64) -> Result<f64, PilotError> {
    match value {
        None => Ok(default),
        Some(value) if value.is_finite() && value > 0.0 => Ok(value),
        Some(value) => Err(PilotError::InvalidConfig(
            format!("{key} must be > 0, got {value}").into(),
        )),
    }
}

fn millis(key: &str, value: Option<u64>, default: Duration) -> Result<Duration, PilotError> {
    match value {
        None => Ok(default),
        Some(0) => Err(PilotError::InvalidConfig(format!("{key} must be >= 1").into())),
        Some(value) => Ok(Duration::from_millis(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = PilotConfig::from_toml_str("").expect("parse empty config");
        assert_eq!(config, PilotConfig::default());
        assert_eq!(config.connection.endpoint.rpc_port, 50000);
        assert_eq!(config.connection.endpoint.stream_port, 50001);
        assert_eq!(config.connection.name, "KautoPilly");
    }

    #[test]
    fn sections_override_defaults() {
        let config = PilotConfig::from_toml_str(
            r#"
[connection]
address = "192.168.1.20"
rpc_port = 6000
stream_port = 6001
io_timeout_ms = 250

[autopilot]
max_rotation_speed = 4.5

[console]
refresh_ms = 50
tick_interval_ms = 20
log_level = "DEBUG"
log_file = "pilot.log"
"#,
        )
        .expect("parse config");
        assert_eq!(config.connection.endpoint.address, "192.168.1.20");
        assert_eq!(config.connection.endpoint.rpc_port, 6000);
        assert_eq!(config.connection.io_timeout, Duration::from_millis(250));
        assert_eq!(config.autopilot.max_rotation_speed, 4.5);
        assert_eq!(config.autopilot.rotation_speed_multiplier, 10.0);
        assert_eq!(config.console.tick_interval, Duration::from_millis(20));
        assert_eq!(config.console.log_level, "debug");
        assert_eq!(config.console.log_file, Some(PathBuf::from("pilot.log")));
    }

    #[test]
    fn invalid_values_are_rejected() {
        for text in [
            "[connection]\nrpc_port = 70000",
            "[connection]\naddress = \"\"",
            "[connection]\nio_timeout_ms = 0",
            "[autopilot]\nrotation_speed_multiplier = -1.0",
            "[console]\nlog_level = \"loud\"",
            "[console]\nunknown = 1",
        ] {
            let err = PilotConfig::from_toml_str(text).expect_err(text);
            assert!(matches!(err, PilotError::InvalidConfig(_)), "{text}: {err}");
        }
    }

    #[test]
    fn missing_file_is_optional() {
        let path = std::env::temp_dir().join("kautopilly-missing-config.toml");
        let _ = std::fs::remove_file(&path);
        let config = PilotConfig::load_optional(&path).expect("defaults");
        assert_eq!(config, PilotConfig::default());
    }
}
