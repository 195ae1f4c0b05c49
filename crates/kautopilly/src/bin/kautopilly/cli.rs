use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use kautopilly::config::{PilotConfig, DEFAULT_CONFIG_FILE};
use kautopilly::Endpoint;

#[derive(Parser, Debug)]
#[command(name = "kautopilly")]
#[command(version, about = "Live autopilot console for a remotely simulated vessel", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Interactive terminal console.
    Ui {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Print telemetry lines to stdout.
    Monitor {
        #[command(flatten)]
        target: TargetArgs,
        /// Stop after this many lines.
        #[arg(long)]
        count: Option<u64>,
        /// Minimum spacing between printed lines.
        #[arg(long, default_value_t = 1000)]
        every_ms: u64,
    },
    /// Make one connection attempt and report the outcome.
    Probe {
        #[command(flatten)]
        target: TargetArgs,
    },
}

#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Config file (defaults to ./kautopilly.toml when present).
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub address: Option<String>,
    #[arg(long, allow_negative_numbers = true)]
    pub rpc_port: Option<i64>,
    #[arg(long, allow_negative_numbers = true)]
    pub stream_port: Option<i64>,
    /// Fly the built-in simulated vessel instead of a remote server.
    #[arg(long, default_value_t = false)]
    pub simulate: bool,
}

impl TargetArgs {
    /// Loads the config file and applies command-line overrides.
    pub fn resolve(&self) -> anyhow::Result<PilotConfig> {
        let mut config = match self.config.as_ref() {
            Some(path) => PilotConfig::load(path)?,
            None => PilotConfig::load_optional(DEFAULT_CONFIG_FILE)?,
        };
        let current = &config.connection.endpoint;
        let endpoint = Endpoint::parse(
            self.address.as_deref().unwrap_or(current.address.as_str()),
            self.rpc_port.unwrap_or(i64::from(current.rpc_port)),
            self.stream_port.unwrap_or(i64::from(current.stream_port)),
        )
        .context("invalid connection flags")?;
        config.connection.endpoint = endpoint;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "kautopilly",
            "monitor",
            "--address",
            "10.0.0.9",
            "--rpc-port",
            "6000",
            "--count",
            "3",
        ]);
        let Command::Monitor {
            target,
            count,
            every_ms,
        } = cli.command
        else {
            panic!("expected monitor");
        };
        assert_eq!(count, Some(3));
        assert_eq!(every_ms, 1000);
        let config = target.resolve().expect("resolve");
        assert_eq!(config.connection.endpoint.address, "10.0.0.9");
        assert_eq!(config.connection.endpoint.rpc_port, 6000);
        assert_eq!(config.connection.endpoint.stream_port, 50001);
    }

    #[test]
    fn out_of_range_port_is_rejected() {
        let cli = Cli::parse_from(["kautopilly", "probe", "--rpc-port", "-5"]);
        let Command::Probe { target } = cli.command else {
            panic!("expected probe");
        };
        let err = target.resolve().expect_err("negative port");
        assert!(format!("{err:#}").contains("out of range"));
    }
}
