mod cli;

use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use kautopilly::config::PilotConfig;
use kautopilly::logging::{init_logging, LogTarget};
use kautopilly::remote::RemoteApi;
use kautopilly::{ConnectionManager, Pilot, PilotCommand, SimulatedRemote, TcpRemote};
use tracing::debug;

use cli::{Cli, Command, TargetArgs};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Ui { target } => {
            let config = setup(&target, LogTarget::Sink)?;
            if target.simulate {
                kautopilly::ui::run_ui(SimulatedRemote::new().with_motion(), &config, "simulated")
            } else {
                kautopilly::ui::run_ui(tcp_remote(&config), &config, "tcp")
            }
        }
        Command::Monitor {
            target,
            count,
            every_ms,
        } => {
            let config = setup(&target, LogTarget::Stderr)?;
            let every = Duration::from_millis(every_ms);
            if target.simulate {
                monitor(SimulatedRemote::new().with_motion(), &config, count, every)
            } else {
                monitor(tcp_remote(&config), &config, count, every)
            }
        }
        Command::Probe { target } => {
            let config = setup(&target, LogTarget::Stderr)?;
            if target.simulate {
                probe(SimulatedRemote::new(), &config)
            } else {
                probe(tcp_remote(&config), &config)
            }
        }
    }
}

fn setup(target: &TargetArgs, log_target: LogTarget) -> anyhow::Result<PilotConfig> {
    let config = target.resolve()?;
    init_logging(
        &config.console.log_level,
        config.console.log_file.as_deref(),
        log_target,
    )?;
    debug!(?config, "configuration resolved");
    Ok(config)
}

fn tcp_remote(config: &PilotConfig) -> TcpRemote {
    TcpRemote::new(config.connection.connect_timeout, config.connection.io_timeout)
}

fn probe<A: RemoteApi>(api: A, config: &PilotConfig) -> anyhow::Result<()> {
    let mut manager = ConnectionManager::new(api, config.connection.name.clone());
    let session = manager.connect_endpoint(config.connection.endpoint.clone())?;
    let endpoint = session.endpoint();
    println!(
        "connected to {}:{} (stream port {}), active vessel {}",
        endpoint.address,
        endpoint.rpc_port,
        endpoint.stream_port,
        session.vessel().0
    );
    manager.disconnect();
    Ok(())
}

fn monitor<A: RemoteApi>(
    api: A,
    config: &PilotConfig,
    count: Option<u64>,
    every: Duration,
) -> anyhow::Result<()> {
    let endpoint = &config.connection.endpoint;
    let mut pilot = Pilot::new(api, config.connection.name.clone(), config.autopilot);
    pilot.apply(PilotCommand::Connect {
        address: endpoint.address.clone(),
        rpc_port: i64::from(endpoint.rpc_port),
        stream_port: i64::from(endpoint.stream_port),
    })?;

    let mut printed = 0_u64;
    let mut last_print: Option<Instant> = None;
    let result = loop {
        if count.is_some_and(|limit| printed >= limit) {
            break Ok(());
        }
        let snapshot = match pilot.tick() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => break Ok(()),
            Err(err) => break Err(err),
        };
        if last_print.map_or(true, |at| at.elapsed() >= every) {
            let view = pilot.view();
            println!(
                "{:>6}  alt {:>9.1} m  spd {:>7.1} m/s  hdg {:>5.1}  pit {:>5.1}  rol {:>6.1}  {}  {}  thr {:.2}",
                view.ticks,
                snapshot.altitude,
                snapshot.speed,
                snapshot.heading,
                snapshot.pitch,
                snapshot.roll,
                snapshot.latitude_dms(),
                snapshot.longitude_dms(),
                view.controls.throttle,
            );
            printed += 1;
            last_print = Some(Instant::now());
        }
        if !config.console.tick_interval.is_zero() {
            thread::sleep(config.console.tick_interval);
        }
    };
    pilot.shutdown();
    result.map_err(anyhow::Error::from)
}
