//! The cooperative control loop.
//!
//! One [`Pilot`] owns the connection, the synchronizer, the autopilot
//! dispatcher and the throttle reconciler. Operator intent arrives as
//! [`PilotCommand`]s and is applied immediately; observers learn about every
//! change through [`PilotEvent`]s. Only one tick is ever in flight.

#![allow(missing_docs)]

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use smol_str::SmolStr;
use tracing::{debug, info, warn};

use crate::autopilot::{AutopilotDispatcher, AutopilotTuning};
use crate::connection::{ConnectionManager, Session};
use crate::error::PilotError;
use crate::reconcile::ThrottleReconciler;
use crate::remote::RemoteApi;
use crate::sync::StreamSynchronizer;
use crate::telemetry::{ConnectionState, ControlState, ModelView, TelemetryModel, TelemetrySnapshot};

/// A setpoint entered and confirmed by the operator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Setpoint {
    Heading(f64),
    Pitch(f64),
    Roll(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PilotCommand {
    Connect {
        address: SmolStr,
        rpc_port: i64,
        stream_port: i64,
    },
    Disconnect,
    SetTargetHeading(f64),
    SetTargetPitch(f64),
    SetTargetRoll(f64),
    /// Sets a target and engages the autopilot.
    SubmitSetpoint(Setpoint),
    SetAutopilotEngaged(bool),
    SetThrottle(f64),
    SetLights(bool),
    SetGear(bool),
    SetBrakes(bool),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PilotEvent {
    StateChanged(ConnectionState),
    Model(ModelView),
    /// A connect attempt failed or a live session was lost.
    ConnectionFailed { reason: SmolStr },
    /// A command was refused without touching the session.
    CommandRejected { reason: SmolStr },
}

pub struct Pilot<A> {
    connection: ConnectionManager<A>,
    sync: StreamSynchronizer,
    autopilot: AutopilotDispatcher,
    throttle: ThrottleReconciler,
    model: TelemetryModel,
    events: Option<Sender<PilotEvent>>,
}

impl<A: RemoteApi> Pilot<A> {
    pub fn new(api: A, client_name: impl Into<SmolStr>, tuning: AutopilotTuning) -> Self {
        Self {
            connection: ConnectionManager::new(api, client_name),
            sync: StreamSynchronizer::new(),
            autopilot: AutopilotDispatcher::new(tuning),
            throttle: ThrottleReconciler::new(ControlState::default().throttle),
            model: TelemetryModel::new(),
            events: None,
        }
    }

    #[must_use]
    pub fn with_events(mut self, events: Sender<PilotEvent>) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub fn state(&self) -> &ConnectionState {
        self.model.state()
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.connection.session()
    }

    #[must_use]
    pub fn view(&self) -> ModelView {
        let controls = self.autopilot.controls();
        ModelView {
            state: self.model.state().clone(),
            snapshot: self.model.snapshot().copied(),
            ticks: self.model.ticks(),
            autopilot: self.autopilot.target(),
            controls: ControlState {
                throttle: self.throttle.displayed(),
                lights: controls.lights,
                gear: controls.gear,
                brakes: controls.brakes,
            },
            throttle_pending: self.throttle.is_pending(),
        }
    }

    /// Applies one operator command right away.
    ///
    /// Failures are also reported as events; a lost session moves the
    /// connection to `Failed` before this returns.
    pub fn apply(&mut self, command: PilotCommand) -> Result<(), PilotError> {
        debug!(?command, "operator command");
        let result = self.dispatch(command);
        if let Err(err) = &result {
            self.report(err);
        }
        self.flush_transitions();
        self.publish_model();
        result
    }

    /// Runs one tick when connected. Returns the published snapshot, or
    /// `None` when there is no session to read from.
    pub fn tick(&mut self) -> Result<Option<TelemetrySnapshot>, PilotError> {
        let Some(session) = self.connection.session_mut() else {
            return Ok(None);
        };
        let result = self.sync.tick(session);
        match result {
            Ok(reading) => {
                self.throttle.observe(reading.remote_throttle);
                self.model.publish(reading.snapshot);
                self.publish_model();
                Ok(Some(reading.snapshot))
            }
            Err(err) => {
                self.report(&err);
                self.flush_transitions();
                self.publish_model();
                Err(err)
            }
        }
    }

    /// Drives the loop until `Shutdown` arrives or every sender is gone.
    ///
    /// Pending commands are applied before the next tick starts. While
    /// disconnected the loop sleeps on the command channel.
    pub fn run(mut self, commands: &Receiver<PilotCommand>, tick_interval: Duration) {
        info!("pilot loop started");
        let mut next_tick = Instant::now();
        loop {
            let received = if self.model.state().is_connected() {
                match commands.recv_deadline(next_tick) {
                    Ok(command) => Some(command),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            } else {
                match commands.recv() {
                    Ok(command) => Some(command),
                    Err(_) => break,
                }
            };
            match received {
                Some(PilotCommand::Shutdown) => break,
                Some(command) => {
                    let _ = self.apply(command);
                }
                None => {
                    let _ = self.tick();
                    next_tick = Instant::now() + tick_interval;
                }
            }
        }
        self.shutdown();
        info!("pilot loop stopped");
    }

    /// Closes any open session.
    pub fn shutdown(&mut self) {
        self.connection.disconnect();
        self.sync.reset();
        self.flush_transitions();
    }

    fn dispatch(&mut self, command: PilotCommand) -> Result<(), PilotError> {
        match command {
            PilotCommand::Connect {
                address,
                rpc_port,
                stream_port,
            } => self.connect(&address, rpc_port, stream_port),
            PilotCommand::Disconnect | PilotCommand::Shutdown => {
                self.shutdown();
                Ok(())
            }
            PilotCommand::SetThrottle(value) => {
                let session = open_session(&mut self.connection)?;
                self.throttle.command(session, value).map(|_| ())
            }
            PilotCommand::SetTargetHeading(value) => {
                let session = open_session(&mut self.connection)?;
                self.autopilot.set_target_heading(session, value)
            }
            PilotCommand::SetTargetPitch(value) => {
                let session = open_session(&mut self.connection)?;
                self.autopilot.set_target_pitch(session, value)
            }
            PilotCommand::SetTargetRoll(value) => {
                let session = open_session(&mut self.connection)?;
                self.autopilot.set_target_roll(session, value)
            }
            PilotCommand::SubmitSetpoint(setpoint) => {
                let session = open_session(&mut self.connection)?;
                match setpoint {
                    Setpoint::Heading(value) => self.autopilot.set_target_heading(session, value)?,
                    Setpoint::Pitch(value) => self.autopilot.set_target_pitch(session, value)?,
                    Setpoint::Roll(value) => self.autopilot.set_target_roll(session, value)?,
                }
                self.autopilot.set_engaged(session, true)
            }
            PilotCommand::SetAutopilotEngaged(engaged) => {
                let session = open_session(&mut self.connection)?;
                self.autopilot.set_engaged(session, engaged)
            }
            PilotCommand::SetLights(on) => {
                let session = open_session(&mut self.connection)?;
                self.autopilot.set_lights(session, on)
            }
            PilotCommand::SetGear(down) => {
                let session = open_session(&mut self.connection)?;
                self.autopilot.set_gear(session, down)
            }
            PilotCommand::SetBrakes(on) => {
                let session = open_session(&mut self.connection)?;
                self.autopilot.set_brakes(session, on)
            }
        }
    }

    fn connect(&mut self, address: &str, rpc_port: i64, stream_port: i64) -> Result<(), PilotError> {
        self.sync.reset();
        let session = self.connection.connect(address, rpc_port, stream_port)?;
        self.sync.register_session(session)?;
        let reading = self.sync.tick(session)?;
        self.autopilot.initialize(session, &reading.snapshot)?;
        self.throttle.reset(reading.remote_throttle);
        self.model.publish(reading.snapshot);
        Ok(())
    }

    fn report(&mut self, err: &PilotError) {
        if err.is_session_fatal() {
            self.connection.fail(err);
            self.sync.reset();
            self.emit(PilotEvent::ConnectionFailed {
                reason: SmolStr::new(err.to_string()),
            });
        } else if err.is_connect_failure() {
            self.emit(PilotEvent::ConnectionFailed {
                reason: SmolStr::new(err.to_string()),
            });
        } else {
            warn!(error = %err, "command rejected");
            self.emit(PilotEvent::CommandRejected {
                reason: SmolStr::new(err.to_string()),
            });
        }
    }

    fn flush_transitions(&mut self) {
        for state in self.connection.drain_transitions() {
            if self.model.set_state(state.clone()) {
                self.emit(PilotEvent::StateChanged(state));
            }
        }
    }

    fn publish_model(&self) {
        let Some(events) = &self.events else {
            return;
        };
        // Views are superseded by the next one; drop rather than block.
        if let Err(TrySendError::Full(_)) = events.try_send(PilotEvent::Model(self.view())) {
            debug!("event channel full, model view dropped");
        }
    }

    fn emit(&self, event: PilotEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

fn open_session<A: RemoteApi>(
    connection: &mut ConnectionManager<A>,
) -> Result<&mut Session, PilotError> {
    connection
        .session_mut()
        .filter(|session| session.is_open())
        .ok_or(PilotError::NotConnected)
}
