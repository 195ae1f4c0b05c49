//! In-process remote vessel for tests and offline demos.
//!
//! [`SimulatedRemote`] implements [`RemoteApi`] against a shared, inspectable
//! vessel model. Tests use it to script remote behavior (refused connections,
//! lagging throttle writes, dropped links) and to assert on the exact calls
//! the core issued. With motion enabled it also flies a crude kinematic model
//! so the console has something to show without a real server.

#![allow(missing_docs)]

use std::io;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use smol_str::SmolStr;

use crate::error::TransportError;
use crate::remote::{
    Attribute, ConnectRequest, FlightId, ReferenceFrame, RemoteApi, RemoteCall, RemoteHandle,
    RemoteValue, StreamId, StreamTarget, VesselId,
};

const VESSEL: VesselId = VesselId(1);
// Equatorial rotation speed of the body; what an inertial-frame speed reads at rest.
const BODY_ROTATION_SPEED: f64 = 174.94;
const METERS_PER_DEGREE: f64 = 10_471.0;

/// Live state of the simulated vessel.
#[derive(Debug, Clone, PartialEq)]
pub struct VesselModel {
    pub altitude: f64,
    pub surface_altitude: f64,
    /// Speed relative to the surface.
    pub surface_speed: f64,
    pub heading: f64,
    pub pitch: f64,
    pub roll: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub throttle: f64,
    pub lights: bool,
    pub gear: bool,
    pub brakes: bool,
    pub sas: bool,
    pub autopilot_engaged: bool,
    pub target_pitch: f64,
    pub target_heading: f64,
    pub target_roll: f64,
    pub rotation_speed_multiplier: f64,
    pub max_rotation_speed: f64,
}

impl Default for VesselModel {
    fn default() -> Self {
        Self {
            altitude: 75.2,
            surface_altitude: 4.8,
            surface_speed: 0.0,
            heading: 90.4,
            pitch: 0.7,
            roll: -0.3,
            latitude: -0.0486,
            longitude: -74.7244,
            throttle: 0.0,
            lights: false,
            gear: true,
            brakes: true,
            sas: false,
            autopilot_engaged: false,
            target_pitch: 0.0,
            target_heading: 0.0,
            target_roll: 0.0,
            rotation_speed_multiplier: 1.0,
            max_rotation_speed: 1.0,
        }
    }
}

impl VesselModel {
    fn flight_value(&self, frame: ReferenceFrame, attribute: Attribute) -> Option<f64> {
        let value = match attribute {
            Attribute::MeanAltitude => self.altitude,
            Attribute::SurfaceAltitude => self.surface_altitude,
            Attribute::Speed => match frame {
                ReferenceFrame::OrbitalBody => self.surface_speed,
                ReferenceFrame::VesselSurface => self.surface_speed + BODY_ROTATION_SPEED,
            },
            Attribute::Heading => self.heading,
            Attribute::Pitch => self.pitch,
            Attribute::Roll => self.roll,
            Attribute::Latitude => self.latitude,
            Attribute::Longitude => self.longitude,
            _ => return None,
        };
        Some(value)
    }

    fn control_value(&self, attribute: Attribute) -> Option<RemoteValue> {
        let value = match attribute {
            Attribute::Throttle => RemoteValue::Number(self.throttle),
            Attribute::Lights => RemoteValue::Bool(self.lights),
            Attribute::Gear => RemoteValue::Bool(self.gear),
            Attribute::Brakes => RemoteValue::Bool(self.brakes),
            Attribute::Sas => RemoteValue::Bool(self.sas),
            _ => return None,
        };
        Some(value)
    }

    fn advance(&mut self, dt: f64) {
        if self.autopilot_engaged {
            let rate = (self.max_rotation_speed * 3.0).max(1.0) * dt;
            self.heading = approach_angle(self.heading, self.target_heading, rate);
            self.pitch = approach(self.pitch, self.target_pitch, rate);
            self.roll = approach(self.roll, self.target_roll, rate);
        }
        let drag = if self.brakes { 12.0 } else { 2.0 };
        let accel = self.throttle * 25.0 - drag * (self.surface_speed / 100.0).max(0.1);
        self.surface_speed = (self.surface_speed + accel * dt).max(0.0);
        let climb = self.surface_speed * self.pitch.to_radians().sin() * dt;
        self.altitude = (self.altitude + climb).max(self.altitude - self.surface_altitude);
        self.surface_altitude = (self.surface_altitude + climb).max(0.0);
        let travel = self.surface_speed * self.pitch.to_radians().cos() * dt / METERS_PER_DEGREE;
        self.latitude += travel * self.heading.to_radians().cos();
        self.longitude += travel * self.heading.to_radians().sin();
    }
}

fn approach(current: f64, target: f64, step: f64) -> f64 {
    let delta = target - current;
    if delta.abs() <= step {
        target
    } else {
        current + step.copysign(delta)
    }
}

fn approach_angle(current: f64, target: f64, step: f64) -> f64 {
    let delta = (target - current + 540.0).rem_euclid(360.0) - 180.0;
    (current + delta.clamp(-step, step)).rem_euclid(360.0)
}

#[derive(Debug, Default)]
struct SimState {
    vessel: VesselModel,
    calls: Vec<RemoteCall>,
    flights: Vec<ReferenceFrame>,
    streams: Vec<StreamTarget>,
    stream_reads: usize,
    connect_attempts: usize,
    closed_handles: usize,
    last_client_name: Option<SmolStr>,
    refuse: bool,
    connect_error: Option<SmolStr>,
    link_down: bool,
    defer_throttle: bool,
    pending_throttle: Option<f64>,
    no_vessel: bool,
    motion: Option<Instant>,
}

impl SimState {
    fn apply(&mut self, call: RemoteCall) {
        let vessel = &mut self.vessel;
        match call {
            RemoteCall::Engage => vessel.autopilot_engaged = true,
            RemoteCall::Disengage => vessel.autopilot_engaged = false,
            RemoteCall::TargetPitchAndHeading { pitch, heading } => {
                vessel.target_pitch = pitch;
                vessel.target_heading = heading;
            }
            RemoteCall::TargetRoll { roll } => vessel.target_roll = roll,
            RemoteCall::RotationSpeedMultiplier { value } => {
                vessel.rotation_speed_multiplier = value;
            }
            RemoteCall::MaxRotationSpeed { value } => vessel.max_rotation_speed = value,
            RemoteCall::SetThrottle { value } => {
                if self.defer_throttle {
                    self.pending_throttle = Some(value);
                } else {
                    vessel.throttle = value;
                }
            }
            RemoteCall::SetLights { on } => vessel.lights = on,
            RemoteCall::SetGear { down } => vessel.gear = down,
            RemoteCall::SetBrakes { on } => vessel.brakes = on,
            RemoteCall::SetSas { on } => vessel.sas = on,
        }
        self.calls.push(call);
    }

    fn read(&self, target: StreamTarget) -> Result<RemoteValue, TransportError> {
        let value = match target {
            StreamTarget::Flight { flight, attribute } => {
                let frame = usize::try_from(flight.0)
                    .ok()
                    .and_then(|index| self.flights.get(index))
                    .copied()
                    .ok_or_else(|| TransportError::Rejected("unknown flight".into()))?;
                self.vessel
                    .flight_value(frame, attribute)
                    .map(RemoteValue::Number)
            }
            StreamTarget::Control { attribute, .. } => self.vessel.control_value(attribute),
        };
        value.ok_or_else(|| {
            TransportError::Rejected(
                format!("attribute {} not available", target.attribute().as_str()).into(),
            )
        })
    }
}

/// Shared handle to a simulated vessel; clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct SimulatedRemote {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedRemote {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Integrates the kinematic model on every stream read using wall time.
    #[must_use]
    pub fn with_motion(self) -> Self {
        self.state.lock().motion = Some(Instant::now());
        self
    }

    #[must_use]
    pub fn vessel(&self) -> VesselModel {
        self.state.lock().vessel.clone()
    }

    pub fn update_vessel(&self, update: impl FnOnce(&mut VesselModel)) {
        update(&mut self.state.lock().vessel);
    }

    #[must_use]
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    #[must_use]
    pub fn streams(&self) -> Vec<StreamTarget> {
        self.state.lock().streams.clone()
    }

    #[must_use]
    pub fn flight_frames(&self) -> Vec<ReferenceFrame> {
        self.state.lock().flights.clone()
    }

    #[must_use]
    pub fn stream_reads(&self) -> usize {
        self.state.lock().stream_reads
    }

    #[must_use]
    pub fn connect_attempts(&self) -> usize {
        self.state.lock().connect_attempts
    }

    #[must_use]
    pub fn closed_handles(&self) -> usize {
        self.state.lock().closed_handles
    }

    #[must_use]
    pub fn last_client_name(&self) -> Option<SmolStr> {
        self.state.lock().last_client_name.clone()
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.state.lock().refuse = refuse;
    }

    pub fn fail_connections_with(&self, message: &str) {
        self.state.lock().connect_error = Some(SmolStr::new(message));
    }

    pub fn without_active_vessel(&self) {
        self.state.lock().no_vessel = true;
    }

    /// Every open handle starts failing with a reset error.
    pub fn drop_link(&self) {
        self.state.lock().link_down = true;
    }

    pub fn restore_link(&self) {
        self.state.lock().link_down = false;
    }

    /// Holds throttle writes until [`Self::apply_pending_throttle`] runs,
    /// like a remote that has not caught up yet.
    pub fn defer_throttle_writes(&self, defer: bool) {
        self.state.lock().defer_throttle = defer;
    }

    pub fn apply_pending_throttle(&self) {
        let mut state = self.state.lock();
        if let Some(value) = state.pending_throttle.take() {
            state.vessel.throttle = value;
        }
    }
}

impl RemoteApi for SimulatedRemote {
    fn connect(&self, request: &ConnectRequest) -> Result<Box<dyn RemoteHandle>, TransportError> {
        let mut state = self.state.lock();
        state.connect_attempts += 1;
        state.last_client_name = Some(request.name.clone());
        if state.refuse {
            return Err(TransportError::Refused(
                format!("{}:{}", request.address, request.rpc_port).into(),
            ));
        }
        if let Some(message) = state.connect_error.clone() {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::Other,
                message.as_str(),
            )));
        }
        state.link_down = false;
        Ok(Box::new(SimulatedHandle {
            state: self.state.clone(),
            closed: false,
        }))
    }
}

struct SimulatedHandle {
    state: Arc<Mutex<SimState>>,
    closed: bool,
}

impl SimulatedHandle {
    fn live(&self) -> Result<parking_lot::MutexGuard<'_, SimState>, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        let state = self.state.lock();
        if state.link_down {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )));
        }
        Ok(state)
    }
}

impl RemoteHandle for SimulatedHandle {
    fn active_vessel(&mut self) -> Result<VesselId, TransportError> {
        let state = self.live()?;
        if state.no_vessel {
            return Err(TransportError::Rejected("no active vessel".into()));
        }
        Ok(VESSEL)
    }

    fn flight(
        &mut self,
        vessel: VesselId,
        frame: ReferenceFrame,
    ) -> Result<FlightId, TransportError> {
        let mut state = self.live()?;
        if vessel != VESSEL {
            return Err(TransportError::Rejected("unknown vessel".into()));
        }
        state.flights.push(frame);
        Ok(FlightId(state.flights.len() as u64 - 1))
    }

    fn add_stream(&mut self, target: StreamTarget) -> Result<StreamId, TransportError> {
        let mut state = self.live()?;
        state.read(target)?;
        state.streams.push(target);
        Ok(StreamId(state.streams.len() as u64 - 1))
    }

    fn read_streams(&mut self, ids: &[StreamId]) -> Result<Vec<RemoteValue>, TransportError> {
        let mut state = self.live()?;
        if let Some(last) = state.motion {
            let now = Instant::now();
            let dt = now.duration_since(last).as_secs_f64().min(0.5);
            state.motion = Some(now);
            state.vessel.advance(dt);
        }
        state.stream_reads += 1;
        ids.iter()
            .map(|id| {
                let target = usize::try_from(id.0)
                    .ok()
                    .and_then(|index| state.streams.get(index))
                    .copied()
                    .ok_or_else(|| {
                        TransportError::Rejected(format!("unknown stream {}", id.0).into())
                    })?;
                state.read(target)
            })
            .collect()
    }

    fn get(&mut self, target: StreamTarget) -> Result<RemoteValue, TransportError> {
        self.live()?.read(target)
    }

    fn call(&mut self, vessel: VesselId, call: &RemoteCall) -> Result<(), TransportError> {
        let mut state = self.live()?;
        if vessel != VESSEL {
            return Err(TransportError::Rejected("unknown vessel".into()));
        }
        state.apply(*call);
        Ok(())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.state.lock().closed_handles += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_depends_on_reference_frame() {
        let model = VesselModel {
            surface_speed: 50.0,
            ..VesselModel::default()
        };
        assert_eq!(
            model.flight_value(ReferenceFrame::OrbitalBody, Attribute::Speed),
            Some(50.0)
        );
        assert_eq!(
            model.flight_value(ReferenceFrame::VesselSurface, Attribute::Speed),
            Some(50.0 + BODY_ROTATION_SPEED)
        );
    }

    #[test]
    fn engaged_autopilot_turns_the_short_way_round() {
        let mut model = VesselModel {
            heading: 350.0,
            target_heading: 10.0,
            autopilot_engaged: true,
            max_rotation_speed: 10.0,
            ..VesselModel::default()
        };
        model.advance(0.1);
        assert!((model.heading - 353.0).abs() < 1e-9, "heading {}", model.heading);
    }

    #[test]
    fn deferred_throttle_lands_on_request() {
        let remote = SimulatedRemote::new();
        remote.defer_throttle_writes(true);
        let mut state = remote.state.lock();
        state.apply(RemoteCall::SetThrottle { value: 0.8 });
        assert_eq!(state.vessel.throttle, 0.0);
        drop(state);
        remote.apply_pending_throttle();
        assert_eq!(remote.vessel().throttle, 0.8);
    }
}
