//! Local mirror of the remote vessel state.

#![allow(missing_docs)]

use smol_str::SmolStr;

use crate::coords::{latitude_dms, longitude_dms, Dms};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed(SmolStr),
}

impl ConnectionState {
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Failed(_) => "failed",
        }
    }
}

/// One consistent set of readings taken during a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TelemetrySnapshot {
    /// Altitude above mean sea level, meters.
    pub altitude: f64,
    /// Altitude above the terrain, meters.
    pub surface_altitude: f64,
    /// Surface-relative speed, m/s.
    pub speed: f64,
    pub heading: f64,
    pub pitch: f64,
    pub roll: f64,
    pub latitude: f64,
    pub longitude: f64,
}

impl TelemetrySnapshot {
    #[must_use]
    pub fn latitude_dms(&self) -> Dms<'static> {
        latitude_dms(self.latitude)
    }

    #[must_use]
    pub fn longitude_dms(&self) -> Dms<'static> {
        longitude_dms(self.longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutopilotTarget {
    pub heading: f64,
    pub pitch: f64,
    pub roll: f64,
    pub engaged: bool,
}

impl Default for AutopilotTarget {
    fn default() -> Self {
        Self {
            heading: 90.0,
            pitch: 0.0,
            roll: 0.0,
            engaged: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlState {
    /// 0.0 to 1.0. Displayed value, see [`crate::reconcile`].
    pub throttle: f64,
    pub lights: bool,
    pub gear: bool,
    pub brakes: bool,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            throttle: 0.5,
            lights: false,
            gear: true,
            brakes: false,
        }
    }
}

/// Read-only copy of the model handed to observers.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelView {
    pub state: ConnectionState,
    pub snapshot: Option<TelemetrySnapshot>,
    pub ticks: u64,
    pub autopilot: AutopilotTarget,
    pub controls: ControlState,
    pub throttle_pending: bool,
}

/// Single-writer store owned by the pilot loop.
#[derive(Debug, Clone)]
pub struct TelemetryModel {
    state: ConnectionState,
    snapshot: Option<TelemetrySnapshot>,
    ticks: u64,
}

impl Default for TelemetryModel {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryModel {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            snapshot: None,
            ticks: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn set_state(&mut self, state: ConnectionState) -> bool {
        if self.state == state {
            return false;
        }
        self.state = state;
        true
    }

    /// Last published snapshot. Survives session loss.
    #[must_use]
    pub fn snapshot(&self) -> Option<&TelemetrySnapshot> {
        self.snapshot.as_ref()
    }

    /// Number of snapshots published so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn publish(&mut self, snapshot: TelemetrySnapshot) {
        self.snapshot = Some(snapshot);
        self.ticks = self.ticks.saturating_add(1);
    }
}
