//! Boundary to the remote vehicle-control API.
//!
//! The core never talks to sockets directly. It drives a [`RemoteApi`]
//! implementation ([`crate::transport::TcpRemote`] in production,
//! [`crate::harness::SimulatedRemote`] in tests and demos) through the
//! handful of operations below.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VesselId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlightId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(pub u64);

/// Frame a flight context reports its values in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceFrame {
    /// The vessel's own surface frame (attitude, position, altitudes).
    VesselSurface,
    /// The orbited body's rotating frame. Speed measured here is
    /// surface-relative rather than orbital.
    OrbitalBody,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    MeanAltitude,
    SurfaceAltitude,
    Speed,
    Heading,
    Pitch,
    Roll,
    Latitude,
    Longitude,
    Throttle,
    Lights,
    Gear,
    Brakes,
    Sas,
}

impl Attribute {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MeanAltitude => "mean_altitude",
            Self::SurfaceAltitude => "surface_altitude",
            Self::Speed => "speed",
            Self::Heading => "heading",
            Self::Pitch => "pitch",
            Self::Roll => "roll",
            Self::Latitude => "latitude",
            Self::Longitude => "longitude",
            Self::Throttle => "throttle",
            Self::Lights => "lights",
            Self::Gear => "gear",
            Self::Brakes => "brakes",
            Self::Sas => "sas",
        }
    }
}

/// Something a stream or a one-shot `get` can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum StreamTarget {
    Flight {
        flight: FlightId,
        attribute: Attribute,
    },
    Control {
        vessel: VesselId,
        attribute: Attribute,
    },
}

impl StreamTarget {
    #[must_use]
    pub fn attribute(&self) -> Attribute {
        match self {
            Self::Flight { attribute, .. } | Self::Control { attribute, .. } => *attribute,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoteValue {
    Bool(bool),
    Number(f64),
}

impl RemoteValue {
    #[must_use]
    pub fn as_f64(self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(value),
            Self::Bool(_) => None,
        }
    }

    #[must_use]
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Self::Bool(flag) => Some(flag),
            Self::Number(_) => None,
        }
    }
}

/// Writes and procedure calls issued against the active vessel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RemoteCall {
    Engage,
    Disengage,
    /// The attitude command is joint: pitch and heading always travel together.
    TargetPitchAndHeading { pitch: f64, heading: f64 },
    TargetRoll { roll: f64 },
    RotationSpeedMultiplier { value: f64 },
    MaxRotationSpeed { value: f64 },
    SetThrottle { value: f64 },
    SetLights { on: bool },
    SetGear { down: bool },
    SetBrakes { on: bool },
    SetSas { on: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub name: SmolStr,
    pub address: SmolStr,
    pub rpc_port: u16,
    pub stream_port: u16,
}

/// Entry point of a remote vehicle-control API.
pub trait RemoteApi {
    /// Performs exactly one connection attempt.
    fn connect(&self, request: &ConnectRequest) -> Result<Box<dyn RemoteHandle>, TransportError>;
}

/// An established connection to the remote API.
pub trait RemoteHandle: Send {
    fn active_vessel(&mut self) -> Result<VesselId, TransportError>;

    fn flight(
        &mut self,
        vessel: VesselId,
        frame: ReferenceFrame,
    ) -> Result<FlightId, TransportError>;

    fn add_stream(&mut self, target: StreamTarget) -> Result<StreamId, TransportError>;

    /// Reads every listed stream in one round trip. Either all values are
    /// returned, in order, or the whole read fails.
    fn read_streams(&mut self, ids: &[StreamId]) -> Result<Vec<RemoteValue>, TransportError>;

    fn get(&mut self, target: StreamTarget) -> Result<RemoteValue, TransportError>;

    fn call(&mut self, vessel: VesselId, call: &RemoteCall) -> Result<(), TransportError>;

    fn close(&mut self);
}
