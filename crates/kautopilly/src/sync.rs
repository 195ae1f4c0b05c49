//! Per-tick telemetry synchronization.
//!
//! A session gets a fixed [`SubscriptionSet`]: one stream per telemetry field
//! plus the current throttle. Each tick reads all of them in one batched call
//! and either yields a complete [`TickReading`] or fails as a whole.

#![allow(missing_docs)]

use tracing::{debug, trace};

use crate::connection::Session;
use crate::error::PilotError;
use crate::remote::{Attribute, FlightId, ReferenceFrame, RemoteValue, StreamId, StreamTarget};
use crate::telemetry::TelemetrySnapshot;

/// Order of the streams inside a batched read.
const FLIGHT_FIELDS: [Attribute; 8] = [
    Attribute::MeanAltitude,
    Attribute::SurfaceAltitude,
    Attribute::Speed,
    Attribute::Heading,
    Attribute::Pitch,
    Attribute::Roll,
    Attribute::Latitude,
    Attribute::Longitude,
];

/// Flight contexts and stream ids opened for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSet {
    pub flight: FlightId,
    /// Flight context in the orbited body's frame, used for ground speed.
    pub surface_flight: FlightId,
    /// Stream ids in [`FLIGHT_FIELDS`] order followed by the throttle stream.
    streams: Vec<StreamId>,
}

impl SubscriptionSet {
    #[must_use]
    pub fn stream_ids(&self) -> &[StreamId] {
        &self.streams
    }
}

/// Everything one tick observed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReading {
    pub snapshot: TelemetrySnapshot,
    pub remote_throttle: f64,
}

#[derive(Debug, Default)]
pub struct StreamSynchronizer {
    subscriptions: Option<SubscriptionSet>,
}

impl StreamSynchronizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves the vessel's flight contexts and opens every stream.
    pub fn register_session(
        &mut self,
        session: &mut Session,
    ) -> Result<SubscriptionSet, PilotError> {
        self.subscriptions = None;
        let flight = session.flight(ReferenceFrame::VesselSurface)?;
        let surface_flight = session.flight(ReferenceFrame::OrbitalBody)?;
        let mut streams = Vec::with_capacity(FLIGHT_FIELDS.len() + 1);
        for attribute in FLIGHT_FIELDS {
            // Ground speed is only meaningful relative to the rotating surface.
            let source = if attribute == Attribute::Speed {
                surface_flight
            } else {
                flight
            };
            streams.push(session.add_stream(StreamTarget::Flight {
                flight: source,
                attribute,
            })?);
        }
        streams.push(session.add_stream(StreamTarget::Control {
            vessel: session.vessel(),
            attribute: Attribute::Throttle,
        })?);
        let set = SubscriptionSet {
            flight,
            surface_flight,
            streams,
        };
        debug!(streams = set.streams.len(), "registered telemetry streams");
        self.subscriptions = Some(set.clone());
        Ok(set)
    }

    /// Reads every subscription as one unit.
    pub fn tick(&self, session: &mut Session) -> Result<TickReading, PilotError> {
        let Some(set) = self.subscriptions.as_ref() else {
            return Err(PilotError::SessionLost("no telemetry streams registered".into()));
        };
        let values = session.read_streams(set.stream_ids())?;
        let reading = assemble(&values)?;
        trace!(?reading, "tick");
        Ok(reading)
    }

    pub fn reset(&mut self) {
        self.subscriptions = None;
    }
}

fn assemble(values: &[RemoteValue]) -> Result<TickReading, PilotError> {
    let number = |index: usize| -> Result<f64, PilotError> {
        let attribute = FLIGHT_FIELDS
            .get(index)
            .copied()
            .unwrap_or(Attribute::Throttle);
        values
            .get(index)
            .and_then(|value| value.as_f64())
            .ok_or_else(|| {
                PilotError::SessionLost(
                    format!("stream {} returned no number", attribute.as_str()).into(),
                )
            })
    };
    Ok(TickReading {
        snapshot: TelemetrySnapshot {
            altitude: number(0)?,
            surface_altitude: number(1)?,
            speed: number(2)?,
            heading: number(3)?,
            pitch: number(4)?,
            roll: number(5)?,
            latitude: number(6)?,
            longitude: number(7)?,
        },
        remote_throttle: number(FLIGHT_FIELDS.len())?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionManager;
    use crate::harness::SimulatedRemote;

    #[test]
    fn assemble_rejects_non_numeric_values() {
        let mut values = vec![RemoteValue::Number(1.0); 9];
        assert!(assemble(&values).is_ok());
        values[4] = RemoteValue::Bool(true);
        let err = assemble(&values).expect_err("bool pitch");
        assert!(err.to_string().contains("pitch"));
        values.truncate(8);
        values[4] = RemoteValue::Number(1.0);
        let err = assemble(&values).expect_err("missing throttle");
        assert!(err.to_string().contains("throttle"));
    }

    #[test]
    fn tick_without_registration_fails() {
        let remote = SimulatedRemote::new();
        let mut manager = ConnectionManager::new(remote, "test");
        let session = manager.connect("127.0.0.1", 50000, 50001).expect("connect");
        let sync = StreamSynchronizer::new();
        assert!(matches!(
            sync.tick(session),
            Err(PilotError::SessionLost(_))
        ));
    }

    #[test]
    fn speed_stream_uses_orbital_body_frame() {
        let remote = SimulatedRemote::new();
        remote.update_vessel(|vessel| vessel.surface_speed = 42.0);
        let mut manager = ConnectionManager::new(remote.clone(), "test");
        let session = manager.connect("127.0.0.1", 50000, 50001).expect("connect");
        let mut sync = StreamSynchronizer::new();
        let set = sync.register_session(session).expect("register");
        assert_eq!(set.stream_ids().len(), 9);
        assert_eq!(
            remote.flight_frames(),
            vec![ReferenceFrame::VesselSurface, ReferenceFrame::OrbitalBody]
        );
        let reading = sync.tick(session).expect("tick");
        assert_eq!(reading.snapshot.speed, 42.0);
        assert_eq!(remote.stream_reads(), 1);
    }
}
