//! Live control client for a remotely simulated vessel.
//!
//! The crate keeps a local model of one vessel in sync with a remote
//! simulator: it connects, registers telemetry streams, reads them once per
//! tick, and forwards autopilot and control commands. The terminal console in
//! [`ui`] and the `kautopilly` binary are thin layers over [`pilot::Pilot`].

#![allow(missing_docs)]

pub mod autopilot;
pub mod config;
pub mod connection;
pub mod coords;
pub mod error;
pub mod harness;
pub mod logging;
pub mod pilot;
pub mod reconcile;
pub mod remote;
pub mod sync;
pub mod telemetry;
pub mod transport;
pub mod ui;

pub use config::PilotConfig;
pub use connection::{ConnectionManager, Endpoint, Session};
pub use error::{PilotError, TransportError};
pub use harness::SimulatedRemote;
pub use pilot::{Pilot, PilotCommand, PilotEvent, Setpoint};
pub use telemetry::{ConnectionState, ModelView, TelemetrySnapshot};
pub use transport::TcpRemote;
