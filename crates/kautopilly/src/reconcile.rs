//! Throttle reconciliation between the operator and the remote vessel.
//!
//! Both sides can move the throttle. While an operator write is still
//! propagating, stale remote readings are ignored; once the remote reports
//! the commanded value the remote becomes authoritative again.

#![allow(missing_docs)]

use tracing::debug;

use crate::connection::Session;
use crate::error::PilotError;
use crate::remote::RemoteCall;

/// Remote throttle is single precision; readings within this distance of the
/// commanded value count as converged.
pub const THROTTLE_TOLERANCE: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThrottleSync {
    /// No operator write outstanding; the display mirrors the remote.
    Converged,
    /// An operator write has not been observed remotely yet.
    Pending { commanded: f64 },
}

#[derive(Debug, Clone)]
pub struct ThrottleReconciler {
    sync: ThrottleSync,
    displayed: f64,
}

impl ThrottleReconciler {
    #[must_use]
    pub fn new(initial: f64) -> Self {
        Self {
            sync: ThrottleSync::Converged,
            displayed: clamp_throttle(initial),
        }
    }

    /// Value the operator should see right now.
    #[must_use]
    pub fn displayed(&self) -> f64 {
        self.displayed
    }

    #[must_use]
    pub fn sync_state(&self) -> ThrottleSync {
        self.sync
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self.sync, ThrottleSync::Pending { .. })
    }

    /// Adopts the remote value with nothing outstanding, as after a connect.
    pub fn reset(&mut self, remote: f64) {
        self.sync = ThrottleSync::Converged;
        self.displayed = clamp_throttle(remote);
    }

    /// Applies an operator throttle locally and writes it to the vessel.
    ///
    /// Values are clamped to `0.0..=1.0`; non-finite values are rejected
    /// without touching local or remote state.
    pub fn command(&mut self, session: &mut Session, value: f64) -> Result<f64, PilotError> {
        if !value.is_finite() {
            return Err(PilotError::InvalidSetpoint(
                format!("throttle {value} is not a number").into(),
            ));
        }
        let value = clamp_throttle(value);
        self.displayed = value;
        self.sync = ThrottleSync::Pending { commanded: value };
        debug!(throttle = value, "throttle override pending");
        session.call(RemoteCall::SetThrottle { value })?;
        Ok(value)
    }

    /// Folds one remote reading in and returns the value to display.
    pub fn observe(&mut self, remote: f64) -> f64 {
        match self.sync {
            ThrottleSync::Converged => self.displayed = clamp_throttle(remote),
            ThrottleSync::Pending { commanded } => {
                if (remote - commanded).abs() <= THROTTLE_TOLERANCE {
                    debug!(throttle = commanded, "throttle override converged");
                    self.sync = ThrottleSync::Converged;
                }
            }
        }
        self.displayed
    }
}

fn clamp_throttle(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}
