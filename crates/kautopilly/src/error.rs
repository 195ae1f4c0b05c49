//! Error types for the pilot core and its remote adapters.

#![allow(missing_docs)]

use std::io;

use smol_str::SmolStr;
use thiserror::Error;

/// Errors surfaced by the synchronization core.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PilotError {
    /// Rejected before any network activity.
    #[error("invalid address or port: {0}")]
    InvalidAddressOrPort(SmolStr),
    /// The remote process is not listening on the RPC port.
    #[error(
        "Could not connect to address:\n\n{address}:{rpc_port} (stream port: {stream_port})\n\nIs kRPC server started?"
    )]
    ServerNotStarted {
        address: SmolStr,
        rpc_port: u16,
        stream_port: u16,
    },
    #[error("connectivity error: {0}")]
    Connectivity(SmolStr),
    /// A read or write failed on a session that was previously connected.
    #[error("session lost: {0}")]
    SessionLost(SmolStr),
    #[error("not connected")]
    NotConnected,
    #[error("invalid setpoint: {0}")]
    InvalidSetpoint(SmolStr),
    #[error("invalid config: {0}")]
    InvalidConfig(SmolStr),
}

impl PilotError {
    /// True when the error must tear down the active session.
    #[must_use]
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, Self::SessionLost(_))
    }

    /// True for the connection failures an operator can retry.
    #[must_use]
    pub fn is_connect_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidAddressOrPort(_) | Self::ServerNotStarted { .. } | Self::Connectivity(_)
        )
    }
}

/// Structured failures reported by a [`crate::remote::RemoteApi`] adapter.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Nothing is listening at the target endpoint.
    #[error("connection refused by {0}")]
    Refused(SmolStr),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    /// The remote answered with `ok: false`.
    #[error("remote rejected request: {0}")]
    Rejected(SmolStr),
    #[error("protocol error: {0}")]
    Protocol(SmolStr),
    #[error("handle closed")]
    Closed,
}

impl TransportError {
    /// Classifies an i/o error raised while opening a channel.
    pub fn from_connect(err: io::Error, target: &str) -> Self {
        if err.kind() == io::ErrorKind::ConnectionRefused {
            Self::Refused(SmolStr::new(target))
        } else {
            Self::Io(err)
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(SmolStr::new(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refused_connect_is_classified_by_error_kind() {
        let err = io::Error::new(io::ErrorKind::ConnectionRefused, "nobody home");
        assert!(matches!(
            TransportError::from_connect(err, "127.0.0.1:50000"),
            TransportError::Refused(_)
        ));
        let err = io::Error::new(io::ErrorKind::TimedOut, "slow");
        assert!(matches!(
            TransportError::from_connect(err, "127.0.0.1:50000"),
            TransportError::Io(_)
        ));
    }

    #[test]
    fn server_not_started_message_names_both_ports() {
        let err = PilotError::ServerNotStarted {
            address: SmolStr::new("10.0.0.5"),
            rpc_port: 50000,
            stream_port: 50001,
        };
        let text = err.to_string();
        assert!(text.contains("10.0.0.5:50000 (stream port: 50001)"));
        assert!(text.ends_with("Is kRPC server started?"));
        assert!(err.is_connect_failure());
        assert!(!err.is_session_fatal());
    }
}
