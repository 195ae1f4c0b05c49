//! Connection lifecycle and the live session handle.

#![allow(missing_docs)]

use std::collections::VecDeque;

use smol_str::SmolStr;
use tracing::{debug, info, warn};

use crate::error::{PilotError, TransportError};
use crate::remote::{
    ConnectRequest, FlightId, ReferenceFrame, RemoteApi, RemoteCall, RemoteHandle, RemoteValue,
    StreamId, StreamTarget, VesselId,
};
use crate::telemetry::ConnectionState;

/// A structurally validated remote address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub address: SmolStr,
    pub rpc_port: u16,
    pub stream_port: u16,
}

impl Endpoint {
    /// Validates operator input without touching the network.
    ///
    /// Ports arrive as raw integers because they come straight from text
    /// entry; anything outside `1..=65535` is rejected.
    pub fn parse(address: &str, rpc_port: i64, stream_port: i64) -> Result<Self, PilotError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(PilotError::InvalidAddressOrPort("address is empty".into()));
        }
        if address.chars().any(char::is_whitespace) {
            return Err(PilotError::InvalidAddressOrPort(
                format!("address '{address}' contains whitespace").into(),
            ));
        }
        Ok(Self {
            address: SmolStr::new(address),
            rpc_port: parse_port("rpc", rpc_port)?,
            stream_port: parse_port("stream", stream_port)?,
        })
    }
}

fn parse_port(kind: &str, value: i64) -> Result<u16, PilotError> {
    match u16::try_from(value) {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(PilotError::InvalidAddressOrPort(
            format!("{kind} port {value} out of range 1-65535").into(),
        )),
    }
}

/// An open connection plus the vessel it controls.
///
/// Every operation fails with [`PilotError::SessionLost`] once the session is
/// closed or the transport reports an error.
pub struct Session {
    handle: Box<dyn RemoteHandle>,
    endpoint: Endpoint,
    vessel: VesselId,
    open: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.endpoint)
            .field("vessel", &self.vessel)
            .field("open", &self.open)
            .finish_non_exhaustive()
    }
}

impl Session {
    fn open(mut handle: Box<dyn RemoteHandle>, endpoint: Endpoint) -> Result<Self, PilotError> {
        let vessel = match handle.active_vessel() {
            Ok(vessel) => vessel,
            Err(err) => {
                handle.close();
                return Err(PilotError::Connectivity(
                    format!("no active vessel: {err}").into(),
                ));
            }
        };
        Ok(Self {
            handle,
            endpoint,
            vessel,
            open: true,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    #[must_use]
    pub fn vessel(&self) -> VesselId {
        self.vessel
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }

    fn ensure_open(&self) -> Result<(), PilotError> {
        if self.open {
            Ok(())
        } else {
            Err(PilotError::SessionLost("session closed".into()))
        }
    }

    pub fn flight(&mut self, frame: ReferenceFrame) -> Result<FlightId, PilotError> {
        self.ensure_open()?;
        let vessel = self.vessel;
        self.handle.flight(vessel, frame).map_err(session_lost)
    }

    pub fn add_stream(&mut self, target: StreamTarget) -> Result<StreamId, PilotError> {
        self.ensure_open()?;
        self.handle.add_stream(target).map_err(session_lost)
    }

    pub fn read_streams(&mut self, ids: &[StreamId]) -> Result<Vec<RemoteValue>, PilotError> {
        self.ensure_open()?;
        let values = self.handle.read_streams(ids).map_err(session_lost)?;
        if values.len() != ids.len() {
            return Err(PilotError::SessionLost(
                format!(
                    "stream read returned {} values for {} streams",
                    values.len(),
                    ids.len()
                )
                .into(),
            ));
        }
        Ok(values)
    }

    pub fn get(&mut self, target: StreamTarget) -> Result<RemoteValue, PilotError> {
        self.ensure_open()?;
        self.handle.get(target).map_err(session_lost)
    }

    pub fn get_bool(&mut self, target: StreamTarget) -> Result<bool, PilotError> {
        self.get(target)?
            .as_bool()
            .ok_or_else(|| unexpected_type(target, "bool"))
    }

    pub fn call(&mut self, call: RemoteCall) -> Result<(), PilotError> {
        self.ensure_open()?;
        debug!(?call, "remote call");
        let vessel = self.vessel;
        self.handle.call(vessel, &call).map_err(session_lost)
    }

    /// Closes the underlying handle. Safe to call more than once.
    pub fn close(&mut self) {
        if self.open {
            self.open = false;
            self.handle.close();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

fn session_lost(err: TransportError) -> PilotError {
    PilotError::SessionLost(SmolStr::new(err.to_string()))
}

fn unexpected_type(target: StreamTarget, expected: &str) -> PilotError {
    PilotError::SessionLost(
        format!(
            "{} did not return a {expected}",
            target.attribute().as_str()
        )
        .into(),
    )
}

/// Undrained transitions kept before the oldest are discarded.
const MAX_TRANSITIONS: usize = 32;

/// Owns the session and the connection state machine.
pub struct ConnectionManager<A> {
    api: A,
    client_name: SmolStr,
    state: ConnectionState,
    transitions: VecDeque<ConnectionState>,
    session: Option<Session>,
}

impl<A: RemoteApi> ConnectionManager<A> {
    pub fn new(api: A, client_name: impl Into<SmolStr>) -> Self {
        Self {
            api,
            client_name: client_name.into(),
            state: ConnectionState::Disconnected,
            transitions: VecDeque::new(),
            session: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut Session> {
        self.session.as_mut()
    }

    /// States entered since the last call, oldest first. Only the most
    /// recent transitions are retained between calls.
    pub fn drain_transitions(&mut self) -> Vec<ConnectionState> {
        self.transitions.drain(..).collect()
    }

    fn transition(&mut self, state: ConnectionState) {
        if self.state != state {
            self.state = state.clone();
            if self.transitions.len() == MAX_TRANSITIONS {
                self.transitions.pop_front();
            }
            self.transitions.push_back(state);
        }
    }

    /// Makes one connection attempt.
    ///
    /// Invalid input fails before the remote API is touched. An existing
    /// session is closed first, also when the new input is invalid.
    pub fn connect(
        &mut self,
        address: &str,
        rpc_port: i64,
        stream_port: i64,
    ) -> Result<&mut Session, PilotError> {
        let endpoint = match Endpoint::parse(address, rpc_port, stream_port) {
            Ok(endpoint) => endpoint,
            Err(err) => {
                self.close_previous();
                self.transition(ConnectionState::Failed(SmolStr::new(err.to_string())));
                return Err(err);
            }
        };
        self.connect_endpoint(endpoint)
    }

    pub fn connect_endpoint(&mut self, endpoint: Endpoint) -> Result<&mut Session, PilotError> {
        self.close_previous();
        self.transition(ConnectionState::Connecting);
        info!(
            address = %endpoint.address,
            rpc_port = endpoint.rpc_port,
            stream_port = endpoint.stream_port,
            "connecting"
        );
        let request = ConnectRequest {
            name: self.client_name.clone(),
            address: endpoint.address.clone(),
            rpc_port: endpoint.rpc_port,
            stream_port: endpoint.stream_port,
        };
        let opened = self
            .api
            .connect(&request)
            .map_err(|err| classify_connect_error(err, &endpoint))
            .and_then(|handle| Session::open(handle, endpoint));
        match opened {
            Ok(session) => {
                info!(vessel = session.vessel().0, "connected");
                self.transition(ConnectionState::Connected);
                Ok(self.session.insert(session))
            }
            Err(err) => {
                warn!(error = %err, "connection attempt failed");
                self.transition(ConnectionState::Failed(SmolStr::new(err.to_string())));
                Err(err)
            }
        }
    }

    /// Tears down the session after it stopped responding.
    pub fn fail(&mut self, reason: &PilotError) {
        warn!(error = %reason, "session failed");
        self.close_session();
        self.transition(ConnectionState::Failed(SmolStr::new(reason.to_string())));
    }

    /// Idempotent.
    pub fn disconnect(&mut self) {
        if self.session.is_some() {
            info!("disconnecting");
        }
        self.close_session();
        self.transition(ConnectionState::Disconnected);
    }

    /// Closes a session replaced by a new connect attempt.
    fn close_previous(&mut self) {
        if self.close_session() {
            info!("closing previous session");
            self.transition(ConnectionState::Disconnected);
        }
    }

    fn close_session(&mut self) -> bool {
        match self.session.take() {
            Some(mut session) => {
                session.close();
                true
            }
            None => false,
        }
    }
}

fn classify_connect_error(err: TransportError, endpoint: &Endpoint) -> PilotError {
    match err {
        TransportError::Refused(_) => PilotError::ServerNotStarted {
            address: endpoint.address.clone(),
            rpc_port: endpoint.rpc_port,
            stream_port: endpoint.stream_port,
        },
        other => PilotError::Connectivity(SmolStr::new(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::SimulatedRemote;

    #[test]
    fn endpoint_rejects_bad_input() {
        assert!(Endpoint::parse("", 50000, 50001).is_err());
        assert!(Endpoint::parse("   ", 50000, 50001).is_err());
        assert!(Endpoint::parse("my host", 50000, 50001).is_err());
        assert!(Endpoint::parse("127.0.0.1", 0, 50001).is_err());
        assert!(Endpoint::parse("127.0.0.1", 50000, 65536).is_err());
        assert!(Endpoint::parse("127.0.0.1", -1, 50001).is_err());
        let endpoint = Endpoint::parse(" localhost ", 1, 65535).expect("valid endpoint");
        assert_eq!(endpoint.address, "localhost");
    }

    #[test]
    fn connect_transitions_to_connected() {
        let remote = SimulatedRemote::new();
        let mut manager = ConnectionManager::new(remote.clone(), "test");
        let session = manager
            .connect("127.0.0.1", 50000, 50001)
            .expect("connect");
        assert!(session.is_open());
        assert_eq!(manager.state(), &ConnectionState::Connected);
        assert_eq!(
            manager.drain_transitions(),
            vec![ConnectionState::Connecting, ConnectionState::Connected]
        );
        assert_eq!(remote.connect_attempts(), 1);
        assert_eq!(remote.last_client_name().as_deref(), Some("test"));
    }

    #[test]
    fn invalid_input_fails_without_a_connection_attempt() {
        let remote = SimulatedRemote::new();
        let mut manager = ConnectionManager::new(remote.clone(), "test");
        for (rpc, stream) in [(0, 50001), (50000, 70000), (-3, 50001), (50000, 0)] {
            let err = manager
                .connect("127.0.0.1", rpc, stream)
                .expect_err("invalid port");
            assert!(matches!(err, PilotError::InvalidAddressOrPort(_)));
        }
        assert!(manager.connect("", 50000, 50001).is_err());
        assert_eq!(remote.connect_attempts(), 0);
        assert!(matches!(manager.state(), ConnectionState::Failed(_)));
        assert!(!manager
            .drain_transitions()
            .contains(&ConnectionState::Connecting));
    }

    #[test]
    fn refused_connection_maps_to_server_not_started() {
        let remote = SimulatedRemote::new();
        remote.refuse_connections(true);
        let mut manager = ConnectionManager::new(remote.clone(), "test");
        let err = manager
            .connect("127.0.0.1", 50000, 50001)
            .expect_err("refused");
        assert!(matches!(err, PilotError::ServerNotStarted { rpc_port: 50000, .. }));
        assert!(matches!(manager.state(), ConnectionState::Failed(_)));
        assert!(manager.session().is_none());
    }

    #[test]
    fn other_transport_errors_map_to_connectivity() {
        let remote = SimulatedRemote::new();
        remote.fail_connections_with("network unreachable");
        let mut manager = ConnectionManager::new(remote, "test");
        let err = manager
            .connect("10.1.1.1", 50000, 50001)
            .expect_err("unreachable");
        assert!(matches!(err, PilotError::Connectivity(_)));
    }

    #[test]
    fn disconnect_is_idempotent() {
        let remote = SimulatedRemote::new();
        let mut manager = ConnectionManager::new(remote.clone(), "test");
        manager.disconnect();
        assert_eq!(manager.state(), &ConnectionState::Disconnected);
        manager.connect("127.0.0.1", 50000, 50001).expect("connect");
        manager.disconnect();
        manager.disconnect();
        assert_eq!(manager.state(), &ConnectionState::Disconnected);
        assert!(manager.session().is_none());
        assert_eq!(remote.closed_handles(), 1);
    }

    #[test]
    fn reconnect_closes_previous_session() {
        let remote = SimulatedRemote::new();
        let mut manager = ConnectionManager::new(remote.clone(), "test");
        manager.connect("127.0.0.1", 50000, 50001).expect("first");
        manager.drain_transitions();
        manager.connect("127.0.0.1", 50000, 50001).expect("second");
        assert_eq!(remote.connect_attempts(), 2);
        assert_eq!(remote.closed_handles(), 1);
        assert_eq!(
            manager.drain_transitions(),
            vec![
                ConnectionState::Disconnected,
                ConnectionState::Connecting,
                ConnectionState::Connected,
            ]
        );
    }

    #[test]
    fn invalid_reconnect_closes_the_live_session() {
        let remote = SimulatedRemote::new();
        let mut manager = ConnectionManager::new(remote.clone(), "test");
        manager.connect("127.0.0.1", 50000, 50001).expect("connect");
        manager.drain_transitions();

        let err = manager
            .connect("127.0.0.1", 0, 50001)
            .expect_err("rpc port 0");
        assert!(matches!(err, PilotError::InvalidAddressOrPort(_)));
        assert!(manager.session().is_none());
        assert_eq!(remote.closed_handles(), 1);
        assert_eq!(remote.connect_attempts(), 1);
        let transitions = manager.drain_transitions();
        assert_eq!(transitions[0], ConnectionState::Disconnected);
        assert!(matches!(transitions[1], ConnectionState::Failed(_)));
    }

    #[test]
    fn undrained_transitions_are_bounded() {
        let remote = SimulatedRemote::new();
        let mut manager = ConnectionManager::new(remote, "test");
        for _ in 0..40 {
            manager.connect("127.0.0.1", 50000, 50001).expect("connect");
            manager.disconnect();
        }
        let transitions = manager.drain_transitions();
        assert_eq!(transitions.len(), MAX_TRANSITIONS);
        assert_eq!(transitions.last(), Some(&ConnectionState::Disconnected));
        assert!(manager.drain_transitions().is_empty());
    }
}
