//! TCP adapter speaking the JSON-lines bridge protocol.
//!
//! Two sockets per session: the RPC channel carries requests and calls, the
//! stream channel carries batched stream reads. Every message is one JSON
//! object followed by `\n`.

#![allow(missing_docs)]

use std::io::{self, BufRead, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use smol_str::SmolStr;
use tracing::{debug, trace};

use crate::error::TransportError;
use crate::remote::{
    ConnectRequest, FlightId, ReferenceFrame, RemoteApi, RemoteCall, RemoteHandle, RemoteValue,
    StreamId, StreamTarget, VesselId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpRemote {
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl TcpRemote {
    #[must_use]
    pub fn new(connect_timeout: Duration, io_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            io_timeout,
        }
    }
}

impl RemoteApi for TcpRemote {
    fn connect(&self, request: &ConnectRequest) -> Result<Box<dyn RemoteHandle>, TransportError> {
        let mut rpc = Channel::open(
            "rpc",
            &request.address,
            request.rpc_port,
            self.connect_timeout,
            self.io_timeout,
        )?;
        let hello = rpc.request("hello", json!({ "name": request.name.as_str() }))?;
        let client_id: u64 = field(&hello, "client_id")?;

        let mut stream = Channel::open(
            "stream",
            &request.address,
            request.stream_port,
            self.connect_timeout,
            self.io_timeout,
        )?;
        stream.request("hello", json!({ "client_id": client_id }))?;
        debug!(client_id, "bridge session opened");
        Ok(Box::new(TcpHandle {
            rpc,
            stream,
            closed: false,
        }))
    }
}

struct TcpHandle {
    rpc: Channel,
    stream: Channel,
    closed: bool,
}

impl TcpHandle {
    fn rpc(&mut self, kind: &str, params: Value) -> Result<Value, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.rpc.request(kind, params)
    }
}

impl RemoteHandle for TcpHandle {
    fn active_vessel(&mut self) -> Result<VesselId, TransportError> {
        let result = self.rpc("space_center.active_vessel", json!({}))?;
        field(&result, "vessel")
    }

    fn flight(
        &mut self,
        vessel: VesselId,
        frame: ReferenceFrame,
    ) -> Result<FlightId, TransportError> {
        let result = self.rpc("vessel.flight", json!({ "vessel": vessel, "frame": frame }))?;
        field(&result, "flight")
    }

    fn add_stream(&mut self, target: StreamTarget) -> Result<StreamId, TransportError> {
        let result = self.rpc("stream.add", json!({ "target": target }))?;
        field(&result, "stream")
    }

    fn read_streams(&mut self, ids: &[StreamId]) -> Result<Vec<RemoteValue>, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        let result = self.stream.request("streams.read", json!({ "ids": ids }))?;
        let values: Vec<RemoteValue> = field(&result, "values")?;
        if values.len() != ids.len() {
            return Err(TransportError::Protocol(
                format!("expected {} stream values, got {}", ids.len(), values.len()).into(),
            ));
        }
        Ok(values)
    }

    fn get(&mut self, target: StreamTarget) -> Result<RemoteValue, TransportError> {
        let result = self.rpc("get", json!({ "target": target }))?;
        field(&result, "value")
    }

    fn call(&mut self, vessel: VesselId, call: &RemoteCall) -> Result<(), TransportError> {
        self.rpc("call", json!({ "vessel": vessel, "call": call }))
            .map(|_| ())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(err) = self.rpc.request("close", json!({})) {
            debug!(error = %err, "close request failed");
        }
        self.rpc.shutdown();
        self.stream.shutdown();
    }
}

/// One line-oriented request/response socket.
struct Channel {
    label: &'static str,
    next_id: u64,
    reader: BufReader<TcpStream>,
}

impl Channel {
    fn open(
        label: &'static str,
        address: &str,
        port: u16,
        connect_timeout: Duration,
        io_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let target = format!("{address}:{port}");
        let addrs: Vec<SocketAddr> = (address, port)
            .to_socket_addrs()
            .map_err(TransportError::Io)?
            .collect();
        let mut last_err = io::Error::new(
            io::ErrorKind::NotFound,
            format!("{target} did not resolve to any address"),
        );
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, connect_timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(io_timeout))?;
                    stream.set_write_timeout(Some(io_timeout))?;
                    stream.set_nodelay(true)?;
                    debug!(channel = label, %addr, "channel connected");
                    return Ok(Self {
                        label,
                        next_id: 1,
                        reader: BufReader::new(stream),
                    });
                }
                Err(err) => last_err = err,
            }
        }
        Err(TransportError::from_connect(last_err, &target))
    }

    fn request(&mut self, kind: &str, params: Value) -> Result<Value, TransportError> {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        let line = serde_json::to_string(&json!({ "id": id, "type": kind, "params": params }))?;
        trace!(channel = self.label, %line, "request");
        {
            let stream = self.reader.get_mut();
            stream.write_all(line.as_bytes())?;
            stream.write_all(b"\n")?;
            stream.flush()?;
        }
        let mut response = String::new();
        if self.reader.read_line(&mut response)? == 0 {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("{} channel closed by remote", self.label),
            )));
        }
        trace!(channel = self.label, response = response.trim_end(), "response");
        parse_response(id, &response)
    }

    fn shutdown(&mut self) {
        let _ = self.reader.get_mut().shutdown(Shutdown::Both);
    }
}

fn parse_response(id: u64, line: &str) -> Result<Value, TransportError> {
    let mut response: Value = serde_json::from_str(line)?;
    if response.get("id").and_then(Value::as_u64) != Some(id) {
        return Err(TransportError::Protocol(
            format!("response id mismatch, expected {id}").into(),
        ));
    }
    match response.get("ok").and_then(Value::as_bool) {
        Some(true) => Ok(response
            .get_mut("result")
            .map(Value::take)
            .unwrap_or(Value::Null)),
        Some(false) => {
            let error = response
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            Err(TransportError::Rejected(SmolStr::new(error)))
        }
        None => Err(TransportError::Protocol("response without 'ok'".into())),
    }
}

fn field<T: DeserializeOwned>(result: &Value, key: &str) -> Result<T, TransportError> {
    let value = result
        .get(key)
        .cloned()
        .ok_or_else(|| TransportError::Protocol(format!("result missing '{key}'").into()))?;
    serde_json::from_value(value)
        .map_err(|err| TransportError::Protocol(format!("invalid '{key}': {err}").into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn parse_response_checks_id_and_ok() {
        assert_eq!(
            parse_response(3, r#"{"id":3,"ok":true,"result":{"vessel":9}}"#).expect("ok"),
            json!({"vessel": 9})
        );
        assert!(matches!(
            parse_response(3, r#"{"id":4,"ok":true,"result":{}}"#),
            Err(TransportError::Protocol(_))
        ));
        assert!(matches!(
            parse_response(3, r#"{"id":3,"ok":false,"error":"no vessel"}"#),
            Err(TransportError::Rejected(message)) if message == "no vessel"
        ));
        assert!(matches!(
            parse_response(3, "not json"),
            Err(TransportError::Protocol(_))
        ));
    }

    #[test]
    fn closed_port_is_reported_as_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind probe socket");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);
        let err = Channel::open(
            "rpc",
            "127.0.0.1",
            port,
            Duration::from_millis(500),
            Duration::from_millis(500),
        )
        .err()
        .expect("nothing listening");
        assert!(matches!(err, TransportError::Refused(_)), "{err}");
    }

    #[test]
    fn request_round_trips_one_line() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test socket");
        let port = listener.local_addr().expect("local addr").port();
        thread::spawn(move || {
            let Ok((stream, _)) = listener.accept() else {
                return;
            };
            let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
            let mut writer = stream;
            let mut line = String::new();
            while reader.read_line(&mut line).map_or(false, |read| read > 0) {
                let request: Value = serde_json::from_str(&line).expect("request json");
                let response = json!({
                    "id": request["id"],
                    "ok": true,
                    "result": { "echo": request["type"] }
                });
                writer
                    .write_all(format!("{response}\n").as_bytes())
                    .expect("write response");
                line.clear();
            }
        });

        let mut channel = Channel::open(
            "rpc",
            "127.0.0.1",
            port,
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .expect("open channel");
        let first = channel.request("hello", json!({})).expect("first");
        let second = channel.request("get", json!({})).expect("second");
        assert_eq!(first, json!({"echo": "hello"}));
        assert_eq!(second, json!({"echo": "get"}));
        assert_eq!(channel.next_id, 3);
    }
}
