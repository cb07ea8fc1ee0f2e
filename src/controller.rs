//! The controller façade (spec.md §4.8): the library's user-visible API.
//! Everything else in this crate exists to support `Controller`'s methods.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, Mutex as AsyncMutex};
use torctl_proto::descriptor::RouterStatusEntry;
use torctl_proto::response;
use torctl_wire::ReplyMessage;

use crate::auth;
use crate::error::ControllerError;
use crate::listener::{DispatchQueue, ListenerFn, ListenerId, ListenerRegistry};
use crate::pump::{self, PendingRequests};
use crate::socket::Socket;

/// How the control port is reached; kept around so `connect` can be
/// retried after a disconnect.
#[derive(Clone)]
enum Target {
    Tcp { address: String, port: u16 },
    Unix { path: PathBuf },
}

/// A relay's entry in `GETINFO circuit-status`/`stream-status`. Kept as a
/// thin wrapper over the raw path rather than the full event grammar
/// (spec.md §4.8 doesn't ask for more, and `CIRC`/`STREAM` events already
/// carry the typed version of this data).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitStatusEntry {
    pub id: String,
    pub status: String,
    pub rest: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamStatusEntry {
    pub id: String,
    pub status: String,
    pub circuit_id: String,
    pub target: String,
}

/// Result of [`Controller::map_address`]: per-entry partial success,
/// aggregated across one `MAPADDRESS` call per pair (see SPEC_FULL.md §9
/// Open Question (a)).
#[derive(Debug, Clone, Default)]
pub struct MapAddressOutcome {
    pub applied: Vec<(String, String)>,
    pub failed: Vec<(String, String, String)>,
}

struct Connection {
    socket: Arc<Socket>,
    requests: PendingRequests,
    pump_task: tokio::task::JoinHandle<()>,
}

pub struct Controller {
    target: Target,
    conn: AsyncMutex<Option<Connection>>,
    events: DispatchQueue,
    dispatch_task: AsyncMutex<Option<tokio::task::JoinHandle<()>>>,
    listeners: ListenerRegistry,
    enabled_features: AsyncMutex<Vec<String>>,
}

impl Controller {
    fn new(target: Target) -> Self {
        Controller {
            target,
            conn: AsyncMutex::new(None),
            events: DispatchQueue::new(1024),
            dispatch_task: AsyncMutex::new(None),
            listeners: ListenerRegistry::new(),
            enabled_features: AsyncMutex::new(Vec::new()),
        }
    }

    pub fn from_port(address: impl Into<String>, port: u16) -> Self {
        Controller::new(Target::Tcp { address: address.into(), port })
    }

    pub fn from_socket_file(path: impl Into<PathBuf>) -> Self {
        Controller::new(Target::Unix { path: path.into() })
    }

    /// Establishes the transport, spawns the reader pump and event
    /// dispatcher, and — on a reconnect — reattaches event subscriptions
    /// and previously enabled features (spec.md §4.8's reattach rule).
    pub async fn connect(&self) -> Result<(), ControllerError> {
        let (socket, reader) = match &self.target {
            Target::Tcp { address, port } => Socket::connect_tcp(address, *port).await?,
            Target::Unix { path } => Socket::connect_unix(path).await?,
        };
        let socket = Arc::new(socket);
        let requests = PendingRequests::new();

        let pump_task = tokio::spawn(pump::run(
            reader,
            socket.clone(),
            requests.clone(),
            self.events.clone(),
            || tracing::info!("control connection closed"),
        ));

        *self.conn.lock().await = Some(Connection { socket, requests, pump_task });

        let mut dispatch_task = self.dispatch_task.lock().await;
        if dispatch_task.is_none() {
            *dispatch_task = Some(tokio::spawn(self.events.clone().run(self.listeners.clone())));
        }
        drop(dispatch_task);

        self.reattach().await?;
        Ok(())
    }

    async fn reattach(&self) -> Result<(), ControllerError> {
        let types = self.listeners.subscribed_types().await;
        if !types.is_empty() {
            self.raw_msg(&format!("SETEVENTS {}", types.join(" "))).await?;
        }
        let features = self.enabled_features.lock().await.clone();
        if !features.is_empty() {
            self.raw_msg(&format!("USEFEATURE {}", features.join(" "))).await?;
        }
        Ok(())
    }

    pub async fn close(&self) {
        if let Some(conn) = self.conn.lock().await.take() {
            conn.socket.close().await;
            conn.pump_task.abort();
        }
    }

    pub async fn is_alive(&self) -> bool {
        match self.conn.lock().await.as_ref() {
            Some(conn) => conn.socket.is_alive(),
            None => false,
        }
    }

    /// Sends `command`, returning the assembled reply unparsed. Internal
    /// building block for every other façade method, and for
    /// [`crate::auth::authenticate`].
    pub(crate) async fn raw_msg(&self, command: &str) -> Result<ReplyMessage, ControllerError> {
        self.raw_msg_deadline(command, None).await
    }

    async fn raw_msg_deadline(&self, command: &str, deadline: Option<Duration>) -> Result<ReplyMessage, ControllerError> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or(ControllerError::NotConnected)?;
        let (tx, rx) = oneshot::channel();
        let requests = conn.requests.clone();
        conn.socket
            .write_line(command, || requests.push(tx))
            .await
            .map_err(ControllerError::from)?;
        drop(guard);

        match deadline {
            Some(d) => tokio::time::timeout(d, rx)
                .await
                .map_err(|_| ControllerError::Timeout)?
                .map_err(|_| ControllerError::Socket(crate::error::SocketError::SocketClosed))?,
            None => rx.await.map_err(|_| ControllerError::Socket(crate::error::SocketError::SocketClosed))?,
        }
    }

    /// Sends `command` and validates a bare `250 OK`-style reply.
    pub async fn msg(&self, command: &str) -> Result<response::singleline::SingleLineResponse, ControllerError> {
        let reply = self.raw_msg(command).await?;
        Ok(response::singleline::parse(&reply)?)
    }

    async fn send_and_check(&self, command: &str) -> Result<(), ControllerError> {
        self.msg(command).await?;
        Ok(())
    }

    pub async fn authenticate(&self, password: Option<&str>) -> Result<(), ControllerError> {
        auth::authenticate(self, password).await
    }

    pub async fn get_info(&self, keys: &[String]) -> Result<HashMap<String, String>, ControllerError> {
        let reply = self.raw_msg(&format!("GETINFO {}", keys.join(" "))).await?;
        Ok(response::getinfo::parse(&reply, keys)?)
    }

    pub async fn get_conf(&self, keys: &[String]) -> Result<HashMap<String, Vec<Option<String>>>, ControllerError> {
        let reply = self.raw_msg(&format!("GETCONF {}", keys.join(" "))).await?;
        Ok(response::getconf::parse(&reply)?)
    }

    pub async fn set_conf(&self, key: &str, value: &str) -> Result<(), ControllerError> {
        self.set_options(&[(key.to_owned(), Some(value.to_owned()))]).await
    }

    pub async fn reset_conf(&self, keys: &[String]) -> Result<(), ControllerError> {
        self.send_and_check(&format!("RESETCONF {}", keys.join(" "))).await
    }

    /// `SETCONF` over several options at once; a `None` value resets that
    /// key to its default (Tor's native meaning of a bare `key` token).
    pub async fn set_options(&self, options: &[(String, Option<String>)]) -> Result<(), ControllerError> {
        let mut command = String::from("SETCONF");
        for (key, value) in options {
            command.push(' ');
            match value {
                Some(value) => {
                    command.push_str(key);
                    command.push('=');
                    command.push_str(&quote_value(value));
                }
                None => command.push_str(key),
            }
        }
        self.send_and_check(&command).await
    }

    /// Sends `+LOADCONF`'s multi-line payload form.
    pub async fn load_conf(&self, text: &str) -> Result<(), ControllerError> {
        let mut command = String::from("+LOADCONF\r\n");
        for line in text.lines() {
            if let Some(rest) = line.strip_prefix('.') {
                command.push('.');
                command.push_str(rest);
            } else {
                command.push_str(line);
            }
            command.push_str("\r\n");
        }
        command.push('.');
        self.send_and_check(&command).await
    }

    pub async fn save_conf(&self, force: bool) -> Result<(), ControllerError> {
        let command = if force { "SAVECONF FORCE" } else { "SAVECONF" };
        self.send_and_check(command).await
    }

    pub async fn signal(&self, signal_name: &str) -> Result<(), ControllerError> {
        self.send_and_check(&format!("SIGNAL {signal_name}")).await
    }

    pub async fn new_circuit(&self, path: &[String], purpose: Option<&str>) -> Result<String, ControllerError> {
        self.extend_circuit("0", path, purpose).await
    }

    pub async fn extend_circuit(&self, circuit_id: &str, path: &[String], purpose: Option<&str>) -> Result<String, ControllerError> {
        let mut command = format!("EXTENDCIRCUIT {circuit_id}");
        if !path.is_empty() {
            command.push(' ');
            command.push_str(&path.join(","));
        }
        if let Some(purpose) = purpose {
            command.push_str(&format!(" purpose={purpose}"));
        }
        let reply = self.msg(&command).await?;
        reply
            .message
            .strip_prefix("EXTENDED ")
            .map(str::to_owned)
            .ok_or_else(|| ControllerError::Protocol(torctl_proto::ProtoError::malformed("EXTENDCIRCUIT", reply.message.clone())))
    }

    pub async fn repurpose_circuit(&self, circuit_id: &str, purpose: &str) -> Result<(), ControllerError> {
        self.send_and_check(&format!("SETCIRCUITPURPOSE {circuit_id} purpose={purpose}")).await
    }

    pub async fn close_circuit(&self, circuit_id: &str, if_unused: bool) -> Result<(), ControllerError> {
        let mut command = format!("CLOSECIRCUIT {circuit_id}");
        if if_unused {
            command.push_str(" IfUnused");
        }
        self.send_and_check(&command).await
    }

    pub async fn get_circuits(&self) -> Result<Vec<CircuitStatusEntry>, ControllerError> {
        let info = self.get_info(&["circuit-status".to_owned()]).await?;
        let payload = info.get("circuit-status").cloned().unwrap_or_default();
        Ok(payload.lines().filter(|l| !l.is_empty()).map(parse_circuit_status_line).collect())
    }

    pub async fn attach_stream(&self, stream_id: &str, circuit_id: &str, hop: Option<u32>) -> Result<(), ControllerError> {
        let mut command = format!("ATTACHSTREAM {stream_id} {circuit_id}");
        if let Some(hop) = hop {
            command.push_str(&format!(" HOP={hop}"));
        }
        self.send_and_check(&command).await
    }

    pub async fn close_stream(&self, stream_id: &str, reason: &str) -> Result<(), ControllerError> {
        self.send_and_check(&format!("CLOSESTREAM {stream_id} {reason}")).await
    }

    pub async fn get_streams(&self) -> Result<Vec<StreamStatusEntry>, ControllerError> {
        let info = self.get_info(&["stream-status".to_owned()]).await?;
        let payload = info.get("stream-status").cloned().unwrap_or_default();
        Ok(payload.lines().filter(|l| !l.is_empty()).filter_map(parse_stream_status_line).collect())
    }

    pub async fn get_server_descriptor(&self, identity: &str) -> Result<String, ControllerError> {
        let key = format!("desc/id/{identity}");
        let info = self.get_info(std::slice::from_ref(&key)).await?;
        Ok(info.get(&key).cloned().unwrap_or_default())
    }

    pub async fn get_network_status(&self, identity: Option<&str>) -> Result<Vec<RouterStatusEntry>, ControllerError> {
        let key = match identity {
            Some(identity) => format!("ns/id/{identity}"),
            None => "ns/all".to_owned(),
        };
        let info = self.get_info(std::slice::from_ref(&key)).await?;
        let payload = info.get(&key).cloned().unwrap_or_default();
        Ok(RouterStatusEntry::parse_all(&payload))
    }

    /// One `MAPADDRESS` per pair, aggregated into an applied list and a
    /// per-entry failure list (SPEC_FULL.md §9 Open Question (a)).
    pub async fn map_address(&self, mappings: &[(String, String)]) -> Result<MapAddressOutcome, ControllerError> {
        let mut outcome = MapAddressOutcome::default();
        for (from, to) in mappings {
            let command = format!("MAPADDRESS {from}={to}");
            match self.raw_msg(&command).await.and_then(|reply| Ok(response::mapaddress::parse(&reply)?)) {
                Ok(result) => outcome.applied.extend(result.applied),
                Err(err) => outcome.failed.push((from.clone(), to.clone(), err.to_string())),
            }
        }
        Ok(outcome)
    }

    pub async fn get_socks_listeners(&self) -> Result<Vec<String>, ControllerError> {
        let info = self.get_info(&["net/listeners/socks".to_owned()]).await?;
        let raw = info.get("net/listeners/socks").cloned().unwrap_or_default();
        Ok(raw.split_whitespace().map(|tok| tok.trim_matches('"').to_owned()).collect())
    }

    /// Registers `callback` for `event_types` (empty = all types) and
    /// issues `SETEVENTS` for the new union of subscriptions.
    pub async fn add_event_listener(&self, event_types: &[String], callback: ListenerFn) -> Result<ListenerId, ControllerError> {
        let id = self.listeners.add(event_types.to_vec(), callback).await;
        let types = self.listeners.subscribed_types().await;
        self.send_and_check(&format!("SETEVENTS {}", types.join(" "))).await?;
        Ok(id)
    }

    pub async fn remove_event_listener(&self, id: ListenerId) -> Result<(), ControllerError> {
        self.listeners.remove(id).await;
        let types = self.listeners.subscribed_types().await;
        let command = if types.is_empty() { "SETEVENTS".to_owned() } else { format!("SETEVENTS {}", types.join(" ")) };
        self.send_and_check(&command).await
    }

    pub async fn enable_feature(&self, names: &[String]) -> Result<(), ControllerError> {
        self.send_and_check(&format!("USEFEATURE {}", names.join(" "))).await?;
        let mut enabled = self.enabled_features.lock().await;
        for name in names {
            if !enabled.contains(name) {
                enabled.push(name.clone());
            }
        }
        Ok(())
    }

    pub async fn is_feature_enabled(&self, name: &str) -> bool {
        self.enabled_features.lock().await.iter().any(|f| f == name)
    }

    /// Count of events dropped by the bounded dispatch queue for overflow.
    pub fn dropped_event_count(&self) -> u64 {
        self.events.dropped_count()
    }
}

fn quote_value(value: &str) -> String {
    if value.contains(' ') || value.is_empty() {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value.to_owned()
    }
}

fn parse_circuit_status_line(line: &str) -> CircuitStatusEntry {
    let mut parts = line.splitn(3, ' ');
    let id = parts.next().unwrap_or_default().to_owned();
    let status = parts.next().unwrap_or_default().to_owned();
    let rest = parts.next().unwrap_or_default().to_owned();
    CircuitStatusEntry { id, status, rest }
}

fn parse_stream_status_line(line: &str) -> Option<StreamStatusEntry> {
    let mut parts = line.splitn(4, ' ');
    Some(StreamStatusEntry {
        id: parts.next()?.to_owned(),
        status: parts.next()?.to_owned(),
        circuit_id: parts.next()?.to_owned(),
        target: parts.next().unwrap_or_default().to_owned(),
    })
}
