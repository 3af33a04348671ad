//! # Protocol Client Boundary
//!
//! The swarm never speaks the game protocol itself. A [`Connector`] starts
//! one client per session and hands back a [`ClientHandle`]; the client's
//! asynchronous machinery reports its lifecycle as [`ClientEvent`]s on that
//! handle.
//!
//! ```text
//! Session driver                       Client task (Connector)
//!     │                                      │
//!     ├── connect(target, name) ───────────▶ │ DNS, TCP, handshake, login
//!     │ ◀──────────── Connected ─────────────┤
//!     │ ◀──────────── LoginSuccess ──────────┤
//!     │ ◀──────────── WorldData(n) ──────────┤ (repeated)
//!     │ ◀──────────── Disconnected / Error ──┘
//!     │
//!     └── disconnect() ────────────────────▶ stop token
//! ```

pub mod scripted;
pub mod tcp;

pub use scripted::{Outcome, Script, ScriptedConnector};
pub use tcp::TcpConnector;

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::ServerAddress;
use crate::error::SessionError;

/// Buffered events per client before the client task waits on the session
pub const EVENT_CAPACITY: usize = 64;

/// Why an established session ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", content = "reason", rename_all = "snake_case")]
pub enum DisconnectReason {
    /// The server closed the session (kick, error, shutdown)
    Server(String),
    /// This process asked the client to disconnect
    Local,
    /// The client went away without saying why
    StreamClosed,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::Server(reason) => write!(f, "server: {reason}"),
            DisconnectReason::Local => f.write_str("local disconnect"),
            DisconnectReason::StreamClosed => f.write_str("event stream closed"),
        }
    }
}

/// Lifecycle event reported by a protocol client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Transport is up; handshake and login begin
    Connected,
    /// Login completed; the client is in the world
    LoginSuccess,
    /// World-data units received (e.g. chunks)
    WorldData(u64),
    /// Transport or protocol failure
    Error(SessionError),
    /// Session ended
    Disconnected(DisconnectReason),
}

/// Starts protocol clients. `connect` must not block: all slow work runs
/// on a task the connector spawns.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, target: &ServerAddress, name: &str) -> ClientHandle;
}

/// Session side of a running client
#[derive(Debug)]
pub struct ClientHandle {
    events: mpsc::Receiver<ClientEvent>,
    stop: CancellationToken,
}

impl ClientHandle {
    /// Create a connected handle/sink pair
    pub fn pair() -> (EventSink, ClientHandle) {
        let (tx, events) = mpsc::channel(EVENT_CAPACITY);
        let stop = CancellationToken::new();
        (
            EventSink {
                tx,
                stop: stop.clone(),
            },
            ClientHandle { events, stop },
        )
    }

    /// Next lifecycle event; `None` once the client task is gone
    pub async fn next_event(&mut self) -> Option<ClientEvent> {
        self.events.recv().await
    }

    /// Ask the client to terminate. Does not wait for the peer.
    pub fn disconnect(&self) {
        self.stop.cancel();
    }
}

impl Drop for ClientHandle {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

/// Client side of a running client
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<ClientEvent>,
    stop: CancellationToken,
}

impl EventSink {
    /// Deliver an event. Returns `false` if the session is gone.
    pub async fn emit(&self, event: ClientEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }

    /// Resolves once the session requested a disconnect
    pub async fn stopped(&self) {
        self.stop.cancelled().await
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }
}
