//! # Scripted Connector
//!
//! Deterministic in-process client. Each connect attempt plays a [`Script`]
//! chosen by attempt number, which makes swarm behaviour reproducible in
//! tests and lets the binary run without a server (`--dry-run`).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{ClientEvent, ClientHandle, Connector, DisconnectReason, EventSink};
use crate::config::ServerAddress;
use crate::error::SessionError;

/// How a scripted login attempt ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Join,
    FailConnect(String),
    FailLogin(String),
}

/// One client's scripted lifecycle
#[derive(Debug, Clone)]
pub struct Script {
    pub connect_delay: Duration,
    pub login_delay: Duration,
    pub outcome: Outcome,
    /// World-data units delivered after joining, one batch per interval
    pub world_batches: Vec<u64>,
    pub batch_interval: Duration,
    /// Server kicks the client after the last batch; otherwise it stays
    /// online until asked to disconnect
    pub kick_after_batches: bool,
}

impl Script {
    /// Joins instantly and stays online
    pub fn join() -> Self {
        Self {
            connect_delay: Duration::ZERO,
            login_delay: Duration::ZERO,
            outcome: Outcome::Join,
            world_batches: Vec::new(),
            batch_interval: Duration::ZERO,
            kick_after_batches: false,
        }
    }

    pub fn fail_connect(reason: &str) -> Self {
        Self {
            outcome: Outcome::FailConnect(reason.to_string()),
            ..Self::join()
        }
    }

    pub fn fail_login(reason: &str) -> Self {
        Self {
            outcome: Outcome::FailLogin(reason.to_string()),
            ..Self::join()
        }
    }

    pub fn with_delays(mut self, connect: Duration, login: Duration) -> Self {
        self.connect_delay = connect;
        self.login_delay = login;
        self
    }

    pub fn with_world(mut self, batches: Vec<u64>, interval: Duration) -> Self {
        self.world_batches = batches;
        self.batch_interval = interval;
        self
    }

    pub fn kicked(mut self) -> Self {
        self.kick_after_batches = true;
        self
    }
}

type ScriptFn = dyn Fn(u64) -> Script + Send + Sync;

/// Connector that plays scripts instead of talking to a server
#[derive(Clone)]
pub struct ScriptedConnector {
    script_for: Arc<ScriptFn>,
    attempts: Arc<AtomicU64>,
    local_stops: Arc<AtomicU64>,
}

impl ScriptedConnector {
    /// `script_for` receives the 0-based connect attempt number
    pub fn new(script_for: impl Fn(u64) -> Script + Send + Sync + 'static) -> Self {
        Self {
            script_for: Arc::new(script_for),
            attempts: Arc::new(AtomicU64::new(0)),
            local_stops: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Every attempt plays the same script
    pub fn uniform(script: Script) -> Self {
        Self::new(move |_| script.clone())
    }

    /// Connect attempts made so far
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Acquire)
    }

    /// Clients that ended because the session asked them to
    pub fn local_stops(&self) -> u64 {
        self.local_stops.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for ScriptedConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedConnector")
            .field("attempts", &self.attempts())
            .field("local_stops", &self.local_stops())
            .finish()
    }
}

impl Connector for ScriptedConnector {
    fn connect(&self, _target: &ServerAddress, _name: &str) -> ClientHandle {
        let attempt = self.attempts.fetch_add(1, Ordering::AcqRel);
        let script = (self.script_for)(attempt);
        let (sink, handle) = ClientHandle::pair();
        let local_stops = Arc::clone(&self.local_stops);

        tokio::spawn(async move {
            if !play(&sink, script).await {
                local_stops.fetch_add(1, Ordering::AcqRel);
            }
        });

        handle
    }
}

/// Sleep unless the session disconnects first. `false` if it did.
async fn pause(sink: &EventSink, duration: Duration) -> bool {
    tokio::select! {
        biased;
        _ = sink.stopped() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// Returns `false` if the session stopped the client
async fn play(sink: &EventSink, script: Script) -> bool {
    if !pause(sink, script.connect_delay).await {
        return false;
    }
    if let Outcome::FailConnect(reason) = script.outcome {
        sink.emit(ClientEvent::Error(SessionError::Connect(reason))).await;
        return true;
    }
    sink.emit(ClientEvent::Connected).await;

    if !pause(sink, script.login_delay).await {
        return false;
    }
    if let Outcome::FailLogin(reason) = script.outcome {
        sink.emit(ClientEvent::Error(SessionError::Login(reason))).await;
        return true;
    }
    sink.emit(ClientEvent::LoginSuccess).await;

    for units in script.world_batches {
        if !pause(sink, script.batch_interval).await {
            return false;
        }
        sink.emit(ClientEvent::WorldData(units)).await;
    }

    if script.kick_after_batches {
        sink.emit(ClientEvent::Disconnected(DisconnectReason::Server(
            "kicked".to_string(),
        )))
        .await;
        return true;
    }

    sink.stopped().await;
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> ServerAddress {
        ServerAddress::new("localhost", 25565)
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_script_event_order() {
        let connector = ScriptedConnector::uniform(
            Script::join()
                .with_world(vec![4, 5], Duration::from_millis(10))
                .kicked(),
        );
        let mut handle = connector.connect(&target(), "Player0000");

        assert_eq!(handle.next_event().await, Some(ClientEvent::Connected));
        assert_eq!(handle.next_event().await, Some(ClientEvent::LoginSuccess));
        assert_eq!(handle.next_event().await, Some(ClientEvent::WorldData(4)));
        assert_eq!(handle.next_event().await, Some(ClientEvent::WorldData(5)));
        assert_eq!(
            handle.next_event().await,
            Some(ClientEvent::Disconnected(DisconnectReason::Server(
                "kicked".to_string()
            )))
        );
        assert_eq!(handle.next_event().await, None);
        assert_eq!(connector.attempts(), 1);
        assert_eq!(connector.local_stops(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_script_chosen_by_attempt() {
        let connector = ScriptedConnector::new(|attempt| {
            if attempt == 0 {
                Script::fail_connect("refused")
            } else {
                Script::fail_login("bad handshake")
            }
        });

        let mut first = connector.connect(&target(), "Player0000");
        assert_eq!(
            first.next_event().await,
            Some(ClientEvent::Error(SessionError::Connect("refused".into())))
        );

        let mut second = connector.connect(&target(), "Player0001");
        assert_eq!(second.next_event().await, Some(ClientEvent::Connected));
        assert_eq!(
            second.next_event().await,
            Some(ClientEvent::Error(SessionError::Login("bad handshake".into())))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_counts_local_stop() {
        let connector = ScriptedConnector::uniform(Script::join());
        let mut handle = connector.connect(&target(), "Player0000");
        assert_eq!(handle.next_event().await, Some(ClientEvent::Connected));
        assert_eq!(handle.next_event().await, Some(ClientEvent::LoginSuccess));

        handle.disconnect();
        assert_eq!(handle.next_event().await, None);
        assert_eq!(connector.local_stops(), 1);
    }
}
