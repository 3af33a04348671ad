//! # Session
//!
//! One simulated client: a finite state machine fed by protocol client
//! events, plus the async driver that pumps those events into it.
//!
//! ```text
//! Created → Connecting → LoggingIn → Active → Disconnected
//!               │            │
//!               └────────────┴──────────────→ Failed
//! ```
//!
//! Every transition is a short counter update; nothing is locked across an
//! await point.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::counters::SwarmCounters;
use super::events::{SessionEvent, SessionEventKind};
use crate::config::ServerAddress;
use crate::error::SessionError;
use crate::protocol::{ClientEvent, Connector, DisconnectReason};

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Created,
    Connecting,
    LoggingIn,
    Active,
    Disconnected,
    Failed,
}

impl SessionState {
    /// `Disconnected` and `Failed` end the session
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Disconnected | SessionState::Failed)
    }
}

/// One simulated client
#[derive(Debug)]
pub struct Session {
    id: u64,
    name: String,
    state: SessionState,
    world_units: u64,
    error: Option<SessionError>,
    transitions: Vec<SessionEvent>,
    counters: Arc<SwarmCounters>,
}

impl Session {
    /// Create a session in the `Created` state
    pub fn new(id: u64, name: String, counters: Arc<SwarmCounters>) -> Self {
        Self {
            id,
            name,
            state: SessionState::Created,
            world_units: 0,
            error: None,
            transitions: Vec::new(),
            counters,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// World-data units this session received
    pub fn world_units(&self) -> u64 {
        self.world_units
    }

    /// Transitions taken so far, oldest first
    pub fn transitions(&self) -> &[SessionEvent] {
        &self.transitions
    }

    /// `Created → Connecting`. Returns `false` from any other state.
    pub fn begin_connect(&mut self) -> bool {
        if self.state != SessionState::Created {
            return false;
        }
        self.transition(SessionEventKind::Connecting, SessionState::Connecting, None);
        true
    }

    /// Apply one client event and return the resulting state.
    ///
    /// Events that do not fit the current state are ignored.
    pub fn apply(&mut self, event: ClientEvent) -> SessionState {
        use SessionState::*;

        match (self.state, event) {
            (Connecting, ClientEvent::Connected) => {
                self.transition(SessionEventKind::Connected, LoggingIn, None);
            }
            (LoggingIn, ClientEvent::LoginSuccess) => {
                if self.counters.session_joined() {
                    self.transition(SessionEventKind::Joined, Active, None);
                } else {
                    // Joining would push active past created; this session was never admitted.
                    self.fail(SessionError::Login("join not backed by an admission".into()));
                }
            }
            (Active, ClientEvent::WorldData(units)) => {
                self.world_units += units;
                self.counters.add_world_units(units);
            }
            (Active, ClientEvent::Disconnected(reason)) => {
                self.leave(reason.to_string());
            }
            // Errors after joining end the session like any other disconnect.
            (Active, ClientEvent::Error(err)) => {
                self.leave(err.to_string());
            }
            (Connecting | LoggingIn, ClientEvent::Error(err)) => {
                self.fail(err);
            }
            (Connecting, ClientEvent::Disconnected(reason)) => {
                self.fail(SessionError::Connect(reason.to_string()));
            }
            (LoggingIn, ClientEvent::Disconnected(reason)) => {
                self.fail(SessionError::Login(reason.to_string()));
            }
            (state, event) => {
                tracing::trace!(session = %self.name, ?state, ?event, "ignoring event");
            }
        }
        self.state
    }

    /// Stop the session on local shutdown.
    ///
    /// An `Active` session disconnects as usual. A session that has not
    /// joined yet ends `Failed` with [`SessionError::Aborted`] but is not
    /// counted in `sessions_failed`.
    pub fn abort(&mut self) -> SessionState {
        use SessionState::*;

        match self.state {
            Active => self.leave(DisconnectReason::Local.to_string()),
            Created | Connecting | LoggingIn => {
                let err = SessionError::Aborted;
                self.transition(SessionEventKind::Aborted, Failed, Some(err.to_string()));
                self.error = Some(err);
            }
            Disconnected | Failed => {}
        }
        self.state
    }

    fn leave(&mut self, reason: String) {
        self.counters.session_left();
        self.transition(
            SessionEventKind::Disconnected,
            SessionState::Disconnected,
            Some(reason),
        );
    }

    fn fail(&mut self, err: SessionError) {
        self.counters.session_failed();
        self.transition(
            SessionEventKind::Failed,
            SessionState::Failed,
            Some(err.to_string()),
        );
        self.error = Some(err);
    }

    fn transition(&mut self, kind: SessionEventKind, to: SessionState, detail: Option<String>) {
        let mut event = SessionEvent::new(kind, &self.name, self.state, to);
        if let Some(detail) = detail {
            event = event.with_detail(detail);
        }
        event.emit();
        self.transitions.push(event);
        self.state = to;
    }

    /// Run the session to a terminal state.
    ///
    /// Starts the client, feeds its events into [`Session::apply`], and
    /// disconnects it when `shutdown` fires.
    pub async fn drive<C: Connector + ?Sized>(
        mut self,
        connector: &C,
        target: &ServerAddress,
        shutdown: CancellationToken,
    ) -> SessionOutcome {
        self.begin_connect();
        let mut client = connector.connect(target, &self.name);

        while !self.state.is_terminal() {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    client.disconnect();
                    self.abort();
                }
                event = client.next_event() => {
                    let event = event
                        .unwrap_or(ClientEvent::Disconnected(DisconnectReason::StreamClosed));
                    self.apply(event);
                }
            }
        }

        self.into_outcome()
    }

    fn into_outcome(self) -> SessionOutcome {
        SessionOutcome {
            id: self.id,
            name: self.name,
            state: self.state,
            world_units: self.world_units,
            error: self.error,
        }
    }
}

/// What a finished session amounted to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub id: u64,
    pub name: String,
    pub state: SessionState,
    pub world_units: u64,
    pub error: Option<SessionError>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Script, ScriptedConnector};
    use std::time::Duration;

    fn session(counters: &Arc<SwarmCounters>) -> Session {
        counters.session_created();
        Session::new(0, "Player0000".to_string(), Arc::clone(counters))
    }

    #[test]
    fn test_join_and_disconnect_moves_active_counter() {
        let counters = Arc::new(SwarmCounters::new());
        let mut session = session(&counters);

        assert!(session.begin_connect());
        assert_eq!(session.apply(ClientEvent::Connected), SessionState::LoggingIn);
        assert_eq!(counters.created_and_active(), (1, 0));

        assert_eq!(session.apply(ClientEvent::LoginSuccess), SessionState::Active);
        assert_eq!(counters.created_and_active(), (1, 1));

        session.apply(ClientEvent::WorldData(7));
        session.apply(ClientEvent::WorldData(2));
        assert_eq!(session.world_units(), 9);
        assert_eq!(counters.snapshot(1).world_units_loaded, 9);

        let state = session.apply(ClientEvent::Disconnected(DisconnectReason::Server(
            "kicked".into(),
        )));
        assert_eq!(state, SessionState::Disconnected);
        assert_eq!(counters.created_and_active(), (1, 0));
        assert_eq!(counters.snapshot(1).sessions_failed, 0);
    }

    #[test]
    fn test_failure_before_active_leaves_active_untouched() {
        let counters = Arc::new(SwarmCounters::new());
        let mut session = session(&counters);
        session.begin_connect();
        session.apply(ClientEvent::Connected);

        let state = session.apply(ClientEvent::Error(SessionError::Login("bad handshake".into())));
        assert_eq!(state, SessionState::Failed);

        let snapshot = counters.snapshot(1);
        assert_eq!(snapshot.sessions_created, 1);
        assert_eq!(snapshot.sessions_active, 0);
        assert_eq!(snapshot.sessions_failed, 1);
    }

    #[test]
    fn test_disconnect_while_connecting_is_connect_failure() {
        let counters = Arc::new(SwarmCounters::new());
        let mut session = session(&counters);
        session.begin_connect();

        session.apply(ClientEvent::Disconnected(DisconnectReason::StreamClosed));
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(counters.snapshot(1).sessions_failed, 1);
        assert!(matches!(session.into_outcome().error, Some(SessionError::Connect(_))));
    }

    #[test]
    fn test_abort_before_join_is_not_counted_as_failure() {
        let counters = Arc::new(SwarmCounters::new());
        let mut connecting = session(&counters);
        connecting.begin_connect();
        assert_eq!(connecting.abort(), SessionState::Failed);

        let mut logging_in = session(&counters);
        logging_in.begin_connect();
        logging_in.apply(ClientEvent::Connected);
        assert_eq!(logging_in.abort(), SessionState::Failed);
        assert_eq!(
            logging_in.transitions().last().map(|e| e.kind),
            Some(SessionEventKind::Aborted)
        );

        let snapshot = counters.snapshot(2);
        assert_eq!(snapshot.sessions_failed, 0);
        assert_eq!(snapshot.sessions_active, 0);
        assert_eq!(connecting.into_outcome().error, Some(SessionError::Aborted));
    }

    #[test]
    fn test_abort_disconnects_active_session() {
        let counters = Arc::new(SwarmCounters::new());
        let mut session = session(&counters);
        session.begin_connect();
        session.apply(ClientEvent::Connected);
        session.apply(ClientEvent::LoginSuccess);

        assert_eq!(session.abort(), SessionState::Disconnected);
        assert_eq!(session.abort(), SessionState::Disconnected);
        assert_eq!(counters.created_and_active(), (1, 0));
        assert_eq!(counters.snapshot(1).sessions_failed, 0);
    }

    #[test]
    fn test_unadmitted_join_is_refused() {
        let counters = Arc::new(SwarmCounters::new());
        // Never counted as created.
        let mut stray = Session::new(7, "Player0007".to_string(), Arc::clone(&counters));
        stray.begin_connect();
        stray.apply(ClientEvent::Connected);

        assert_eq!(stray.apply(ClientEvent::LoginSuccess), SessionState::Failed);
        assert_eq!(counters.created_and_active(), (0, 0));
    }

    #[test]
    fn test_out_of_order_events_are_ignored() {
        let counters = Arc::new(SwarmCounters::new());
        let mut session = session(&counters);

        // Nothing happens before the connect starts.
        assert_eq!(session.apply(ClientEvent::LoginSuccess), SessionState::Created);

        session.begin_connect();
        assert_eq!(session.apply(ClientEvent::WorldData(5)), SessionState::Connecting);
        assert_eq!(session.apply(ClientEvent::LoginSuccess), SessionState::Connecting);
        assert_eq!(counters.snapshot(1).world_units_loaded, 0);
        assert!(!session.begin_connect());
    }

    #[test]
    fn test_terminal_states_absorb_events() {
        let counters = Arc::new(SwarmCounters::new());
        let mut session = session(&counters);
        session.begin_connect();
        session.apply(ClientEvent::Connected);
        session.apply(ClientEvent::LoginSuccess);
        session.apply(ClientEvent::Disconnected(DisconnectReason::Local));

        // A second disconnect must not decrement again.
        session.apply(ClientEvent::Disconnected(DisconnectReason::Local));
        session.apply(ClientEvent::WorldData(3));
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(counters.created_and_active(), (1, 0));
        assert_eq!(session.world_units(), 0);

        let kinds: Vec<_> = session.transitions().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SessionEventKind::Connecting,
                SessionEventKind::Connected,
                SessionEventKind::Joined,
                SessionEventKind::Disconnected,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_until_server_kick() {
        let counters = Arc::new(SwarmCounters::new());
        let connector = ScriptedConnector::uniform(
            Script::join()
                .with_world(vec![3, 3, 3], Duration::from_millis(5))
                .kicked(),
        );

        let outcome = session(&counters)
            .drive(
                &connector,
                &ServerAddress::new("localhost", 25565),
                CancellationToken::new(),
            )
            .await;

        assert_eq!(outcome.state, SessionState::Disconnected);
        assert_eq!(outcome.world_units, 9);
        assert_eq!(counters.snapshot(1).world_units_loaded, 9);
        assert_eq!(counters.created_and_active(), (1, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_stops_on_shutdown() {
        let counters = Arc::new(SwarmCounters::new());
        let connector = ScriptedConnector::uniform(Script::join());
        let shutdown = CancellationToken::new();

        let driver = tokio::spawn({
            let session = session(&counters);
            let connector = connector.clone();
            let shutdown = shutdown.clone();
            async move {
                session
                    .drive(&connector, &ServerAddress::new("localhost", 25565), shutdown)
                    .await
            }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(counters.created_and_active(), (1, 1));

        shutdown.cancel();
        let outcome = driver.await.unwrap();
        assert_eq!(outcome.state, SessionState::Disconnected);
        assert_eq!(counters.created_and_active(), (1, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_shutdown_mid_connect() {
        let counters = Arc::new(SwarmCounters::new());
        let connector = ScriptedConnector::uniform(
            Script::join().with_delays(Duration::from_secs(60), Duration::ZERO),
        );
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let outcome = session(&counters)
            .drive(&connector, &ServerAddress::new("localhost", 25565), shutdown)
            .await;

        assert_eq!(outcome.state, SessionState::Failed);
        assert_eq!(outcome.error, Some(SessionError::Aborted));
        assert_eq!(counters.snapshot(1).sessions_failed, 0);
    }
}
