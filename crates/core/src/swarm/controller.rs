//! # Swarm Controller
//!
//! Owns the swarm: decides when to admit a new session, keeps the shared
//! counters, and serves snapshots to the reporter.
//!
//! Two independent periodic tasks run while the swarm is up:
//!
//! ```text
//! admission loop (every `delay`)     reporting loop (every 100ms)
//!     │                                   │
//!     ├── should_admit? ── admit_session  ├── snapshot() ── Reporter::render
//!     │         │                         │
//!     │         └── spawn Session::drive ─┼──▶ SwarmCounters ◀── snapshot()
//! ```
//!
//! The loops only meet through [`SwarmCounters`]. Both stop on the shared
//! shutdown token; sessions hold child tokens of it.

use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};

use super::admission::{self, should_admit};
use super::counters::{SwarmCounters, SwarmSnapshot};
use super::session::Session;
use super::signal;
use crate::config::{ServerAddress, SwarmConfig};
use crate::error::SwarmError;
use crate::protocol::Connector;
use crate::report::Reporter;

/// Default reporting period (10 FPS)
pub const REPORT_INTERVAL: Duration = Duration::from_millis(100);

enum RunState {
    Idle,
    Running {
        admission: JoinHandle<()>,
        reporting: JoinHandle<()>,
    },
    Stopped,
}

/// The swarm controller
pub struct SwarmController<C: Connector> {
    target: ServerAddress,
    config: SwarmConfig,
    connector: Arc<C>,
    counters: Arc<SwarmCounters>,
    next_seq: AtomicU64,
    report_interval: Duration,
    cancel: CancellationToken,
    sessions: TaskTracker,
    state: Mutex<RunState>,
}

impl<C: Connector> SwarmController<C> {
    /// Create a controller. Fails if the configuration cannot be run.
    pub fn new(target: ServerAddress, config: SwarmConfig, connector: C) -> Result<Self, SwarmError> {
        config.validate()?;
        if config.simulate {
            debug!("client simulation requested; sessions only connect and idle");
        }
        Ok(Self {
            target,
            config,
            connector: Arc::new(connector),
            counters: Arc::new(SwarmCounters::new()),
            next_seq: AtomicU64::new(0),
            report_interval: REPORT_INTERVAL,
            cancel: CancellationToken::new(),
            sessions: TaskTracker::new(),
            state: Mutex::new(RunState::Idle),
        })
    }

    /// Override the reporting period (at least 1ms)
    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    pub fn target(&self) -> &ServerAddress {
        &self.target
    }

    fn lock_state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start the admission and reporting loops.
    ///
    /// The first admission tick fires immediately.
    pub fn start<R: Reporter>(self: &Arc<Self>, reporter: R) -> Result<(), SwarmError> {
        let runtime = Handle::try_current().map_err(|_| SwarmError::NoRuntime)?;

        let mut state = self.lock_state();
        match *state {
            RunState::Idle => {}
            RunState::Running { .. } => return Err(SwarmError::AlreadyStarted),
            RunState::Stopped => return Err(SwarmError::ShutDown),
        }

        info!(
            server = %self.target,
            count = self.config.target_count,
            delay_ms = self.config.delay_ms,
            buffer = self.config.buffer,
            "starting swarm"
        );

        let admission = runtime.spawn(Arc::clone(self).admission_loop());
        let reporting = runtime.spawn(reporting_loop(
            Arc::clone(&self.counters),
            self.config.target_count,
            self.report_interval,
            self.cancel.clone(),
            reporter,
        ));
        *state = RunState::Running {
            admission,
            reporting,
        };
        Ok(())
    }

    /// Shut the swarm down on the first SIGINT/SIGTERM.
    ///
    /// The returned task finishes after that shutdown completes, or as soon
    /// as the swarm is shut down some other way.
    pub fn arm_termination_handler(self: &Arc<Self>) -> Result<JoinHandle<bool>, SwarmError> {
        self.shutdown_on(signal::termination())
    }

    /// Shut the swarm down once `trigger` resolves.
    ///
    /// The task yields `true` if it performed the shutdown and `false` if
    /// the swarm was already shut down by someone else. A trigger that
    /// fails still shuts the swarm down.
    pub fn shutdown_on<F>(self: &Arc<Self>, trigger: F) -> Result<JoinHandle<bool>, SwarmError>
    where
        F: Future<Output = io::Result<()>> + Send + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| SwarmError::NoRuntime)?;
        let swarm = Arc::clone(self);

        Ok(runtime.spawn(async move {
            tokio::select! {
                _ = swarm.cancel.cancelled() => false,
                result = trigger => {
                    match result {
                        Ok(()) => info!("termination signal received"),
                        Err(e) => warn!(error = %e, "cannot listen for termination signals"),
                    }
                    swarm.shutdown().await
                }
            }
        }))
    }

    async fn admission_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.delay());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.admission_tick();
                }
            }
        }
        debug!("admission loop stopped");
    }

    /// Run the admission policy once. Returns `true` if a session was admitted.
    ///
    /// No-op once the swarm is shut down.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime while a session is admitted.
    pub fn admission_tick(&self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        let (created, active) = self.counters.created_and_active();
        if !should_admit(created, active, self.config.target_count, self.config.buffer) {
            trace!(created, active, "admission skipped");
            return false;
        }
        self.admit_session();
        true
    }

    /// Admit one session unconditionally and start its connection.
    ///
    /// Returns the session's sequence number. `sessions_created` is bumped
    /// before the connect starts.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime, since the session driver is
    /// spawned onto the current one.
    pub fn admit_session(&self) -> u64 {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let name = admission::session_name(&self.config.prefix, seq);
        self.counters.session_created();

        let session = Session::new(seq, name, Arc::clone(&self.counters));
        let connector = Arc::clone(&self.connector);
        let target = self.target.clone();
        let shutdown = self.cancel.child_token();

        self.sessions.spawn(async move {
            let outcome = session.drive(connector.as_ref(), &target, shutdown).await;
            trace!(
                session = %outcome.name,
                state = ?outcome.state,
                chunks = outcome.world_units,
                "session finished"
            );
        });
        seq
    }

    /// Consistent copy of the counters
    pub fn snapshot(&self) -> SwarmSnapshot {
        self.counters.snapshot(self.config.target_count)
    }

    /// Stop both loops, tell live sessions to disconnect, and close the
    /// reporter.
    ///
    /// Returns `true` for the call that performed the shutdown; repeated or
    /// concurrent calls return `false` and do nothing. Does not wait for
    /// sessions to finish disconnecting.
    pub async fn shutdown(&self) -> bool {
        let previous = std::mem::replace(&mut *self.lock_state(), RunState::Stopped);
        let loops = match previous {
            RunState::Stopped => return false,
            RunState::Idle => None,
            RunState::Running {
                admission,
                reporting,
            } => Some((admission, reporting)),
        };

        self.cancel.cancel();
        self.sessions.close();

        if let Some((admission, reporting)) = loops {
            for (name, handle) in [("admission", admission), ("reporting", reporting)] {
                if let Err(e) = handle.await {
                    warn!(task = name, error = %e, "loop ended abnormally");
                }
            }
        }

        let snapshot = self.snapshot();
        info!(
            created = snapshot.sessions_created,
            active = snapshot.sessions_active,
            failed = snapshot.sessions_failed,
            chunks = snapshot.world_units_loaded,
            "swarm shut down"
        );
        true
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait until every session driver has finished. Only resolves after
    /// [`shutdown`](Self::shutdown).
    pub async fn wait_sessions(&self) {
        self.sessions.wait().await
    }

    /// Session drivers still running
    pub fn live_sessions(&self) -> usize {
        self.sessions.len()
    }
}

async fn reporting_loop<R: Reporter>(
    counters: Arc<SwarmCounters>,
    target_count: u32,
    interval: Duration,
    shutdown: CancellationToken,
    mut reporter: R,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = reporter.render(&counters.snapshot(target_count)) {
                    warn!(error = %e, "progress render failed");
                }
            }
        }
    }

    if let Err(e) = reporter.close(&counters.snapshot(target_count)) {
        warn!(error = %e, "closing progress reporter failed");
    }
    debug!("reporting loop stopped");
}
