//! # Swarm Orchestration
//!
//! Admission control and session lifecycle for a swarm of simulated clients.
//!
//! ## Session Flow
//!
//! ```text
//! admission tick → admit_session → Session::drive → client events → SwarmCounters → snapshot
//! ```

pub mod admission;
pub mod controller;
pub mod counters;
pub mod events;
pub mod session;
pub mod signal;

pub use admission::{session_name, should_admit};
pub use controller::{SwarmController, REPORT_INTERVAL};
pub use counters::{SwarmCounters, SwarmSnapshot};
pub use events::{SessionEvent, SessionEventKind};
pub use session::{Session, SessionOutcome, SessionState};
