//! # StressCraft Core
//!
//! The engine of the StressCraft load generator: decides when to spawn
//! simulated clients against a game server, tracks their lifecycle, and
//! exposes consistent snapshots of swarm health.
//!
//! ## Architecture
//!
//! - `config` - Swarm settings and target address
//! - `swarm/` - Admission controller, session state machine, shared counters
//! - `protocol/` - Protocol client boundary and shipped connectors
//! - `report/` - Progress reporters fed by snapshots
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stresscraft_core::config::{ServerAddress, SwarmConfig};
//! use stresscraft_core::protocol::TcpConnector;
//! use stresscraft_core::report::LogReporter;
//! use stresscraft_core::swarm::SwarmController;
//!
//! let swarm = Arc::new(SwarmController::new(
//!     ServerAddress::new("localhost", 25565),
//!     SwarmConfig::default(),
//!     TcpConnector::default(),
//! )?);
//! swarm.start(LogReporter::default())?;
//! swarm.arm_termination_handler()?.await?;
//! ```

pub mod config;
pub mod error;
pub mod protocol;
pub mod report;
pub mod swarm;

pub use config::{ServerAddress, SwarmConfig};
pub use error::{ConfigError, SessionError, SwarmError};
pub use swarm::{SwarmController, SwarmSnapshot};
