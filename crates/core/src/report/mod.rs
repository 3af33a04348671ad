//! # Progress Reporting
//!
//! The reporter side of the swarm. A [`Reporter`] is handed to the
//! controller, which polls it with fresh [`SwarmSnapshot`]s on the
//! reporting cadence. Reporters only ever see snapshots.
//!
//! - [`TerminalReporter`] - redraws a header, chunk counter and progress
//!   bars in place, with log lines from a [`LogPane`] scrolling above
//! - [`LogReporter`] - periodic structured log lines for non-TTY output

pub mod log;
pub mod terminal;

pub use log::LogReporter;
pub use terminal::{progress_bar, LogPane, LogPaneWriter, TerminalReporter};

use std::io;

use crate::swarm::SwarmSnapshot;

/// Renders swarm progress
pub trait Reporter: Send + 'static {
    /// Draw the current state
    fn render(&mut self, snapshot: &SwarmSnapshot) -> io::Result<()>;

    /// Draw the final state and release any resources. Called once.
    fn close(&mut self, snapshot: &SwarmSnapshot) -> io::Result<()> {
        self.render(snapshot)
    }
}

impl Reporter for Box<dyn Reporter> {
    fn render(&mut self, snapshot: &SwarmSnapshot) -> io::Result<()> {
        (**self).render(snapshot)
    }

    fn close(&mut self, snapshot: &SwarmSnapshot) -> io::Result<()> {
        (**self).close(snapshot)
    }
}

/// Reporter that draws nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn render(&mut self, _snapshot: &SwarmSnapshot) -> io::Result<()> {
        Ok(())
    }
}
