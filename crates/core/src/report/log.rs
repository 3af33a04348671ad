//! Log-line reporter for output that is not a terminal.

use std::io;
use std::time::Duration;
use tokio::time::Instant;

use super::Reporter;
use crate::swarm::SwarmSnapshot;

/// Emits a `tracing` line when the swarm changed and `every` has passed
#[derive(Debug)]
pub struct LogReporter {
    every: Duration,
    last: Option<(Instant, SwarmSnapshot)>,
}

impl LogReporter {
    pub fn new(every: Duration) -> Self {
        Self { every, last: None }
    }

    fn log(snapshot: &SwarmSnapshot, message: &'static str) {
        tracing::info!(
            created = snapshot.sessions_created,
            active = snapshot.sessions_active,
            failed = snapshot.sessions_failed,
            target = snapshot.target_count,
            chunks = snapshot.world_units_loaded,
            "{}",
            message
        );
    }
}

impl Default for LogReporter {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl Reporter for LogReporter {
    fn render(&mut self, snapshot: &SwarmSnapshot) -> io::Result<()> {
        let now = Instant::now();
        let due = match &self.last {
            None => true,
            Some((at, last)) => last != snapshot && now.duration_since(*at) >= self.every,
        };
        if due {
            Self::log(snapshot, "swarm progress");
            self.last = Some((now, *snapshot));
        }
        Ok(())
    }

    fn close(&mut self, snapshot: &SwarmSnapshot) -> io::Result<()> {
        Self::log(snapshot, "swarm final state");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_throttles_unchanged_and_frequent_updates() {
        let mut reporter = LogReporter::new(Duration::from_secs(1));
        let mut snapshot = SwarmSnapshot::default();

        reporter.render(&snapshot).unwrap();
        let first = reporter.last.unwrap().0;

        snapshot.sessions_created = 1;
        reporter.render(&snapshot).unwrap();
        assert_eq!(reporter.last.unwrap().0, first);

        tokio::time::advance(Duration::from_secs(1)).await;
        reporter.render(&snapshot).unwrap();
        assert_eq!(reporter.last.unwrap().1.sessions_created, 1);

        // Unchanged state is not repeated.
        tokio::time::advance(Duration::from_secs(5)).await;
        let before = reporter.last.unwrap().0;
        reporter.render(&snapshot).unwrap();
        assert_eq!(reporter.last.unwrap().0, before);
    }
}
