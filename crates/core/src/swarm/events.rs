//! # Session Events
//!
//! Records of session state transitions, emitted through `tracing`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::session::SessionState;

/// Kind of session event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionEventKind {
    /// Connect started
    Connecting,
    /// Transport established, logging in
    Connected,
    /// Login completed
    Joined,
    /// Active session ended
    Disconnected,
    /// Session failed before joining
    Failed,
    /// Session stopped by shutdown before joining
    Aborted,
}

/// A state transition of one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    /// Timestamp
    pub timestamp: DateTime<Utc>,
    /// Kind of event
    pub kind: SessionEventKind,
    /// Session display name
    pub session: String,
    pub from: SessionState,
    pub to: SessionState,
    /// Failure or disconnect reason if applicable
    #[serde(default)]
    pub detail: Option<String>,
}

impl SessionEvent {
    /// Create a new event
    pub fn new(kind: SessionEventKind, session: &str, from: SessionState, to: SessionState) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            session: session.to_string(),
            from,
            to,
            detail: None,
        }
    }

    /// Attach a reason to the event
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Log the event at a level matching its kind
    pub fn emit(&self) {
        let detail = self.detail.as_deref().unwrap_or("");
        match self.kind {
            SessionEventKind::Failed => tracing::warn!(
                session = %self.session,
                from = ?self.from,
                reason = detail,
                "session failed"
            ),
            SessionEventKind::Aborted => tracing::debug!(
                session = %self.session,
                from = ?self.from,
                "session aborted by shutdown"
            ),
            SessionEventKind::Disconnected => tracing::debug!(
                session = %self.session,
                reason = detail,
                "session disconnected"
            ),
            kind => tracing::debug!(
                session = %self.session,
                event = ?kind,
                state = ?self.to,
                "session transition"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let event = SessionEvent::new(
            SessionEventKind::Failed,
            "Player0003",
            SessionState::Connecting,
            SessionState::Failed,
        )
        .with_detail("connect failed: refused");

        assert_eq!(event.session, "Player0003");
        assert_eq!(event.detail.as_deref(), Some("connect failed: refused"));
    }

    #[test]
    fn test_event_serialization() {
        let event = SessionEvent::new(
            SessionEventKind::Joined,
            "Player0000",
            SessionState::LoggingIn,
            SessionState::Active,
        );
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"joined\""));
        assert!(json.contains("\"to\":\"active\""));
    }
}
