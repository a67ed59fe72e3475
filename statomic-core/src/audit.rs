//! Transition events and the audit emission policy.
//!
//! Every applied transition can leave one [`TransitionEvent`] on the
//! attached sink. In `transaction` mode the event is staged inside the
//! unit of work and exists iff the transition committed; in `signal`
//! mode it is written in the post-transition phase, after commit.
//! Sink failures are logged and never break a transition.

use crate::error::BoxError;
use crate::state::StateToken;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One recorded transition. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub event_id: Uuid,
    pub owner_kind: String,
    pub owner_id: String,
    pub transition: String,
    /// String forms of the tokens, as prefix matching sees them.
    pub source: String,
    pub target: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TransitionEvent {
    pub fn new(
        owner_kind: impl Into<String>,
        owner_id: impl Into<String>,
        transition: impl Into<String>,
        source: &StateToken,
        target: &StateToken,
    ) -> Self {
        TransitionEvent {
            event_id: Uuid::new_v4(),
            owner_kind: owner_kind.into(),
            owner_id: owner_id.into(),
            transition: transition.into(),
            source: source.to_string(),
            target: target.to_string(),
            timestamp: Utc::now(),
            principal: None,
            description: None,
        }
    }

    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Destination for transition events.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &TransitionEvent) -> Result<(), BoxError>;
}

/// Records on the sink, logging failures instead of surfacing them.
pub(crate) fn record_isolated(sink: &dyn AuditSink, event: &TransitionEvent) {
    if let Err(e) = sink.record(event) {
        tracing::error!(
            transition = %event.transition,
            owner = %event.owner_id,
            error = %e,
            "audit sink failed, event dropped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_event_construction() {
        let event = TransitionEvent::new(
            "post",
            "42",
            "submit",
            &StateToken::text("draft"),
            &StateToken::text("review"),
        )
        .with_principal("editor")
        .with_description("weekly batch");

        assert_eq!(event.owner_kind, "post");
        assert_eq!(event.source, "draft");
        assert_eq!(event.target, "review");
        assert_eq!(event.principal.as_deref(), Some("editor"));
        assert_eq!(event.description.as_deref(), Some("weekly batch"));
    }

    #[test]
    fn test_optional_fields_skipped_in_json() {
        let event = TransitionEvent::new(
            "post",
            "42",
            "submit",
            &StateToken::text("draft"),
            &StateToken::text("review"),
        );

        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("principal").is_none());
        assert!(json.get("description").is_none());
        assert!(json.get("event_id").is_some());
    }

    #[test]
    fn test_event_ids_are_unique() {
        let a = TransitionEvent::new("p", "1", "t", &StateToken::Int(1), &StateToken::Int(2));
        let b = TransitionEvent::new("p", "1", "t", &StateToken::Int(1), &StateToken::Int(2));
        assert_ne!(a.event_id, b.event_id);
    }

    struct FailingSink;

    impl AuditSink for FailingSink {
        fn record(&self, _event: &TransitionEvent) -> Result<(), BoxError> {
            Err("sink unavailable".into())
        }
    }

    struct VecSink(Mutex<Vec<TransitionEvent>>);

    impl AuditSink for VecSink {
        fn record(&self, event: &TransitionEvent) -> Result<(), BoxError> {
            self.0.lock().push(event.clone());
            Ok(())
        }
    }

    #[test]
    fn test_record_isolated_swallows_sink_failure() {
        let event = TransitionEvent::new("p", "1", "t", &StateToken::Int(1), &StateToken::Int(2));
        // Must not panic or surface the error.
        record_isolated(&FailingSink, &event);
    }

    #[test]
    fn test_record_isolated_delivers() {
        let sink = VecSink(Mutex::new(Vec::new()));
        let event = TransitionEvent::new("p", "1", "t", &StateToken::Int(1), &StateToken::Int(2));
        record_isolated(&sink, &event);
        assert_eq!(sink.0.lock().len(), 1);
    }
}
