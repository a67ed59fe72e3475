//! Unit-of-work interface and the buffered default scope.
//!
//! Atomic transitions run inside a scope obtained from the machine's
//! [`UowProvider`]. The engine stages its durable writes (the on_error
//! fallback state, transaction-mode audit events) on the scope so they
//! share its fate, and registers after-commit hooks for work that must
//! only happen once the scope has committed.

use crate::audit::{record_isolated, AuditSink, TransitionEvent};
use crate::error::ScopeError;
use crate::state::StateToken;
use crate::storage::{StateKey, StateStore};
use std::sync::Arc;

/// Staged mutation scope for one transition attempt.
///
/// Staged writes become durable iff `commit` succeeds. Hooks registered
/// with `after_commit` run exactly once, after a successful commit, and
/// never after a rollback.
pub trait UnitOfWork: Send {
    fn stage_state(&mut self, key: &StateKey, token: &StateToken);

    fn stage_event(&mut self, event: &TransitionEvent);

    fn after_commit(&mut self, hook: Box<dyn FnOnce() + Send>);

    fn commit(self: Box<Self>) -> Result<(), ScopeError>;

    fn rollback(self: Box<Self>);
}

/// Opens scopes for the engine.
///
/// Opening is infallible; a backend that cannot start a transaction should
/// return a scope whose `commit` fails.
pub trait UowProvider: Send + Sync {
    fn begin(&self) -> Box<dyn UnitOfWork>;
}

/// Default scope: stages writes in memory and flushes them through the
/// attached store and sink on commit.
///
/// Gives hosts without native transactions the documented rollback and
/// after-commit semantics. State writes flush in staging order; a backend
/// whose writes can fail partway should provide its own scope instead.
pub struct BufferedScope {
    store: Arc<dyn StateStore>,
    sink: Option<Arc<dyn AuditSink>>,
    states: Vec<(StateKey, StateToken)>,
    events: Vec<TransitionEvent>,
    hooks: Vec<Box<dyn FnOnce() + Send>>,
}

impl BufferedScope {
    pub fn new(store: Arc<dyn StateStore>, sink: Option<Arc<dyn AuditSink>>) -> Self {
        BufferedScope {
            store,
            sink,
            states: Vec::new(),
            events: Vec::new(),
            hooks: Vec::new(),
        }
    }
}

impl UnitOfWork for BufferedScope {
    fn stage_state(&mut self, key: &StateKey, token: &StateToken) {
        self.states.push((key.clone(), token.clone()));
    }

    fn stage_event(&mut self, event: &TransitionEvent) {
        self.events.push(event.clone());
    }

    fn after_commit(&mut self, hook: Box<dyn FnOnce() + Send>) {
        self.hooks.push(hook);
    }

    fn commit(self: Box<Self>) -> Result<(), ScopeError> {
        let scope = *self;

        for (key, token) in &scope.states {
            scope
                .store
                .write(key, token)
                .map_err(|e| ScopeError::with_source("state write failed", e))?;
        }

        // Audit faults never abort a commit.
        if let Some(sink) = &scope.sink {
            for event in &scope.events {
                record_isolated(sink.as_ref(), event);
            }
        }

        for hook in scope.hooks {
            hook();
        }

        Ok(())
    }

    fn rollback(self: Box<Self>) {}
}

/// Provider handing out [`BufferedScope`]s over a store and sink.
pub struct BufferedProvider {
    store: Arc<dyn StateStore>,
    sink: Option<Arc<dyn AuditSink>>,
}

impl BufferedProvider {
    pub fn new(store: Arc<dyn StateStore>, sink: Option<Arc<dyn AuditSink>>) -> Self {
        BufferedProvider { store, sink }
    }
}

impl UowProvider for BufferedProvider {
    fn begin(&self) -> Box<dyn UnitOfWork> {
        Box::new(BufferedScope::new(
            Arc::clone(&self.store),
            self.sink.clone(),
        ))
    }
}
