//! In-memory backend: committed state rows, native scopes, audit delegation.

use crate::error::StoreError;
use crate::log::AuditLog;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use statomic_core::{
    AuditSink, BoxError, ScopeError, StateKey, StateStore, StateToken, TransitionEvent,
    UnitOfWork, UowProvider,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Row {
    token: StateToken,
    revision: u64,
}

/// Shared in-memory backend.
///
/// One value serves as the machine's store, unit-of-work provider, and
/// audit sink, so a machine wired to it gets real transactional behavior
/// without an external database. Clones are cheap handles onto the same
/// rows and log.
#[derive(Clone)]
pub struct MemBackend {
    inner: Arc<Inner>,
}

struct Inner {
    rows: DashMap<StateKey, Row>,
    log: AuditLog,
    fail_next_commit: AtomicBool,
}

impl Inner {
    fn put(&self, key: &StateKey, token: StateToken) {
        match self.rows.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                let row = entry.get_mut();
                row.token = token;
                row.revision += 1;
            }
            Entry::Vacant(slot) => {
                slot.insert(Row { token, revision: 1 });
            }
        }
    }
}

impl MemBackend {
    pub fn new() -> Self {
        Self::with_log(AuditLog::new())
    }

    /// Backend over an existing log, e.g. one loaded from disk.
    pub fn with_log(log: AuditLog) -> Self {
        MemBackend {
            inner: Arc::new(Inner {
                rows: DashMap::new(),
                log,
                fail_next_commit: AtomicBool::new(false),
            }),
        }
    }

    pub fn log(&self) -> &AuditLog {
        &self.inner.log
    }

    /// Writes a committed value directly, bumping the row revision. This is
    /// the caller's save path after a successful transition.
    pub fn put(&self, key: &StateKey, token: impl Into<StateToken>) {
        self.inner.put(key, token.into());
    }

    pub fn len(&self) -> usize {
        self.inner.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.rows.is_empty()
    }

    /// Makes the next scope commit fail. Fault hook for rollback paths.
    pub fn fail_next_commit(&self) {
        self.inner.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Flushes the audit log to its persistence path, when it has one.
    pub fn sync(&self) -> Result<(), StoreError> {
        self.inner.log.persist()
    }
}

impl Default for MemBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore for MemBackend {
    fn read(&self, key: &StateKey) -> Option<StateToken> {
        self.inner.rows.get(key).map(|row| row.token.clone())
    }

    fn revision(&self, key: &StateKey) -> Option<u64> {
        self.inner.rows.get(key).map(|row| row.revision)
    }

    fn write(&self, key: &StateKey, token: &StateToken) -> Result<(), BoxError> {
        self.inner.put(key, token.clone());
        Ok(())
    }
}

impl UowProvider for MemBackend {
    fn begin(&self) -> Box<dyn UnitOfWork> {
        Box::new(MemScope {
            inner: Arc::clone(&self.inner),
            states: Vec::new(),
            events: Vec::new(),
            hooks: Vec::new(),
        })
    }
}

impl AuditSink for MemBackend {
    fn record(&self, event: &TransitionEvent) -> Result<(), BoxError> {
        self.inner.log.append(event.clone());
        Ok(())
    }
}

/// Native scope over the backend; staged writes land atomically on commit.
pub struct MemScope {
    inner: Arc<Inner>,
    states: Vec<(StateKey, StateToken)>,
    events: Vec<TransitionEvent>,
    hooks: Vec<Box<dyn FnOnce() + Send>>,
}

impl UnitOfWork for MemScope {
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

        if scope.inner.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(ScopeError::new("commit refused by fault injection"));
        }

        for (key, token) in scope.states {
            scope.inner.put(&key, token);
        }
        for event in scope.events {
            scope.inner.log.append(event);
        }
        for hook in scope.hooks {
            hook();
        }

        Ok(())
    }

    fn rollback(self: Box<Self>) {}
}
