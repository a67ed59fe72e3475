//! Transition observers.
//!
//! Observers are per-machine, ordered, and synchronous. Pre-observers run
//! after the guards pass and before the body; post-observers run after the
//! unit of work has committed, on success only.

use crate::state::StateToken;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;

/// What observers learn about an attempt.
#[derive(Debug)]
pub struct TransitionNotice<'a> {
    pub field: &'a str,
    pub transition: &'a str,
    pub source: &'a StateToken,
    /// Declared target before firing (None when the target is dynamic);
    /// the resolved target afterwards.
    pub target: Option<&'a StateToken>,
    pub args: &'a Value,
}

pub(crate) type ObserverFn<O> = Arc<dyn Fn(&O, &TransitionNotice) + Send + Sync>;

/// Ordered observer lists for one machine.
pub(crate) struct Observers<O> {
    pre: RwLock<Vec<ObserverFn<O>>>,
    post: RwLock<Vec<ObserverFn<O>>>,
}

impl<O> Observers<O> {
    pub(crate) fn new() -> Self {
        Observers {
            pre: RwLock::new(Vec::new()),
            post: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn add_pre(&self, observer: ObserverFn<O>) {
        self.pre.write().push(observer);
    }

    pub(crate) fn add_post(&self, observer: ObserverFn<O>) {
        self.post.write().push(observer);
    }

    pub(crate) fn notify_pre(&self, owner: &O, notice: &TransitionNotice) {
        // Snapshot so observers may register observers without deadlocking.
        let observers: Vec<_> = self.pre.read().iter().map(Arc::clone).collect();
        for observer in observers {
            observer(owner, notice);
        }
    }

    pub(crate) fn notify_post(&self, owner: &O, notice: &TransitionNotice) {
        let observers: Vec<_> = self.post.read().iter().map(Arc::clone).collect();
        for observer in observers {
            observer(owner, notice);
        }
    }
}
