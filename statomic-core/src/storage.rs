//! Committed-state storage interface.

use crate::error::BoxError;
use crate::state::StateToken;
use serde::{Deserialize, Serialize};

/// Storage key for one owner's state field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateKey {
    pub kind: String,
    pub id: String,
    pub field: String,
}

impl StateKey {
    pub fn new(kind: impl Into<String>, id: impl Into<String>, field: impl Into<String>) -> Self {
        StateKey {
            kind: kind.into(),
            id: id.into(),
            field: field.into(),
        }
    }
}

/// Committed-state reads and writes.
///
/// `read` must reflect the most recently committed value for the key; both
/// sides of the concurrency guard go through it.
pub trait StateStore: Send + Sync {
    fn read(&self, key: &StateKey) -> Option<StateToken>;

    /// Monotonic per-key revision, when the backend tracks one.
    fn revision(&self, key: &StateKey) -> Option<u64>;

    fn write(&self, key: &StateKey, token: &StateToken) -> Result<(), BoxError>;
}

/// No backing store: reads are empty, writes are dropped, and the
/// concurrency guard never fires. The default for detached owners.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedStore;

impl StateStore for DetachedStore {
    fn read(&self, _key: &StateKey) -> Option<StateToken> {
        None
    }

    fn revision(&self, _key: &StateKey) -> Option<u64> {
        None
    }

    fn write(&self, _key: &StateKey, _token: &StateToken) -> Result<(), BoxError> {
        Ok(())
    }
}
