//! Guard evaluation: ordered conditions and the permission check.
//!
//! Guards are effect-free. Conditions run in declared order and
//! short-circuit on the first failure; the permission check runs last,
//! against the acting principal. Failures carry the guard's label so
//! callers can tell which rule rejected the attempt.

use std::fmt;
use std::sync::Arc;

/// Guard label reported when the permission check fails.
pub const PERMISSION_GUARD: &str = "permission";

/// Identity of the principal attempting a transition.
pub trait Actor {
    fn actor_id(&self) -> String;
}

/// A labelled predicate over the owning object.
pub struct Condition<O> {
    label: String,
    check: Arc<dyn Fn(&O) -> bool + Send + Sync>,
}

impl<O> Condition<O> {
    pub fn new(
        label: impl Into<String>,
        check: impl Fn(&O) -> bool + Send + Sync + 'static,
    ) -> Self {
        Condition {
            label: label.into(),
            check: Arc::new(check),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn check(&self, owner: &O) -> bool {
        (self.check)(owner)
    }
}

impl<O> Clone for Condition<O> {
    fn clone(&self) -> Self {
        Condition {
            label: self.label.clone(),
            check: Arc::clone(&self.check),
        }
    }
}

impl<O> fmt::Debug for Condition<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Predicate over (owning object, acting principal).
pub struct Permission<O> {
    check: Arc<dyn Fn(&O, &dyn Actor) -> bool + Send + Sync>,
}

impl<O> Permission<O> {
    pub fn new(check: impl Fn(&O, &dyn Actor) -> bool + Send + Sync + 'static) -> Self {
        Permission {
            check: Arc::new(check),
        }
    }

    pub fn check(&self, owner: &O, actor: &dyn Actor) -> bool {
        (self.check)(owner, actor)
    }
}

impl<O> Clone for Permission<O> {
    fn clone(&self) -> Self {
        Permission {
            check: Arc::clone(&self.check),
        }
    }
}

impl<O> fmt::Debug for Permission<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Permission").finish_non_exhaustive()
    }
}

/// Returns the label of the first failing guard, or None when all pass.
///
/// A declared permission with no principal supplied denies.
pub(crate) fn first_failure<O>(
    conditions: &[Condition<O>],
    permission: Option<&Permission<O>>,
    owner: &O,
    principal: Option<&dyn Actor>,
) -> Option<String> {
    for condition in conditions {
        if !condition.check(owner) {
            return Some(condition.label().to_string());
        }
    }

    if let Some(permission) = permission {
        match principal {
            Some(actor) if permission.check(owner, actor) => {}
            _ => return Some(PERMISSION_GUARD.to_string()),
        }
    }

    None
}
