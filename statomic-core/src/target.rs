//! Target resolution for fixed and dynamic transitions.
//!
//! Most transitions land on one declared token. Dynamic transitions pick
//! the token at fire time, either by running a callable over the owner
//! and the fire arguments, or by mapping the body's return value onto a
//! declared outcome set. Either way the result must stay inside the set
//! the definition declared; anything else is a programming error surfaced
//! as [`EngineError::InvalidResolvedState`].

use crate::error::EngineError;
use crate::state::StateToken;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Where a transition lands.
pub enum Target<O> {
    /// Always the same declared token.
    Fixed(StateToken),
    /// Computed by a callable from (owner, fire arguments).
    Computed {
        states: Vec<StateToken>,
        resolve: Arc<dyn Fn(&O, &Value) -> StateToken + Send + Sync>,
    },
    /// Mapped from the body's return value.
    FromOutcome { states: Vec<StateToken> },
}

impl<O> Target<O> {
    pub fn fixed(token: impl Into<StateToken>) -> Self {
        Target::Fixed(token.into())
    }

    pub fn computed<I, T>(
        states: I,
        resolve: impl Fn(&O, &Value) -> StateToken + Send + Sync + 'static,
    ) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<StateToken>,
    {
        Target::Computed {
            states: states.into_iter().map(Into::into).collect(),
            resolve: Arc::new(resolve),
        }
    }

    pub fn from_outcome<I, T>(states: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<StateToken>,
    {
        Target::FromOutcome {
            states: states.into_iter().map(Into::into).collect(),
        }
    }

    /// The declared target when it is knowable before firing.
    pub fn fixed_token(&self) -> Option<&StateToken> {
        match self {
            Target::Fixed(token) => Some(token),
            _ => None,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        !matches!(self, Target::Fixed(_))
    }

    /// Every token this target may land on; all must be declared on the field.
    pub fn tokens(&self) -> &[StateToken] {
        match self {
            Target::Fixed(token) => std::slice::from_ref(token),
            Target::Computed { states, .. } => states,
            Target::FromOutcome { states } => states,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Target::Fixed(_) => "fixed",
            Target::Computed { .. } => "computed",
            Target::FromOutcome { .. } => "from_outcome",
        }
    }

    /// Resolves the landing token for one attempt.
    pub(crate) fn resolve(
        &self,
        name: &str,
        owner: &O,
        args: &Value,
        outcome: &Value,
    ) -> Result<StateToken, EngineError> {
        match self {
            Target::Fixed(token) => Ok(token.clone()),
            Target::Computed { states, resolve } => {
                let token = resolve(owner, args);
                if states.contains(&token) {
                    Ok(token)
                } else {
                    Err(EngineError::InvalidResolvedState {
                        name: name.to_string(),
                        resolved: token.to_string(),
                    })
                }
            }
            Target::FromOutcome { states } => states
                .iter()
                .find(|token| outcome_matches(token, outcome))
                .cloned()
                .ok_or_else(|| EngineError::InvalidResolvedState {
                    name: name.to_string(),
                    resolved: describe_outcome(outcome),
                }),
        }
    }
}

fn outcome_matches(token: &StateToken, outcome: &Value) -> bool {
    match (token, outcome) {
        (StateToken::Text(s), Value::String(v)) => s == v,
        (StateToken::Int(i), Value::Number(n)) => n.as_i64() == Some(*i),
        (StateToken::Key(k), Value::String(v)) => v.parse::<Uuid>().map(|u| u == *k).unwrap_or(false),
        _ => false,
    }
}

fn describe_outcome(outcome: &Value) -> String {
    match outcome {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl<O> Clone for Target<O> {
    fn clone(&self) -> Self {
        match self {
            Target::Fixed(token) => Target::Fixed(token.clone()),
            Target::Computed { states, resolve } => Target::Computed {
                states: states.clone(),
                resolve: Arc::clone(resolve),
            },
            Target::FromOutcome { states } => Target::FromOutcome {
                states: states.clone(),
            },
        }
    }
}

impl<O> fmt::Debug for Target<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Fixed(token) => f.debug_tuple("Fixed").field(token).finish(),
            Target::Computed { states, .. } => f
                .debug_struct("Computed")
                .field("states", states)
                .finish_non_exhaustive(),
            Target::FromOutcome { states } => f
                .debug_struct("FromOutcome")
                .field("states", states)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Post {
        approved: bool,
    }

    #[test]
    fn test_fixed_resolves_unconditionally() {
        let target: Target<Post> = Target::fixed("review");
        let token = target
            .resolve("submit", &Post { approved: false }, &Value::Null, &Value::Null)
            .unwrap();
        assert_eq!(token, StateToken::text("review"));
        assert_eq!(target.fixed_token(), Some(&StateToken::text("review")));
        assert!(!target.is_dynamic());
    }

    #[test]
    fn test_computed_within_declared_set() {
        let target = Target::computed(["published", "rejected"], |post: &Post, _| {
            if post.approved {
                StateToken::text("published")
            } else {
                StateToken::text("rejected")
            }
        });

        let token = target
            .resolve("moderate", &Post { approved: true }, &Value::Null, &Value::Null)
            .unwrap();
        assert_eq!(token, StateToken::text("published"));
        assert!(target.is_dynamic());
        assert!(target.fixed_token().is_none());
    }

    #[test]
    fn test_computed_outside_declared_set() {
        let target =
            Target::computed(["published", "rejected"], |_: &Post, _| StateToken::text("archived"));

        let err = target
            .resolve("moderate", &Post { approved: true }, &Value::Null, &Value::Null)
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidResolvedState { ref resolved, .. } if resolved == "archived"
        ));
    }

    #[test]
    fn test_computed_sees_fire_arguments() {
        let target = Target::computed(["fast", "slow"], |_: &Post, args: &Value| {
            match args.get("lane").and_then(Value::as_str) {
                Some("fast") => StateToken::text("fast"),
                _ => StateToken::text("slow"),
            }
        });

        let token = target
            .resolve("route", &Post { approved: false }, &json!({"lane": "fast"}), &Value::Null)
            .unwrap();
        assert_eq!(token, StateToken::text("fast"));
    }

    #[test]
    fn test_from_outcome_maps_strings() {
        let target: Target<Post> = Target::from_outcome(["published", "rejected"]);
        let token = target
            .resolve("moderate", &Post { approved: true }, &Value::Null, &json!("rejected"))
            .unwrap();
        assert_eq!(token, StateToken::text("rejected"));
    }

    #[test]
    fn test_from_outcome_maps_integers() {
        let target: Target<Post> = Target::from_outcome([1i64, 2]);
        let token = target
            .resolve("grade", &Post { approved: true }, &Value::Null, &json!(2))
            .unwrap();
        assert_eq!(token, StateToken::Int(2));
    }

    #[test]
    fn test_from_outcome_unmapped_value() {
        let target: Target<Post> = Target::from_outcome(["published", "rejected"]);
        let err = target
            .resolve("moderate", &Post { approved: true }, &Value::Null, &json!("archived"))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidResolvedState { .. }));
    }

    #[test]
    fn test_from_outcome_rejects_unconvertible_shapes() {
        let target: Target<Post> = Target::from_outcome(["published"]);
        let err = target
            .resolve("moderate", &Post { approved: true }, &Value::Null, &json!(true))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidResolvedState { .. }));
    }
}
