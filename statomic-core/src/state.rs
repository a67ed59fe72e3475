//! State tokens, field declarations, and the per-object state value.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A single state in a field's declared set.
///
/// Tokens come in three forms: text, integer, and foreign identifier.
/// The string form (`Display`) is what prefix patterns match against and
/// what audit events record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateToken {
    Int(i64),
    /// Identifier-shaped strings deserialize as identifier tokens.
    Key(Uuid),
    Text(String),
}

impl StateToken {
    pub fn text(s: impl Into<String>) -> Self {
        StateToken::Text(s.into())
    }
}

impl fmt::Display for StateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateToken::Text(s) => f.write_str(s),
            StateToken::Int(i) => write!(f, "{i}"),
            StateToken::Key(k) => write!(f, "{k}"),
        }
    }
}

impl From<&str> for StateToken {
    fn from(s: &str) -> Self {
        StateToken::Text(s.to_string())
    }
}

impl From<String> for StateToken {
    fn from(s: String) -> Self {
        StateToken::Text(s)
    }
}

impl From<i64> for StateToken {
    fn from(i: i64) -> Self {
        StateToken::Int(i)
    }
}

impl From<Uuid> for StateToken {
    fn from(k: Uuid) -> Self {
        StateToken::Key(k)
    }
}

/// Declares a state field: name, finite token set, initial token, protection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateField {
    name: String,
    states: Vec<StateToken>,
    initial: StateToken,
    /// None defers to the engine default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    protected: Option<bool>,
}

impl StateField {
    pub fn builder(name: impl Into<String>) -> StateFieldBuilder {
        StateFieldBuilder {
            name: name.into(),
            states: Vec::new(),
            initial: None,
            protected: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared tokens, in declaration order.
    pub fn states(&self) -> &[StateToken] {
        &self.states
    }

    pub fn initial(&self) -> &StateToken {
        &self.initial
    }

    pub fn declares(&self, token: &StateToken) -> bool {
        self.states.contains(token)
    }

    /// Resolves the protected flag against the engine default.
    pub fn is_protected(&self, default: bool) -> bool {
        self.protected.unwrap_or(default)
    }

    /// A fresh state value holding the initial token.
    pub fn initial_value(&self) -> StateValue {
        StateValue::new(self.initial.clone())
    }
}

/// Builder for [`StateField`]. Validation happens in `build`.
pub struct StateFieldBuilder {
    name: String,
    states: Vec<StateToken>,
    initial: Option<StateToken>,
    protected: Option<bool>,
}

impl StateFieldBuilder {
    pub fn state(mut self, token: impl Into<StateToken>) -> Self {
        self.states.push(token.into());
        self
    }

    pub fn states<I, T>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<StateToken>,
    {
        self.states.extend(tokens.into_iter().map(Into::into));
        self
    }

    pub fn initial(mut self, token: impl Into<StateToken>) -> Self {
        self.initial = Some(token.into());
        self
    }

    pub fn protected(mut self, protected: bool) -> Self {
        self.protected = Some(protected);
        self
    }

    pub fn build(self) -> Result<StateField, EngineError> {
        if self.states.is_empty() {
            return Err(EngineError::InvalidField {
                field: self.name,
                reason: "no states declared".to_string(),
            });
        }

        for (i, token) in self.states.iter().enumerate() {
            if self.states[..i].contains(token) {
                return Err(EngineError::InvalidField {
                    field: self.name,
                    reason: format!("state '{token}' declared twice"),
                });
            }
        }

        let initial = match self.initial {
            Some(token) => token,
            None => {
                return Err(EngineError::InvalidField {
                    field: self.name,
                    reason: "no initial state".to_string(),
                })
            }
        };
        if !self.states.contains(&initial) {
            return Err(EngineError::InvalidField {
                field: self.name,
                reason: format!("initial state '{initial}' not in states list"),
            });
        }

        Ok(StateField {
            name: self.name,
            states: self.states,
            initial,
            protected: self.protected,
        })
    }
}

/// Current state of one field on one owning object.
///
/// Reassignment goes through the machine: `fire` for guarded transitions,
/// `assign` for direct writes on unprotected fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateValue {
    current: StateToken,
}

impl StateValue {
    pub fn new(initial: impl Into<StateToken>) -> Self {
        StateValue {
            current: initial.into(),
        }
    }

    pub fn current(&self) -> &StateToken {
        &self.current
    }

    pub(crate) fn set(&mut self, token: StateToken) {
        self.current = token;
    }
}

/// Implemented by objects that carry engine-managed state fields.
pub trait StateOwner {
    /// Stable type tag recorded on audit events.
    const KIND: &'static str;

    /// Identity of this object within its kind.
    fn owner_id(&self) -> String;
}
