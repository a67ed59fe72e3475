//! Transition definitions.
//!
//! A definition is declared with [`TransitionBuilder`] and compiled into a
//! validated [`TransitionDef`] when the machine is built:
//!
//! ```ignore
//! TransitionBuilder::new("submit")
//!     .source("draft")
//!     .to("review")
//!     .condition("is_complete", |post: &Post| post.complete)
//!     .body(|post, _args| { post.submitted_at = Some(Utc::now()); Ok(Value::Null) })
//! ```
//!
//! Compilation parses source patterns and checks every token the definition
//! can touch against the field's declared set, so no undeclared state can
//! appear at fire time.

use crate::error::{BoxError, EngineError};
use crate::guard::{Condition, Permission};
use crate::pattern::SourcePattern;
use crate::state::{StateField, StateToken};
use crate::target::Target;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

pub(crate) type Body<O> =
    Arc<dyn Fn(&mut O, &Value) -> Result<Value, BoxError> + Send + Sync>;
pub(crate) type SuccessHook<O> =
    Arc<dyn Fn(&mut O, &TransitionCtx) -> Result<(), BoxError> + Send + Sync>;
pub(crate) type CommitHook<O> = Arc<dyn Fn(&mut O, &TransitionCtx) + Send + Sync>;

/// Execution context handed to `on_success` and `on_commit` hooks.
pub struct TransitionCtx<'a> {
    pub field: &'a str,
    pub transition: &'a str,
    pub source: &'a StateToken,
    pub target: &'a StateToken,
    pub args: &'a Value,
}

/// A raw source entry as declared on the builder.
#[derive(Debug, Clone)]
pub enum SourceSpec {
    /// Pattern string, parsed with the configured separator.
    Pattern(String),
    /// Literal token, for integer and identifier states.
    Token(StateToken),
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSpec::Pattern(s) => f.write_str(s),
            SourceSpec::Token(t) => write!(f, "{t}"),
        }
    }
}

impl From<&str> for SourceSpec {
    fn from(s: &str) -> Self {
        SourceSpec::Pattern(s.to_string())
    }
}

impl From<String> for SourceSpec {
    fn from(s: String) -> Self {
        SourceSpec::Pattern(s)
    }
}

impl From<i64> for SourceSpec {
    fn from(i: i64) -> Self {
        SourceSpec::Token(StateToken::Int(i))
    }
}

impl From<Uuid> for SourceSpec {
    fn from(k: Uuid) -> Self {
        SourceSpec::Token(StateToken::Key(k))
    }
}

impl From<StateToken> for SourceSpec {
    fn from(t: StateToken) -> Self {
        SourceSpec::Token(t)
    }
}

/// Declarative transition description; compiled by the machine builder.
pub struct TransitionBuilder<O> {
    name: String,
    sources: Vec<SourceSpec>,
    target: Option<Target<O>>,
    conditions: Vec<Condition<O>>,
    permission: Option<Permission<O>>,
    body: Option<Body<O>>,
    on_success: Option<SuccessHook<O>>,
    on_commit: Option<CommitHook<O>>,
    on_error: Option<StateToken>,
    atomic: Option<bool>,
    metadata: serde_json::Map<String, Value>,
}

impl<O> TransitionBuilder<O> {
    pub fn new(name: impl Into<String>) -> Self {
        TransitionBuilder {
            name: name.into(),
            sources: Vec::new(),
            target: None,
            conditions: Vec::new(),
            permission: None,
            body: None,
            on_success: None,
            on_commit: None,
            on_error: None,
            atomic: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn source(mut self, source: impl Into<SourceSpec>) -> Self {
        self.sources.push(source.into());
        self
    }

    pub fn sources<I, T>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<SourceSpec>,
    {
        self.sources.extend(sources.into_iter().map(Into::into));
        self
    }

    /// Fixed target token. For dynamic targets use [`TransitionBuilder::target`].
    pub fn to(mut self, token: impl Into<StateToken>) -> Self {
        self.target = Some(Target::Fixed(token.into()));
        self
    }

    pub fn target(mut self, target: Target<O>) -> Self {
        self.target = Some(target);
        self
    }

    pub fn condition(
        mut self,
        label: impl Into<String>,
        check: impl Fn(&O) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.conditions.push(Condition::new(label, check));
        self
    }

    pub fn permission(
        mut self,
        check: impl Fn(&O, &dyn crate::guard::Actor) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.permission = Some(Permission::new(check));
        self
    }

    /// Business logic of the transition; its return value is the outcome.
    pub fn body(
        mut self,
        body: impl Fn(&mut O, &Value) -> Result<Value, BoxError> + Send + Sync + 'static,
    ) -> Self {
        self.body = Some(Arc::new(body));
        self
    }

    /// Runs inside the unit of work, after the state is applied; shares its fate.
    pub fn on_success(
        mut self,
        hook: impl Fn(&mut O, &TransitionCtx) -> Result<(), BoxError> + Send + Sync + 'static,
    ) -> Self {
        self.on_success = Some(Arc::new(hook));
        self
    }

    /// Runs strictly after a successful commit, never after a rollback.
    pub fn on_commit(
        mut self,
        hook: impl Fn(&mut O, &TransitionCtx) + Send + Sync + 'static,
    ) -> Self {
        self.on_commit = Some(Arc::new(hook));
        self
    }

    /// Fallback state applied when the body fails.
    pub fn on_error(mut self, fallback: impl Into<StateToken>) -> Self {
        self.on_error = Some(fallback.into());
        self
    }

    /// Overrides the engine's default atomicity for this transition.
    pub fn atomic(mut self, atomic: bool) -> Self {
        self.atomic = Some(atomic);
        self
    }

    /// Attaches an opaque metadata entry; the engine never inspects these.
    pub fn meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Parses patterns and validates every token against the field.
    pub(crate) fn compile(
        self,
        field: &StateField,
        separator: char,
    ) -> Result<TransitionDef<O>, EngineError> {
        let invalid = |reason: String| EngineError::InvalidDefinition {
            name: self.name.clone(),
            reason,
        };

        if self.name.is_empty() {
            return Err(EngineError::InvalidDefinition {
                name: String::new(),
                reason: "empty transition name".to_string(),
            });
        }
        if self.sources.is_empty() {
            return Err(invalid("no source patterns".to_string()));
        }
        let target = match self.target {
            Some(t) => t,
            None => return Err(invalid("no target".to_string())),
        };

        let mut patterns = Vec::with_capacity(self.sources.len());
        let mut raw_sources = Vec::with_capacity(self.sources.len());
        for spec in &self.sources {
            raw_sources.push(spec.to_string());
            let pattern = match spec {
                SourceSpec::Pattern(s) => SourcePattern::parse(s, separator),
                SourceSpec::Token(t) => SourcePattern::Exact(t.clone()),
            };
            if let SourcePattern::Exact(token) = &pattern {
                if !field.declares(token) {
                    return Err(invalid(format!(
                        "source '{token}' not in the states of field '{}'",
                        field.name()
                    )));
                }
            }
            patterns.push(pattern);
        }

        if target.is_dynamic() && target.tokens().is_empty() {
            return Err(invalid("dynamic target declares no outcome states".to_string()));
        }
        for token in target.tokens() {
            if !field.declares(token) {
                return Err(invalid(format!(
                    "target '{token}' not in the states of field '{}'",
                    field.name()
                )));
            }
        }

        // "+" needs a fixed target to know what it excludes.
        if target.is_dynamic() && patterns.contains(&SourcePattern::AnyExcept) {
            return Err(invalid(
                "'+' source requires a fixed target".to_string(),
            ));
        }

        if let Some(fallback) = &self.on_error {
            if !field.declares(fallback) {
                return Err(invalid(format!(
                    "on_error state '{fallback}' not in the states of field '{}'",
                    field.name()
                )));
            }
        }

        Ok(TransitionDef {
            name: self.name,
            raw_sources,
            sources: patterns,
            target,
            conditions: self.conditions,
            permission: self.permission,
            body: self.body,
            on_success: self.on_success,
            on_commit: self.on_commit,
            on_error: self.on_error,
            atomic: self.atomic,
            metadata: self.metadata,
        })
    }
}

/// Validated, compiled transition definition.
pub struct TransitionDef<O> {
    name: String,
    raw_sources: Vec<String>,
    sources: Vec<SourcePattern>,
    target: Target<O>,
    conditions: Vec<Condition<O>>,
    permission: Option<Permission<O>>,
    body: Option<Body<O>>,
    on_success: Option<SuccessHook<O>>,
    on_commit: Option<CommitHook<O>>,
    on_error: Option<StateToken>,
    atomic: Option<bool>,
    metadata: serde_json::Map<String, Value>,
}

impl<O> TransitionDef<O> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sources(&self) -> &[SourcePattern] {
        &self.sources
    }

    pub fn target(&self) -> &Target<O> {
        &self.target
    }

    pub fn conditions(&self) -> &[Condition<O>] {
        &self.conditions
    }

    pub fn permission(&self) -> Option<&Permission<O>> {
        self.permission.as_ref()
    }

    pub fn on_error(&self) -> Option<&StateToken> {
        self.on_error.as_ref()
    }

    /// None defers to the engine default.
    pub fn atomic(&self) -> Option<bool> {
        self.atomic
    }

    pub fn metadata(&self) -> &serde_json::Map<String, Value> {
        &self.metadata
    }

    /// Returns whether any source pattern covers `state`.
    pub fn matches_source(&self, state: &StateToken) -> bool {
        let fixed = self.target.fixed_token();
        self.sources.iter().any(|p| p.matches(state, fixed))
    }

    pub(crate) fn body(&self) -> Option<&Body<O>> {
        self.body.as_ref()
    }

    pub(crate) fn success_hook(&self) -> Option<&SuccessHook<O>> {
        self.on_success.as_ref()
    }

    pub(crate) fn commit_hook(&self) -> Option<&CommitHook<O>> {
        self.on_commit.as_ref()
    }

    /// Declarative view feeding the registry fingerprint.
    pub(crate) fn fingerprint_value(&self) -> Value {
        json!({
            "name": self.name,
            "sources": self.raw_sources,
            "target": {
                "kind": self.target.kind(),
                "states": self.target.tokens().iter().map(|t| t.to_string()).collect::<Vec<_>>(),
            },
            "conditions": self.conditions.iter().map(|c| c.label()).collect::<Vec<_>>(),
            "permission": self.permission.is_some(),
            "on_error": self.on_error.as_ref().map(|t| t.to_string()),
            "atomic": self.atomic,
            "metadata": self.metadata,
        })
    }
}

impl<O> fmt::Debug for TransitionDef<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionDef")
            .field("name", &self.name)
            .field("sources", &self.raw_sources)
            .field("target", &self.target)
            .field("on_error", &self.on_error)
            .field("atomic", &self.atomic)
            .finish_non_exhaustive()
    }
}
