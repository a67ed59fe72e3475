//! The state machine: field, registry, collaborators, and the executor.

use crate::audit::{record_isolated, AuditSink, TransitionEvent};
use crate::config::{AuditMode, EngineConfig};
use crate::definition::{TransitionBuilder, TransitionCtx, TransitionDef};
use crate::error::{BoxError, EngineError};
use crate::guard::{self, Actor};
use crate::observer::{Observers, TransitionNotice};
use crate::registry::TransitionRegistry;
use crate::state::{StateField, StateOwner, StateToken, StateValue};
use crate::storage::{DetachedStore, StateKey, StateStore};
use crate::uow::{BufferedProvider, UnitOfWork, UowProvider};
use serde_json::Value;
use std::sync::Arc;

/// Result of a fired transition.
#[derive(Debug, Clone)]
pub struct Fired {
    pub transition: String,
    pub source: StateToken,
    pub target: StateToken,
    /// The body's return value; Null when the transition has no body.
    pub outcome: Value,
}

type ReadFn<O> = fn(&O) -> &StateValue;
type WriteFn<O> = fn(&mut O) -> &mut StateValue;

/// One state field's machine: the compiled registry plus the collaborators
/// a transition runs against.
///
/// Built once per (owning type, field) and shared; `fire` takes `&self`.
pub struct StateMachine<O: StateOwner> {
    field: StateField,
    read: ReadFn<O>,
    write: WriteFn<O>,
    registry: TransitionRegistry<O>,
    config: EngineConfig,
    store: Arc<dyn StateStore>,
    uow: Arc<dyn UowProvider>,
    sink: Option<Arc<dyn AuditSink>>,
    observers: Observers<O>,
    protected: bool,
}

impl<O: StateOwner> StateMachine<O> {
    /// Starts a builder over `field`, with accessors projecting the managed
    /// state value out of the owner.
    pub fn builder(field: StateField, read: ReadFn<O>, write: WriteFn<O>) -> StateMachineBuilder<O> {
        StateMachineBuilder {
            field,
            read,
            write,
            transitions: Vec::new(),
            config: EngineConfig::default(),
            store: None,
            uow: None,
            sink: None,
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn field(&self) -> &StateField {
        &self.field
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &TransitionRegistry<O> {
        &self.registry
    }

    /// All transitions of the field, in declaration order.
    pub fn transitions(&self) -> &[TransitionDef<O>] {
        self.registry.transitions()
    }

    pub fn current<'a>(&self, owner: &'a O) -> &'a StateToken {
        (self.read)(owner).current()
    }

    /// Storage key of this field on `owner`.
    pub fn state_key(&self, owner: &O) -> StateKey {
        StateKey::new(O::KIND, owner.owner_id(), self.field.name())
    }

    /// Non-mutating dry run of matching and guards. Unknown names are
    /// simply not fireable.
    pub fn can_fire(&self, owner: &O, name: &str, principal: Option<&dyn Actor>) -> bool {
        let Some(def) = self.registry.get(name) else {
            return false;
        };
        if !def.matches_source(self.current(owner)) {
            return false;
        }
        guard::first_failure(def.conditions(), def.permission(), owner, principal).is_none()
    }

    /// The permission check alone; transitions without one allow any actor.
    pub fn has_permission(&self, owner: &O, name: &str, principal: &dyn Actor) -> bool {
        match self.registry.get(name) {
            Some(def) => match def.permission() {
                Some(permission) => permission.check(owner, principal),
                None => true,
            },
            None => false,
        }
    }

    /// Transitions whose source covers the current state and whose
    /// conditions pass. Permissions are filtered only when a principal
    /// is supplied.
    pub fn available_transitions<'a>(
        &'a self,
        owner: &'a O,
        principal: Option<&dyn Actor>,
    ) -> Vec<&'a TransitionDef<O>> {
        let state = self.current(owner);
        self.registry
            .matching(state)
            .filter(|def| {
                let permission = if principal.is_some() {
                    def.permission()
                } else {
                    None
                };
                guard::first_failure(def.conditions(), permission, owner, principal).is_none()
            })
            .collect()
    }

    /// Fingerprint of the declarative registry content.
    pub fn fingerprint(&self) -> String {
        self.registry.fingerprint()
    }

    // =========================================================================
    // Direct assignment
    // =========================================================================

    /// Sets the state value directly, bypassing guards, auditing, and the
    /// unit of work. Rejected on protected fields and for undeclared tokens.
    pub fn assign(&self, owner: &mut O, token: impl Into<StateToken>) -> Result<(), EngineError> {
        if self.protected {
            return Err(EngineError::ProtectedField {
                field: self.field.name().to_string(),
            });
        }
        let token = token.into();
        if !self.field.declares(&token) {
            return Err(EngineError::InvalidField {
                field: self.field.name().to_string(),
                reason: format!("cannot assign undeclared state '{token}'"),
            });
        }
        (self.write)(owner).set(token);
        Ok(())
    }

    // =========================================================================
    // Observers
    // =========================================================================

    /// Registers an observer running after guards pass, before the body.
    pub fn on_pre_transition(&self, observer: impl Fn(&O, &TransitionNotice) + Send + Sync + 'static) {
        self.observers.add_pre(Arc::new(observer));
    }

    /// Registers an observer running after commit, on success only.
    pub fn on_post_transition(&self, observer: impl Fn(&O, &TransitionNotice) + Send + Sync + 'static) {
        self.observers.add_post(Arc::new(observer));
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Fires the named transition on `owner`.
    ///
    /// `args` is handed to the body and to dynamic target resolution;
    /// `principal` feeds the permission check and the audit record;
    /// `description` is free text attached to the audit record.
    pub fn fire(
        &self,
        owner: &mut O,
        name: &str,
        args: Value,
        principal: Option<&dyn Actor>,
        description: Option<&str>,
    ) -> Result<Fired, EngineError> {
        let write = self.write;
        let def = self.registry.lookup(name)?;
        let source = self.current(owner).clone();

        // Match the source patterns against the in-memory state
        if !def.matches_source(&source) {
            return Err(EngineError::TransitionNotAllowed {
                name: name.to_string(),
                state: source.to_string(),
                guard: None,
            });
        }

        // Capture the committed value for the concurrency check
        let key = self.state_key(owner);
        let committed = self.store.read(&key);
        let committed_rev = self.store.revision(&key);

        // Guards
        if let Some(failed) =
            guard::first_failure(def.conditions(), def.permission(), owner, principal)
        {
            return Err(EngineError::TransitionNotAllowed {
                name: name.to_string(),
                state: source.to_string(),
                guard: Some(failed),
            });
        }

        // Pre-observers see the declared target; dynamic targets have none yet
        let declared = def.target().fixed_token().cloned();
        self.observers.notify_pre(
            owner,
            &TransitionNotice {
                field: self.field.name(),
                transition: name,
                source: &source,
                target: declared.as_ref(),
                args: &args,
            },
        );

        let atomic = def.atomic().unwrap_or(self.config.defaults.atomic);
        let mut scope = if atomic { Some(self.uow.begin()) } else { None };

        // Body
        let outcome = match def.body() {
            Some(body) => body(owner, &args),
            None => Ok(Value::Null),
        };
        let outcome = match outcome {
            Ok(value) => value,
            Err(cause) => {
                return Err(self.body_failure(
                    owner,
                    def,
                    &key,
                    &source,
                    scope,
                    principal,
                    description,
                    cause,
                ));
            }
        };

        // Resolve the target
        let target = match def.target().resolve(name, owner, &args, &outcome) {
            Ok(token) => token,
            Err(e) => {
                rollback(scope);
                return Err(e);
            }
        };

        // Concurrency check against the step-one capture
        if let Err(e) = self.check_concurrency(&key, &committed, committed_rev) {
            rollback(scope);
            return Err(e);
        }

        // Apply in memory; persisting the new value stays on the caller's
        // save path
        write(owner).set(target.clone());

        // Audit
        let event = self.build_event(owner, name, &source, &target, principal, description);
        if let Some(event) = &event {
            match self.config.audit.mode {
                AuditMode::Transaction => match scope.as_mut() {
                    Some(scope) => scope.stage_event(event),
                    None => self.record_event(event),
                },
                AuditMode::Signal => {}
            }
        }

        // on_success shares the scope's fate
        let ctx = TransitionCtx {
            field: self.field.name(),
            transition: name,
            source: &source,
            target: &target,
            args: &args,
        };
        if let Some(hook) = def.success_hook() {
            if let Err(cause) = hook(owner, &ctx) {
                write(owner).set(source.clone());
                rollback(scope);
                return Err(EngineError::CallbackFailed {
                    name: name.to_string(),
                    source: cause,
                });
            }
        }

        // Commit
        if let Some(scope) = scope.take() {
            if let Err(scope_err) = scope.commit() {
                write(owner).set(source.clone());
                return Err(EngineError::CommitFailed {
                    name: name.to_string(),
                    source: scope_err,
                });
            }
        }

        // on_commit runs strictly after commit; immediately when no scope
        // exists
        if let Some(hook) = def.commit_hook() {
            hook(owner, &ctx);
        }

        // Post phase: signal-mode audit first, then post-observers
        if let Some(event) = &event {
            if self.config.audit.mode == AuditMode::Signal {
                self.record_event(event);
            }
        }
        self.observers.notify_post(
            owner,
            &TransitionNotice {
                field: self.field.name(),
                transition: name,
                source: &source,
                target: Some(&target),
                args: &args,
            },
        );

        tracing::info!(
            field = self.field.name(),
            transition = name,
            source = %source,
            target = %target,
            "transition applied"
        );

        Ok(Fired {
            transition: name.to_string(),
            source,
            target,
            outcome,
        })
    }

    /// Body-failure path: fallback state when the definition has one,
    /// otherwise roll back untouched.
    #[allow(clippy::too_many_arguments)]
    fn body_failure(
        &self,
        owner: &mut O,
        def: &TransitionDef<O>,
        key: &StateKey,
        source: &StateToken,
        scope: Option<Box<dyn UnitOfWork>>,
        principal: Option<&dyn Actor>,
        description: Option<&str>,
        cause: BoxError,
    ) -> EngineError {
        let name = def.name();

        let Some(fallback) = def.on_error() else {
            rollback(scope);
            return EngineError::BodyFailed {
                name: name.to_string(),
                source: cause,
            };
        };

        tracing::warn!(
            transition = name,
            fallback = %fallback,
            "body failed, applying fallback state"
        );

        (self.write)(owner).set(fallback.clone());

        // Unlike the success path, the fallback write is made durable here:
        // the caller's save path will not run after the error surfaces.
        let event = self.build_event(owner, name, source, fallback, principal, description);
        match scope {
            Some(mut scope) => {
                scope.stage_state(key, fallback);
                if let Some(event) = &event {
                    if self.config.audit.mode == AuditMode::Transaction {
                        scope.stage_event(event);
                    }
                }
                if let Err(scope_err) = scope.commit() {
                    // The body error is what the caller must see
                    tracing::error!(transition = name, error = %scope_err, "fallback commit failed");
                }
            }
            None => {
                if let Err(e) = self.store.write(key, fallback) {
                    tracing::error!(transition = name, error = %e, "fallback state write failed");
                }
                if let Some(event) = &event {
                    if self.config.audit.mode == AuditMode::Transaction {
                        self.record_event(event);
                    }
                }
            }
        }

        if let Some(event) = &event {
            if self.config.audit.mode == AuditMode::Signal {
                self.record_event(event);
            }
        }

        EngineError::BodyFailed {
            name: name.to_string(),
            source: cause,
        }
    }

    fn check_concurrency(
        &self,
        key: &StateKey,
        captured: &Option<StateToken>,
        captured_rev: Option<u64>,
    ) -> Result<(), EngineError> {
        let now = self.store.read(key);
        let now_rev = self.store.revision(key);

        // Detached owners cannot conflict
        if captured.is_none() && now.is_none() {
            return Ok(());
        }

        if *captured != now || captured_rev != now_rev {
            return Err(EngineError::ConcurrentTransition {
                field: self.field.name().to_string(),
                expected: display_or_none(captured),
                actual: display_or_none(&now),
            });
        }
        Ok(())
    }

    fn build_event(
        &self,
        owner: &O,
        name: &str,
        source: &StateToken,
        target: &StateToken,
        principal: Option<&dyn Actor>,
        description: Option<&str>,
    ) -> Option<TransitionEvent> {
        if self.config.audit.is_disabled() || self.sink.is_none() {
            return None;
        }

        let mut event = TransitionEvent::new(O::KIND, owner.owner_id(), name, source, target);
        if let Some(actor) = principal {
            event = event.with_principal(actor.actor_id());
        }
        if let Some(description) = description {
            event = event.with_description(description);
        }
        Some(event)
    }

    fn record_event(&self, event: &TransitionEvent) {
        if let Some(sink) = &self.sink {
            record_isolated(sink.as_ref(), event);
        }
    }
}

fn rollback(scope: Option<Box<dyn UnitOfWork>>) {
    if let Some(scope) = scope {
        scope.rollback();
    }
}

fn display_or_none(token: &Option<StateToken>) -> String {
    match token {
        Some(t) => t.to_string(),
        None => "<none>".to_string(),
    }
}

/// Builder for [`StateMachine`].
pub struct StateMachineBuilder<O: StateOwner> {
    field: StateField,
    read: ReadFn<O>,
    write: WriteFn<O>,
    transitions: Vec<TransitionBuilder<O>>,
    config: EngineConfig,
    store: Option<Arc<dyn StateStore>>,
    uow: Option<Arc<dyn UowProvider>>,
    sink: Option<Arc<dyn AuditSink>>,
}

impl<O: StateOwner> StateMachineBuilder<O> {
    pub fn transition(mut self, transition: TransitionBuilder<O>) -> Self {
        self.transitions.push(transition);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn unit_of_work(mut self, provider: Arc<dyn UowProvider>) -> Self {
        self.uow = Some(provider);
        self
    }

    pub fn audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Compiles every transition against the field and wires collaborators.
    ///
    /// Defaults: a detached store, a buffered unit of work over the attached
    /// store and sink, and no audit sink.
    pub fn build(self) -> Result<StateMachine<O>, EngineError> {
        self.config.validate()?;
        let separator = self.config.defaults.wildcard_separator;

        let mut registry = TransitionRegistry::new(self.field.name());
        for builder in self.transitions {
            let def = builder.compile(&self.field, separator)?;
            if !def.atomic().unwrap_or(self.config.defaults.atomic) {
                tracing::warn!(
                    transition = def.name(),
                    "non-atomic transition: partial effects will not roll back"
                );
            }
            registry.register(def)?;
        }

        if self.config.audit.enabled && self.sink.is_none() {
            tracing::warn!(
                field = self.field.name(),
                "audit enabled but no sink attached, events will not be recorded"
            );
        }

        let store = self.store.unwrap_or_else(|| Arc::new(DetachedStore));
        let uow = self.uow.unwrap_or_else(|| {
            Arc::new(BufferedProvider::new(Arc::clone(&store), self.sink.clone()))
        });
        let protected = self.field.is_protected(self.config.defaults.protected_fields);

        Ok(StateMachine {
            field: self.field,
            read: self.read,
            write: self.write,
            registry,
            config: self.config,
            store,
            uow,
            sink: self.sink,
            observers: Observers::new(),
            protected,
        })
    }
}
