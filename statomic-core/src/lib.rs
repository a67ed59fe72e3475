//! # statomic-core
//!
//! Guarded state-transition engine for statomic.
//!
//! This crate provides:
//! - State field and transition declaration
//! - Source pattern matching and target resolution
//! - Guarded, atomic transition execution
//! - Audit trail events and observer hooks

pub mod audit;
pub mod config;
pub mod definition;
pub mod error;
pub mod guard;
pub mod machine;
pub mod observer;
pub mod pattern;
pub mod registry;
pub mod state;
pub mod storage;
pub mod target;
pub mod uow;

pub use audit::{AuditSink, TransitionEvent};
pub use config::{AuditConfig, AuditMode, ConfigError, DefaultsConfig, EngineConfig};
pub use definition::{SourceSpec, TransitionBuilder, TransitionCtx, TransitionDef};
pub use error::{BoxError, EngineError, ScopeError};
pub use guard::{Actor, Condition, Permission, PERMISSION_GUARD};
pub use machine::{Fired, StateMachine, StateMachineBuilder};
pub use observer::TransitionNotice;
pub use pattern::SourcePattern;
pub use registry::TransitionRegistry;
pub use state::{StateField, StateFieldBuilder, StateOwner, StateToken, StateValue};
pub use storage::{DetachedStore, StateKey, StateStore};
pub use target::Target;
pub use uow::{BufferedProvider, BufferedScope, UnitOfWork, UowProvider};
