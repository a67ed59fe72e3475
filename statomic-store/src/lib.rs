//! # statomic-store
//!
//! Storage layer for statomic.
//!
//! This crate provides:
//! - An in-memory backend with committed rows and native scopes
//! - Commit fault injection for exercising rollback paths
//! - An append-only audit log with JSON persistence

pub mod backend;
pub mod error;
pub mod log;

pub use backend::{MemBackend, MemScope};
pub use error::StoreError;
pub use log::AuditLog;
