//! # statomic
//!
//! Guarded state-transition engine with atomic execution and audit trails.
//!
//! A state field declares the tokens a value may rest in; transitions
//! between them are declared with source patterns, guards, and targets,
//! then compiled into a [`StateMachine`] that executes them against the
//! owning value.
//!
//! ```
//! use serde_json::Value;
//! use statomic::{StateField, StateMachine, StateOwner, StateValue, TransitionBuilder};
//!
//! struct Order {
//!     id: String,
//!     status: StateValue,
//! }
//!
//! impl StateOwner for Order {
//!     const KIND: &'static str = "order";
//!
//!     fn owner_id(&self) -> String {
//!         self.id.clone()
//!     }
//! }
//!
//! let field = StateField::builder("status")
//!     .states(["created", "paid", "shipped"])
//!     .initial("created")
//!     .build()?;
//! let machine =
//!     StateMachine::builder(field, |o: &Order| &o.status, |o: &mut Order| &mut o.status)
//!         .transition(TransitionBuilder::new("pay").source("created").to("paid"))
//!         .transition(TransitionBuilder::new("ship").source("paid").to("shipped"))
//!         .build()?;
//!
//! let mut order = Order {
//!     id: "o-1".to_string(),
//!     status: machine.field().initial_value(),
//! };
//! machine.fire(&mut order, "pay", Value::Null, None, None)?;
//! assert_eq!(machine.current(&order).to_string(), "paid");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use statomic_core::*;

pub use statomic_store as store;
