//! Per-field transition registry.

use crate::definition::TransitionDef;
use crate::error::EngineError;
use crate::state::StateToken;
use serde_json::json;
use std::fmt;

/// Ordered collection of one field's compiled transitions.
///
/// Immutable once the machine is built; lookups take shared references and
/// tolerate any number of concurrent readers.
pub struct TransitionRegistry<O> {
    field: String,
    transitions: Vec<TransitionDef<O>>,
}

impl<O> TransitionRegistry<O> {
    pub(crate) fn new(field: impl Into<String>) -> Self {
        TransitionRegistry {
            field: field.into(),
            transitions: Vec::new(),
        }
    }

    pub(crate) fn register(&mut self, def: TransitionDef<O>) -> Result<(), EngineError> {
        if self.transitions.iter().any(|t| t.name() == def.name()) {
            return Err(EngineError::DuplicateTransitionName {
                name: def.name().to_string(),
            });
        }
        self.transitions.push(def);
        Ok(())
    }

    /// Name of the field this registry serves.
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn get(&self, name: &str) -> Option<&TransitionDef<O>> {
        self.transitions.iter().find(|t| t.name() == name)
    }

    /// Looks up a definition by name.
    pub fn lookup(&self, name: &str) -> Result<&TransitionDef<O>, EngineError> {
        self.get(name).ok_or_else(|| EngineError::UnknownTransition {
            field: self.field.clone(),
            name: name.to_string(),
        })
    }

    /// Definitions whose source patterns cover `state`, in declaration order.
    pub fn matching<'a>(
        &'a self,
        state: &'a StateToken,
    ) -> impl Iterator<Item = &'a TransitionDef<O>> + 'a {
        self.transitions
            .iter()
            .filter(move |def| def.matches_source(state))
    }

    /// All definitions, in declaration order.
    pub fn transitions(&self) -> &[TransitionDef<O>] {
        &self.transitions
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// crc32c fingerprint of the declarative content, for detecting
    /// definition drift between deployments.
    pub fn fingerprint(&self) -> String {
        let view = json!({
            "field": self.field,
            "transitions": self
                .transitions
                .iter()
                .map(|t| t.fingerprint_value())
                .collect::<Vec<_>>(),
        });
        let bytes = serde_json::to_vec(&view).unwrap();
        format!("{:08x}", crc32c::crc32c(&bytes))
    }
}

impl<O> fmt::Debug for TransitionRegistry<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionRegistry")
            .field("field", &self.field)
            .field("transitions", &self.transitions)
            .finish()
    }
}
