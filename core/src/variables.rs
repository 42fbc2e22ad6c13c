//! Content-keyed identity for request variables.
//!
//! # Design
//! Callers rebuild their variables on every render, so two renders with the
//! same content routinely hand over distinct values. The stabilizer reduces
//! each value to its JSON text and only mints a new `Arc<str>` when that text
//! changes. Everything downstream keys on the `Arc` pointer, which turns
//! "changed by reference" into "changed by value".

use std::sync::Arc;

use serde::Serialize;

use crate::error::ClientError;

/// Serialized form of absent variables.
pub const NO_VARIABLES: &str = "null";

/// Emits a stable serialized identity for a stream of variable values.
#[derive(Debug, Default)]
pub struct VariableStabilizer {
    emitted: Option<Arc<str>>,
    current: Option<Arc<str>>,
}

impl VariableStabilizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize `value` and return the emitted identity.
    ///
    /// Returns the previously emitted `Arc` (pointer-equal) when the
    /// serialized text is unchanged.
    pub fn stabilize<V: Serialize + ?Sized>(
        &mut self,
        value: Option<&V>,
    ) -> Result<Arc<str>, ClientError> {
        let current = match value {
            Some(v) => serde_json::to_string(v).map_err(|e| ClientError::Serialization(e.to_string()))?,
            None => NO_VARIABLES.to_string(),
        };

        let emitted = match &self.emitted {
            Some(prev) if **prev == *current => Arc::clone(prev),
            _ => Arc::from(current),
        };
        self.emitted = Some(Arc::clone(&emitted));
        self.current = Some(Arc::clone(&emitted));
        Ok(emitted)
    }

    /// The identity emitted by the last successful `stabilize` call.
    pub fn emitted(&self) -> Option<&Arc<str>> {
        self.emitted.as_ref()
    }

    /// Reset the emitted value to the last serialized input.
    pub fn teardown(&mut self) {
        self.emitted = self.current.clone();
    }
}
