//! Registration store — the fields a host advertises about itself.
//!
//! Read in full every time a discovery response is sent, so mutations
//! take effect on the very next response. Single-threaded like the rest
//! of the tick loop; a host driving it from multiple threads must wrap
//! it in its own lock.

use lantern_core::fields::FieldMap;

/// The advertised field set. No validation beyond what the wire codec
/// tolerates: keys must not contain raw newlines or a literal `": "`.
#[derive(Debug, Clone, Default)]
pub struct RegistrationStore {
    fields: FieldMap,
}

impl RegistrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or overwrite a field. Idempotent.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.set(key, value);
    }

    /// Unregister a field. Idempotent; unknown keys are a no-op.
    pub fn unset(&mut self, key: &str) {
        self.fields.remove(key);
    }

    /// The full field set, as sent in the next response.
    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }
}
