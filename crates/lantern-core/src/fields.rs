//! Field map — the string key/value record set carried by every
//! discovery packet.
//!
//! Keys are unique under case-insensitive, culture-invariant comparison
//! (Unicode lowercase folding). The casing of the first insert is kept;
//! later writes to the same key replace the value only. Values are
//! compared exactly.

/// An ordered-insertion map of string fields with case-insensitive keys.
///
/// Backed by a plain vector: discovery packets carry a handful of fields,
/// so linear lookup beats hashing and keeps insertion order stable for
/// encoding.
#[derive(Debug, Clone, Default)]
pub struct FieldMap {
    entries: Vec<(String, String)>,
}

/// Case-insensitive key comparison. Full Unicode lowercasing, not
/// locale-dependent; compares folded character streams so no lookup
/// ever allocates.
fn keys_match(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field. Last write wins for the value; the
    /// stored key keeps its original casing.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| keys_match(k, &key)) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Remove a field. Returns the removed value, or None if the key was
    /// not present. Idempotent.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(k, _)| keys_match(k, key))?;
        Some(self.entries.remove(pos).1)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| keys_match(k, key))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Order-insensitive equality; keys compared case-insensitively, values
/// exactly.
impl PartialEq for FieldMap {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl Eq for FieldMap {}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = FieldMap::new();
        for (k, v) in iter {
            map.set(k, v);
        }
        map
    }
}
