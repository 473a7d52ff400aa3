//! Application signature — the coarse identity fingerprint that keeps
//! unrelated applications sharing the discovery port from answering each
//! other.
//!
//! Not a security boundary. Collisions are tolerable, just rare: the
//! signature only filters out cross-talk, it does not authenticate.

use serde::{Deserialize, Serialize};

/// The three inputs that identify one compatible deployment of an
/// application: who publishes it, what it is, and which engine/runtime
/// version it was built against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppIdentity {
    pub publisher: String,
    pub application: String,
    pub version: String,
}

impl Default for AppIdentity {
    fn default() -> Self {
        Self {
            publisher: "lantern".to_string(),
            application: "lantern".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl AppIdentity {
    /// Derive the wire signature: the 32-bit fingerprint of each input in
    /// order, decimal, each followed by a `.`.
    ///
    /// Compute once and keep the result; the engine stores it as an
    /// immutable field at construction.
    pub fn signature(&self) -> String {
        let mut signature = String::new();
        for part in [&self.publisher, &self.application, &self.version] {
            signature.push_str(&fingerprint(part).to_string());
            signature.push('.');
        }
        signature
    }
}

/// First four bytes of the BLAKE3 hash as a little-endian u32.
fn fingerprint(input: &str) -> u32 {
    let hash = blake3::hash(input.as_bytes());
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&hash.as_bytes()[..4]);
    u32::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(publisher: &str, application: &str, version: &str) -> AppIdentity {
        AppIdentity {
            publisher: publisher.to_string(),
            application: application.to_string(),
            version: version.to_string(),
        }
    }

    #[test]
    fn signature_is_deterministic() {
        let a = identity("acme", "game", "1.2");
        let b = identity("acme", "game", "1.2");
        assert_eq!(a.signature(), b.signature());
    }

    #[test]
    fn signature_differs_per_input() {
        let base = identity("acme", "game", "1.2");
        assert_ne!(base.signature(), identity("evil", "game", "1.2").signature());
        assert_ne!(base.signature(), identity("acme", "other", "1.2").signature());
        assert_ne!(base.signature(), identity("acme", "game", "1.3").signature());
    }

    #[test]
    fn signature_shape() {
        let sig = identity("acme", "game", "1.2").signature();
        // three decimal fingerprints, each dot-terminated
        assert!(sig.ends_with('.'));
        assert_eq!(sig.matches('.').count(), 3);
        for part in sig.split('.').filter(|p| !p.is_empty()) {
            assert!(part.bytes().all(|b| b.is_ascii_digit()));
        }
    }
}
