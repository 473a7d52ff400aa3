//! Discovered-peer records.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use lantern_core::fields::FieldMap;
use lantern_core::wire::PORT_KEY;

/// Everything known about a peer from one received packet.
///
/// Built once per non-empty datagram and never mutated afterwards. The
/// engine hands records out and forgets them; superseding or expiring a
/// record is the consumer's job.
#[derive(Debug, Clone)]
pub struct PeerRecord {
    source: SocketAddr,
    fields: FieldMap,
    received_at: Instant,
}

/// Failure to read the reserved advertised-port field when the caller
/// asserted it must be present.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortFieldError {
    #[error("packet carries no \"Port\" field")]
    Missing,
    #[error("advertised port {0:?} is not a decimal 16-bit value")]
    Invalid(String),
}

impl PeerRecord {
    pub fn new(source: SocketAddr, fields: FieldMap) -> Self {
        Self {
            source,
            fields,
            received_at: Instant::now(),
        }
    }

    /// The remote address and port the packet arrived from.
    pub fn source(&self) -> SocketAddr {
        self.source
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// Monotonic time since the packet was received. Consumers age
    /// records off this, never off wall-clock time.
    pub fn elapsed(&self) -> Duration {
        self.received_at.elapsed()
    }

    /// The advertised service port, or None when the field is missing or
    /// not a plain decimal u16.
    pub fn try_advertised_port(&self) -> Option<u16> {
        parse_port(self.fields.get(PORT_KEY)?)
    }

    /// The advertised service port, for callers that treat its absence
    /// as a programming error.
    pub fn advertised_port(&self) -> Result<u16, PortFieldError> {
        let value = self.fields.get(PORT_KEY).ok_or(PortFieldError::Missing)?;
        parse_port(value).ok_or_else(|| PortFieldError::Invalid(value.to_string()))
    }
}

/// Strict decimal parse: digits only, no sign, no surrounding space.
fn parse_port(value: &str) -> Option<u16> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}
