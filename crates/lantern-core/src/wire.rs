//! lantern wire format — the discovery packet encoding.
//!
//! These rules ARE the protocol. Every deployed peer must agree on them
//! bit for bit, so nothing here may change without breaking discovery
//! against existing hosts.
//!
//! A packet is a set of fields serialized as newline-joined
//! `key: value` lines, with each UTF-16 code unit of the resulting text
//! packed into two bytes, big-endian. The fixed-width packing doubles
//! ASCII payload size but keeps the byte layout bijective and trivial to
//! decode. Characters outside the Basic Multilingual Plane travel as
//! surrogate pairs.

use crate::fields::FieldMap;

// ── Reserved keys ─────────────────────────────────────────────────────────────

/// Compatibility filter. A request or response is only honored when this
/// field matches the receiver's own signature.
pub const SIGNATURE_KEY: &str = "Signature";

/// Advertised service port, decimal, 0-65535. Required in responses.
pub const PORT_KEY: &str = "Port";

/// Free-form label, e.g. the current map or scene name.
pub const MAP_KEY: &str = "Map";

// ── Constants ─────────────────────────────────────────────────────────────────

/// Well-known UDP port the advertiser binds by default.
pub const DEFAULT_DISCOVERY_PORT: u16 = 18418;

/// Receive buffer size. A registration set large enough to overflow this
/// is truncated by the OS; well beyond any realistic field set.
pub const MAX_DATAGRAM: usize = 8192;

/// Key/value delimiter inside a line. Only the first occurrence in a
/// line delimits; values may contain it freely.
const SEPARATOR: &str = ": ";

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Serialize a field map into packet bytes.
///
/// Round-trips exactly through [`decode`] for any map whose keys and
/// values contain no newline and whose keys contain no literal `": "`.
/// The empty map encodes to an empty byte array.
pub fn encode(fields: &FieldMap) -> Vec<u8> {
    pack_utf16_be(&fields_to_text(fields))
}

/// Parse packet bytes into a field map.
///
/// Never fails: an odd trailing byte is dropped, unpaired surrogates
/// become replacement characters, and lines without a `": "` separator
/// are skipped.
pub fn decode(bytes: &[u8]) -> FieldMap {
    text_to_fields(&unpack_utf16_be(bytes))
}

fn fields_to_text(fields: &FieldMap) -> String {
    let lines: Vec<String> = fields
        .iter()
        .map(|(k, v)| format!("{k}{SEPARATOR}{v}"))
        .collect();
    lines.join("\n")
}

fn text_to_fields(text: &str) -> FieldMap {
    let mut fields = FieldMap::new();
    for line in text.split('\n').filter(|l| !l.is_empty()) {
        // first separator wins; values keep any later occurrences
        if let Some(index) = line.find(SEPARATOR) {
            fields.set(&line[..index], &line[index + SEPARATOR.len()..]);
        }
    }
    fields
}

fn pack_utf16_be(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len() * 2);
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    bytes
}

fn unpack_utf16_be(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
