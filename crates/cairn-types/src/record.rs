use bytes::Bytes;

use crate::object::ObjectHash;

/// The persisted unit: a hash and the canonical bytes it was computed from.
///
/// Records are immutable. `payload` is reference-counted so one record can
/// be fanned out to several transports without copying.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub hash: ObjectHash,
    pub payload: Bytes,
    /// Length of `payload` in bytes (uncompressed).
    pub size: u64,
}

impl Record {
    pub fn new(hash: ObjectHash, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        let size = payload.len() as u64;
        Self {
            hash,
            payload,
            size,
        }
    }

    /// Canonical bytes as UTF-8 text, if they are valid UTF-8.
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}
