//! The opaque 32-byte record identifier.

use std::fmt;

/// A record's opaque identifier.
///
/// Clients derive this from salted hashing of `host+user`; the server never
/// inspects its structure. On the wire it is raw bytes; on disk it is the
/// lowercase-hex directory name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId([u8; 32]);

/// Errors decoding a [`RecordId`] from its on-disk hex form.
#[derive(Debug, thiserror::Error)]
pub enum RecordIdError {
    /// The string was not valid hex, or not 64 hex digits.
    #[error("not a 64-character lowercase-hex record id")]
    BadHex,
}

impl RecordId {
    /// Wraps 32 raw bytes as received on the wire.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw 32 bytes, as sent on the wire.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns the lowercase-hex form used as the on-disk directory name.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses the lowercase-hex on-disk directory name back into an id.
    pub fn from_hex(s: &str) -> Result<Self, RecordIdError> {
        let bytes = hex::decode(s).map_err(|_| RecordIdError::BadHex)?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| RecordIdError::BadHex)?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RecordId").field(&self.to_hex()).finish()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trips() {
        let id = RecordId::from_bytes([0x2a; 32]);
        let hex = id.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(RecordId::from_hex(&hex).unwrap(), id);
    }

    #[test]
    fn rejects_short_hex() {
        assert!(RecordId::from_hex("2a2a").is_err());
    }

    #[test]
    fn rejects_non_hex() {
        assert!(RecordId::from_hex(&"zz".repeat(32)).is_err());
    }
}
