//! The 10-byte challenge tuple MAC-sealed to a specific wrapped request
//! (spec §4.6/§4.7/GLOSSARY).

/// `n:u8 ‖ k:u8 ‖ ts:u64_le`, 10 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Challenge {
    /// Equihash `n`.
    pub n: u8,
    /// Equihash `k`.
    pub k: u8,
    /// Unix timestamp (seconds) the challenge was issued at.
    pub ts: u64,
}

/// Byte length of a packed [`Challenge`].
pub const CHALLENGE_LEN: usize = 10;

/// Byte length of a MAC tag, as sealed onto a challenge or expected on a
/// verify request.
pub const MAC_LEN: usize = 32;

/// Errors decoding a packed challenge.
#[derive(Debug, thiserror::Error)]
#[error("challenge must be exactly {CHALLENGE_LEN} bytes, got {0}")]
pub struct ChallengeError(usize);

impl Challenge {
    /// Packs this challenge into its 10-byte wire form.
    pub fn to_bytes(self) -> [u8; CHALLENGE_LEN] {
        let mut out = [0u8; CHALLENGE_LEN];
        out[0] = self.n;
        out[1] = self.k;
        out[2..10].copy_from_slice(&self.ts.to_le_bytes());
        out
    }

    /// Unpacks a 10-byte challenge.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ChallengeError> {
        if bytes.len() != CHALLENGE_LEN {
            return Err(ChallengeError(bytes.len()));
        }
        Ok(Self {
            n: bytes[0],
            k: bytes[1],
            ts: u64::from_le_bytes(bytes[2..10].try_into().expect("length checked above")),
        })
    }
}

/// The literal 6-byte failure sentinel sent before closing on any
/// fail-closed path (spec §6/§9/GLOSSARY).
pub const FAIL_SENTINEL: &[u8; 6] = b"\x00\x04fail";

/// The literal 2-byte response to a successful record operation.
pub const OK_RESPONSE: &[u8; 2] = b"ok";
