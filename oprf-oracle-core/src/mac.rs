//! Keyed MAC used to seal proof-of-work challenges to a specific request
//! (spec components C6/C7).
//!
//! Any 32-byte deterministic MAC suffices per spec §4.6 step 7; we use
//! BLAKE3's keyed mode, which is both a MAC and fast enough to not become the
//! bottleneck next to the Equihash solve it is protecting.

use subtle::ConstantTimeEq as _;

/// Computes a 32-byte MAC over the concatenation of `parts` under `key`.
pub fn seal(key: &[u8; 32], parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_keyed(key);
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

/// Constant-time comparison of two MACs.
///
/// Spec §9: "the contract is timing-independence in the length of matching
/// prefix" — `subtle`'s `ConstantTimeEq` gives us exactly that over the fixed
/// 32-byte tag.
pub fn verify(expected: &[u8; 32], provided: &[u8; 32]) -> bool {
    expected.ct_eq(provided).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_is_deterministic_and_binds_all_parts() {
        let key = [1u8; 32];
        let a = seal(&key, &[b"req", b"challenge"]);
        let b = seal(&key, &[b"req", b"challenge"]);
        assert_eq!(a, b);
        let c = seal(&key, &[b"req", b"different"]);
        assert_ne!(a, c);
    }

    #[test]
    fn verify_matches_seal_output() {
        let key = [2u8; 32];
        let tag = seal(&key, &[b"payload"]);
        assert!(verify(&tag, &tag));
        let mut tampered = tag;
        tampered[0] ^= 1;
        assert!(!verify(&tag, &tampered));
    }
}
