//! The OPRF responder primitive (spec component C5).
//!
//! `spec.md` treats `oprf.respond(alpha, k) -> beta` as an external, opaque
//! pure function over a prime-order group; this module is the one concrete
//! instantiation this workspace ships. It computes `beta = alpha^k` in the
//! Ristretto255 group, the same "blind point, scalar-multiply, return point"
//! shape as the SPHINX/OPAQUE family of OPRFs.
//!
//! The server never sees a password: `alpha` is a blinded client query and
//! `k` never leaves this process.

use curve25519_dalek::{ristretto::CompressedRistretto, scalar::Scalar};
use rand::{CryptoRng, RngCore};
use zeroize::Zeroize;

/// The record's OPRF secret scalar.
///
/// Zeroized on drop; this 32-byte value is the one piece of state whose
/// leakage breaks every security property of the oracle.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct OprfScalar([u8; 32]);

impl OprfScalar {
    /// Wraps raw scalar bytes as loaded from the `key`/`new`/`old` record files.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Generates a fresh random scalar.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Returns the raw bytes, as persisted to disk.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }
}

/// Errors that can occur while evaluating the OPRF.
#[derive(Debug, thiserror::Error)]
pub enum OprfError {
    /// `alpha` did not decode to a valid group element.
    #[error("alpha is not a valid group element")]
    InvalidBlindedElement,
}

/// Computes `beta = alpha^k`.
///
/// `alpha` is the client's blinded query, an encoded Ristretto255 point.
/// Returns [`OprfError::InvalidBlindedElement`] if `alpha` does not decode to
/// a point on the curve (including the identity element, which callers must
/// reject separately per their own protocol rules if they care to).
pub fn respond(alpha: &[u8; 32], k: &OprfScalar) -> Result<[u8; 32], OprfError> {
    let point = CompressedRistretto(*alpha)
        .decompress()
        .ok_or(OprfError::InvalidBlindedElement)?;
    let scalar = Scalar::from_bytes_mod_order(k.0);
    Ok((point * scalar).compress().to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use curve25519_dalek::ristretto::RistrettoPoint;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn blinded_query(rng: &mut impl RngCore) -> [u8; 32] {
        // A uniformly random compressed Ristretto point, constructed via the
        // group's hash-to-curve-free uniform sampling (random scalar times
        // the basepoint) so it is guaranteed to decompress.
        let scalar = Scalar::from_bytes_mod_order({
            let mut b = [0u8; 32];
            rng.fill_bytes(&mut b);
            b
        });
        (RistrettoPoint::mul_base(&scalar)).compress().to_bytes()
    }

    #[test]
    fn same_key_same_query_is_deterministic() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let alpha = blinded_query(&mut rng);
        let k = OprfScalar::random(&mut rng);
        let beta1 = respond(&alpha, &k).unwrap();
        let beta2 = respond(&alpha, &k).unwrap();
        assert_eq!(beta1, beta2);
    }

    #[test]
    fn different_keys_give_different_output() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let alpha = blinded_query(&mut rng);
        let k1 = OprfScalar::random(&mut rng);
        let k2 = OprfScalar::random(&mut rng);
        assert_ne!(respond(&alpha, &k1).unwrap(), respond(&alpha, &k2).unwrap());
    }

    #[test]
    fn rejects_invalid_element() {
        let k = OprfScalar::from_bytes([7u8; 32]);
        // 0xFF repeated is not a valid Ristretto encoding.
        let bad_alpha = [0xffu8; 32];
        assert!(respond(&bad_alpha, &k).is_err());
    }
}
