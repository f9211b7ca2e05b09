//! Detached Ed25519-style signature verification (spec component C2's
//! primitive: `sign_verify(sig, msg, pk) -> bool`).

use ed25519_dalek::{Signature, Verifier as _, VerifyingKey};

/// Errors verifying a detached signature.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    /// The 32-byte public key does not decode to a valid point on the curve.
    #[error("bad public key")]
    BadPublicKey,
    /// Signature verification failed.
    #[error("signature verification failed")]
    Invalid,
}

/// Verifies a detached Ed25519 signature of `msg` under `pk`.
///
/// Returns `Ok(())` iff `sig` is valid; any other outcome is
/// [`SignatureError`], never a partial/ambiguous result.
pub fn verify(sig: &[u8; 64], msg: &[u8], pk: &[u8; 32]) -> Result<(), SignatureError> {
    let verifying_key = VerifyingKey::from_bytes(pk).map_err(|_| SignatureError::BadPublicKey)?;
    let signature = Signature::from_bytes(sig);
    verifying_key
        .verify(msg, &signature)
        .map_err(|_| SignatureError::Invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer as _, SigningKey};
    use rand::rngs::OsRng;

    #[test]
    fn round_trips() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let msg = b"pubkey || payload";
        let sig = signing_key.sign(msg);
        let pk = signing_key.verifying_key().to_bytes();
        assert!(verify(&sig.to_bytes(), msg, &pk).is_ok());
    }

    #[test]
    fn rejects_tampered_message() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let sig = signing_key.sign(b"original");
        let pk = signing_key.verifying_key().to_bytes();
        assert!(verify(&sig.to_bytes(), b"tampered", &pk).is_err());
    }

    #[test]
    fn rejects_bad_pubkey_bytes() {
        // The all-zero string is not a valid Ed25519 point.
        let bad_pk = [0u8; 32];
        let sig = [0u8; 64];
        assert!(verify(&sig, b"msg", &bad_pk).is_err());
    }
}
