//! The challenge verifier (spec C7, §4.7): checks a submitted proof-of-work
//! solution against a previously issued, MAC-sealed challenge, then
//! dispatches the wrapped request to the record state machine.

use tokio::io::{AsyncRead, AsyncReadExt as _, AsyncWrite};

use oprf_oracle_core::pow::EquihashVerifier;
use oprf_oracle_types::difficulty::timeout_for;
use oprf_oracle_types::{RecordOp, WrappedRequest, DIFFICULTIES};

use crate::blob_store::BlobStore;
use crate::errors::OracleError;
use crate::id_locks::IdLocks;
use crate::metrics::METRICS_ID_CHALLENGE_REJECTED;
use crate::record;

use super::{load_or_create_mac_key, now_secs, read_wrapped_request, RateLimitConfig};

/// Verifies a submitted PoW solution against its sealed challenge and, on
/// success, dispatches the carried request to the record state machine
/// (spec §4.7).
#[tracing::instrument(level = "debug", skip_all)]
pub async fn verify<S>(
    stream: &mut S,
    store: &BlobStore,
    locks: &IdLocks,
    rl: &RateLimitConfig,
    equihash: &dyn EquihashVerifier,
    mask_unknown_id_on_get: bool,
) -> Result<(), OracleError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut challenge_buf = [0u8; 42];
    stream.read_exact(&mut challenge_buf).await?;
    let (challenge_tag, sig) = challenge_buf.split_at(10);
    let n = challenge_tag[0];
    let k = challenge_tag[1];
    let ts = u64::from_le_bytes(challenge_tag[2..10].try_into().expect("fixed slice"));

    let wrapped = read_wrapped_request(stream).await?;

    let mac_key = load_or_create_mac_key(store).await?;
    let expected_sig = oprf_oracle_core::mac::seal(&mac_key, &[wrapped.as_bytes(), challenge_tag]);
    if !oprf_oracle_core::mac::verify(&expected_sig, sig.try_into().expect("fixed slice")) {
        ::metrics::counter!(METRICS_ID_CHALLENGE_REJECTED).increment(1);
        return Err(OracleError::RateLimit("challenge MAC mismatch".into()));
    }

    // Foreign (n,k) pairs must be rejected outright, never treated as
    // "no timeout" (spec §9).
    let Some(timeout_secs) = timeout_for(n, k).map(u64::from) else {
        ::metrics::counter!(METRICS_ID_CHALLENGE_REJECTED).increment(1);
        return Err(OracleError::RateLimit(format!("unknown difficulty parameters n={n} k={k}")));
    };

    let now = now_secs();
    if now.saturating_sub(timeout_secs + rl.rl_gracetime_secs) > ts {
        ::metrics::counter!(METRICS_ID_CHALLENGE_REJECTED).increment(1);
        return Err(OracleError::RateLimit("proof-of-work challenge expired".into()));
    }

    let solution_len = equihash
        .solsize(n, k)
        .map_err(|err| OracleError::RateLimit(err.to_string()))?;
    let mut solution = vec![0u8; solution_len];
    stream.read_exact(&mut solution).await?;

    let mut seed = challenge_tag.to_vec();
    seed.extend_from_slice(wrapped.as_bytes());
    let solved = equihash
        .verify(n, k, &seed, &solution)
        .map_err(|err| OracleError::RateLimit(err.to_string()))?;
    if !solved {
        ::metrics::counter!(METRICS_ID_CHALLENGE_REJECTED).increment(1);
        return Err(OracleError::RateLimit("invalid proof-of-work solution".into()));
    }

    dispatch(stream, store, locks, wrapped, mask_unknown_id_on_get).await
}

/// Routes a verified wrapped request to its record-state-machine operation
/// (spec §4.8: "Opcode collision" note — CREATE never reaches here, only
/// the six privileged/record ops do).
async fn dispatch<S>(
    stream: &mut S,
    store: &BlobStore,
    locks: &IdLocks,
    wrapped: WrappedRequest,
    mask_unknown_id_on_get: bool,
) -> Result<(), OracleError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let id = wrapped.id();
    match wrapped.op() {
        RecordOp::Get => {
            let alpha = wrapped.alpha().expect("GET always carries alpha");
            let mask_key = if mask_unknown_id_on_get {
                Some(load_or_create_mac_key(store).await?)
            } else {
                None
            };
            record::get(stream, store, id, alpha, mask_key.as_ref()).await
        }
        RecordOp::Change => {
            let alpha = wrapped.alpha().expect("CHANGE always carries alpha");
            record::change(stream, store, locks, id, alpha).await
        }
        RecordOp::Commit => {
            let alpha = wrapped.alpha().expect("COMMIT always carries alpha");
            record::commit(stream, store, locks, id, alpha).await
        }
        RecordOp::Undo => {
            let alpha = wrapped.alpha().expect("UNDO always carries alpha");
            record::undo(stream, store, locks, id, alpha).await
        }
        RecordOp::Delete => {
            let alpha = wrapped.alpha().expect("DELETE always carries alpha");
            record::delete(stream, store, locks, id, alpha).await
        }
        RecordOp::Read => record::read_blob(stream, store, locks, id).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oprf_oracle_core::pow::{EquihashVerifier, PowError, ReferenceEquihash};
    use tokio::io::{duplex, AsyncWriteExt as _};

    /// Accepts any solution of the declared size without checking it.
    ///
    /// The production [`DIFFICULTIES`] table only holds `k=4` entries, whose
    /// real solutions (16 leaf indices) are infeasible to brute-force in a
    /// test; this stub lets a test exercise the verifier's MAC/expiry/
    /// dispatch logic against a real, table-listed `(n, k)` pair without
    /// paying for an actual Equihash solve.
    struct AlwaysValid;

    impl EquihashVerifier for AlwaysValid {
        fn solsize(&self, _n: u8, _k: u8) -> Result<usize, PowError> {
            Ok(0)
        }

        fn verify(&self, _n: u8, _k: u8, _seed: &[u8], _solution: &[u8]) -> Result<bool, PowError> {
            Ok(true)
        }
    }

    fn rl() -> RateLimitConfig {
        RateLimitConfig {
            rl_decay_secs: 1800,
            rl_threshold: 1,
            rl_gracetime_secs: 10,
        }
    }

    fn get_request(id: [u8; 32]) -> Vec<u8> {
        let mut buf = vec![RecordOp::GET];
        buf.extend_from_slice(&id);
        buf.extend_from_slice(&[0x11; 32]);
        buf
    }

    async fn store_with_mac_key() -> (tempfile::TempDir, BlobStore, [u8; 32]) {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let key = load_or_create_mac_key(&store).await.unwrap();
        (dir, store, key)
    }

    /// Builds a sealed challenge for `req` at tiny Equihash parameters not in
    /// the production table — verifier tests exercise the framing/MAC/expiry
    /// logic, not the production difficulty ladder.
    fn seal_challenge(mac_key: &[u8; 32], req: &[u8], n: u8, k: u8, ts: u64) -> [u8; 42] {
        let mut tag = [0u8; 10];
        tag[0] = n;
        tag[1] = k;
        tag[2..10].copy_from_slice(&ts.to_le_bytes());
        let sig = oprf_oracle_core::mac::seal(mac_key, &[req, &tag]);
        let mut out = [0u8; 42];
        out[..10].copy_from_slice(&tag);
        out[10..].copy_from_slice(&sig);
        out
    }

    #[tokio::test]
    async fn rejects_mac_mismatch() {
        let (_dir, store, mac_key) = store_with_mac_key().await;
        let locks = IdLocks::default();
        let req = get_request([1u8; 32]);
        let mut challenge = seal_challenge(&mac_key, &req, 8, 2, now_secs());
        challenge[41] ^= 0xff;

        let (mut client, mut server) = duplex(4096);
        let store_clone = store.clone();
        let rl_clone = rl();
        let server_task = tokio::spawn(async move {
            verify(&mut server, &store_clone, &locks, &rl_clone, &ReferenceEquihash, false).await
        });
        client.write_all(&challenge).await.unwrap();
        client.write_all(&req).await.unwrap();
        drop(client);
        assert!(server_task.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn rejects_unknown_difficulty_parameters() {
        let (_dir, store, mac_key) = store_with_mac_key().await;
        let locks = IdLocks::default();
        let req = get_request([2u8; 32]);
        let challenge = seal_challenge(&mac_key, &req, 61, 4, now_secs());

        let (mut client, mut server) = duplex(4096);
        let store_clone = store.clone();
        let rl_clone = rl();
        let server_task = tokio::spawn(async move {
            verify(&mut server, &store_clone, &locks, &rl_clone, &ReferenceEquihash, false).await
        });
        client.write_all(&challenge).await.unwrap();
        client.write_all(&req).await.unwrap();
        drop(client);
        assert!(server_task.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn rejects_expired_challenge() {
        let (_dir, store, mac_key) = store_with_mac_key().await;
        let locks = IdLocks::default();
        let req = get_request([3u8; 32]);
        // n=60,k=4 has a 1-second timeout; issue it far enough in the past
        // that even the 10-second gracetime can't save it.
        let challenge = seal_challenge(&mac_key, &req, 60, 4, now_secs().saturating_sub(100));

        let (mut client, mut server) = duplex(4096);
        let store_clone = store.clone();
        let rl_clone = rl();
        let server_task = tokio::spawn(async move {
            verify(&mut server, &store_clone, &locks, &rl_clone, &ReferenceEquihash, false).await
        });
        client.write_all(&challenge).await.unwrap();
        client.write_all(&req).await.unwrap();
        drop(client);
        assert!(server_task.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn valid_solution_reaches_dispatch() {
        let (_dir, store, mac_key) = store_with_mac_key().await;
        let locks = IdLocks::default();
        let id = [4u8; 32];
        let req = get_request(id);
        // A real entry from the production table (level 0) — the verifier
        // rejects any `(n, k)` pair absent from it, so the stub solver below
        // must still be exercised against a genuine table entry.
        let n = DIFFICULTIES[0].n;
        let k = DIFFICULTIES[0].k;
        let ts = now_secs();
        let challenge = seal_challenge(&mac_key, &req, n, k, ts);

        let (mut client, mut server) = duplex(8192);
        let store_clone = store.clone();
        let rl_clone = rl();
        let server_task = tokio::spawn(async move {
            verify(&mut server, &store_clone, &locks, &rl_clone, &AlwaysValid, false).await
        });
        client.write_all(&challenge).await.unwrap();
        client.write_all(&req).await.unwrap();
        // `AlwaysValid::solsize` is 0, so no solution bytes follow.
        drop(client);

        // The PoW check passes and control reaches `record::get`, which then
        // fails closed on its own terms because no such record exists —
        // proof the verifier's own checks (MAC, expiry, solution) all
        // passed rather than short-circuiting beforehand.
        let err = server_task.await.unwrap().unwrap_err();
        assert!(matches!(err, OracleError::State(_)));
    }
}
