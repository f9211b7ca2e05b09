//! The record state machine (spec C4): create / get / change / commit /
//! undo / delete / read-blob, and the shared record-auth challenge that
//! guards every privileged operation.

use oprf_oracle_core::oprf::OprfScalar;
use oprf_oracle_core::signature;
use rand::rngs::OsRng;
use rand::RngCore as _;
use tokio::io::{AsyncRead, AsyncReadExt as _, AsyncWrite, AsyncWriteExt as _};

use oprf_oracle_types::{RecordId, OK_RESPONSE};

use crate::blob_store::{BlobStore, FileName};
use crate::codec;
use crate::errors::OracleError;
use crate::host_blob;
use crate::id_locks::IdLocks;
use crate::oprf;

/// Creates a new record (spec §4.4.1). Must not be preceded by PoW — the
/// connection driver bypasses that entirely for this op.
pub async fn create<S>(
    stream: &mut S,
    store: &BlobStore,
    locks: &IdLocks,
    id: RecordId,
    alpha: &[u8; 32],
) -> Result<(), OracleError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let _guard = locks.acquire(id)?;

    if store.load(Some(id), FileName::Rules, None).await?.is_some() {
        return Err(OracleError::State(format!("record {id} already exists")));
    }

    let k = match store.load(Some(id), FileName::Key, Some(32)).await? {
        Some(bytes) => OprfScalar::from_bytes(bytes.try_into().expect("length checked by blob store")),
        None => OprfScalar::random(&mut OsRng),
    };
    let beta = oprf::respond(alpha, &k)?;
    stream.write_all(&beta).await?;

    let mut envelope = vec![0u8; 32 + 42 + 64];
    stream.read_exact(&mut envelope).await?;
    let pk: [u8; 32] = envelope[..32].try_into().expect("fixed-size slice");
    let rules = codec::verify(&envelope, &pk)?.to_vec();

    store.save(Some(id), FileName::Key, &k.to_bytes()).await?;
    store.save(Some(id), FileName::Pub, &pk).await?;
    store.save(Some(id), FileName::Rules, &rules).await?;

    host_blob::run(stream, store).await?;
    stream.write_all(OK_RESPONSE).await?;
    Ok(())
}

/// Fetches the OPRF response and rules for a record (spec §4.4.2).
///
/// `mask_unknown_id` is the resolved Open Question from spec §9/§7: when
/// `Some(mac_key)`, an unknown id gets a deterministic dummy OPRF response
/// instead of an immediate fail, hiding the existence leak at the cost of
/// one extra scalar multiplication.
pub async fn get<S>(
    stream: &mut S,
    store: &BlobStore,
    id: RecordId,
    alpha: &[u8; 32],
    mask_unknown_id: Option<&[u8; 32]>,
) -> Result<(), OracleError>
where
    S: AsyncWrite + Unpin,
{
    let key_bytes = store.load(Some(id), FileName::Key, Some(32)).await?;
    let rules = store.load(Some(id), FileName::Rules, Some(42)).await?;

    let (beta, rules) = match (key_bytes, rules) {
        (Some(key_bytes), Some(rules)) => {
            let k = OprfScalar::from_bytes(key_bytes.try_into().expect("length checked by blob store"));
            (oprf::respond(alpha, &k)?, rules)
        }
        _ => match mask_unknown_id {
            Some(mac_key) => {
                let dummy_k = OprfScalar::from_bytes(oprf_oracle_core::mac::seal(
                    mac_key,
                    &[b"dummy-key", id.as_bytes()],
                ));
                (oprf::respond(alpha, &dummy_k)?, vec![0u8; 42])
            }
            None => return Err(OracleError::State(format!("record {id} absent"))),
        },
    };

    let mut out = beta.to_vec();
    out.extend_from_slice(&rules);
    stream.write_all(&out).await?;
    Ok(())
}

/// Starts a pending key change (spec §4.4.3). Requires record auth.
pub async fn change<S>(
    stream: &mut S,
    store: &BlobStore,
    locks: &IdLocks,
    id: RecordId,
    alpha: &[u8; 32],
) -> Result<(), OracleError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let _guard = locks.acquire(id)?;

    record_auth(stream, store, id, Some(alpha)).await?;
    let rules = store
        .load(Some(id), FileName::Rules, Some(42))
        .await?
        .ok_or_else(|| OracleError::State(format!("record {id} has no rules")))?;

    let k_new = OprfScalar::random(&mut OsRng);
    let beta = oprf::respond(alpha, &k_new)?;
    store.save(Some(id), FileName::New, &k_new.to_bytes()).await?;

    let mut out = beta.to_vec();
    out.extend_from_slice(&rules);
    stream.write_all(&out).await?;
    Ok(())
}

/// Commits a pending change (spec §4.4.4): `new` becomes `key`, the prior
/// `key` becomes `old`.
pub async fn commit<S>(
    stream: &mut S,
    store: &BlobStore,
    locks: &IdLocks,
    id: RecordId,
    alpha: &[u8; 32],
) -> Result<(), OracleError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    commit_or_undo(stream, store, locks, id, alpha, FileName::New, FileName::Old).await
}

/// Undoes a committed change (spec §4.4.4): `old` becomes `key` again, the
/// prior `key` becomes `new` (enabling redo).
pub async fn undo<S>(
    stream: &mut S,
    store: &BlobStore,
    locks: &IdLocks,
    id: RecordId,
    alpha: &[u8; 32],
) -> Result<(), OracleError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    commit_or_undo(stream, store, locks, id, alpha, FileName::Old, FileName::New).await
}

async fn commit_or_undo<S>(
    stream: &mut S,
    store: &BlobStore,
    locks: &IdLocks,
    id: RecordId,
    alpha: &[u8; 32],
    source: FileName,
    destination: FileName,
) -> Result<(), OracleError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let _guard = locks.acquire(id)?;

    record_auth(stream, store, id, Some(alpha)).await?;
    let source_bytes = store
        .load(Some(id), source, Some(32))
        .await?
        .ok_or_else(|| OracleError::State(format!("record {id} has no pending scalar")))?;
    let current_key = store
        .load(Some(id), FileName::Key, Some(32))
        .await?
        .ok_or_else(|| OracleError::State(format!("record {id} has no key")))?;
    let rules = store
        .load(Some(id), FileName::Rules, Some(42))
        .await?
        .ok_or_else(|| OracleError::State(format!("record {id} has no rules")))?;

    let source_scalar =
        OprfScalar::from_bytes(source_bytes.clone().try_into().expect("length checked by blob store"));
    let beta = oprf::respond(alpha, &source_scalar)?;
    let mut out = beta.to_vec();
    out.extend_from_slice(&rules);
    stream.write_all(&out).await?;

    let mut envelope = vec![0u8; 32 + 42 + 64];
    stream.read_exact(&mut envelope).await?;
    let pk_new: [u8; 32] = envelope[..32].try_into().expect("fixed-size slice");
    let rules_new = codec::verify(&envelope, &pk_new)?.to_vec();

    // Write the destination (preserving the prior key) before overwriting
    // `key` and deleting `source`, so an abort between writes still leaves
    // every scalar recoverable from disk (spec §9).
    store.save(Some(id), destination, &current_key).await?;
    store.save(Some(id), FileName::Key, &source_bytes).await?;
    store.save(Some(id), FileName::Pub, &pk_new).await?;
    store.save(Some(id), FileName::Rules, &rules_new).await?;
    store.unlink(Some(id), source).await?;

    stream.write_all(OK_RESPONSE).await?;
    Ok(())
}

/// Deletes a record (spec §4.4.5): runs the host-blob removal cycle, then
/// recursively removes the record directory.
pub async fn delete<S>(
    stream: &mut S,
    store: &BlobStore,
    locks: &IdLocks,
    id: RecordId,
    alpha: &[u8; 32],
) -> Result<(), OracleError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let _guard = locks.acquire(id)?;

    record_auth(stream, store, id, Some(alpha)).await?;
    host_blob::run(stream, store).await?;
    store.rmtree(id).await?;
    stream.write_all(OK_RESPONSE).await?;
    Ok(())
}

/// Reads the host-scoped blob (spec §4.4.6): the short-form request with no
/// `alpha`, authenticated via the nonce challenge with an empty OPRF step.
pub async fn read_blob<S>(
    stream: &mut S,
    store: &BlobStore,
    locks: &IdLocks,
    id: RecordId,
) -> Result<(), OracleError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let _guard = locks.acquire(id)?;

    record_auth(stream, store, id, None).await?;
    let blob = store.load(Some(id), FileName::Blob, None).await?.unwrap_or_default();
    stream.write_all(&blob).await?;
    Ok(())
}

/// The shared server-side challenge guarding every privileged operation
/// (spec §4.4.7): binds a fresh nonce to the record's signing key.
async fn record_auth<S>(
    stream: &mut S,
    store: &BlobStore,
    id: RecordId,
    alpha: Option<&[u8; 32]>,
) -> Result<(), OracleError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let pub_key = store
        .load(Some(id), FileName::Pub, Some(32))
        .await?
        .ok_or_else(|| OracleError::State(format!("record {id} has no pub key")))?;
    let pub_key: [u8; 32] = pub_key.try_into().expect("length checked by blob store");

    let mut nonce = [0u8; 32];
    OsRng.fill_bytes(&mut nonce);

    let beta = match alpha {
        Some(a) => match store.load(Some(id), FileName::Key, Some(32)).await? {
            Some(key_bytes) => {
                let k = OprfScalar::from_bytes(key_bytes.try_into().expect("length checked by blob store"));
                oprf::respond(a, &k)?.to_vec()
            }
            None => Vec::new(),
        },
        None => Vec::new(),
    };

    let mut out = beta;
    out.extend_from_slice(&nonce);
    stream.write_all(&out).await?;

    let mut sig = [0u8; 64];
    stream.read_exact(&mut sig).await?;
    signature::verify(&sig, &nonce, &pub_key).map_err(|err| OracleError::Crypto(err.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use curve25519_dalek::{ristretto::RistrettoPoint, scalar::Scalar};
    use ed25519_dalek::{Signer as _, SigningKey};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use tokio::io::duplex;

    fn id() -> RecordId {
        RecordId::from_bytes([0x2a; 32])
    }

    fn blinded_query(rng: &mut impl RngCore) -> [u8; 32] {
        let mut b = [0u8; 32];
        rng.fill_bytes(&mut b);
        let scalar = Scalar::from_bytes_mod_order(b);
        RistrettoPoint::mul_base(&scalar).compress().to_bytes()
    }

    fn signed_envelope(signing_key: &SigningKey, payload: &[u8]) -> Vec<u8> {
        let pk = signing_key.verifying_key().to_bytes();
        let mut signed = pk.to_vec();
        signed.extend_from_slice(payload);
        let sig = signing_key.sign(&signed);
        let mut envelope = signed;
        envelope.extend_from_slice(&sig.to_bytes());
        envelope
    }

    #[tokio::test]
    async fn create_then_get_returns_same_beta() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let locks = IdLocks::default();
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let signing_key = SigningKey::generate(&mut rng);
        let alpha = blinded_query(&mut rng);
        let rules = [0x2au8; 42];
        let envelope = signed_envelope(&signing_key, &rules);

        let (mut client, mut server) = duplex(8192);
        let store_clone = store.clone();
        let locks_clone = locks.clone();
        let server_task =
            tokio::spawn(async move { create(&mut server, &store_clone, &locks_clone, id(), &alpha).await });

        let mut beta = [0u8; 32];
        client.read_exact(&mut beta).await.unwrap();
        client.write_all(&envelope).await.unwrap();

        // host-blob cycle: register a fresh host under the same id.
        client.write_all(id().as_bytes()).await.unwrap();
        let mut current = [0u8; 2];
        client.read_exact(&mut current).await.unwrap();
        assert_eq!(&current, b"\x00\x00");
        let host_key = SigningKey::generate(&mut rng);
        let host_pk = host_key.verifying_key().to_bytes();
        let body = b"alice".to_vec();
        let size = body.len() as u16;
        let mut signed = host_pk.to_vec();
        signed.extend_from_slice(&size.to_be_bytes());
        signed.extend_from_slice(&body);
        let sig = host_key.sign(&signed);
        client.write_all(&host_pk).await.unwrap();
        client.write_all(&size.to_be_bytes()).await.unwrap();
        client.write_all(&body).await.unwrap();
        client.write_all(&sig.to_bytes()).await.unwrap();

        let mut ok = [0u8; 2];
        client.read_exact(&mut ok).await.unwrap();
        assert_eq!(&ok, b"ok");
        server_task.await.unwrap().unwrap();

        let alpha2 = blinded_query(&mut rng);
        let (mut client2, mut server2) = duplex(8192);
        let store_clone2 = store.clone();
        let server_task2 = tokio::spawn(async move { get(&mut server2, &store_clone2, id(), &alpha2, None).await });
        let mut response = vec![0u8; 32 + 42];
        client2.read_exact(&mut response).await.unwrap();
        server_task2.await.unwrap().unwrap();
        assert_eq!(&response[32..], &rules);
    }

    #[tokio::test]
    async fn second_create_on_same_id_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        store.save(Some(id()), FileName::Rules, &[0u8; 42]).await.unwrap();
        let locks = IdLocks::default();
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let alpha = blinded_query(&mut rng);

        let (_client, mut server) = duplex(128);
        let result = create(&mut server, &store, &locks, id(), &alpha).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn get_on_unknown_id_fails_without_masking() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let mut rng = ChaCha20Rng::seed_from_u64(9);
        let alpha = blinded_query(&mut rng);
        let (_client, mut server) = duplex(128);
        assert!(get(&mut server, &store, id(), &alpha, None).await.is_err());
    }

    #[tokio::test]
    async fn get_on_unknown_id_masks_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let alpha = blinded_query(&mut rng);
        let mac_key = [3u8; 32];

        let (mut client, mut server) = duplex(128);
        let server_task = tokio::spawn(async move { get(&mut server, &store, id(), &alpha, Some(&mac_key)).await });
        let mut response = vec![0u8; 32 + 42];
        client.read_exact(&mut response).await.unwrap();
        server_task.await.unwrap().unwrap();
    }
}
