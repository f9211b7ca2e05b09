//! Host-blob updater (spec C3): maintains a per-host "user list" blob that
//! the server cannot author — only the party holding the host's signing key
//! can mutate it.

use oprf_oracle_core::signature;
use tokio::io::{AsyncRead, AsyncReadExt as _, AsyncWrite, AsyncWriteExt as _};

use oprf_oracle_types::RecordId;

use crate::blob_store::{BlobStore, FileName};
use crate::errors::OracleError;

const EMPTY_BLOB: &[u8; 2] = b"\x00\x00";

/// Runs one host-blob update cycle over `stream`: reads the 32-byte host
/// id, sends the host's current blob, then reads and verifies a
/// signature-wrapped update and persists it.
pub async fn run<S>(stream: &mut S, store: &BlobStore) -> Result<(), OracleError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut host_id_bytes = [0u8; 32];
    stream.read_exact(&mut host_id_bytes).await?;
    let host_id = RecordId::from_bytes(host_id_bytes);

    let existing_blob = store.load(Some(host_id), FileName::Blob, None).await?;
    let current = existing_blob.as_deref().unwrap_or(EMPTY_BLOB);
    stream.write_all(current).await?;

    if existing_blob.is_none() {
        register_new_host(stream, store, host_id).await
    } else {
        update_existing_host(stream, store, host_id).await
    }
}

/// Reads `size[2, big-endian] ‖ signed_body[size+64]` and splits it into
/// the declared size, the unsigned body, and the detached signature.
async fn read_size_body_sig<S>(stream: &mut S) -> Result<(u16, Vec<u8>, [u8; 64]), OracleError>
where
    S: AsyncRead + Unpin,
{
    let mut size_bytes = [0u8; 2];
    stream.read_exact(&mut size_bytes).await?;
    let size = u16::from_be_bytes(size_bytes);

    let mut body = vec![0u8; usize::from(size)];
    stream.read_exact(&mut body).await?;
    let mut sig = [0u8; 64];
    stream.read_exact(&mut sig).await?;
    Ok((size, body, sig))
}

async fn register_new_host<S>(
    stream: &mut S,
    store: &BlobStore,
    host_id: RecordId,
) -> Result<(), OracleError>
where
    S: AsyncRead + Unpin,
{
    let mut pk = [0u8; 32];
    stream.read_exact(&mut pk).await?;
    let (size, body, sig) = read_size_body_sig(stream).await?;

    let mut signed = pk.to_vec();
    signed.extend_from_slice(&size.to_be_bytes());
    signed.extend_from_slice(&body);
    signature::verify(&sig, &signed, &pk)
        .map_err(|err| OracleError::Crypto(err.to_string()))?;

    store.save(Some(host_id), FileName::Pub, &pk).await?;
    let mut persisted = size.to_be_bytes().to_vec();
    persisted.extend_from_slice(&body);
    store.save(Some(host_id), FileName::Blob, &persisted).await?;
    Ok(())
}

async fn update_existing_host<S>(
    stream: &mut S,
    store: &BlobStore,
    host_id: RecordId,
) -> Result<(), OracleError>
where
    S: AsyncRead + Unpin,
{
    let pub_key = store
        .load(Some(host_id), FileName::Pub, Some(32))
        .await?
        .ok_or_else(|| OracleError::State("host has a blob but no pub key".into()))?;
    let pub_key: [u8; 32] = pub_key.try_into().expect("length checked by blob store");

    let (size, body, sig) = read_size_body_sig(stream).await?;
    let mut signed = pub_key.to_vec();
    signed.extend_from_slice(&size.to_be_bytes());
    signed.extend_from_slice(&body);
    signature::verify(&sig, &signed, &pub_key)
        .map_err(|err| OracleError::Crypto(err.to_string()))?;

    let mut persisted = size.to_be_bytes().to_vec();
    persisted.extend_from_slice(&body);
    store.save(Some(host_id), FileName::Blob, &persisted).await?;
    Ok(())
}
