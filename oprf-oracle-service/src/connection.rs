//! The connection driver (spec C8): reads one outer opcode and routes the
//! rest of the connection's lifetime to CREATE, the challenge issuer, or the
//! challenge verifier. Anything else is a silent close.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt as _, AsyncWrite, AsyncWriteExt as _};

use oprf_oracle_core::pow::EquihashVerifier;
use oprf_oracle_types::{Opcode, RecordId};

use crate::blob_store::BlobStore;
use crate::challenge::{issuer, verifier, RateLimitConfig};
use crate::errors::OracleError;
use crate::id_locks::IdLocks;
use crate::metrics::{METRICS_ID_REQUESTS_FAILED, METRICS_ID_REQUESTS_TOTAL};
use crate::record;

/// Everything one connection needs to drive itself. Owned and cheaply
/// `Clone`able (an `Arc` clone plus a few small `Copy`/`Clone` fields) so the
/// accept loop can hand an independent copy to every spawned task.
#[derive(Clone)]
pub struct ConnectionContext {
    /// The record/global blob store.
    pub store: BlobStore,
    /// The per-id advisory lock registry.
    pub locks: IdLocks,
    /// Resolved rate-limit tuning.
    pub rate_limit: RateLimitConfig,
    /// The Equihash backend the challenge verifier checks solutions against.
    pub equihash: Arc<dyn EquihashVerifier>,
    /// Whether GET on an unknown id returns a masked dummy response instead
    /// of failing closed.
    pub mask_unknown_id_on_get: bool,
}

/// Drives one accepted connection to completion: reads the outer opcode,
/// dispatches, and on any error writes the fail sentinel before returning.
/// Never propagates an error to the caller — the accept loop only needs to
/// know the task finished.
#[tracing::instrument(level = "debug", skip_all)]
pub async fn drive<S>(stream: &mut S, ctx: &ConnectionContext)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match dispatch(stream, ctx).await {
        Ok(()) => {}
        Err(err) => {
            ::metrics::counter!(METRICS_ID_REQUESTS_FAILED).increment(1);
            let sentinel = err.into_sentinel();
            // Best-effort: the peer may already be gone.
            let _ = stream.write_all(sentinel).await;
        }
    }
}

async fn dispatch<S>(stream: &mut S, ctx: &ConnectionContext) -> Result<(), OracleError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut op = [0u8; 1];
    stream.read_exact(&mut op).await?;

    let opcode = match Opcode::try_from(op[0]) {
        Ok(opcode) => opcode,
        Err(_) => return Ok(()), // silent close: not a recognized outer opcode
    };

    ::metrics::counter!(METRICS_ID_REQUESTS_TOTAL, "opcode" => opcode_label(opcode)).increment(1);

    match opcode {
        Opcode::Create => {
            let mut id_and_alpha = [0u8; 64];
            stream.read_exact(&mut id_and_alpha).await?;
            let id = RecordId::from_bytes(id_and_alpha[..32].try_into().expect("fixed slice"));
            let alpha: [u8; 32] = id_and_alpha[32..].try_into().expect("fixed slice");
            record::create(stream, &ctx.store, &ctx.locks, id, &alpha).await
        }
        Opcode::ChallengeCreate => issuer::issue(stream, &ctx.store, &ctx.rate_limit).await,
        Opcode::ChallengeVerify => {
            verifier::verify(
                stream,
                &ctx.store,
                &ctx.locks,
                &ctx.rate_limit,
                ctx.equihash.as_ref(),
                ctx.mask_unknown_id_on_get,
            )
            .await
        }
    }
}

fn opcode_label(opcode: Opcode) -> &'static str {
    match opcode {
        Opcode::Create => "create",
        Opcode::ChallengeCreate => "challenge_create",
        Opcode::ChallengeVerify => "challenge_verify",
    }
}
