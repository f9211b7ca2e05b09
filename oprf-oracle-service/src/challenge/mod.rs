//! Adaptive proof-of-work rate limiter: the challenge issuer (spec C6,
//! §4.6) and verifier (spec C7, §4.7), plus the wrapped-request framing and
//! MAC-key handling they share.

pub mod issuer;
pub mod verifier;

use std::time::{SystemTime, UNIX_EPOCH};

use tokio::io::{AsyncRead, AsyncReadExt as _};

use oprf_oracle_types::{RecordOp, WrappedRequest};

use crate::blob_store::{BlobStore, FileName};
use crate::errors::OracleError;

/// Rate-limit tuning, resolved from [`crate::config::OracleConfig`] into the
/// plain seconds/count values the issuer and verifier operate on.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Seconds of inactivity after which a difficulty level decays by one
    /// (per elapsed period).
    pub rl_decay_secs: u64,
    /// Requests observed at a level, at or above which the next challenge
    /// escalates to the next level.
    pub rl_threshold: u32,
    /// Extra seconds of leeway added to a level's solve timeout before a
    /// submitted solution is considered expired.
    pub rl_gracetime_secs: u64,
}

impl Default for RateLimitConfig {
    /// The same defaults `original_source/pwdsphinx/oracle.py` ships.
    fn default() -> Self {
        Self {
            rl_decay_secs: 1800,
            rl_threshold: 1,
            rl_gracetime_secs: 10,
        }
    }
}

/// Seconds since the Unix epoch, truncated to `u64`.
pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is after 1970")
        .as_secs()
}

/// Reads the "wrapped request" carried through a proof-of-work round-trip
/// (spec §4.6 step 1 / §4.7 step 2): one opcode byte, then 32 (READ) or 64
/// (everything else) more bytes.
pub(crate) async fn read_wrapped_request<S>(stream: &mut S) -> Result<WrappedRequest, OracleError>
where
    S: AsyncRead + Unpin,
{
    let mut op = [0u8; 1];
    stream.read_exact(&mut op).await?;
    let record_op = RecordOp::try_from(op[0])?;
    let rest_len = if record_op.is_short_form() { 32 } else { 64 };
    let mut buf = Vec::with_capacity(1 + rest_len);
    buf.push(op[0]);
    buf.resize(1 + rest_len, 0);
    stream.read_exact(&mut buf[1..]).await?;
    Ok(WrappedRequest::parse(buf)?)
}

/// Loads the process-wide MAC key used to seal challenges, generating and
/// persisting a fresh one on first use.
///
/// Spec §9: two concurrent first-users can each generate a key; the loser's
/// write is simply overwritten, and its clients see an unverifiable
/// challenge on their next request and retry. Left as-is rather than
/// seeded at startup — see `DESIGN.md`.
pub(crate) async fn load_or_create_mac_key(store: &BlobStore) -> Result<[u8; 32], OracleError> {
    if let Some(bytes) = store.load(None, FileName::GlobalMacKey, Some(32)).await? {
        return Ok(bytes.try_into().expect("length checked by blob store"));
    }
    let mut key = [0u8; 32];
    rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut key);
    store.save(None, FileName::GlobalMacKey, &key).await?;
    Ok(key)
}
