//! The challenge issuer (spec C6, §4.6): reads the wrapped request the
//! client wants to eventually execute, advances that record's adaptive PoW
//! difficulty, and sends back a MAC-sealed challenge.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt as _};

use oprf_oracle_types::{Challenge, DifficultyState, DIFFICULTIES};

use crate::blob_store::{BlobStore, FileName};
use crate::errors::OracleError;
use crate::metrics::METRICS_ID_CHALLENGE_LEVEL;

use super::{load_or_create_mac_key, now_secs, read_wrapped_request, RateLimitConfig};

/// Issues a proof-of-work challenge for the wrapped request read from
/// `stream` (spec §4.6).
#[tracing::instrument(level = "debug", skip_all)]
pub async fn issue<S>(stream: &mut S, store: &BlobStore, rl: &RateLimitConfig) -> Result<(), OracleError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let wrapped = read_wrapped_request(stream).await?;
    let id = wrapped.id();

    let now = now_secs();
    let prior = store.load(Some(id), FileName::Difficulty, Some(9)).await?;
    let (level, count) = next_difficulty(prior, now, rl);

    if level == DifficultyState::max_level() && count > rl.rl_threshold.saturating_mul(2) {
        tracing::warn!(%id, count, "sustained proof-of-work activity at the top difficulty level");
    }
    ::metrics::gauge!(METRICS_ID_CHALLENGE_LEVEL).set(f64::from(level));

    let new_state = DifficultyState {
        level,
        count,
        ts: now as u32,
    };
    // Matches `original_source`'s `save_blob`, which opens the file without
    // creating any missing directory: an unknown id's difficulty write is
    // swallowed rather than materializing a record directory for it, unless
    // a prior difficulty file already proved the directory exists.
    let wrote = store
        .save_if_dir_exists(Some(id), FileName::Difficulty, &new_state.to_bytes())
        .await?;
    if !wrote && prior.is_some() {
        return Err(OracleError::State(format!(
            "record {id} lost its directory between difficulty reads"
        )));
    }

    let mac_key = load_or_create_mac_key(store).await?;
    let level_params = DIFFICULTIES[usize::from(level)];
    let challenge = Challenge {
        n: level_params.n,
        k: level_params.k,
        ts: now,
    };
    let challenge_bytes = challenge.to_bytes();
    let sig = oprf_oracle_core::mac::seal(&mac_key, &[wrapped.as_bytes(), &challenge_bytes]);

    let mut out = challenge_bytes.to_vec();
    out.extend_from_slice(&sig);
    stream.write_all(&out).await?;
    Ok(())
}

/// Computes the next `(level, count)` pair per spec §4.6 steps 2-3, given
/// the previously persisted state (if any) and the current time.
fn next_difficulty(prior: Option<Vec<u8>>, now: u64, rl: &RateLimitConfig) -> (u8, u32) {
    let max_level = DifficultyState::max_level();
    let Some(bytes) = prior else {
        return (0, 0);
    };
    let state = DifficultyState::from_bytes(&bytes).expect("length checked by blob store");

    if state.level > max_level {
        return (max_level, 0);
    }

    let elapsed = now.saturating_sub(u64::from(state.ts));
    if elapsed > rl.rl_decay_secs && state.level > 0 {
        let periods = elapsed / rl.rl_decay_secs;
        (state.level.saturating_sub(periods.min(u64::from(u8::MAX)) as u8), 0)
    } else if state.count >= rl.rl_threshold && state.level < max_level {
        (state.level + 1, 0)
    } else {
        (state.level, state.count + 1)
    }
}
