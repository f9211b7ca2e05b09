//! Configuration for the oracle service library.
//!
//! Mirrors the split the teacher uses between its library-level
//! `OprfNodeConfig` and the example binary's own `bind_addr`/TLS fields:
//! this struct covers everything the *library* needs (storage root, worker
//! cap, rate-limit tuning), while listener address, TLS material, and the
//! per-read timeout live on the binary's own config and are passed in
//! separately when building an [`crate::OracleServer`].

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::challenge::RateLimitConfig;

/// The configuration for the oracle service.
///
/// Populated via `--flag`/`OPRF_ORACLE_*` environment variables.
#[derive(Parser, Debug, Clone)]
pub struct OracleConfig {
    /// Root directory holding every record's subdirectory and the global
    /// MAC key.
    #[clap(long, env = "OPRF_ORACLE_DATADIR")]
    pub datadir: PathBuf,

    /// Maximum number of connections served concurrently.
    #[clap(long, env = "OPRF_ORACLE_MAX_KIDS", default_value = "5")]
    pub max_kids: usize,

    /// Seconds of inactivity after which a record's proof-of-work
    /// difficulty decays by one level per elapsed period.
    #[clap(
        long,
        env = "OPRF_ORACLE_RL_DECAY",
        default_value = "30min",
        value_parser = humantime::parse_duration
    )]
    pub rl_decay: Duration,

    /// Requests observed at a difficulty level at or above which the next
    /// challenge escalates to the next level.
    #[clap(long, env = "OPRF_ORACLE_RL_THRESHOLD", default_value = "1")]
    pub rl_threshold: u32,

    /// Extra leeway added to a level's solve timeout before a submitted
    /// proof-of-work solution is considered expired.
    #[clap(
        long,
        env = "OPRF_ORACLE_RL_GRACETIME",
        default_value = "10s",
        value_parser = humantime::parse_duration
    )]
    pub rl_gracetime: Duration,

    /// When set, GET on an unknown record id runs the OPRF over a
    /// deterministic dummy key instead of failing closed, hiding the
    /// existence leak at the cost of one extra scalar multiplication.
    #[clap(long, env = "OPRF_ORACLE_MASK_UNKNOWN_ID_ON_GET")]
    pub mask_unknown_id_on_get: bool,
}

impl OracleConfig {
    /// Resolves the rate-limit fields into the plain-seconds form the
    /// challenge issuer and verifier operate on.
    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            rl_decay_secs: self.rl_decay.as_secs(),
            rl_threshold: self.rl_threshold,
            rl_gracetime_secs: self.rl_gracetime.as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_converts_durations_to_seconds() {
        let config = OracleConfig {
            datadir: PathBuf::from("/tmp/oracle"),
            max_kids: 5,
            rl_decay: Duration::from_secs(1800),
            rl_threshold: 1,
            rl_gracetime: Duration::from_secs(10),
            mask_unknown_id_on_get: false,
        };
        let rl = config.rate_limit();
        assert_eq!(rl.rl_decay_secs, 1800);
        assert_eq!(rl.rl_threshold, 1);
        assert_eq!(rl.rl_gracetime_secs, 10);
    }
}
