//! The adaptive proof-of-work difficulty table and the on-disk `difficulty`
//! file's 9-byte packed state (spec §3, §4.6).

/// One entry of the ordered difficulty table: Equihash parameters and the
/// number of seconds a client is given to solve at this level before the
/// challenge is considered expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultyLevel {
    /// Equihash `n` (bits).
    pub n: u8,
    /// Equihash `k` (rounds).
    pub k: u8,
    /// Seconds allowed to solve before expiry (indexes `RL_Timeouts`).
    pub timeout_secs: u32,
}

/// 13 levels, `(60,4,1s)` through `(120,4,5120s)`, `n` stepping by 5.
///
/// The timeout column is not a clean doubling curve — it is the benchmarked/
/// interpolated series from `original_source/pwdsphinx/oracle.py`'s own
/// `Difficulties` table, which this mirrors exactly.
pub const DIFFICULTIES: [DifficultyLevel; 13] = [
    DifficultyLevel { n: 60, k: 4, timeout_secs: 1 },
    DifficultyLevel { n: 65, k: 4, timeout_secs: 2 },
    DifficultyLevel { n: 70, k: 4, timeout_secs: 4 },
    DifficultyLevel { n: 75, k: 4, timeout_secs: 9 },
    DifficultyLevel { n: 80, k: 4, timeout_secs: 16 },
    DifficultyLevel { n: 85, k: 4, timeout_secs: 32 },
    DifficultyLevel { n: 90, k: 4, timeout_secs: 80 },
    DifficultyLevel { n: 95, k: 4, timeout_secs: 160 },
    DifficultyLevel { n: 100, k: 4, timeout_secs: 320 },
    DifficultyLevel { n: 105, k: 4, timeout_secs: 640 },
    DifficultyLevel { n: 110, k: 4, timeout_secs: 1280 },
    DifficultyLevel { n: 115, k: 4, timeout_secs: 2560 },
    DifficultyLevel { n: 120, k: 4, timeout_secs: 5120 },
];

/// Looks up the timeout for a given `(n, k)` pair as they would appear in a
/// submitted challenge, rather than by level index.
///
/// An `(n, k)` pair not present in [`DIFFICULTIES`] must be rejected by
/// callers (spec §9: "an unknown `(n,k)` ... must fail, not be treated as
/// 'no timeout'").
pub fn timeout_for(n: u8, k: u8) -> Option<u32> {
    DIFFICULTIES
        .iter()
        .find(|level| level.n == n && level.k == k)
        .map(|level| level.timeout_secs)
}

/// The persisted, packed state of a record's `difficulty` file: 9 bytes,
/// `level:u8 ‖ count:u32_le ‖ ts:u32_le`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultyState {
    /// Index into [`DIFFICULTIES`].
    pub level: u8,
    /// Requests observed at the current level since the last escalation/decay.
    pub count: u32,
    /// Unix timestamp (seconds) this state was last written.
    pub ts: u32,
}

/// Errors decoding a packed `difficulty` file.
#[derive(Debug, thiserror::Error)]
#[error("difficulty state must be exactly 9 bytes, got {0}")]
pub struct DifficultyStateError(usize);

impl DifficultyState {
    /// Packs this state into the 9-byte on-disk form.
    pub fn to_bytes(self) -> [u8; 9] {
        let mut out = [0u8; 9];
        out[0] = self.level;
        out[1..5].copy_from_slice(&self.count.to_le_bytes());
        out[5..9].copy_from_slice(&self.ts.to_le_bytes());
        out
    }

    /// Unpacks a 9-byte on-disk `difficulty` file.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DifficultyStateError> {
        if bytes.len() != 9 {
            return Err(DifficultyStateError(bytes.len()));
        }
        Ok(Self {
            level: bytes[0],
            count: u32::from_le_bytes(bytes[1..5].try_into().expect("length checked above")),
            ts: u32::from_le_bytes(bytes[5..9].try_into().expect("length checked above")),
        })
    }

    /// The clamped top level, one past which escalation saturates.
    pub fn max_level() -> u8 {
        (DIFFICULTIES.len() - 1) as u8
    }
}
