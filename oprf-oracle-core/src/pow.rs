//! Equihash proof-of-work verification (spec component C6/C7's external
//! collaborator: `solsize(n,k)` and `verify(n,k,seed,solution) -> bool`).
//!
//! Equihash is Wagner's generalized-birthday memory-hard puzzle: a solution
//! is `2^k` distinct indices into a pseudo-random hash stream such that,
//! combined pairwise in a depth-`k` binary tree, the XOR of each pair's hash
//! output has its next `n/(k+1)` bits zero, and the final combined hash is
//! zero in its remaining low-order bits.
//!
//! `spec.md` treats the verifier as an out-of-scope external collaborator
//! reached only through this interface; [`EquihashVerifier`] is that seam, so
//! callers (and tests) can swap in a stub without touching the protocol
//! state machine. [`ReferenceEquihash`] is the one production-grade backend
//! this workspace ships.

use std::collections::HashSet;

/// Errors from solution-size computation or verification.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PowError {
    /// `k` is large enough that `n/(k+1)` underflows to something unusable,
    /// or `k` is zero (no rounds to combine).
    #[error("invalid equihash parameters n={n} k={k}")]
    InvalidParams {
        /// The rejected `n`.
        n: u8,
        /// The rejected `k`.
        k: u8,
    },
    /// The solution buffer is not exactly `solsize(n, k)` bytes.
    #[error("wrong solution size: expected {expected}, got {actual}")]
    WrongSolutionSize {
        /// Expected length.
        expected: usize,
        /// Observed length.
        actual: usize,
    },
}

/// Pluggable Equihash backend. See module docs.
pub trait EquihashVerifier: Send + Sync {
    /// Returns the exact byte length of a valid solution for `(n, k)`.
    fn solsize(&self, n: u8, k: u8) -> Result<usize, PowError>;

    /// Verifies `solution` against `seed` under parameters `(n, k)`.
    fn verify(&self, n: u8, k: u8, seed: &[u8], solution: &[u8]) -> Result<bool, PowError>;
}

/// The production Equihash verifier.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceEquihash;

fn bit_len(n: u8, k: u8) -> Result<u32, PowError> {
    if k == 0 {
        return Err(PowError::InvalidParams { n, k });
    }
    Ok(u32::from(n) / u32::from(k + 1) + 1)
}

fn collision_bit_len(n: u8, k: u8) -> u32 {
    u32::from(n) / u32::from(k + 1)
}

/// Reads `num_bits` bits starting at bit offset `start` (MSB-first within
/// each byte) from `data`, returned right-aligned in a `u64`.
fn read_bits(data: &[u8], start: u32, num_bits: u32) -> u64 {
    let mut value: u64 = 0;
    for i in 0..num_bits {
        let bit_pos = start + i;
        let byte = data[(bit_pos / 8) as usize];
        let bit = (byte >> (7 - (bit_pos % 8))) & 1;
        value = (value << 1) | u64::from(bit);
    }
    value
}

/// Writes the low `num_bits` bits of `value` into `out` starting at bit
/// offset `start` (MSB-first within each byte). `out` must already be
/// zero-filled and large enough.
fn write_bits(out: &mut [u8], start: u32, num_bits: u32, value: u64) {
    for i in 0..num_bits {
        let bit = (value >> (num_bits - 1 - i)) & 1;
        let bit_pos = start + i;
        if bit == 1 {
            out[(bit_pos / 8) as usize] |= 1 << (7 - (bit_pos % 8));
        }
    }
}

/// Checks that bits `[start, start+num_bits)` of `data` are all zero.
fn bits_are_zero(data: &[u8], start: u32, num_bits: u32) -> bool {
    (0..num_bits).all(|i| {
        let bit_pos = start + i;
        let byte = data[(bit_pos / 8) as usize];
        (byte >> (7 - (bit_pos % 8))) & 1 == 0
    })
}

/// Expands a packed solution buffer into `2^k` indices, each `bit_len(n,k)`
/// bits wide.
fn unpack_indices(solution: &[u8], n: u8, k: u8) -> Result<Vec<u32>, PowError> {
    let bits = bit_len(n, k)?;
    let count = 1usize << k;
    let mut indices = Vec::with_capacity(count);
    for i in 0..count {
        let value = read_bits(solution, i as u32 * bits, bits);
        indices.push(value as u32);
    }
    Ok(indices)
}

/// Packs `2^k` indices, each `bit_len(n,k)` bits wide, into a byte buffer.
fn pack_indices(indices: &[u32], n: u8, k: u8) -> Result<Vec<u8>, PowError> {
    let bits = bit_len(n, k)?;
    let total_bits = bits as usize * indices.len();
    let mut out = vec![0u8; total_bits.div_ceil(8)];
    for (i, &value) in indices.iter().enumerate() {
        write_bits(&mut out, i as u32 * bits, bits, u64::from(value));
    }
    Ok(out)
}

/// Derives the pseudo-random hash of `ceil(n/8)` bytes for leaf `index`,
/// using BLAKE3's extendable output keyed on `seed`.
fn leaf_hash(seed: &[u8], index: u32, n: u8) -> Vec<u8> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(seed);
    hasher.update(&index.to_le_bytes());
    let mut reader = hasher.finalize_xof();
    let mut out = vec![0u8; (usize::from(n)).div_ceil(8)];
    reader.fill(&mut out);
    out
}

fn xor_into(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= s;
    }
}

/// Recursively validates one subtree of the Wagner tree.
///
/// Returns the combined hash and the sorted leaf index list on success.
fn validate_subtree(
    seed: &[u8],
    indices: &[u32],
    n: u8,
    k: u8,
    round: u32,
) -> Option<(Vec<u8>, Vec<u32>)> {
    if indices.len() == 1 {
        return Some((leaf_hash(seed, indices[0], n), vec![indices[0]]));
    }
    let mid = indices.len() / 2;
    let (left_hash, left_idx) = validate_subtree(seed, &indices[..mid], n, k, round - 1)?;
    let (right_hash, right_idx) = validate_subtree(seed, &indices[mid..], n, k, round - 1)?;

    // Canonical ordering: the left subtree's smallest index must precede
    // the right subtree's, otherwise the same multiset could encode two
    // "different" solutions.
    if left_idx.first() >= right_idx.first() {
        return None;
    }

    let cbl = collision_bit_len(n, k);
    let offset = cbl * (round - 1);
    let mut combined = left_hash;
    xor_into(&mut combined, &right_hash);
    if !bits_are_zero(&combined, offset, cbl) {
        return None;
    }

    let mut merged = left_idx;
    merged.extend(right_idx);
    Some((combined, merged))
}

impl EquihashVerifier for ReferenceEquihash {
    fn solsize(&self, n: u8, k: u8) -> Result<usize, PowError> {
        let bits = bit_len(n, k)?;
        Ok((bits as usize * (1usize << k)).div_ceil(8))
    }

    fn verify(&self, n: u8, k: u8, seed: &[u8], solution: &[u8]) -> Result<bool, PowError> {
        let expected = self.solsize(n, k)?;
        if solution.len() != expected {
            return Err(PowError::WrongSolutionSize {
                expected,
                actual: solution.len(),
            });
        }
        let indices = unpack_indices(solution, n, k)?;
        if indices.iter().collect::<HashSet<_>>().len() != indices.len() {
            return Ok(false);
        }
        let Some((combined, _)) = validate_subtree(seed, &indices, n, k, u32::from(k)) else {
            return Ok(false);
        };
        let cbl = collision_bit_len(n, k);
        let consumed = cbl * u32::from(k);
        let remaining = u32::from(n).saturating_sub(consumed);
        Ok(bits_are_zero(&combined, consumed, remaining))
    }
}

/// Brute-force Equihash solver, useful only for tests and for generating
/// fixtures at tiny `(n, k)` — real deployments only ever verify.
#[cfg(any(test, feature = "solver"))]
pub fn solve(seed: &[u8], n: u8, k: u8, search_space: u32) -> Option<Vec<u8>> {
    let verifier = ReferenceEquihash;
    let count = 1usize << k;
    let mut combo = vec![0u32; count];
    fn rec(
        seed: &[u8],
        n: u8,
        k: u8,
        verifier: &ReferenceEquihash,
        search_space: u32,
        combo: &mut Vec<u32>,
        pos: usize,
        start: u32,
    ) -> Option<Vec<u8>> {
        if pos == combo.len() {
            let packed = pack_indices(combo, n, k).ok()?;
            return match verifier.verify(n, k, seed, &packed) {
                Ok(true) => Some(packed),
                _ => None,
            };
        }
        for candidate in start..search_space {
            combo[pos] = candidate;
            if let Some(found) = rec(seed, n, k, verifier, search_space, combo, pos + 1, candidate + 1)
            {
                return Some(found);
            }
        }
        None
    }
    rec(seed, n, k, &verifier, search_space, &mut combo, 0, 0)
}
