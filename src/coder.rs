//! Systematic Cauchy Reed-Solomon kernel over GF(2^8).
//!
//! Given `k` data shards of equal length, [`encode`] writes `m` parity
//! shards such that any `k` of the `k + m` total shards reconstruct the
//! data. [`reconstruct`] solves for missing data shards in place, in
//! buffers the caller provides.
//!
//! The code uses a normalized Cauchy matrix:
//!
//! ```text
//! a_ij = (y_j + x_0) / (x_i + y_j)
//! ```
//!
//! where `x_i = k + row` indexes parity rows, `x_0 = k`, and `y_j = col`
//! indexes data columns. Rows and columns are disjoint field points, so
//! every square submatrix is invertible and decoding succeeds for any
//! erasure pattern within the parity budget.

use crate::gf::{gf_mul_slice_inplace, gf_muladd_slice, Gf256};
use crate::Error;

/// Maximum total shards (data + parity) in one coding group.
pub const MAX_SHARDS: usize = 256;

/// Cauchy matrix element for parity row `row`, data column `col`, in a
/// group of `k` data shards.
#[inline]
fn coefficient(k: usize, row: usize, col: usize) -> Gf256 {
    let x_i = Gf256((k + row) as u8);
    let x_0 = Gf256(k as u8);
    let y_j = Gf256(col as u8);
    (y_j + x_0) / (x_i + y_j)
}

/// Compute `parity.len()` parity shards from `data`.
///
/// Data shards pass through unchanged (systematic code); only the parity
/// buffers are written. All shards must share one nonzero length.
///
/// # Errors
///
/// [`Error::InvalidShardCount`] if there are no data shards or more than
/// [`MAX_SHARDS`] total; [`Error::ShardSizeMismatch`] if any shard length
/// differs or is zero.
pub fn encode(data: &[&[u8]], parity: &mut [&mut [u8]]) -> Result<(), Error> {
    let k = data.len();
    if k == 0 || k + parity.len() > MAX_SHARDS {
        return Err(Error::InvalidShardCount);
    }
    let len = data[0].len();
    if len == 0
        || data.iter().any(|s| s.len() != len)
        || parity.iter().any(|s| s.len() != len)
    {
        return Err(Error::ShardSizeMismatch);
    }

    for (row, out) in parity.iter_mut().enumerate() {
        out.fill(0);
        for (col, src) in data.iter().enumerate() {
            gf_muladd_slice(out, src, coefficient(k, row, col));
        }
    }
    Ok(())
}

/// Reconstruct missing data shards in place.
///
/// * `k` - number of data shards in the group
/// * `present` - surviving data shards as `(position, bytes)`
/// * `parity` - available parity shards as `(parity index, bytes)`, where
///   the index is the shard's row in the encoding matrix
/// * `missing` - `(position, scratch buffer)` for each missing data shard;
///   on success each buffer holds the reconstructed shard
///
/// Only the first `missing.len()` parity shards are consumed; any subset
/// of that size works.
///
/// # Errors
///
/// [`Error::InsufficientShards`] with fewer parity shards than missing
/// positions; [`Error::InvalidShardCount`] / [`Error::ShardSizeMismatch`]
/// on malformed geometry; [`Error::SingularMatrix`] if elimination hits a
/// zero pivot (unreachable for well-formed Cauchy systems, checked anyway).
pub fn reconstruct(
    k: usize,
    present: &[(usize, &[u8])],
    parity: &[(usize, &[u8])],
    missing: &mut [(usize, &mut [u8])],
) -> Result<(), Error> {
    let n_missing = missing.len();
    if n_missing == 0 {
        return Ok(());
    }
    if k == 0 || present.len() + n_missing != k {
        return Err(Error::InvalidShardCount);
    }
    if parity.len() < n_missing {
        return Err(Error::InsufficientShards);
    }
    let parity = &parity[..n_missing];
    if parity.iter().any(|&(idx, _)| k + idx >= MAX_SHARDS) {
        return Err(Error::InvalidShardCount);
    }
    let len = missing[0].1.len();
    if len == 0
        || missing.iter().any(|(_, s)| s.len() != len)
        || present.iter().any(|(_, s)| s.len() != len)
        || parity.iter().any(|(_, s)| s.len() != len)
    {
        return Err(Error::ShardSizeMismatch);
    }

    // Seed each scratch buffer with one parity shard, then cancel the
    // contribution of every surviving data shard (addition doubles as
    // subtraction in GF(2^8)).
    for (row, (_, buf)) in missing.iter_mut().enumerate() {
        let (p_idx, p_data) = parity[row];
        buf.copy_from_slice(p_data);
        for &(col, src) in present {
            gf_muladd_slice(buf, src, coefficient(k, p_idx, col));
        }
    }

    // Solve the n_missing x n_missing system over the missing columns.
    let cols: Vec<usize> = missing.iter().map(|(pos, _)| *pos).collect();
    let mut matrix: Vec<Vec<Gf256>> = parity
        .iter()
        .map(|&(p_idx, _)| cols.iter().map(|&c| coefficient(k, p_idx, c)).collect())
        .collect();

    // Forward elimination. No row exchanges: every minor of a Cauchy
    // matrix is nonsingular, so the diagonal pivots cannot vanish.
    for col in 0..n_missing {
        let pivot = matrix[col][col];
        if pivot.0 == 0 {
            return Err(Error::SingularMatrix);
        }
        let inv = Gf256(1) / pivot;
        for j in col..n_missing {
            matrix[col][j] = matrix[col][j] * inv;
        }
        gf_mul_slice_inplace(missing[col].1, inv);

        for row in col + 1..n_missing {
            let factor = matrix[row][col];
            if factor.0 == 0 {
                continue;
            }
            for j in col..n_missing {
                let v = matrix[col][j];
                matrix[row][j] = matrix[row][j] + v * factor;
            }
            let (head, tail) = missing.split_at_mut(row);
            gf_muladd_slice(tail[0].1, head[col].1, factor);
        }
    }

    // Back substitution.
    for col in (1..n_missing).rev() {
        for row in 0..col {
            let factor = matrix[row][col];
            if factor.0 == 0 {
                continue;
            }
            let (head, tail) = missing.split_at_mut(col);
            gf_muladd_slice(head[row].1, tail[0].1, factor);
        }
    }

    Ok(())
}
