//! Sparse run-length diff/patch for flat integer arrays.
//!
//! A diff is a flat token stream `[copy, n, lit_1 .. lit_n, copy, n, ..]`. Each chunk copies
//! `copy` elements from the old array at the current output position and then appends `n`
//! literals. The final chunk may be a lone copy count. Every parallel map array gets its own
//! diff; nothing here assumes two arrays line up.

use thiserror::Error;

/// Unchanged runs up to this length are cheaper to resend than to split around.
const MAX_ABSORBED_RUN: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("negative run length {0} at token {1}")]
    NegativeRun(i32, usize),
    #[error("copy of {len} elements at {at} overruns the old array of {old_len}")]
    CopyOverrun { at: usize, len: usize, old_len: usize },
    #[error("diff ends inside a literal run")]
    TruncatedLiterals,
}

/// Encodes the transition from `old` to `new`.
pub fn diff(old: &[i32], new: &[i32]) -> Vec<i32> {
    let same = |i: usize| i < old.len() && old[i] == new[i];
    let mut out = Vec::new();
    let mut i = 0;

    while i < new.len() {
        let copy_start = i;
        while i < new.len() && same(i) {
            i += 1;
        }
        out.push(run_len(i - copy_start));
        if i == new.len() {
            return out;
        }

        let literal_start = i;
        loop {
            while i < new.len() && !same(i) {
                i += 1;
            }
            let gap_start = i;
            while i < new.len() && same(i) && i - gap_start < MAX_ABSORBED_RUN {
                i += 1;
            }
            // Fold a short unchanged gap into the literal run only when more changes follow.
            if i == gap_start || i == new.len() || same(i) {
                i = gap_start;
                break;
            }
        }
        out.push(run_len(i - literal_start));
        out.extend_from_slice(&new[literal_start..i]);
    }

    out
}

/// Rebuilds the new array from `old` and a diff produced by [`diff`].
pub fn patch(old: &[i32], diff: &[i32]) -> Result<Vec<i32>, PatchError> {
    let mut out = Vec::with_capacity(old.len());
    let mut pos = 0;

    while pos < diff.len() {
        let copy = run_at(diff, pos)?;
        pos += 1;
        let start = out.len();
        let end = start + copy;
        if end > old.len() {
            return Err(PatchError::CopyOverrun {
                at: start,
                len: copy,
                old_len: old.len(),
            });
        }
        out.extend_from_slice(&old[start..end]);

        if pos == diff.len() {
            break;
        }
        let literals = run_at(diff, pos)?;
        pos += 1;
        let values = diff
            .get(pos..pos + literals)
            .ok_or(PatchError::TruncatedLiterals)?;
        out.extend_from_slice(values);
        pos += literals;
    }

    Ok(out)
}

fn run_at(diff: &[i32], pos: usize) -> Result<usize, PatchError> {
    let token = diff[pos];
    usize::try_from(token).map_err(|_| PatchError::NegativeRun(token, pos))
}

fn run_len(len: usize) -> i32 {
    i32::try_from(len).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_arrays_encode_as_single_copy() {
        let data = vec![4, 4, 4, 9, 1];
        assert_eq!(diff(&data, &data), vec![5]);
        assert_eq!(patch(&data, &[5]).unwrap(), data);
    }

    #[test]
    fn empty_old_encodes_full_literal_run() {
        let new = vec![1, 2, 3];
        let encoded = diff(&[], &new);
        assert_eq!(encoded, vec![0, 3, 1, 2, 3]);
        assert_eq!(patch(&[], &encoded).unwrap(), new);
    }

    #[test]
    fn single_change_costs_three_tokens_plus_tail() {
        let old = vec![0; 10];
        let mut new = old.clone();
        new[4] = 7;
        assert_eq!(diff(&old, &new), vec![4, 1, 7, 5]);
    }

    #[test]
    fn short_gaps_between_changes_are_absorbed() {
        let old = vec![0, 0, 0, 0, 0, 0, 0, 0];
        let new = vec![1, 0, 0, 2, 0, 0, 0, 3];
        // Gap of two is resent; gap of three is copied.
        assert_eq!(diff(&old, &new), vec![0, 4, 1, 0, 0, 2, 3, 1, 3]);
        assert_eq!(patch(&old, &diff(&old, &new)).unwrap(), new);
    }

    #[test]
    fn handles_growth_and_shrink() {
        let old = vec![1, 2, 3];
        let longer = vec![1, 2, 3, 4, 5];
        let shorter = vec![1, 9];
        assert_eq!(patch(&old, &diff(&old, &longer)).unwrap(), longer);
        assert_eq!(patch(&old, &diff(&old, &shorter)).unwrap(), shorter);
        assert_eq!(patch(&old, &diff(&old, &[])).unwrap(), Vec::<i32>::new());
    }

    #[test]
    fn malformed_diffs_are_rejected() {
        let old = vec![1, 2];
        assert_eq!(
            patch(&old, &[3]),
            Err(PatchError::CopyOverrun {
                at: 0,
                len: 3,
                old_len: 2
            })
        );
        assert_eq!(patch(&old, &[-1]), Err(PatchError::NegativeRun(-1, 0)));
        assert_eq!(patch(&old, &[0, 2, 5]), Err(PatchError::TruncatedLiterals));
    }
}
