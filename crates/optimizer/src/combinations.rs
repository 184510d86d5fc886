//! Lazy generation of candidate combinations.
//!
//! [`Combinations`] walks the restricted power set of a candidate list:
//! subset sizes ascend from `min_size` to `n`, and within one size subsets
//! come in lexicographic order of candidate indices. Nothing is
//! materialized up front, so callers can stop after any number of items.

use std::sync::Arc;

use spotmix_core::Combination;

/// Restartable iterator over every subset of size `>= min_size`.
///
/// Cloning yields an iterator that resumes from the same position;
/// [`Combinations::restart`] rewinds to the first subset.
#[derive(Debug, Clone)]
pub struct Combinations {
    candidates: Arc<[String]>,
    min_size: usize,
    /// Indices of the next subset to yield; `None` once exhausted.
    cursor: Option<Vec<usize>>,
}

impl Combinations {
    /// `min_size` of zero is treated as one: the empty group is never a candidate.
    pub fn new(candidates: Vec<String>, min_size: usize) -> Self {
        let candidates: Arc<[String]> = candidates.into();
        let min_size = min_size.max(1);
        let cursor = Self::first(candidates.len(), min_size);
        Self {
            candidates,
            min_size,
            cursor,
        }
    }

    fn first(n: usize, size: usize) -> Option<Vec<usize>> {
        (size <= n).then(|| (0..size).collect())
    }

    pub fn restart(&self) -> Self {
        Self {
            candidates: Arc::clone(&self.candidates),
            min_size: self.min_size,
            cursor: Self::first(self.candidates.len(), self.min_size),
        }
    }

    pub fn min_size(&self) -> usize {
        self.min_size
    }

    /// Number of subsets a fresh generator yields: Σ C(n, k) for k in
    /// `min_size..=n`, saturating at `u64::MAX`.
    pub fn total(&self) -> u64 {
        let n = self.candidates.len() as u64;
        (self.min_size as u64..=n)
            .map(|k| binomial(n, k))
            .fold(0u64, |acc, c| acc.saturating_add(c))
    }

    /// Step `idx` to the next subset of the same size, or the first subset of
    /// the next size.
    fn advance(n: usize, mut idx: Vec<usize>) -> Option<Vec<usize>> {
        let k = idx.len();
        let pivot = (0..k).rev().find(|&i| idx[i] < n - k + i);
        match pivot {
            Some(i) => {
                idx[i] += 1;
                for j in i + 1..k {
                    idx[j] = idx[j - 1] + 1;
                }
                Some(idx)
            }
            None => Self::first(n, k + 1),
        }
    }
}

impl Iterator for Combinations {
    type Item = Combination;

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.cursor.take()?;
        let combination = Combination::new(idx.iter().map(|&i| self.candidates[i].clone()));
        self.cursor = Self::advance(self.candidates.len(), idx);
        Some(combination)
    }
}

impl std::iter::FusedIterator for Combinations {}

/// C(n, k), saturating at `u64::MAX`.
pub fn binomial(n: u64, k: u64) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut acc: u128 = 1;
    for i in 0..k {
        acc = acc * (n - i) as u128 / (i + 1) as u128;
        if acc > u64::MAX as u128 {
            return u64::MAX;
        }
    }
    acc as u64
}
