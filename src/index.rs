//! The grouped index: resolved per-axis values of one iteration step.

use serde::{Deserialize, Serialize};

/// Highest domain rank a range construct accepts.
pub const MAX_RANK: usize = 8;

/// Fixed-length, positionally addressable bundle of per-axis values.
///
/// Both the runtime mapper and the static enumerator produce this type, so a
/// loop body cannot tell which path ran it. Unused slots are always zero,
/// which keeps the derived comparisons exact.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupedIndex {
    len: u8,
    values: [i64; MAX_RANK],
}

impl GroupedIndex {
    /// Build from a slice. Returns `None` above [`MAX_RANK`] components.
    pub fn new(values: &[i64]) -> Option<Self> {
        if values.len() > MAX_RANK {
            return None;
        }
        let mut out = [0i64; MAX_RANK];
        out[..values.len()].copy_from_slice(values);
        Some(Self {
            len: values.len() as u8,
            values: out,
        })
    }

    pub(crate) fn from_parts(len: usize, values: [i64; MAX_RANK]) -> Self {
        debug_assert!(len <= MAX_RANK);
        debug_assert!(values[len..].iter().all(|v| *v == 0));
        Self {
            len: len as u8,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, k: usize) -> Option<i64> {
        self.as_slice().get(k).copied()
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.values[..self.len()]
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.as_slice().iter().copied()
    }

    /// Sum of all components.
    pub fn sum(&self) -> i64 {
        self.iter().sum()
    }

    /// Components `range` as a new grouped index.
    pub fn slice(&self, range: std::ops::Range<usize>) -> GroupedIndex {
        let part = &self.as_slice()[range];
        let mut out = [0i64; MAX_RANK];
        out[..part.len()].copy_from_slice(part);
        Self::from_parts(part.len(), out)
    }

    pub fn to_vec(&self) -> Vec<i64> {
        self.as_slice().to_vec()
    }
}

impl std::ops::Index<usize> for GroupedIndex {
    type Output = i64;

    fn index(&self, k: usize) -> &i64 {
        &self.as_slice()[k]
    }
}

impl std::fmt::Debug for GroupedIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl std::fmt::Display for GroupedIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.iter().map(|v| v.to_string()).collect();
        write!(f, "({})", parts.join(", "))
    }
}

impl AsRef<[i64]> for GroupedIndex {
    fn as_ref(&self) -> &[i64] {
        self.as_slice()
    }
}
