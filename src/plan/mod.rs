//! Flattening and dispatch planning.
//!
//! A [`DispatchPlan`] maps one flat counter in `[0, total)` onto the
//! row-major tuple of a resolved domain:
//! ```text
//! stride[N-1] = 1
//! stride[k]   = stride[k+1] * size[k+1]
//! value[k]    = begin[k] + (flat / stride[k]) % size[k]
//! ```
//! The first axis varies slowest. `map` is pure, so flat indices can run
//! on any worker in any order.

pub mod binding;
pub(crate) mod dispatch;
#[cfg(test)]
mod tests;

use crate::domain::{ResolvedAxis, ResolvedDomain};
use crate::index::{GroupedIndex, MAX_RANK};
use crate::runtime::LaunchError;

pub use binding::{Binding, Iteration, LoopTargets, LoopVar};

/// Sizes, strides and the flat → tuple mapping of a resolved domain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchPlan {
    axes: Vec<ResolvedAxis>,
    sizes: Vec<u64>,
    strides: Vec<u64>,
    total: u64,
}

impl DispatchPlan {
    pub fn new(domain: &ResolvedDomain) -> Result<Self, LaunchError> {
        let rank = domain.rank();
        if rank == 0 || rank > MAX_RANK {
            return Err(LaunchError::Rank(rank));
        }
        let sizes = domain.sizes();
        let total = domain
            .total()
            .ok_or_else(|| LaunchError::DomainOverflow(sizes.clone()))?;

        // Strides only matter for non-empty domains, where they cannot overflow.
        let mut strides = vec![1u64; rank];
        if total > 0 {
            for k in (0..rank - 1).rev() {
                strides[k] = strides[k + 1] * sizes[k + 1];
            }
        }

        tracing::debug!(rank, total, ?sizes, "dispatch plan");
        Ok(Self {
            axes: domain.axes().to_vec(),
            sizes,
            strides,
            total,
        })
    }

    pub fn rank(&self) -> usize {
        self.axes.len()
    }

    /// Number of iterations. Zero if any axis is empty or inverted.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn sizes(&self) -> &[u64] {
        &self.sizes
    }

    pub fn strides(&self) -> &[u64] {
        &self.strides
    }

    /// Tuple for flat index `flat`, which must lie in `[0, total)`.
    pub fn map(&self, flat: u64) -> GroupedIndex {
        debug_assert!(flat < self.total);
        let mut values = [0i64; MAX_RANK];
        if self.axes.len() == 1 {
            values[0] = self.axes[0].begin.wrapping_add(flat as i64);
        } else {
            for (k, axis) in self.axes.iter().enumerate() {
                let offset = (flat / self.strides[k]) % self.sizes[k];
                values[k] = axis.begin.wrapping_add(offset as i64);
            }
        }
        GroupedIndex::from_parts(self.axes.len(), values)
    }
}
