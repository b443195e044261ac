//! Parallel and serial execution of a planned domain.

use rayon::prelude::*;

use super::{Binding, DispatchPlan, Iteration};
use crate::runtime::{KernelFault, LaunchError};

/// Run `body` once per flat index on the current rayon pool.
///
/// Returns after every index completed, or after the first fault; indices
/// already run are not undone. No order is guaranteed between indices.
pub(crate) fn dispatch_parallel<F>(
    plan: &DispatchPlan,
    binding: &Binding,
    body: &F,
) -> Result<u64, LaunchError>
where
    F: Fn(&Iteration<'_>) -> Result<(), KernelFault> + Sync,
{
    let total = plan.total();
    if total == 0 {
        return Ok(0);
    }

    (0..total).into_par_iter().try_for_each(|flat| {
        let it = Iteration::new(flat, plan.map(flat), binding);
        body(&it).map_err(|fault| LaunchError::Fault { flat, fault })
    })?;

    Ok(total)
}

/// Run `body` once per flat index, in row-major order, on the calling thread.
pub(crate) fn dispatch_serial<F, E>(
    plan: &DispatchPlan,
    binding: &Binding,
    mut body: F,
) -> Result<u64, E>
where
    F: FnMut(&Iteration<'_>) -> Result<(), E>,
{
    for flat in 0..plan.total() {
        body(&Iteration::new(flat, plan.map(flat), binding))?;
    }
    Ok(plan.total())
}
