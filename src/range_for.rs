//! The range-for construct: a domain plus the loop targets that iterate it.
//!
//! ```text
//! RangeLoop ── compile ──→ CompiledLoop ── resolve ──→ DispatchPlan ──→ dispatch
//!     └──────── force_static ──→ StaticLoop (unrolled tuples)
//! ```

use crate::diagnostic::Diagnostic;
use crate::domain::{Evaluator, RangeDomain};
use crate::plan::dispatch::dispatch_serial;
use crate::plan::{Binding, DispatchPlan, Iteration, LoopTargets};
use crate::runtime::{KernelFault, LaunchError, LaunchReport};

/// A domain and how the loop header binds it.
#[derive(Clone, Debug, PartialEq)]
pub struct RangeLoop {
    domain: RangeDomain,
    targets: LoopTargets,
}

impl RangeLoop {
    /// `for v0, v1, ... in domain` with `vars` loop variables.
    pub fn new(domain: RangeDomain, vars: usize) -> Self {
        Self {
            domain,
            targets: LoopTargets::Vars(vars),
        }
    }

    /// `for I in grouped(domain)`.
    pub fn grouped(domain: RangeDomain) -> Self {
        Self {
            domain,
            targets: LoopTargets::Grouped,
        }
    }

    pub fn domain(&self) -> &RangeDomain {
        &self.domain
    }

    pub fn targets(&self) -> LoopTargets {
        self.targets
    }

    /// Check the loop header against the domain rank.
    pub fn compile(&self) -> Result<CompiledLoop, Diagnostic> {
        let (binding, arity_warning) =
            Binding::new(self.targets, self.domain.rank(), self.domain.call_site())?;
        Ok(CompiledLoop {
            domain: self.domain.clone(),
            binding,
            arity_warning,
        })
    }
}

/// One loop variable per axis.
impl From<RangeDomain> for RangeLoop {
    fn from(domain: RangeDomain) -> Self {
        let rank = domain.rank();
        RangeLoop::new(domain, rank)
    }
}

/// Iterate `domain` with a single grouped index as the loop target.
pub fn group(domain: RangeDomain) -> RangeLoop {
    RangeLoop::grouped(domain)
}

/// A loop whose header has been checked; ready to resolve and dispatch.
#[derive(Clone, Debug)]
pub struct CompiledLoop {
    domain: RangeDomain,
    binding: Binding,
    arity_warning: Option<Diagnostic>,
}

impl CompiledLoop {
    pub fn domain(&self) -> &RangeDomain {
        &self.domain
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    /// Warning to report on every call when fewer variables than axes are bound.
    pub fn arity_warning(&self) -> Option<&Diagnostic> {
        self.arity_warning.as_ref()
    }

    /// Resolve the bounds for this invocation and plan the flat dispatch.
    pub fn plan(&self, eval: &Evaluator<'_>) -> Result<DispatchPlan, LaunchError> {
        DispatchPlan::new(&self.domain.resolve(eval)?)
    }

    /// Run the loop on the calling thread in row-major order.
    ///
    /// Meant for loops nested inside a parallel body, where only the
    /// outermost loop is dispatched across workers. Like a launch, every
    /// call reports the arity warning once, unless the evaluator turns it off.
    pub fn for_each_serial<F>(
        &self,
        eval: &Evaluator<'_>,
        body: F,
    ) -> Result<LaunchReport, KernelFault>
    where
        F: FnMut(&Iteration<'_>) -> Result<(), KernelFault>,
    {
        let plan = self.plan(eval)?;
        let warnings = self.report_arity_warning(eval.arity_warnings());
        let iterations = dispatch_serial(&plan, &self.binding, body)?;
        Ok(LaunchReport {
            iterations,
            warnings,
        })
    }

    /// The arity warning for one call, logged once when `enabled`.
    pub(crate) fn report_arity_warning(&self, enabled: bool) -> Vec<Diagnostic> {
        match &self.arity_warning {
            Some(warning) if enabled => {
                tracing::warn!(
                    call = %self.domain.call_site().source,
                    "{}",
                    warning.message
                );
                vec![warning.clone()]
            }
            _ => Vec::new(),
        }
    }
}
