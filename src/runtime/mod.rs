//! Execution context, kernel arguments, and launch errors.
//!
//! The [`ExecutionContext`] owns the storage registry and the worker pool.
//! It is the only way to dispatch a compiled loop or clear gradients, so
//! no process-wide state is involved: create one, launch against it, and
//! drop it (or take the storage back with [`ExecutionContext::into_registry`]).

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;

use crate::config::LaunchConfig;
use crate::diagnostic::Diagnostic;
use crate::domain::Evaluator;
use crate::plan::dispatch::dispatch_parallel;
use crate::plan::Iteration;
use crate::range_for::CompiledLoop;
use crate::storage::{ClearStats, StorageRegistry};
use crate::types::ScalarValue;

// ─── Errors ────────────────────────────────────────────────────────

/// A fatal fault raised by a kernel body (or by a buffer access inside it).
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct KernelFault {
    pub message: String,
}

impl KernelFault {
    pub fn new(message: String) -> Self {
        Self { message }
    }
}

impl From<LaunchError> for KernelFault {
    fn from(err: LaunchError) -> Self {
        KernelFault::new(err.to_string())
    }
}

/// Failures that happen at invocation time, after compilation succeeded.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("kernel parameter '{0}' was not supplied")]
    MissingParam(String),
    #[error("bound `{0}` is not an integer")]
    NonIntegral(String),
    #[error("bound `{0}` overflows a 64-bit integer")]
    BoundOverflow(String),
    #[error("field '{0}' is not in the storage registry")]
    UnknownField(String),
    #[error("loading bound from '{field}': {fault}")]
    BoundLoad { field: String, fault: KernelFault },
    #[error("domain of sizes {0:?} has more iterations than fit in 64 bits")]
    DomainOverflow(Vec<u64>),
    #[error("domain rank {0} is outside 1..=8")]
    Rank(usize),
    #[error("kernel fault at flat index {flat}: {fault}")]
    Fault { flat: u64, fault: KernelFault },
    #[error("cannot start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

// ─── Arguments ─────────────────────────────────────────────────────

/// Scalar kernel parameters for one invocation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KernelArgs {
    params: BTreeMap<String, ScalarValue>,
}

impl KernelArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<ScalarValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<ScalarValue>) {
        self.params.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<ScalarValue> {
        self.params.get(name).copied()
    }
}

// ─── Context ───────────────────────────────────────────────────────

/// Outcome of one launch.
#[derive(Clone, Debug, Default)]
pub struct LaunchReport {
    /// Flat indices executed.
    pub iterations: u64,
    /// Non-fatal diagnostics raised by this call.
    pub warnings: Vec<Diagnostic>,
}

/// Storage, configuration and workers for running kernels.
pub struct ExecutionContext {
    config: LaunchConfig,
    registry: StorageRegistry,
    pool: rayon::ThreadPool,
}

impl ExecutionContext {
    pub fn new(config: LaunchConfig, registry: StorageRegistry) -> Result<Self, LaunchError> {
        let mut builder =
            rayon::ThreadPoolBuilder::new().thread_name(|i| format!("ndloop-worker-{}", i));
        if let Some(n) = config.workers {
            builder = builder.num_threads(n);
        }
        let pool = builder.build()?;
        tracing::debug!(workers = pool.current_num_threads(), "execution context ready");
        Ok(Self {
            config,
            registry,
            pool,
        })
    }

    pub fn config(&self) -> &LaunchConfig {
        &self.config
    }

    pub fn registry(&self) -> &StorageRegistry {
        &self.registry
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Tear down the worker pool and hand back the storage.
    pub fn into_registry(self) -> StorageRegistry {
        self.registry
    }

    /// An evaluator over this context's storage and the given arguments.
    pub fn evaluator<'a>(&'a self, args: &'a KernelArgs) -> Evaluator<'a> {
        Evaluator::new(args, &self.registry).with_arity_warnings(self.config.arity_warnings)
    }

    /// Resolve, plan and dispatch `lp` across the workers.
    ///
    /// Synchronous: returns once every flat index ran or the first fault
    /// aborted the dispatch.
    pub fn launch<F>(
        &self,
        lp: &CompiledLoop,
        args: &KernelArgs,
        body: F,
    ) -> Result<LaunchReport, LaunchError>
    where
        F: Fn(&Iteration<'_>) -> Result<(), KernelFault> + Sync,
    {
        let plan = lp.plan(&self.evaluator(args))?;

        let warnings = lp.report_arity_warning(self.config.arity_warnings);

        let iterations = self
            .pool
            .install(|| dispatch_parallel(&plan, lp.binding(), &body))?;

        Ok(LaunchReport {
            iterations,
            warnings,
        })
    }

    /// Zero every adjoint buffer in the registry, leaves in parallel.
    ///
    /// No kernel may be touching the adjoint buffers meanwhile.
    pub fn clear_all_gradients(&self) -> ClearStats {
        self.pool.install(|| self.registry.clear_all_gradients())
    }
}
