pub mod config;
pub mod diagnostic;
pub mod domain;
pub mod index;
pub mod plan;
pub mod range_for;
pub mod runtime;
pub mod span;
pub mod storage;
pub mod types;
pub mod unroll;

// Re-exports: the kernel-author surface
pub use config::LaunchConfig;
pub use diagnostic::{Diagnostic, DiagnosticCode, Severity};
pub use domain::{
    make_range_domain, AxisRange, BoundExpr, FoldConstants, LiteralFolder, RangeArg,
    RangeDomain, ResolvedDomain,
};
pub use index::{GroupedIndex, MAX_RANK};
pub use plan::{DispatchPlan, Iteration, LoopVar};
pub use range_for::{group, CompiledLoop, RangeLoop};
pub use runtime::{ExecutionContext, KernelArgs, KernelFault, LaunchError, LaunchReport};
pub use storage::{ClearStats, FieldDecl, FieldId, LayoutBuilder, StorageRegistry};
pub use types::{IntValue, ScalarKind, ScalarValue};
pub use unroll::{force_static, StaticLoop};

/// Zero every adjoint buffer reachable from the context's storage root.
pub fn clear_all_gradients(ctx: &ExecutionContext) -> ClearStats {
    ctx.clear_all_gradients()
}

/// Build a [`RangeDomain`] from heterogeneous arguments.
///
/// ```
/// let d = ndloop::ndrange![(4, 10), (3, 8), 17].unwrap();
/// assert_eq!(d.rank(), 3);
/// ```
#[macro_export]
macro_rules! ndrange {
    ($($arg:expr),* $(,)?) => {
        $crate::domain::make_range_domain(&[$($crate::domain::RangeArg::from($arg)),*])
    };
}
