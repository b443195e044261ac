//! Range domains: per-axis bounds, their normalization, and their resolution.
//!
//! A [`RangeDomain`] is built once from heterogeneous call arguments by
//! [`make_range_domain`]. Its bounds are [`BoundExpr`]s that may only be
//! known when a kernel is invoked; [`RangeDomain::resolve`] turns them into
//! a [`ResolvedDomain`] of concrete integers, and
//! [`RangeDomain::fold_static`] does the same on the host for the static
//! unroller, failing if any bound is dynamic.

pub mod builder;
pub mod eval;

use serde::{Deserialize, Serialize};

use crate::diagnostic::{Diagnostic, DiagnosticCode};
use crate::runtime::LaunchError;
use crate::storage::FieldId;
use crate::types::{IntValue, ScalarKind};

pub use builder::{make_range_domain, CallSite, RangeArg};
pub use eval::{Evaluator, FoldConstants, LiteralFolder};

// ─── Bound Expressions ─────────────────────────────────────────────

/// One bound of an axis, as the front-end hands it over.
#[derive(Clone, Debug, PartialEq)]
pub enum BoundExpr {
    /// Integer literal of any fixed width.
    Int(IntValue),
    /// Floating-point literal. Never a valid bound; kept so it can be reported.
    Float(f64),
    /// Scalar kernel parameter, resolved at invocation time.
    Param { name: String, kind: ScalarKind },
    /// Element load from a field's primary buffer, resolved at invocation time.
    Load {
        field: FieldId,
        name: String,
        kind: ScalarKind,
        index: Vec<BoundExpr>,
    },
    Add(Box<BoundExpr>, Box<BoundExpr>),
    Sub(Box<BoundExpr>, Box<BoundExpr>),
    Mul(Box<BoundExpr>, Box<BoundExpr>),
}

impl BoundExpr {
    pub fn int(v: impl Into<IntValue>) -> Self {
        BoundExpr::Int(v.into())
    }

    pub fn param(name: &str, kind: ScalarKind) -> Self {
        BoundExpr::Param {
            name: name.to_string(),
            kind,
        }
    }

    pub fn load(field: FieldId, name: &str, kind: ScalarKind, index: Vec<BoundExpr>) -> Self {
        BoundExpr::Load {
            field,
            name: name.to_string(),
            kind,
            index,
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn add(self, rhs: BoundExpr) -> Self {
        BoundExpr::Add(Box::new(self), Box::new(rhs))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn sub(self, rhs: BoundExpr) -> Self {
        BoundExpr::Sub(Box::new(self), Box::new(rhs))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn mul(self, rhs: BoundExpr) -> Self {
        BoundExpr::Mul(Box::new(self), Box::new(rhs))
    }

    /// True when the value this expression produces is an integer.
    ///
    /// Load indices are checked too: a float index is as wrong as a float bound.
    pub fn is_integral(&self) -> bool {
        match self {
            BoundExpr::Int(_) => true,
            BoundExpr::Float(_) => false,
            BoundExpr::Param { kind, .. } => kind.is_integral(),
            BoundExpr::Load { kind, index, .. } => {
                kind.is_integral() && index.iter().all(BoundExpr::is_integral)
            }
            BoundExpr::Add(a, b) | BoundExpr::Sub(a, b) | BoundExpr::Mul(a, b) => {
                a.is_integral() && b.is_integral()
            }
        }
    }

    /// True when the expression reads a parameter or a buffer.
    pub fn is_dynamic(&self) -> bool {
        match self {
            BoundExpr::Int(_) | BoundExpr::Float(_) => false,
            BoundExpr::Param { .. } | BoundExpr::Load { .. } => true,
            BoundExpr::Add(a, b) | BoundExpr::Sub(a, b) | BoundExpr::Mul(a, b) => {
                a.is_dynamic() || b.is_dynamic()
            }
        }
    }
}

impl std::fmt::Display for BoundExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoundExpr::Int(v) => write!(f, "{}", v),
            BoundExpr::Float(v) => write!(f, "{:?}", v),
            BoundExpr::Param { name, .. } => f.write_str(name),
            BoundExpr::Load { name, index, .. } => {
                if index.is_empty() {
                    write!(f, "{}[None]", name)
                } else {
                    let parts: Vec<String> = index.iter().map(|e| e.to_string()).collect();
                    write!(f, "{}[{}]", name, parts.join(", "))
                }
            }
            BoundExpr::Add(a, b) => write!(f, "({} + {})", a, b),
            BoundExpr::Sub(a, b) => write!(f, "({} - {})", a, b),
            BoundExpr::Mul(a, b) => write!(f, "({} * {})", a, b),
        }
    }
}

macro_rules! bound_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for BoundExpr {
                fn from(v: $t) -> Self {
                    BoundExpr::Int(IntValue::from(v))
                }
            }
        )*
    };
}

bound_from_int!(i8, i16, i32, i64, u8, u16, u32, u64);

impl From<f64> for BoundExpr {
    fn from(v: f64) -> Self {
        BoundExpr::Float(v)
    }
}

impl From<IntValue> for BoundExpr {
    fn from(v: IntValue) -> Self {
        BoundExpr::Int(v)
    }
}

// ─── Domains ───────────────────────────────────────────────────────

/// Half-open `[begin, end)` range of one axis.
#[derive(Clone, Debug, PartialEq)]
pub struct AxisRange {
    pub begin: BoundExpr,
    pub end: BoundExpr,
}

/// Normalized, ordered list of axes plus the call site they came from.
#[derive(Clone, Debug, PartialEq)]
pub struct RangeDomain {
    axes: Vec<AxisRange>,
    call_site: CallSite,
}

impl RangeDomain {
    pub(crate) fn new(axes: Vec<AxisRange>, call_site: CallSite) -> Self {
        Self { axes, call_site }
    }

    pub fn rank(&self) -> usize {
        self.axes.len()
    }

    pub fn axes(&self) -> &[AxisRange] {
        &self.axes
    }

    pub fn call_site(&self) -> &CallSite {
        &self.call_site
    }

    /// True when every bound folds to a host literal.
    pub fn is_static(&self, folder: &dyn LiteralFolder) -> bool {
        self.axes
            .iter()
            .all(|a| folder.fold(&a.begin).is_some() && folder.fold(&a.end).is_some())
    }

    /// Resolve every bound against invocation-time values.
    pub fn resolve(&self, eval: &Evaluator<'_>) -> Result<ResolvedDomain, LaunchError> {
        let axes = self
            .axes
            .iter()
            .map(|a| {
                Ok(ResolvedAxis {
                    begin: eval.eval(&a.begin)?,
                    end: eval.eval(&a.end)?,
                })
            })
            .collect::<Result<Vec<_>, LaunchError>>()?;
        Ok(ResolvedDomain { axes })
    }

    /// Resolve every bound on the host, without invocation-time data.
    pub fn fold_static(&self, folder: &dyn LiteralFolder) -> Result<ResolvedDomain, Diagnostic> {
        let mut axes = Vec::with_capacity(self.axes.len());
        for (k, axis) in self.axes.iter().enumerate() {
            let begin = self.fold_bound(folder, k, &axis.begin)?;
            let end = self.fold_bound(folder, k, &axis.end)?;
            axes.push(ResolvedAxis { begin, end });
        }
        Ok(ResolvedDomain { axes })
    }

    fn fold_bound(
        &self,
        folder: &dyn LiteralFolder,
        axis: usize,
        bound: &BoundExpr,
    ) -> Result<i64, Diagnostic> {
        folder.fold(bound).ok_or_else(|| {
            let origin = self.call_site.axis_origin(axis);
            let message = if bound.is_dynamic() {
                format!(
                    "static range needs compile-time bounds, but `{}` is only known at run time",
                    bound
                )
            } else {
                format!(
                    "static range needs compile-time bounds, but `{}` overflows a 64-bit integer",
                    bound
                )
            };
            Diagnostic::error(message, origin.span)
                .with_code(DiagnosticCode::CompileTimeValueRequired)
                .at_position(origin.position)
                .with_note(format!("axis {} of `{}`", axis, self.call_site.source))
                .with_help("use a literal bound, or drop the static expansion".to_string())
        })
    }
}

/// One axis with concrete bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAxis {
    pub begin: i64,
    pub end: i64,
}

impl ResolvedAxis {
    pub fn new(begin: i64, end: i64) -> Self {
        Self { begin, end }
    }

    /// `max(0, end - begin)`. Never overflows: the difference of two `i64` fits in `u64`.
    pub fn size(&self) -> u64 {
        let diff = self.end as i128 - self.begin as i128;
        if diff <= 0 {
            0
        } else {
            diff as u64
        }
    }
}

/// A domain whose bounds are all concrete.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDomain {
    axes: Vec<ResolvedAxis>,
}

impl ResolvedDomain {
    pub fn new(axes: &[(i64, i64)]) -> Self {
        Self {
            axes: axes.iter().map(|&(b, e)| ResolvedAxis::new(b, e)).collect(),
        }
    }

    pub fn rank(&self) -> usize {
        self.axes.len()
    }

    pub fn axes(&self) -> &[ResolvedAxis] {
        &self.axes
    }

    pub fn sizes(&self) -> Vec<u64> {
        self.axes.iter().map(ResolvedAxis::size).collect()
    }

    /// Product of sizes; zero as soon as one axis is empty, `None` on overflow.
    pub fn total(&self) -> Option<u64> {
        let sizes = self.sizes();
        if sizes.contains(&0) {
            return Some(0);
        }
        sizes.iter().try_fold(1u64, |acc, &s| acc.checked_mul(s))
    }
}
