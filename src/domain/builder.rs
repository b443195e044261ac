//! Range descriptor builder: heterogeneous arguments → normalized axes.

use super::{AxisRange, BoundExpr, RangeDomain};
use crate::diagnostic::{Diagnostic, DiagnosticCode};
use crate::index::{GroupedIndex, MAX_RANK};
use crate::span::Span;
use crate::types::IntValue;

const SHAPE_MESSAGE: &str =
    "Every argument of ndrange should be a scalar or a tuple/list like (begin, end)";
const TYPE_MESSAGE: &str =
    "Every argument of ndrange should be an integer scalar or a tuple/list of (int, int)";

/// One call argument, tagged by shape once, at construction.
#[derive(Clone, Debug, PartialEq)]
pub enum RangeArg {
    /// `n` → axis `(0, n)`.
    Scalar(BoundExpr),
    /// A tuple/list literal. Only two components are valid.
    Seq(Vec<BoundExpr>),
    /// A collection spliced in place, one axis per element.
    Splat(Vec<RangeArg>),
}

impl RangeArg {
    pub fn scalar(end: impl Into<BoundExpr>) -> Self {
        RangeArg::Scalar(end.into())
    }

    pub fn pair(begin: impl Into<BoundExpr>, end: impl Into<BoundExpr>) -> Self {
        RangeArg::Seq(vec![begin.into(), end.into()])
    }

    pub fn splat(args: Vec<RangeArg>) -> Self {
        RangeArg::Splat(args)
    }

    /// Axes `(lower[k], upper[k])` for every component of two grouped indices.
    ///
    /// Components are already concrete, so the inner domain is built from
    /// literals and never refers back to the outer iteration.
    pub fn between(lower: &GroupedIndex, upper: &GroupedIndex) -> Self {
        RangeArg::Splat(
            lower
                .iter()
                .zip(upper.iter())
                .map(|(b, e)| RangeArg::pair(b, e))
                .collect(),
        )
    }
}

impl From<BoundExpr> for RangeArg {
    fn from(e: BoundExpr) -> Self {
        RangeArg::Scalar(e)
    }
}

impl<A: Into<BoundExpr>, B: Into<BoundExpr>> From<(A, B)> for RangeArg {
    fn from((begin, end): (A, B)) -> Self {
        RangeArg::pair(begin, end)
    }
}

impl<A: Into<BoundExpr>, B: Into<BoundExpr>, C: Into<BoundExpr>> From<(A, B, C)> for RangeArg {
    fn from((a, b, c): (A, B, C)) -> Self {
        RangeArg::Seq(vec![a.into(), b.into(), c.into()])
    }
}

impl From<Vec<BoundExpr>> for RangeArg {
    fn from(v: Vec<BoundExpr>) -> Self {
        RangeArg::Seq(v)
    }
}

/// Splat of a grouped index: one `(0, v)` axis per component.
impl From<&GroupedIndex> for RangeArg {
    fn from(idx: &GroupedIndex) -> Self {
        RangeArg::Splat(idx.iter().map(RangeArg::scalar).collect())
    }
}

macro_rules! range_arg_from_scalar {
    ($($t:ty),*) => {
        $(
            impl From<$t> for RangeArg {
                fn from(v: $t) -> Self {
                    RangeArg::Scalar(v.into())
                }
            }
        )*
    };
}

range_arg_from_scalar!(i8, i16, i32, i64, u8, u16, u32, u64, f64);

// ─── Call Site ─────────────────────────────────────────────────────

/// Where an axis came from: the top-level argument and the exact span.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AxisOrigin {
    pub position: usize,
    pub span: Span,
}

/// Source-like rendering of a range call, used to anchor diagnostics.
#[derive(Clone, Debug, PartialEq)]
pub struct CallSite {
    pub source: String,
    /// Span of every top-level argument.
    pub args: Vec<Span>,
    axes: Vec<AxisOrigin>,
}

impl CallSite {
    /// Render `ndrange(arg, ...)` for the given arguments.
    pub fn render(args: &[RangeArg]) -> Self {
        let (source, layouts) = render_layouts(args);
        Self {
            source,
            args: layouts.iter().map(|l| l.span).collect(),
            axes: Vec::new(),
        }
    }

    pub fn axis_origin(&self, axis: usize) -> AxisOrigin {
        self.axes.get(axis).copied().unwrap_or(AxisOrigin {
            position: 0,
            span: Span::new(0, self.source.len() as u32),
        })
    }
}

struct ArgLayout {
    span: Span,
    children: Vec<ArgLayout>,
}

fn render_layouts(args: &[RangeArg]) -> (String, Vec<ArgLayout>) {
    let mut out = String::from("ndrange(");
    let mut layouts = Vec::with_capacity(args.len());
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        layouts.push(write_arg(&mut out, arg));
    }
    out.push(')');
    (out, layouts)
}

fn write_arg(out: &mut String, arg: &RangeArg) -> ArgLayout {
    let start = out.len();
    let mut children = Vec::new();
    match arg {
        RangeArg::Scalar(e) => out.push_str(&e.to_string()),
        RangeArg::Seq(items) => {
            out.push('(');
            let parts: Vec<String> = items.iter().map(|e| e.to_string()).collect();
            out.push_str(&parts.join(", "));
            if items.len() == 1 {
                out.push(',');
            }
            out.push(')');
        }
        RangeArg::Splat(inner) => {
            out.push_str("*[");
            for (i, a) in inner.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                children.push(write_arg(out, a));
            }
            out.push(']');
        }
    }
    ArgLayout {
        span: Span::new(start as u32, out.len() as u32),
        children,
    }
}

// ─── Normalization ─────────────────────────────────────────────────

/// Normalize call arguments into a [`RangeDomain`].
///
/// Scalars become `(0, n)`, pairs stay `(begin, end)`, splats flatten in
/// place. Bounds may be dynamic; nothing here requires a literal.
pub fn make_range_domain(args: &[RangeArg]) -> Result<RangeDomain, Diagnostic> {
    let (source, layouts) = render_layouts(args);
    let mut axes = Vec::new();
    let mut origins = Vec::new();

    for (position, (arg, layout)) in args.iter().zip(&layouts).enumerate() {
        normalize(arg, layout, position, &source, &mut axes, &mut origins)?;
    }

    let whole = Span::new(0, source.len() as u32);
    if axes.is_empty() {
        return Err(Diagnostic::error(
            "ndrange needs at least one axis".to_string(),
            whole,
        )
        .with_code(DiagnosticCode::ShapeError));
    }
    if axes.len() > MAX_RANK {
        return Err(Diagnostic::error(
            format!(
                "ndrange has {} axes, at most {} are supported",
                axes.len(),
                MAX_RANK
            ),
            whole,
        )
        .with_code(DiagnosticCode::ShapeError));
    }

    let call_site = CallSite {
        source,
        args: layouts.iter().map(|l| l.span).collect(),
        axes: origins,
    };
    Ok(RangeDomain::new(axes, call_site))
}

fn normalize(
    arg: &RangeArg,
    layout: &ArgLayout,
    position: usize,
    source: &str,
    axes: &mut Vec<AxisRange>,
    origins: &mut Vec<AxisOrigin>,
) -> Result<(), Diagnostic> {
    let span = layout.span;
    match arg {
        RangeArg::Scalar(end) => {
            check_bound(end, position, span)?;
            axes.push(AxisRange {
                begin: BoundExpr::Int(IntValue::I32(0)),
                end: end.clone(),
            });
            origins.push(AxisOrigin { position, span });
        }
        RangeArg::Seq(items) => {
            if items.len() != 2 {
                let text = &source[span.range()];
                return Err(Diagnostic::error(SHAPE_MESSAGE.to_string(), span)
                    .with_code(DiagnosticCode::ShapeError)
                    .at_position(position)
                    .with_note(format!(
                        "argument {} `{}` has {} components",
                        position + 1,
                        text,
                        items.len()
                    )));
            }
            check_bound(&items[0], position, span)?;
            check_bound(&items[1], position, span)?;
            axes.push(AxisRange {
                begin: items[0].clone(),
                end: items[1].clone(),
            });
            origins.push(AxisOrigin { position, span });
        }
        RangeArg::Splat(inner) => {
            for (a, l) in inner.iter().zip(&layout.children) {
                normalize(a, l, position, source, axes, origins)?;
            }
        }
    }
    Ok(())
}

fn check_bound(bound: &BoundExpr, position: usize, span: Span) -> Result<(), Diagnostic> {
    let problem = if !bound.is_integral() {
        Some(format!("`{}` is not an integer", bound))
    } else {
        unrepresentable(bound).map(|v| format!("`{}` does not fit in a signed 64-bit bound", v))
    };
    match problem {
        None => Ok(()),
        Some(note) => Err(Diagnostic::error(TYPE_MESSAGE.to_string(), span)
            .with_code(DiagnosticCode::TypeMismatch)
            .at_position(position)
            .with_note(format!("argument {}: {}", position + 1, note))),
    }
}

fn unrepresentable(bound: &BoundExpr) -> Option<IntValue> {
    match bound {
        BoundExpr::Int(v) => v.to_i64().is_none().then_some(*v),
        BoundExpr::Float(_) | BoundExpr::Param { .. } => None,
        BoundExpr::Load { index, .. } => index.iter().find_map(unrepresentable),
        BoundExpr::Add(a, b) | BoundExpr::Sub(a, b) | BoundExpr::Mul(a, b) => {
            unrepresentable(a).or_else(|| unrepresentable(b))
        }
    }
}
