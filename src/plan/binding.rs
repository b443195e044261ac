use std::ops::Range;

use crate::diagnostic::{Diagnostic, DiagnosticCode};
use crate::domain::CallSite;
use crate::index::GroupedIndex;
use crate::span::Span;

/// What the loop header binds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopTargets {
    /// One grouped target holding every axis: `for I in grouped(...)`.
    Grouped,
    /// `n` named loop variables: `for i, j in ...`.
    Vars(usize),
}

/// Value bound to one loop variable for one iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopVar {
    Scalar(i64),
    Grouped(GroupedIndex),
}

impl LoopVar {
    pub fn as_scalar(&self) -> Option<i64> {
        match self {
            LoopVar::Scalar(v) => Some(*v),
            LoopVar::Grouped(_) => None,
        }
    }

    pub fn as_grouped(&self) -> Option<&GroupedIndex> {
        match self {
            LoopVar::Scalar(_) => None,
            LoopVar::Grouped(g) => Some(g),
        }
    }
}

/// How axis values are distributed over the bound loop variables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    /// Axis range covered by each variable, in order.
    groups: Vec<Range<usize>>,
    /// Every variable is delivered grouped, even when it covers one axis.
    grouped: bool,
}

impl Binding {
    /// Bind `targets` over a domain of `rank` axes.
    ///
    /// Returns the binding and, when fewer variables than axes are bound,
    /// the deprecation warning to surface on every call.
    pub(crate) fn new(
        targets: LoopTargets,
        rank: usize,
        call_site: &CallSite,
    ) -> Result<(Binding, Option<Diagnostic>), Diagnostic> {
        let whole = Span::new(0, call_site.source.len() as u32);
        let vars = match targets {
            LoopTargets::Grouped => {
                return Ok((
                    Binding {
                        groups: vec![0..rank],
                        grouped: true,
                    },
                    None,
                ))
            }
            LoopTargets::Vars(n) => n,
        };

        if vars == 0 || vars > rank {
            return Err(Diagnostic::error(
                format!(
                    "{} loop variables cannot iterate `{}` of rank {}",
                    vars, call_site.source, rank
                ),
                whole,
            )
            .with_code(DiagnosticCode::ShapeError)
            .with_help("bind between 1 and the domain rank loop variables".to_string()));
        }

        if vars == rank {
            return Ok((
                Binding {
                    groups: (0..rank).map(|k| k..k + 1).collect(),
                    grouped: false,
                },
                None,
            ));
        }

        // The first vars-1 variables take one axis each, the last takes the rest.
        let mut groups: Vec<Range<usize>> = (0..vars - 1).map(|k| k..k + 1).collect();
        groups.push(vars - 1..rank);
        let warning = Diagnostic::warning(
            format!(
                "Ndrange for loop with number of the loop variables not equal to the dimension \
                 of the ndrange is deprecated ({} variables, {} axes)",
                vars, rank
            ),
            whole,
        )
        .with_code(DiagnosticCode::ArityWarning)
        .with_help(
            "bind one loop variable per axis, or iterate a grouped index instead".to_string(),
        );

        Ok((
            Binding {
                groups,
                grouped: false,
            },
            Some(warning),
        ))
    }

    pub fn var_count(&self) -> usize {
        self.groups.len()
    }

    /// The value of variable `k` for the tuple `index`.
    pub fn bind(&self, k: usize, index: &GroupedIndex) -> Option<LoopVar> {
        let group = self.groups.get(k)?;
        if !self.grouped && group.len() == 1 {
            Some(LoopVar::Scalar(index[group.start]))
        } else {
            Some(LoopVar::Grouped(index.slice(group.clone())))
        }
    }
}

/// One iteration step handed to a loop body.
#[derive(Clone, Copy, Debug)]
pub struct Iteration<'a> {
    flat: u64,
    index: GroupedIndex,
    binding: &'a Binding,
}

impl<'a> Iteration<'a> {
    pub(crate) fn new(flat: u64, index: GroupedIndex, binding: &'a Binding) -> Self {
        Self {
            flat,
            index,
            binding,
        }
    }

    /// Position in the canonical row-major order.
    pub fn flat(&self) -> u64 {
        self.flat
    }

    /// All axis values, regardless of how they are bound.
    pub fn index(&self) -> &GroupedIndex {
        &self.index
    }

    /// Value of loop variable `k`.
    pub fn var(&self, k: usize) -> Option<LoopVar> {
        self.binding.bind(k, &self.index)
    }

    /// Scalar value of loop variable `k`, if it is bound to a single axis.
    pub fn scalar(&self, k: usize) -> Option<i64> {
        self.var(k).and_then(|v| v.as_scalar())
    }

    pub fn vars(&self) -> Vec<LoopVar> {
        (0..self.binding.var_count())
            .filter_map(|k| self.var(k))
            .collect()
    }
}
