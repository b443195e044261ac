//! Static unrolling of range loops whose bounds are all host literals.
//!
//! The [`Enumerator`] walks a resolved domain like an odometer: the last
//! axis ticks fastest, and a wrap carries into the axis before it. It
//! never computes a flat index, so it shares nothing with the runtime
//! mapper beyond the resolved domain, yet visits tuples in the same
//! row-major order.


use crate::config::LaunchConfig;
use crate::diagnostic::{Diagnostic, DiagnosticCode};
use crate::domain::{LiteralFolder, ResolvedAxis, ResolvedDomain};
use crate::index::{GroupedIndex, MAX_RANK};
use crate::plan::{Binding, Iteration};
use crate::range_for::RangeLoop;
use crate::span::Span;

/// Row-major enumeration of every tuple of a resolved domain.
pub struct Enumerator<'a> {
    axes: &'a [ResolvedAxis],
    current: [i64; MAX_RANK],
    done: bool,
}

impl<'a> Enumerator<'a> {
    pub fn new(domain: &'a ResolvedDomain) -> Self {
        let axes = domain.axes();
        let mut current = [0i64; MAX_RANK];
        for (k, axis) in axes.iter().enumerate().take(MAX_RANK) {
            current[k] = axis.begin;
        }
        let done = axes.is_empty() || axes.len() > MAX_RANK || axes.iter().any(|a| a.size() == 0);
        Self {
            axes,
            current,
            done,
        }
    }
}

impl Iterator for Enumerator<'_> {
    type Item = GroupedIndex;

    fn next(&mut self) -> Option<GroupedIndex> {
        if self.done {
            return None;
        }
        let out = GroupedIndex::from_parts(self.axes.len(), self.current);

        let mut k = self.axes.len();
        loop {
            if k == 0 {
                self.done = true;
                break;
            }
            k -= 1;
            self.current[k] += 1;
            if self.current[k] < self.axes[k].end {
                break;
            }
            self.current[k] = self.axes[k].begin;
        }
        Some(out)
    }
}

/// A fully materialized static loop: one entry per inlined body copy.
#[derive(Clone, Debug)]
pub struct StaticLoop {
    tuples: Vec<GroupedIndex>,
    binding: Binding,
    arity_warning: Option<Diagnostic>,
}

impl StaticLoop {
    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    pub fn tuples(&self) -> &[GroupedIndex] {
        &self.tuples
    }

    /// Loop-variable/rank mismatch reported at expansion, if enabled in the config.
    pub fn arity_warning(&self) -> Option<&Diagnostic> {
        self.arity_warning.as_ref()
    }

    pub fn iterations(&self) -> impl Iterator<Item = Iteration<'_>> + '_ {
        self.tuples
            .iter()
            .enumerate()
            .map(|(i, idx)| Iteration::new(i as u64, *idx, &self.binding))
    }

    /// Emit the body once per tuple, in order.
    pub fn for_each<F, E>(&self, mut body: F) -> Result<(), E>
    where
        F: FnMut(&Iteration<'_>) -> Result<(), E>,
    {
        for it in self.iterations() {
            body(&it)?;
        }
        Ok(())
    }
}

/// Fully unroll `source` at compile time.
///
/// Every bound must fold to a literal through `folder`; a dynamic bound is
/// a `CompileTimeValueRequired` error naming its argument. Accepts a
/// grouped loop, a loop with named variables, or a bare domain.
pub fn force_static(
    source: impl Into<RangeLoop>,
    folder: &dyn LiteralFolder,
    config: &LaunchConfig,
) -> Result<StaticLoop, Diagnostic> {
    let lp = source.into();
    let domain = lp.domain();
    let compiled = lp.compile()?;
    let resolved = domain.fold_static(folder)?;

    let whole = Span::new(0, domain.call_site().source.len() as u32);
    let count = resolved.total().filter(|n| *n <= config.unroll_limit).ok_or_else(|| {
        Diagnostic::error(
            format!(
                "static expansion of `{}` exceeds the unroll limit of {} copies",
                domain.call_site().source,
                config.unroll_limit
            ),
            whole,
        )
        .with_code(DiagnosticCode::UnrollLimit)
        .with_note(format!("axis sizes: {:?}", resolved.sizes()))
        .with_help("raise `unroll_limit` in ndloop.toml or use a runtime loop".to_string())
    })?;

    let tuples: Vec<GroupedIndex> = Enumerator::new(&resolved).collect();
    debug_assert_eq!(tuples.len() as u64, count);
    tracing::debug!(
        call = %domain.call_site().source,
        copies = tuples.len(),
        "static expansion"
    );

    Ok(StaticLoop {
        tuples,
        binding: compiled.binding().clone(),
        arity_warning: compiled
            .report_arity_warning(config.arity_warnings)
            .into_iter()
            .next(),
    })
}
