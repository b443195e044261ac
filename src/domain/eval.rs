use super::BoundExpr;
use crate::runtime::{KernelArgs, LaunchError};
use crate::storage::StorageRegistry;
use crate::types::{ScalarKind, ScalarValue};

// ─── Host Folding ──────────────────────────────────────────────────

/// Host-side literal folding: can this bound be known at compile time?
pub trait LiteralFolder {
    /// The literal value of `bound`, or `None` if it depends on run-time data.
    fn fold(&self, bound: &BoundExpr) -> Option<i64>;
}

/// Folds integer literals and arithmetic over them. Parameters and loads
/// are always dynamic.
#[derive(Clone, Copy, Debug, Default)]
pub struct FoldConstants;

impl LiteralFolder for FoldConstants {
    fn fold(&self, bound: &BoundExpr) -> Option<i64> {
        match bound {
            BoundExpr::Int(v) => v.to_i64(),
            BoundExpr::Float(_) | BoundExpr::Param { .. } | BoundExpr::Load { .. } => None,
            BoundExpr::Add(a, b) => self.fold(a)?.checked_add(self.fold(b)?),
            BoundExpr::Sub(a, b) => self.fold(a)?.checked_sub(self.fold(b)?),
            BoundExpr::Mul(a, b) => self.fold(a)?.checked_mul(self.fold(b)?),
        }
    }
}

// ─── Invocation-time Evaluation ────────────────────────────────────

/// Concrete evaluator: substitutes kernel arguments and buffer contents into bounds.
pub struct Evaluator<'a> {
    args: &'a KernelArgs,
    storage: &'a StorageRegistry,
    arity_warnings: bool,
}

impl<'a> Evaluator<'a> {
    pub fn new(args: &'a KernelArgs, storage: &'a StorageRegistry) -> Self {
        Self {
            args,
            storage,
            arity_warnings: true,
        }
    }

    /// Whether loops run through this evaluator report loop-variable/rank mismatches.
    pub fn with_arity_warnings(mut self, enabled: bool) -> Self {
        self.arity_warnings = enabled;
        self
    }

    pub fn arity_warnings(&self) -> bool {
        self.arity_warnings
    }

    pub fn eval(&self, bound: &BoundExpr) -> Result<i64, LaunchError> {
        match bound {
            BoundExpr::Int(v) => v
                .to_i64()
                .ok_or_else(|| LaunchError::BoundOverflow(bound.to_string())),
            BoundExpr::Float(_) => Err(LaunchError::NonIntegral(bound.to_string())),
            BoundExpr::Param { name, .. } => match self.args.get(name) {
                None => Err(LaunchError::MissingParam(name.clone())),
                Some(ScalarValue::Int(v)) => v
                    .to_i64()
                    .ok_or_else(|| LaunchError::BoundOverflow(name.clone())),
                Some(ScalarValue::Float(_)) => Err(LaunchError::NonIntegral(name.clone())),
            },
            BoundExpr::Load {
                field, name, index, ..
            } => {
                let buffer = self
                    .storage
                    .primary(*field)
                    .ok_or_else(|| LaunchError::UnknownField(name.clone()))?;
                // The stored kind wins over whatever kind the bound was declared with.
                if !buffer.kind().is_integral() {
                    return Err(LaunchError::NonIntegral(bound.to_string()));
                }
                let index = index
                    .iter()
                    .map(|e| self.eval(e))
                    .collect::<Result<Vec<i64>, _>>()?;
                let value = buffer
                    .get_i64(&index)
                    .map_err(|fault| LaunchError::BoundLoad {
                        field: name.clone(),
                        fault,
                    })?;
                // u64 cells above i64::MAX decode as negative.
                if buffer.kind() == ScalarKind::U64 && value < 0 {
                    return Err(LaunchError::BoundOverflow(bound.to_string()));
                }
                Ok(value)
            }
            BoundExpr::Add(a, b) => self
                .eval(a)?
                .checked_add(self.eval(b)?)
                .ok_or_else(|| LaunchError::BoundOverflow(bound.to_string())),
            BoundExpr::Sub(a, b) => self
                .eval(a)?
                .checked_sub(self.eval(b)?)
                .ok_or_else(|| LaunchError::BoundOverflow(bound.to_string())),
            BoundExpr::Mul(a, b) => self
                .eval(a)?
                .checked_mul(self.eval(b)?)
                .ok_or_else(|| LaunchError::BoundOverflow(bound.to_string())),
        }
    }
}
