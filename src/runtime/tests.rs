use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use super::*;
use crate::diagnostic::DiagnosticCode;
use crate::domain::{make_range_domain, BoundExpr, RangeArg};
use crate::range_for::{group, RangeLoop};
use crate::storage::{FieldDecl, FieldId, LayoutBuilder};
use crate::types::ScalarKind;

fn config(workers: usize) -> LaunchConfig {
    LaunchConfig {
        workers: Some(workers),
        ..LaunchConfig::default()
    }
}

fn grid(n: usize, m: usize) -> (StorageRegistry, FieldId) {
    let mut layout = LayoutBuilder::new();
    let x = layout.declare(FieldDecl::scalar("x", ScalarKind::I32).with_grad());
    let root = layout.root();
    let block = layout.dense(root, &[n, m]);
    layout.place(block, &[x]);
    (layout.finalize().unwrap(), x)
}

#[test]
fn test_context_uses_configured_workers() {
    let ctx = ExecutionContext::new(config(3), StorageRegistry::empty()).unwrap();
    assert_eq!(ctx.workers(), 3);
    assert_eq!(ctx.config().workers, Some(3));
}

#[test]
fn test_launch_writes_every_element() {
    let (reg, x) = grid(4, 5);
    let ctx = ExecutionContext::new(config(4), reg).unwrap();
    let lp = RangeLoop::from(make_range_domain(&[4.into(), 5.into()]).unwrap())
        .compile()
        .unwrap();

    let buf = ctx.registry().primary(x).unwrap();
    let report = ctx
        .launch(&lp, &KernelArgs::new(), |it| {
            let (i, j) = (it.scalar(0).unwrap(), it.scalar(1).unwrap());
            buf.set_i64(&[i, j], i * 10 + j)
        })
        .unwrap();
    assert_eq!(report.iterations, 20);
    assert!(report.warnings.is_empty());

    let reg = ctx.into_registry();
    let values = reg.primary(x).unwrap().to_vec_i64();
    let expected: Vec<i64> = (0..4).flat_map(|i| (0..5).map(move |j| i * 10 + j)).collect();
    assert_eq!(values, expected);
}

#[test]
fn test_launch_resolves_parameters_per_call() {
    let ctx = ExecutionContext::new(config(2), StorageRegistry::empty()).unwrap();
    let n = BoundExpr::param("n", ScalarKind::I32);
    let lp = group(make_range_domain(&[RangeArg::pair(1, n)]).unwrap())
        .compile()
        .unwrap();

    let sum = AtomicI64::new(0);
    for (n, expected) in [(4, 6), (6, 15), (0, 0)] {
        sum.store(0, Ordering::Relaxed);
        let args = KernelArgs::new().with("n", n as i32);
        ctx.launch(&lp, &args, |it| {
            sum.fetch_add(it.index().sum(), Ordering::Relaxed);
            Ok(())
        })
        .unwrap();
        assert_eq!(sum.load(Ordering::Relaxed), expected);
    }
}

#[test]
fn test_missing_parameter_fails_before_dispatch() {
    let ctx = ExecutionContext::new(config(2), StorageRegistry::empty()).unwrap();
    let n = BoundExpr::param("n", ScalarKind::I32);
    let lp = RangeLoop::from(make_range_domain(&[RangeArg::scalar(n)]).unwrap())
        .compile()
        .unwrap();
    let calls = AtomicU64::new(0);
    let err = ctx
        .launch(&lp, &KernelArgs::new(), |_| {
            calls.fetch_add(1, Ordering::Relaxed);
            Ok(())
        })
        .unwrap_err();
    assert!(matches!(err, LaunchError::MissingParam(_)));
    assert_eq!(calls.load(Ordering::Relaxed), 0);
}

#[test]
fn test_arity_warning_on_every_call() {
    let ctx = ExecutionContext::new(config(2), StorageRegistry::empty()).unwrap();
    let lp = RangeLoop::new(make_range_domain(&[2.into(), 3.into(), 4.into()]).unwrap(), 2)
        .compile()
        .unwrap();
    for _ in 0..3 {
        let report = ctx.launch(&lp, &KernelArgs::new(), |_| Ok(())).unwrap();
        assert_eq!(report.iterations, 24);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].code, Some(DiagnosticCode::ArityWarning));
    }
}

#[test]
fn test_arity_warning_can_be_silenced() {
    let quiet = LaunchConfig {
        arity_warnings: false,
        ..config(1)
    };
    let ctx = ExecutionContext::new(quiet, StorageRegistry::empty()).unwrap();
    let lp = RangeLoop::new(make_range_domain(&[2.into(), 3.into()]).unwrap(), 1)
        .compile()
        .unwrap();
    let report = ctx.launch(&lp, &KernelArgs::new(), |_| Ok(())).unwrap();
    assert!(report.warnings.is_empty());
    assert!(lp.arity_warning().is_some());
}

#[test]
fn test_fault_aborts_launch() {
    let ctx = ExecutionContext::new(config(4), StorageRegistry::empty()).unwrap();
    let lp = RangeLoop::from(make_range_domain(&[(0, 10_000).into()]).unwrap())
        .compile()
        .unwrap();
    let err = ctx
        .launch(&lp, &KernelArgs::new(), |it| {
            if it.scalar(0) == Some(1234) {
                return Err(KernelFault::new("bad element".to_string()));
            }
            Ok(())
        })
        .unwrap_err();
    assert!(matches!(err, LaunchError::Fault { flat: 1234, .. }));
    assert!(err.to_string().contains("bad element"));
}

#[test]
fn test_buffer_fault_inside_body() {
    let (reg, x) = grid(2, 2);
    let ctx = ExecutionContext::new(config(2), reg).unwrap();
    let lp = RangeLoop::from(make_range_domain(&[3.into(), 2.into()]).unwrap())
        .compile()
        .unwrap();
    let buf = ctx.registry().primary(x).unwrap();
    let err = ctx
        .launch(&lp, &KernelArgs::new(), |it| {
            buf.set_i64(it.index().as_slice(), 1)
        })
        .unwrap_err();
    assert!(matches!(err, LaunchError::Fault { .. }));
}

#[test]
fn test_nested_serial_loop_inside_launch() {
    let ctx = ExecutionContext::new(config(2), StorageRegistry::empty()).unwrap();
    let outer = RangeLoop::from(make_range_domain(&[3.into()]).unwrap())
        .compile()
        .unwrap();
    let inner = RangeLoop::from(make_range_domain(&[4.into()]).unwrap())
        .compile()
        .unwrap();

    let total = AtomicI64::new(0);
    let args = KernelArgs::new();
    ctx.launch(&outer, &args, |it| {
        let i = it.scalar(0).unwrap_or_default();
        inner.for_each_serial(&ctx.evaluator(&args), |jt| {
            total.fetch_add(i * 4 + jt.scalar(0).unwrap_or_default(), Ordering::Relaxed);
            Ok(())
        })?;
        Ok(())
    })
    .unwrap();
    assert_eq!(total.load(Ordering::Relaxed), (0..12).sum::<i64>());
}

#[test]
fn test_serial_loop_reports_arity_warning() {
    let ctx = ExecutionContext::new(config(2), StorageRegistry::empty()).unwrap();
    let lp = RangeLoop::new(make_range_domain(&[2.into(), 3.into()]).unwrap(), 1)
        .compile()
        .unwrap();
    let args = KernelArgs::new();
    for _ in 0..2 {
        let mut seen = Vec::new();
        let report = lp
            .for_each_serial(&ctx.evaluator(&args), |it| {
                let g = it.var(0).and_then(|v| v.as_grouped().copied());
                seen.extend(g.map(|g| g.to_vec()));
                Ok(())
            })
            .unwrap();
        assert_eq!(report.iterations, 6);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].code, Some(DiagnosticCode::ArityWarning));
        assert_eq!(seen.len(), 6);
        assert_eq!(seen[0], vec![0, 0]);
        assert_eq!(seen[5], vec![1, 2]);
    }
}

#[test]
fn test_serial_loop_warning_follows_config() {
    let quiet = LaunchConfig {
        arity_warnings: false,
        ..config(1)
    };
    let ctx = ExecutionContext::new(quiet, StorageRegistry::empty()).unwrap();
    let lp = RangeLoop::new(make_range_domain(&[2.into(), 3.into()]).unwrap(), 1)
        .compile()
        .unwrap();
    let args = KernelArgs::new();
    let report = lp.for_each_serial(&ctx.evaluator(&args), |_| Ok(())).unwrap();
    assert_eq!(report.iterations, 6);
    assert!(report.warnings.is_empty());
    assert!(!ctx.evaluator(&args).arity_warnings());
}

#[test]
fn test_context_clears_gradients() {
    let (reg, x) = grid(8, 8);
    reg.adjoint(x).unwrap().set_i64(&[7, 7], 5).unwrap();
    let ctx = ExecutionContext::new(config(2), reg).unwrap();
    let stats = ctx.clear_all_gradients();
    assert_eq!(stats.buffers_cleared, 1);
    assert_eq!(stats.elements_cleared, 64);
    assert_eq!(ctx.registry().adjoint(x).unwrap().get_i64(&[7, 7]).unwrap(), 0);
}

#[test]
fn test_kernel_args() {
    let mut args = KernelArgs::new().with("a", 3u8);
    args.set("b", 0.5);
    assert_eq!(args.get("a"), Some(ScalarValue::Int(crate::types::IntValue::U8(3))));
    assert_eq!(args.get("b"), Some(ScalarValue::Float(0.5)));
    assert_eq!(args.get("c"), None);
}
