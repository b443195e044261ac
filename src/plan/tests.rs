use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use super::dispatch::{dispatch_parallel, dispatch_serial};
use super::*;
use crate::diagnostic::DiagnosticCode;
use crate::domain::{make_range_domain, RangeArg};
use crate::runtime::KernelFault;
use crate::unroll::Enumerator;

fn plan(axes: &[(i64, i64)]) -> DispatchPlan {
    DispatchPlan::new(&ResolvedDomain::new(axes)).unwrap()
}

fn binding_for(
    rank: usize,
    targets: LoopTargets,
) -> (Binding, Option<crate::diagnostic::Diagnostic>) {
    let args: Vec<RangeArg> = (0..rank).map(|_| RangeArg::from(2)).collect();
    let domain = make_range_domain(&args).unwrap();
    Binding::new(targets, rank, domain.call_site()).unwrap()
}

// ─── Mapping ───────────────────────────────────────────────────────

#[test]
fn test_strides_are_row_major() {
    let p = plan(&[(4, 10), (3, 8), (0, 17)]);
    assert_eq!(p.sizes(), &[6, 5, 17]);
    assert_eq!(p.strides(), &[85, 17, 1]);
    assert_eq!(p.total(), 510);
    assert_eq!(p.rank(), 3);
}

#[test]
fn test_map_first_axis_slowest() {
    let p = plan(&[(4, 10), (3, 8), (0, 17)]);
    assert_eq!(p.map(0).to_vec(), vec![4, 3, 0]);
    assert_eq!(p.map(1).to_vec(), vec![4, 3, 1]);
    assert_eq!(p.map(17).to_vec(), vec![4, 4, 0]);
    assert_eq!(p.map(85).to_vec(), vec![5, 3, 0]);
    assert_eq!(p.map(509).to_vec(), vec![9, 7, 16]);
}

#[test]
fn test_map_one_axis_offsets_begin() {
    let p = plan(&[(-5, 5)]);
    assert_eq!(p.total(), 10);
    assert_eq!(p.map(0).to_vec(), vec![-5]);
    assert_eq!(p.map(9).to_vec(), vec![4]);
}

#[test]
fn test_map_matches_static_enumeration() {
    let domain = ResolvedDomain::new(&[(1, 3), (-2, 1), (0, 4)]);
    let p = DispatchPlan::new(&domain).unwrap();
    let mapped: Vec<_> = (0..p.total()).map(|f| p.map(f)).collect();
    let enumerated: Vec<_> = Enumerator::new(&domain).collect();
    assert_eq!(mapped, enumerated);
    assert_eq!(mapped.len(), 24);
}

#[test]
fn test_empty_axis_gives_zero_total() {
    for axes in [
        vec![(0, 10), (20, 0)],
        vec![(10, 0), (0, 20)],
        vec![(10, 0), (20, 0)],
    ] {
        assert_eq!(plan(&axes).total(), 0);
    }
    assert_eq!(plan(&[(0, 10), (0, 20)]).total(), 200);
}

#[test]
fn test_rank_outside_bounds() {
    let err = DispatchPlan::new(&ResolvedDomain::new(&[])).unwrap_err();
    assert!(matches!(err, LaunchError::Rank(0)));
    let nine = vec![(0, 1); 9];
    let err = DispatchPlan::new(&ResolvedDomain::new(&nine)).unwrap_err();
    assert!(matches!(err, LaunchError::Rank(9)));
}

#[test]
fn test_overflowing_domain_is_rejected() {
    let err = DispatchPlan::new(&ResolvedDomain::new(&[(0, i64::MAX), (0, 3)])).unwrap_err();
    match err {
        LaunchError::DomainOverflow(sizes) => assert_eq!(sizes, vec![i64::MAX as u64, 3]),
        other => panic!("expected DomainOverflow, got {:?}", other),
    }
}

// ─── Binding ───────────────────────────────────────────────────────

#[test]
fn test_one_variable_per_axis() {
    let (b, warning) = binding_for(3, LoopTargets::Vars(3));
    assert!(warning.is_none());
    let idx = GroupedIndex::new(&[7, 8, 9]).unwrap();
    assert_eq!(b.var_count(), 3);
    assert_eq!(b.bind(0, &idx), Some(LoopVar::Scalar(7)));
    assert_eq!(b.bind(2, &idx), Some(LoopVar::Scalar(9)));
    assert_eq!(b.bind(3, &idx), None);
}

#[test]
fn test_fewer_variables_group_the_tail() {
    let (b, warning) = binding_for(3, LoopTargets::Vars(2));
    let warning = warning.unwrap();
    assert_eq!(warning.code, Some(DiagnosticCode::ArityWarning));
    assert!(!warning.is_error());
    assert!(warning.message.starts_with(
        "Ndrange for loop with number of the loop variables not equal to the dimension"
    ));

    let idx = GroupedIndex::new(&[1, 2, 3]).unwrap();
    assert_eq!(b.bind(0, &idx), Some(LoopVar::Scalar(1)));
    let tail = b.bind(1, &idx).unwrap();
    assert_eq!(tail.as_grouped().unwrap().to_vec(), vec![2, 3]);
}

#[test]
fn test_single_variable_takes_everything() {
    let (b, warning) = binding_for(2, LoopTargets::Vars(1));
    assert!(warning.is_some());
    let idx = GroupedIndex::new(&[4, 5]).unwrap();
    assert_eq!(b.bind(0, &idx), Some(LoopVar::Grouped(idx)));
}

#[test]
fn test_grouped_target_on_rank_one() {
    let (b, warning) = binding_for(1, LoopTargets::Grouped);
    assert!(warning.is_none());
    let idx = GroupedIndex::new(&[6]).unwrap();
    let v = b.bind(0, &idx).unwrap();
    assert_eq!(v.as_scalar(), None);
    assert_eq!(v.as_grouped(), Some(&idx));
}

#[test]
fn test_variable_count_out_of_range() {
    let domain = make_range_domain(&[RangeArg::from(2), RangeArg::from(3)]).unwrap();
    for n in [0, 3] {
        let err = Binding::new(LoopTargets::Vars(n), 2, domain.call_site()).unwrap_err();
        assert_eq!(err.code, Some(DiagnosticCode::ShapeError));
    }
}

#[test]
fn test_iteration_accessors() {
    let (b, _) = binding_for(2, LoopTargets::Vars(2));
    let it = Iteration::new(3, GroupedIndex::new(&[1, 1]).unwrap(), &b);
    assert_eq!(it.flat(), 3);
    assert_eq!(it.index().to_vec(), vec![1, 1]);
    assert_eq!(it.scalar(1), Some(1));
    assert_eq!(it.vars(), vec![LoopVar::Scalar(1), LoopVar::Scalar(1)]);
}

// ─── Dispatch ──────────────────────────────────────────────────────

#[test]
fn test_serial_dispatch_is_row_major() {
    let p = plan(&[(0, 2), (0, 3)]);
    let (b, _) = binding_for(2, LoopTargets::Vars(2));
    let mut seen = Vec::new();
    let n = dispatch_serial(&p, &b, |it: &Iteration<'_>| {
        seen.push((it.scalar(0).unwrap(), it.scalar(1).unwrap()));
        Ok::<(), KernelFault>(())
    })
    .unwrap();
    assert_eq!(n, 6);
    assert_eq!(seen, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]);
}

#[test]
fn test_parallel_dispatch_covers_every_tuple_once() {
    let p = plan(&[(4, 10), (3, 8), (0, 17)]);
    let (b, _) = binding_for(3, LoopTargets::Vars(3));
    let seen = Mutex::new(Vec::new());
    let n = dispatch_parallel(&p, &b, &|it: &Iteration<'_>| {
        seen.lock().unwrap().push((it.flat(), *it.index()));
        Ok(())
    })
    .unwrap();
    assert_eq!(n, 510);

    let mut seen = seen.into_inner().unwrap();
    seen.sort();
    assert_eq!(seen.len(), 510);
    for (flat, idx) in seen {
        assert_eq!(idx, p.map(flat));
    }
}

#[test]
fn test_parallel_dispatch_of_empty_plan() {
    let p = plan(&[(10, 0)]);
    let (b, _) = binding_for(1, LoopTargets::Vars(1));
    let calls = AtomicU64::new(0);
    let n = dispatch_parallel(&p, &b, &|_: &Iteration<'_>| {
        calls.fetch_add(1, Ordering::Relaxed);
        Ok(())
    })
    .unwrap();
    assert_eq!(n, 0);
    assert_eq!(calls.load(Ordering::Relaxed), 0);
}

#[test]
fn test_parallel_dispatch_stops_on_fault() {
    let p = plan(&[(0, 1000)]);
    let (b, _) = binding_for(1, LoopTargets::Vars(1));
    let err = dispatch_parallel(&p, &b, &|it: &Iteration<'_>| {
        if it.scalar(0) == Some(500) {
            Err(KernelFault::new("assertion failed".to_string()))
        } else {
            Ok(())
        }
    })
    .unwrap_err();
    match err {
        LaunchError::Fault { flat, fault } => {
            assert_eq!(flat, 500);
            assert_eq!(fault.message, "assertion failed");
        }
        other => panic!("expected Fault, got {:?}", other),
    }
}
