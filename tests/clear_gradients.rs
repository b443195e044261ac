use ndloop::{
    clear_all_gradients, ExecutionContext, FieldDecl, FieldId, LaunchConfig, LayoutBuilder,
    RangeLoop, ScalarKind, StorageRegistry,
};

const N: usize = 128;

/// root ─┬─ place(x)
///       ├─ dense(n) ─ place(y)
///       └─ dense(n) ─ dense(n) ─ place(z, w)
fn layout() -> (StorageRegistry, [FieldId; 4]) {
    let mut layout = LayoutBuilder::new();
    let x = layout.declare(FieldDecl::scalar("x", ScalarKind::F32));
    let y = layout.declare(FieldDecl::scalar("y", ScalarKind::F32));
    let z = layout.declare(FieldDecl::scalar("z", ScalarKind::F32));
    let w = layout.declare(FieldDecl::scalar("w", ScalarKind::F32));
    let root = layout.root();
    layout.place(root, &[x]);
    let row = layout.dense(root, &[N]);
    layout.place(row, &[y]);
    let outer = layout.dense(root, &[N]);
    let inner = layout.dense(outer, &[N]);
    layout.place(inner, &[z, w]);
    layout.lazy_grad();
    (layout.finalize().unwrap(), [x, y, z, w])
}

fn seed(reg: &StorageRegistry, [x, y, z, w]: [FieldId; 4]) {
    reg.adjoint(x).unwrap().set_f64(&[], 3.0).unwrap();
    for i in 0..N as i64 {
        reg.adjoint(y).unwrap().set_f64(&[i], 3.0).unwrap();
        for j in 0..N as i64 {
            reg.adjoint(z).unwrap().set_f64(&[i, j], 5.0).unwrap();
            reg.adjoint(w).unwrap().set_f64(&[i, j], 6.0).unwrap();
        }
    }
}

fn all_zero(reg: &StorageRegistry, fields: &[FieldId]) -> bool {
    fields
        .iter()
        .all(|f| reg.adjoint(*f).unwrap().to_vec_f64().iter().all(|v| *v == 0.0))
}

#[test]
fn test_clear_all_gradients() {
    let (reg, fields) = layout();
    seed(&reg, fields);
    let ctx = ExecutionContext::new(LaunchConfig::default(), reg).unwrap();

    let stats = clear_all_gradients(&ctx);
    assert!(all_zero(ctx.registry(), &fields));
    assert_eq!(stats.fields_visited, 4);
    assert_eq!(stats.buffers_cleared, 4);
    assert_eq!(stats.elements_cleared, 1 + N + 2 * N * N);
}

#[test]
fn test_clear_twice_equals_clear_once() {
    let (reg, fields) = layout();
    seed(&reg, fields);
    let ctx = ExecutionContext::new(LaunchConfig::default(), reg).unwrap();

    let first = clear_all_gradients(&ctx);
    let second = clear_all_gradients(&ctx);
    assert_eq!(first, second);
    assert!(all_zero(ctx.registry(), &fields));
}

#[test]
fn test_kernel_writes_then_clear() {
    let (reg, fields) = layout();
    let [_, _, z, _] = fields;
    let ctx = ExecutionContext::new(
        LaunchConfig {
            workers: Some(2),
            ..LaunchConfig::default()
        },
        reg,
    )
    .unwrap();

    let lp = RangeLoop::from(ndloop::ndrange![N as i64, N as i64].unwrap())
        .compile()
        .unwrap();
    let grad = ctx.registry().adjoint(z).unwrap();
    ctx.launch(&lp, &ndloop::KernelArgs::new(), |it| {
        grad.set_f64(it.index().as_slice(), 1.0)
    })
    .unwrap();
    assert!(grad.to_vec_f64().iter().all(|v| *v == 1.0));

    clear_all_gradients(&ctx);
    assert!(all_zero(ctx.registry(), &fields));
    let reg = ctx.into_registry();
    assert_eq!(reg.primary(z).unwrap().len(), N * N);
}
