//! Default instance and the convenience wrappers.

use approx::assert_abs_diff_eq;
use ic_backend::global::{self, override_capabilities};
use ic_backend::{
    clear_default, create, get_default, set_default, Backend, BackendConfig, BackendDescriptor,
    BackendOps, Capability, CapabilitySnapshot, Op,
};
use ic_tensor::{f16, TensorView, TensorViewMut};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

static LOCK: Mutex<()> = Mutex::new(());

#[derive(Debug)]
struct SiluOnly;
impl BackendOps for SiluOnly {
    fn supports(&self, op: Op) -> bool {
        op == Op::Silu
    }
}

static SILU_ONLY: BackendDescriptor = BackendDescriptor {
    name: "silu-only",
    capability: Capability::Scalar,
    ops: &SiluOnly,
};

fn scalar_snapshot() -> CapabilitySnapshot {
    CapabilitySnapshot::scalar_only(2)
}

#[test]
fn test_cleared_default_is_recreated() {
    let _guard = LOCK.lock();
    override_capabilities(Some(scalar_snapshot()));
    clear_default();
    let x = [0.0f32, 2.0_f32.ln()];
    let mut out = [7.0f32; 2];
    let xv = TensorView::new(&x, [1, 2]).unwrap();
    let done = global::softmax(&xv, &mut TensorViewMut::new(&mut out, [1, 2]).unwrap()).unwrap();
    override_capabilities(None);
    assert!(done);
    assert_abs_diff_eq!(out[0], 1.0 / 3.0, epsilon = 1e-6);
    assert_abs_diff_eq!(out[1], 2.0 / 3.0, epsilon = 1e-6);
    assert_eq!(get_default().unwrap().name(), "scalar");
    clear_default();
}

#[test]
fn test_wrappers_run_on_default() {
    let _guard = LOCK.lock();
    override_capabilities(Some(scalar_snapshot()));
    set_default(create(None).unwrap());
    override_capabilities(None);

    let x = [0.0f32, 0.0, 0.0, 0.0];
    let mut out = [0.0f32; 4];
    let xv = TensorView::new(&x, [2, 2]).unwrap();
    assert!(global::softmax(&xv, &mut TensorViewMut::new(&mut out, [2, 2]).unwrap()).unwrap());
    assert_eq!(out, [0.5; 4]);

    let w = [1.0f32, 1.0];
    let wv = TensorView::new(&w, [2]).unwrap();
    let y = [3.0f32, -3.0, 1.0, 1.0];
    let yv = TensorView::new(&y, [2, 2]).unwrap();
    assert!(global::rms_norm(&yv, &wv, 0.0, &mut TensorViewMut::new(&mut out, [2, 2]).unwrap()).unwrap());
    assert_abs_diff_eq!(out[0], 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(out[1], -1.0, epsilon = 1e-6);

    assert!(global::silu(&xv, &mut TensorViewMut::new(&mut out, [2, 2]).unwrap()).unwrap());
    assert_eq!(out, [0.0; 4]);

    let id = [1.0f32, 0.0, 0.0, 1.0];
    let idv = TensorView::new(&id, [2, 2]).unwrap();
    assert!(global::matmul(&yv, &idv, &mut TensorViewMut::new(&mut out, [2, 2]).unwrap()).unwrap());
    assert_eq!(out, y);
    clear_default();
}

#[test]
fn test_wrappers_skip_unsupported_ops() {
    let _guard = LOCK.lock();
    let backend = Backend::new(&SILU_ONLY, &BackendConfig::default(), &scalar_snapshot()).unwrap();
    set_default(backend);
    let x = [1.0f32; 4];
    let mut out = [9.0f32; 4];
    let xv = TensorView::new(&x, [2, 2]).unwrap();
    let done = global::matmul(&xv, &xv, &mut TensorViewMut::new(&mut out, [2, 2]).unwrap()).unwrap();
    assert!(!done);
    assert_eq!(out, [9.0; 4]);
    // Listed as supported, but the provider keeps the default body.
    let done = global::silu(&xv, &mut TensorViewMut::new(&mut out, [2, 2]).unwrap()).unwrap();
    assert!(!done);
    assert_eq!(out, [9.0; 4]);
    clear_default();
}

#[test]
fn test_wrapper_shape_errors_are_reported() {
    let _guard = LOCK.lock();
    override_capabilities(Some(scalar_snapshot()));
    set_default(create(None).unwrap());
    override_capabilities(None);
    let x = [1.0f32; 6];
    let mut out = [0.0f32; 4];
    let xv = TensorView::new(&x, [2, 3]).unwrap();
    assert!(global::softmax(&xv, &mut TensorViewMut::new(&mut out, [2, 2]).unwrap()).is_err());
    clear_default();
}

#[test]
fn test_set_default_replaces_previous() {
    let _guard = LOCK.lock();
    override_capabilities(Some(scalar_snapshot()));
    let first = set_default(create(None).unwrap());
    let weak = std::sync::Arc::downgrade(&first);
    drop(first);
    let second = set_default(create(None).unwrap());
    override_capabilities(None);

    assert!(weak.upgrade().is_none(), "replaced default was not released");
    let current = get_default().unwrap();
    assert!(std::sync::Arc::ptr_eq(&current, &second));
    current.set_threads(4);
    assert_eq!(second.threads(), 4);
    drop(current);
    assert!(clear_default().is_some());
    let fresh = get_default().unwrap();
    assert!(!std::sync::Arc::ptr_eq(&fresh, &second));
    drop(fresh);
    clear_default();
}

#[test]
fn test_f16_matmul_through_default() {
    let _guard = LOCK.lock();
    override_capabilities(Some(
        scalar_snapshot()
            .with(Capability::Vector, true, 10)
            .with(Capability::MatrixTile, true, 20),
    ));
    let backend = set_default(create(Some(Capability::MatrixTile)).unwrap());
    override_capabilities(None);
    assert_eq!(backend.name(), "matrix-tile");

    let (m, k, n) = (40, 24, 36);
    let mut rng = StdRng::seed_from_u64(3);
    let a: Vec<f16> = (0..m * k).map(|_| f16::from_f32(rng.gen_range(-1.0..1.0))).collect();
    let b: Vec<f16> = (0..k * n).map(|_| f16::from_f32(rng.gen_range(-1.0..1.0))).collect();
    let mut c = vec![f16::ZERO; m * n];
    let done = global::matmul(
        &TensorView::new(&a, [m, k]).unwrap(),
        &TensorView::new(&b, [k, n]).unwrap(),
        &mut TensorViewMut::new(&mut c, [m, n]).unwrap(),
    )
    .unwrap();
    assert!(done);

    let mut expected = vec![f16::ZERO; m * n];
    ic_kernels::matmul::matmul_reference(&a, &b, &mut expected, m, k, n);
    assert_eq!(c, expected);
    clear_default();
}
