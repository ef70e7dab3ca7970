//! The provider interface: what a backend can do and how it is described.

use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicUsize, Ordering};

use ic_kernels::AttentionShape;
use ic_tensor::{DType, Result as TensorResult, TensorError, TensorView, TensorViewMut};

use crate::capability::Capability;
use crate::error::{BackendError, Result};

/// Expands `$body` once per element type, with `$T` bound to the Rust type
/// of `$dtype`.
macro_rules! dispatch_dtype {
    ($dtype:expr, $T:ident => $body:block) => {
        match $dtype {
            ic_tensor::DType::F32 => {
                type $T = f32;
                $body
            }
            ic_tensor::DType::F16 => {
                type $T = half::f16;
                $body
            }
            ic_tensor::DType::BF16 => {
                type $T = half::bf16;
                $body
            }
        }
    };
}
pub(crate) use dispatch_dtype;

/// Operations a backend may implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Matmul,
    RmsNorm,
    Silu,
    Softmax,
    Attention,
}

impl Op {
    pub const ALL: [Op; 5] = [Op::Matmul, Op::RmsNorm, Op::Silu, Op::Softmax, Op::Attention];

    pub fn name(&self) -> &'static str {
        match self {
            Op::Matmul => "matmul",
            Op::RmsNorm => "rms_norm",
            Op::Silu => "silu",
            Op::Softmax => "softmax",
            Op::Attention => "attention",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-instance provider state, created by [`BackendOps::init`] and handed
/// to every op call.
#[derive(Debug)]
pub struct ProviderContext {
    threads: AtomicUsize,
    live: bool,
}

impl ProviderContext {
    pub fn new(threads: usize) -> Self {
        Self {
            threads: AtomicUsize::new(threads.max(1)),
            live: true,
        }
    }

    /// Worker threads the provider may use.
    pub fn threads(&self) -> usize {
        self.threads.load(Ordering::Relaxed)
    }

    pub fn set_threads(&self, threads: usize) {
        self.threads.store(threads.max(1), Ordering::Relaxed);
    }

    /// False once the destroy hook has run.
    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn mark_destroyed(&mut self) {
        self.live = false;
    }
}

/// Inputs of one batched attention call.
#[derive(Debug, Clone)]
pub struct AttentionArgs<'a> {
    /// `[batch, q_heads, seq_q, head_dim]`
    pub q: TensorView<'a>,
    /// `[batch, kv_heads, seq_kv, head_dim]`
    pub k: TensorView<'a>,
    /// `[batch, kv_heads, seq_kv, head_dim]`
    pub v: TensorView<'a>,
    /// Additive `[seq_q, seq_kv]` mask.
    pub mask: Option<&'a [f32]>,
    pub shape: AttentionShape,
    pub scale: f32,
}

fn unsupported<T>(op: Op) -> Result<T> {
    Err(BackendError::Unsupported {
        backend: "provider",
        op,
    })
}

/// Operations bundle of one provider.
///
/// Every op method receives already-typed views. The default bodies report
/// [`BackendError::Unsupported`]; a provider overrides the ops it lists in
/// [`BackendOps::supports`].
pub trait BackendOps: Send + Sync + Debug {
    fn supports(&self, op: Op) -> bool;

    /// Builds the per-instance context.
    fn init(&self, threads: usize) -> Result<ProviderContext> {
        Ok(ProviderContext::new(threads))
    }

    /// Releases per-instance state. Runs once, when the instance drops.
    fn destroy(&self, ctx: &mut ProviderContext) {
        ctx.mark_destroyed();
    }

    /// `c = a @ b` for rank-2 views of one dtype.
    fn matmul(
        &self,
        _ctx: &ProviderContext,
        _a: &TensorView<'_>,
        _b: &TensorView<'_>,
        _c: &mut TensorViewMut<'_>,
    ) -> Result<()> {
        unsupported(Op::Matmul)
    }

    /// RMS norm over rows of `weight.numel()` elements.
    fn rms_norm(
        &self,
        _ctx: &ProviderContext,
        _x: &TensorView<'_>,
        _weight: &TensorView<'_>,
        _eps: f32,
        _out: &mut TensorViewMut<'_>,
    ) -> Result<()> {
        unsupported(Op::RmsNorm)
    }

    fn silu(
        &self,
        _ctx: &ProviderContext,
        _x: &TensorView<'_>,
        _out: &mut TensorViewMut<'_>,
    ) -> Result<()> {
        unsupported(Op::Silu)
    }

    /// Softmax over the last dimension.
    fn softmax(
        &self,
        _ctx: &ProviderContext,
        _x: &TensorView<'_>,
        _out: &mut TensorViewMut<'_>,
    ) -> Result<()> {
        unsupported(Op::Softmax)
    }

    fn attention(
        &self,
        _ctx: &ProviderContext,
        _args: &AttentionArgs<'_>,
        _out: &mut TensorViewMut<'_>,
    ) -> Result<()> {
        unsupported(Op::Attention)
    }
}

/// A registrable provider: a unique name, the capability it needs, and its
/// operations.
#[derive(Debug)]
pub struct BackendDescriptor {
    pub name: &'static str,
    pub capability: Capability,
    pub ops: &'static dyn BackendOps,
}

impl BackendDescriptor {
    pub fn supports(&self, op: Op) -> bool {
        self.ops.supports(op)
    }
}

fn dtype_mismatch(expected: DType, got: DType) -> TensorError {
    TensorError::DTypeMismatch {
        expected: expected.to_string(),
        got: got.to_string(),
    }
}

fn same_dtype(expected: DType, got: DType) -> TensorResult<()> {
    if expected != got {
        return Err(dtype_mismatch(expected, got));
    }
    Ok(())
}

fn same_shape(x: &TensorView<'_>, out: &TensorViewMut<'_>) -> TensorResult<()> {
    if x.shape() != out.shape() {
        return Err(TensorError::ShapeMismatch {
            expected: x.shape().dims().to_vec(),
            got: out.shape().dims().to_vec(),
        });
    }
    Ok(())
}

/// Checks a matmul and returns `(m, k, n)`.
pub(crate) fn check_matmul(
    a: &TensorView<'_>,
    b: &TensorView<'_>,
    c: &TensorViewMut<'_>,
) -> TensorResult<(usize, usize, usize)> {
    let (m, k) = a.shape().as_matrix()?;
    let (k2, n) = b.shape().as_matrix()?;
    if k != k2 {
        return Err(TensorError::MatmulMismatch { m, k, k2, n });
    }
    let (cm, cn) = c.shape().as_matrix()?;
    if (cm, cn) != (m, n) {
        return Err(TensorError::ShapeMismatch {
            expected: vec![m, n],
            got: vec![cm, cn],
        });
    }
    same_dtype(a.dtype(), b.dtype())?;
    same_dtype(a.dtype(), c.dtype())?;
    Ok((m, k, n))
}

pub(crate) fn check_unary(x: &TensorView<'_>, out: &TensorViewMut<'_>) -> TensorResult<()> {
    same_shape(x, out)?;
    same_dtype(x.dtype(), out.dtype())
}

/// Checks a softmax and returns the row length.
pub(crate) fn check_softmax(x: &TensorView<'_>, out: &TensorViewMut<'_>) -> TensorResult<usize> {
    check_unary(x, out)?;
    let row_len = x.shape().last_dim();
    x.shape().rows(row_len)?;
    Ok(row_len)
}

pub(crate) fn check_rms_norm(
    x: &TensorView<'_>,
    weight: &TensorView<'_>,
    out: &TensorViewMut<'_>,
) -> TensorResult<()> {
    check_unary(x, out)?;
    same_dtype(x.dtype(), weight.dtype())?;
    if weight.numel() != x.shape().last_dim() {
        return Err(TensorError::ShapeMismatch {
            expected: vec![x.shape().last_dim()],
            got: weight.shape().dims().to_vec(),
        });
    }
    x.shape().rows(weight.numel())?;
    Ok(())
}

pub(crate) fn check_attention(args: &AttentionArgs<'_>, out: &TensorViewMut<'_>) -> TensorResult<()> {
    let s = &args.shape;
    if !s.is_valid() {
        return Err(TensorError::InvalidShape(format!(
            "{} query heads cannot share {} key/value heads",
            s.q_heads, s.kv_heads
        )));
    }
    let q_dims = vec![s.batch, s.q_heads, s.seq_q, s.head_dim];
    let kv_dims = vec![s.batch, s.kv_heads, s.seq_kv, s.head_dim];
    for (view, dims) in [(&args.q, &q_dims), (&args.k, &kv_dims), (&args.v, &kv_dims)] {
        if view.numel() != dims.iter().product::<usize>() {
            return Err(TensorError::ShapeMismatch {
                expected: dims.clone(),
                got: view.shape().dims().to_vec(),
            });
        }
    }
    if out.numel() != s.q_len() {
        return Err(TensorError::ShapeMismatch {
            expected: q_dims,
            got: out.shape().dims().to_vec(),
        });
    }
    if let Some(mask) = args.mask {
        if mask.len() != s.mask_len() {
            return Err(TensorError::LengthMismatch {
                shape: vec![s.seq_q, s.seq_kv],
                expected: s.mask_len(),
                got: mask.len(),
            });
        }
    }
    let dtype = args.q.dtype();
    same_dtype(dtype, args.k.dtype())?;
    same_dtype(dtype, args.v.dtype())?;
    same_dtype(dtype, out.dtype())
}

#[cfg(test)]
mod tests {
    use super::*;
    use half::f16;

    #[derive(Debug)]
    struct Nothing;
    impl BackendOps for Nothing {
        fn supports(&self, _op: Op) -> bool {
            false
        }
    }

    #[test]
    fn test_default_ops_unsupported() {
        let ctx = Nothing.init(2).unwrap();
        let data = [1.0f32; 4];
        let x = TensorView::new(&data, [2, 2]).unwrap();
        let mut out_buf = [0.0f32; 4];
        let mut out = TensorViewMut::new(&mut out_buf, [2, 2]).unwrap();
        let err = Nothing.silu(&ctx, &x, &mut out).unwrap_err();
        assert!(matches!(err, BackendError::Unsupported { op: Op::Silu, .. }));
        assert!(Nothing.matmul(&ctx, &x, &x, &mut out).is_err());
    }

    #[test]
    fn test_context_lifecycle() {
        let mut ctx = Nothing.init(0).unwrap();
        assert_eq!(ctx.threads(), 1);
        ctx.set_threads(6);
        assert_eq!(ctx.threads(), 6);
        assert!(ctx.is_live());
        Nothing.destroy(&mut ctx);
        assert!(!ctx.is_live());
    }

    #[test]
    fn test_check_matmul() {
        let a = [0.0f32; 6];
        let b = [0.0f32; 12];
        let mut c = [0.0f32; 8];
        let av = TensorView::new(&a, [2, 3]).unwrap();
        let bv = TensorView::new(&b, [3, 4]).unwrap();
        let cv = TensorViewMut::new(&mut c, [2, 4]).unwrap();
        assert_eq!(check_matmul(&av, &bv, &cv).unwrap(), (2, 3, 4));

        let bad = TensorView::new(&b, [4, 3]).unwrap();
        assert!(matches!(
            check_matmul(&av, &bad, &cv),
            Err(TensorError::MatmulMismatch { k: 3, k2: 4, .. })
        ));

        let b16 = [f16::ZERO; 12];
        let bv16 = TensorView::new(&b16, [3, 4]).unwrap();
        assert!(matches!(
            check_matmul(&av, &bv16, &cv),
            Err(TensorError::DTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_check_rms_norm_and_softmax() {
        let x = [1.0f32; 6];
        let w = [1.0f32; 3];
        let mut o = [0.0f32; 6];
        let xv = TensorView::new(&x, [2, 3]).unwrap();
        let wv = TensorView::new(&w, [3]).unwrap();
        let ov = TensorViewMut::new(&mut o, [2, 3]).unwrap();
        assert!(check_rms_norm(&xv, &wv, &ov).is_ok());
        assert_eq!(check_softmax(&xv, &ov).unwrap(), 3);

        let w2 = [1.0f32; 2];
        let wv2 = TensorView::new(&w2, [2]).unwrap();
        assert!(check_rms_norm(&xv, &wv2, &ov).is_err());

        let mut o2 = [0.0f32; 6];
        let ov2 = TensorViewMut::new(&mut o2, [3, 2]).unwrap();
        assert!(matches!(check_unary(&xv, &ov2), Err(TensorError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_op_names() {
        assert_eq!(Op::RmsNorm.to_string(), "rms_norm");
        assert_eq!(Op::ALL.len(), 5);
    }
}
