use ic_kernels::elementwise::{rms_norm_scalar, silu_scalar, softmax_scalar};
use ic_kernels::matmul::matmul_reference;
use ic_kernels::{multi_head_attention, AttentionPath};
use ic_tensor::{TensorView, TensorViewMut};

use crate::capability::Capability;
use crate::error::Result;
use crate::provider::{
    check_attention, check_matmul, check_rms_norm, check_softmax, check_unary, dispatch_dtype,
    AttentionArgs, BackendDescriptor, BackendOps, Op, ProviderContext,
};

/// Portable reference kernels. Always available.
#[derive(Debug)]
pub struct ScalarOps;

pub static SCALAR: BackendDescriptor = BackendDescriptor {
    name: "scalar",
    capability: Capability::Scalar,
    ops: &ScalarOps,
};

impl BackendOps for ScalarOps {
    fn supports(&self, _op: Op) -> bool {
        true
    }

    fn matmul(
        &self,
        _ctx: &ProviderContext,
        a: &TensorView<'_>,
        b: &TensorView<'_>,
        c: &mut TensorViewMut<'_>,
    ) -> Result<()> {
        let (m, k, n) = check_matmul(a, b, c)?;
        dispatch_dtype!(a.dtype(), T => {
            matmul_reference(a.as_slice::<T>()?, b.as_slice::<T>()?, c.as_mut_slice::<T>()?, m, k, n);
        });
        Ok(())
    }

    fn rms_norm(
        &self,
        _ctx: &ProviderContext,
        x: &TensorView<'_>,
        weight: &TensorView<'_>,
        eps: f32,
        out: &mut TensorViewMut<'_>,
    ) -> Result<()> {
        check_rms_norm(x, weight, out)?;
        dispatch_dtype!(x.dtype(), T => {
            rms_norm_scalar(x.as_slice::<T>()?, weight.as_slice::<T>()?, eps, out.as_mut_slice::<T>()?);
        });
        Ok(())
    }

    fn silu(
        &self,
        _ctx: &ProviderContext,
        x: &TensorView<'_>,
        out: &mut TensorViewMut<'_>,
    ) -> Result<()> {
        check_unary(x, out)?;
        dispatch_dtype!(x.dtype(), T => {
            silu_scalar(x.as_slice::<T>()?, out.as_mut_slice::<T>()?);
        });
        Ok(())
    }

    fn softmax(
        &self,
        _ctx: &ProviderContext,
        x: &TensorView<'_>,
        out: &mut TensorViewMut<'_>,
    ) -> Result<()> {
        let row_len = check_softmax(x, out)?;
        dispatch_dtype!(x.dtype(), T => {
            softmax_scalar(x.as_slice::<T>()?, row_len, out.as_mut_slice::<T>()?);
        });
        Ok(())
    }

    fn attention(
        &self,
        ctx: &ProviderContext,
        args: &AttentionArgs<'_>,
        out: &mut TensorViewMut<'_>,
    ) -> Result<()> {
        check_attention(args, out)?;
        dispatch_dtype!(args.q.dtype(), T => {
            multi_head_attention(
                AttentionPath::Scalar,
                out.as_mut_slice::<T>()?,
                args.q.as_slice::<T>()?,
                args.k.as_slice::<T>()?,
                args.v.as_slice::<T>()?,
                &args.shape,
                args.scale,
                args.mask,
                Some(ctx.threads()),
            );
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use half::bf16;

    #[test]
    fn test_matmul_f32() {
        let ctx = ScalarOps.init(1).unwrap();
        let a = [1.0f32, 2.0, 3.0, 4.0];
        let b = [5.0f32, 6.0, 7.0, 8.0];
        let mut c = [0.0f32; 4];
        let av = TensorView::new(&a, [2, 2]).unwrap();
        let bv = TensorView::new(&b, [2, 2]).unwrap();
        let mut cv = TensorViewMut::new(&mut c, [2, 2]).unwrap();
        ScalarOps.matmul(&ctx, &av, &bv, &mut cv).unwrap();
        assert_eq!(c, [19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_softmax_rows_bf16() {
        let ctx = ScalarOps.init(1).unwrap();
        let x: Vec<bf16> = [0.0f32, 0.0, 1.0, 1.0].iter().map(|&v| bf16::from_f32(v)).collect();
        let mut out = vec![bf16::ZERO; 4];
        let xv = TensorView::new(&x, [2, 2]).unwrap();
        let mut ov = TensorViewMut::new(&mut out, [2, 2]).unwrap();
        ScalarOps.softmax(&ctx, &xv, &mut ov).unwrap();
        for v in out {
            assert_eq!(v.to_f32(), 0.5);
        }
    }

    #[test]
    fn test_rms_norm_and_silu() {
        let ctx = ScalarOps.init(1).unwrap();
        let x = [3.0f32, 4.0];
        let w = [1.0f32, 2.0];
        let mut out = [0.0f32; 2];
        let xv = TensorView::new(&x, [1, 2]).unwrap();
        let wv = TensorView::new(&w, [2]).unwrap();
        let mut ov = TensorViewMut::new(&mut out, [1, 2]).unwrap();
        ScalarOps.rms_norm(&ctx, &xv, &wv, 0.0, &mut ov).unwrap();
        let rms = (12.5f32).sqrt();
        assert_abs_diff_eq!(out[0], 3.0 / rms, epsilon = 1e-6);
        assert_abs_diff_eq!(out[1], 8.0 / rms, epsilon = 1e-6);

        let mut ov = TensorViewMut::new(&mut out, [1, 2]).unwrap();
        ScalarOps.silu(&ctx, &xv, &mut ov).unwrap();
        assert_abs_diff_eq!(out[0], 3.0 / (1.0 + (-3.0f32).exp()), epsilon = 1e-6);
    }

    #[test]
    fn test_shape_errors_propagate() {
        let ctx = ScalarOps.init(1).unwrap();
        let x = [1.0f32; 6];
        let mut out = [0.0f32; 4];
        let xv = TensorView::new(&x, [2, 3]).unwrap();
        let mut ov = TensorViewMut::new(&mut out, [2, 2]).unwrap();
        assert!(ScalarOps.silu(&ctx, &xv, &mut ov).is_err());
    }
}
