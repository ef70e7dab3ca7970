use ic_kernels::elementwise::{rms_norm_vectorized, silu_vectorized, softmax_vectorized};
use ic_kernels::matmul::matmul_vectorized;
use ic_kernels::{multi_head_attention, AttentionPath};
use ic_tensor::{TensorView, TensorViewMut};

use crate::capability::Capability;
use crate::error::Result;
use crate::provider::{
    check_attention, check_matmul, check_rms_norm, check_softmax, check_unary, dispatch_dtype,
    AttentionArgs, BackendDescriptor, BackendOps, Op, ProviderContext,
};

/// Eight-lane kernels built on `wide`.
#[derive(Debug)]
pub struct VectorOps;

pub static VECTOR: BackendDescriptor = BackendDescriptor {
    name: "vector",
    capability: Capability::Vector,
    ops: &VectorOps,
};

impl BackendOps for VectorOps {
    fn supports(&self, _op: Op) -> bool {
        true
    }

    fn init(&self, threads: usize) -> Result<ProviderContext> {
        log::debug!("vector provider: {} threads", threads);
        Ok(ProviderContext::new(threads))
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
            matmul_vectorized(a.as_slice::<T>()?, b.as_slice::<T>()?, c.as_mut_slice::<T>()?, m, k, n);
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
            rms_norm_vectorized(x.as_slice::<T>()?, weight.as_slice::<T>()?, eps, out.as_mut_slice::<T>()?);
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
            silu_vectorized(x.as_slice::<T>()?, out.as_mut_slice::<T>()?);
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
            softmax_vectorized(x.as_slice::<T>()?, row_len, out.as_mut_slice::<T>()?);
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
                AttentionPath::Vectorized,
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
