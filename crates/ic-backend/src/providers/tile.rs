use ic_kernels::gemm::{gemm_bf16_mt, gemm_f16_mt};
use ic_kernels::matmul::matmul_vectorized;
use ic_tensor::{DType, TensorView, TensorViewMut};

use super::VectorOps;
use crate::capability::Capability;
use crate::error::Result;
use crate::provider::{
    check_matmul, AttentionArgs, BackendDescriptor, BackendOps, Op, ProviderContext,
};

/// Matrix-unit provider: 16-bit matmuls run as tiled GEMM on the matrix
/// unit; everything else goes through the vector kernels.
#[derive(Debug)]
pub struct MatrixTileOps;

pub static MATRIX_TILE: BackendDescriptor = BackendDescriptor {
    name: "matrix-tile",
    capability: Capability::MatrixTile,
    ops: &MatrixTileOps,
};

impl BackendOps for MatrixTileOps {
    fn supports(&self, _op: Op) -> bool {
        true
    }

    fn init(&self, threads: usize) -> Result<ProviderContext> {
        log::debug!("matrix-tile provider: {} threads", threads);
        Ok(ProviderContext::new(threads))
    }

    fn matmul(
        &self,
        ctx: &ProviderContext,
        a: &TensorView<'_>,
        b: &TensorView<'_>,
        c: &mut TensorViewMut<'_>,
    ) -> Result<()> {
        let (m, k, n) = check_matmul(a, b, c)?;
        let threads = ctx.threads();
        match a.dtype() {
            DType::F16 => gemm_f16_mt(
                a.as_slice()?,
                b.as_slice()?,
                c.as_mut_slice()?,
                m,
                k,
                n,
                threads,
            ),
            DType::BF16 => gemm_bf16_mt(
                a.as_slice()?,
                b.as_slice()?,
                c.as_mut_slice()?,
                m,
                k,
                n,
                threads,
            ),
            DType::F32 => matmul_vectorized::<f32>(
                a.as_slice()?,
                b.as_slice()?,
                c.as_mut_slice()?,
                m,
                k,
                n,
            ),
        }
        Ok(())
    }

    fn rms_norm(
        &self,
        ctx: &ProviderContext,
        x: &TensorView<'_>,
        weight: &TensorView<'_>,
        eps: f32,
        out: &mut TensorViewMut<'_>,
    ) -> Result<()> {
        VectorOps.rms_norm(ctx, x, weight, eps, out)
    }

    fn silu(
        &self,
        ctx: &ProviderContext,
        x: &TensorView<'_>,
        out: &mut TensorViewMut<'_>,
    ) -> Result<()> {
        VectorOps.silu(ctx, x, out)
    }

    fn softmax(
        &self,
        ctx: &ProviderContext,
        x: &TensorView<'_>,
        out: &mut TensorViewMut<'_>,
    ) -> Result<()> {
        VectorOps.softmax(ctx, x, out)
    }

    fn attention(
        &self,
        ctx: &ProviderContext,
        args: &AttentionArgs<'_>,
        out: &mut TensorViewMut<'_>,
    ) -> Result<()> {
        VectorOps.attention(ctx, args, out)
    }
}
