//! Tiled matrix multiply on the [`MatrixUnit`](unit::MatrixUnit).
//!
//! Two precisions, two tile geometries:
//! - f16 uses 32x32 tiles and the unit's widening `fma16` instruction, with
//!   a software-pipelined slice loop and a rayon task driver.
//! - bf16 uses 16x16 tiles, widening both operands to f32 on pack for
//!   `fma32`, with a static row split across scoped threads.
//!
//! All layouts are row-major: `A[m, k]`, `B[k, n]`, `C[m, n]`. Both paths
//! sum products in k order in f32 and encode once, so they reproduce
//! [`crate::matmul::matmul_reference`] exactly for any tiling or thread
//! count.

mod bf16_tiles;
mod f16_tiles;
pub mod unit;

pub use bf16_tiles::{gemm_bf16, gemm_bf16_mt, TILE as BF16_TILE};
pub use f16_tiles::{gemm_f16, gemm_f16_mt, MT_FLOP_THRESHOLD, TILE as F16_TILE};
pub use unit::MatrixUnit;

fn assert_dims<T>(a: &[T], b: &[T], c: &[T], m: usize, k: usize, n: usize) {
    assert_eq!(a.len(), m * k, "gemm: a.len() != m*k");
    assert_eq!(b.len(), k * n, "gemm: b.len() != k*n");
    assert_eq!(c.len(), m * n, "gemm: c.len() != m*n");
}
