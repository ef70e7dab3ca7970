//! Scaled dot-product attention with an online (streaming) softmax.
//!
//! Per query row the kernels keep a running maximum `M`, a running
//! normalizer `S` and an f32 accumulator of `head_dim` values; the
//! `seq_q x seq_kv` score matrix is never materialized. Reduced-precision
//! inputs are widened to f32 on load and the normalized row is narrowed on
//! store.
//!
//! Single-head layout: `q`/`out` are `[seq_q, head_dim]`, `k`/`v` are
//! `[seq_kv, head_dim]`, and the optional additive mask is
//! `[seq_q, seq_kv]`. A position whose masked score is exactly negative
//! infinity is skipped; a row with no surviving position is written as zeros.

mod multi_head;
mod scalar;
mod vectorized;

use half::{bf16, f16};
use ic_tensor::Element;

use crate::isa;

pub use multi_head::{multi_head_attention, AttentionShape, PARALLEL_HEAD_THRESHOLD};
pub use scalar::attention_scalar;
pub use vectorized::{attention_vectorized, BLOCK_KV, SMALL_KV};

/// Which implementation runs the per-head loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttentionPath {
    /// Portable element-by-element streaming softmax.
    Scalar,
    /// Eight-lane dot products and block-wise softmax.
    Vectorized,
}

impl AttentionPath {
    /// The vectorized path when the CPU has a vector unit, scalar otherwise.
    pub fn detect() -> Self {
        if isa::vector_enabled() {
            AttentionPath::Vectorized
        } else {
            AttentionPath::Scalar
        }
    }
}

pub(crate) fn assert_single_head<T>(
    out: &[T],
    q: &[T],
    k: &[T],
    v: &[T],
    seq_q: usize,
    seq_kv: usize,
    head_dim: usize,
    mask: Option<&[f32]>,
) {
    assert_eq!(q.len(), seq_q * head_dim, "attention: q length");
    assert_eq!(out.len(), seq_q * head_dim, "attention: out length");
    assert_eq!(k.len(), seq_kv * head_dim, "attention: k length");
    assert_eq!(v.len(), seq_kv * head_dim, "attention: v length");
    if let Some(mask) = mask {
        assert_eq!(mask.len(), seq_q * seq_kv, "attention: mask length");
    }
}

/// Single-head attention on the chosen path.
///
/// # Panics
/// Panics if a buffer length disagrees with the dimensions.
#[allow(clippy::too_many_arguments)]
pub fn attention<T: Element>(
    path: AttentionPath,
    out: &mut [T],
    q: &[T],
    k: &[T],
    v: &[T],
    seq_q: usize,
    seq_kv: usize,
    head_dim: usize,
    scale: f32,
    mask: Option<&[f32]>,
) {
    match path {
        AttentionPath::Scalar => {
            attention_scalar(out, q, k, v, seq_q, seq_kv, head_dim, scale, mask)
        }
        AttentionPath::Vectorized => {
            attention_vectorized(out, q, k, v, seq_q, seq_kv, head_dim, scale, mask)
        }
    }
}

/// f32 attention on the detected path.
#[allow(clippy::too_many_arguments)]
pub fn attention_f32(
    out: &mut [f32],
    q: &[f32],
    k: &[f32],
    v: &[f32],
    seq_q: usize,
    seq_kv: usize,
    head_dim: usize,
    scale: f32,
    mask: Option<&[f32]>,
) {
    attention(AttentionPath::detect(), out, q, k, v, seq_q, seq_kv, head_dim, scale, mask);
}

/// Half-precision attention on the detected path; accumulation is f32.
#[allow(clippy::too_many_arguments)]
pub fn attention_f16(
    out: &mut [f16],
    q: &[f16],
    k: &[f16],
    v: &[f16],
    seq_q: usize,
    seq_kv: usize,
    head_dim: usize,
    scale: f32,
    mask: Option<&[f32]>,
) {
    attention(AttentionPath::detect(), out, q, k, v, seq_q, seq_kv, head_dim, scale, mask);
}

/// Brain-float attention on the detected path; accumulation is f32.
#[allow(clippy::too_many_arguments)]
pub fn attention_bf16(
    out: &mut [bf16],
    q: &[bf16],
    k: &[bf16],
    v: &[bf16],
    seq_q: usize,
    seq_kv: usize,
    head_dim: usize,
    scale: f32,
    mask: Option<&[f32]>,
) {
    attention(AttentionPath::detect(), out, q, k, v, seq_q, seq_kv, head_dim, scale, mask);
}

/// Widens a row to f32, borrowing directly when it already is f32.
#[inline]
pub(crate) fn widen<'a, T: Element>(src: &'a [T], buf: &'a mut [f32]) -> &'a [f32] {
    match T::as_f32_slice(src) {
        Some(s) => s,
        None => {
            T::decode_into(src, buf);
            buf
        }
    }
}

/// Writes `acc / sum` into `dst`, or zeros when nothing was accumulated.
#[inline]
pub(crate) fn store_row<T: Element>(dst: &mut [T], acc: &mut [f32], sum: f32) {
    if sum > 0.0 {
        crate::vector::div_scalar(acc, sum);
        for (o, &a) in dst.iter_mut().zip(acc.iter()) {
            *o = T::from_f32(a);
        }
    } else {
        dst.fill(T::ZERO);
    }
}
