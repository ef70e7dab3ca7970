use ic_tensor::Element;

use super::{assert_single_head, store_row, widen};
use crate::scratch::try_filled;
use crate::vector;

/// Rows with at most this many key positions take a single-block softmax.
pub const SMALL_KV: usize = 128;

/// Key positions scored per block on the streaming path.
pub const BLOCK_KV: usize = 64;

#[allow(clippy::too_many_arguments)]
fn score_block<T: Element>(
    scores: &mut [f32],
    q_row: &[f32],
    k: &[T],
    start: usize,
    head_dim: usize,
    scale: f32,
    mask_row: Option<&[f32]>,
    kv_buf: &mut [f32],
) {
    for (jj, s) in scores.iter_mut().enumerate() {
        let j = start + jj;
        let k_row = widen(&k[j * head_dim..(j + 1) * head_dim], &mut *kv_buf);
        let mut score = vector::dot(q_row, k_row) * scale;
        if let Some(mask_row) = mask_row {
            score += mask_row[j];
        }
        *s = score;
    }
}

/// Accumulates `acc += p[jj] * v[start + jj]` for every nonzero weight.
fn accumulate_block<T: Element>(
    acc: &mut [f32],
    weights: &[f32],
    v: &[T],
    start: usize,
    head_dim: usize,
    kv_buf: &mut [f32],
) {
    for (jj, &p) in weights.iter().enumerate() {
        if p == 0.0 {
            continue;
        }
        let j = start + jj;
        let v_row = widen(&v[j * head_dim..(j + 1) * head_dim], &mut *kv_buf);
        vector::axpy(acc, p, v_row);
    }
}

/// Attention with eight-lane dot products and block-wise online softmax.
///
/// Rows with at most [`SMALL_KV`] key positions are scored in one pass,
/// normalized against the row maximum, and reduced. Longer rows are
/// processed in blocks of [`BLOCK_KV`]: each block's maximum updates the
/// running maximum (rescaling the accumulator when it grows) before the
/// block's weights are folded in. Results agree with
/// [`super::attention_scalar`] up to summation-order rounding.
///
/// # Panics
/// Panics if a buffer length disagrees with the dimensions.
#[allow(clippy::too_many_arguments)]
pub fn attention_vectorized<T: Element>(
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
    assert_single_head(out, q, k, v, seq_q, seq_kv, head_dim, mask);
    let d = head_dim;
    if out.is_empty() {
        return;
    }

    let score_len = if seq_kv <= SMALL_KV { seq_kv } else { BLOCK_KV };
    let Some(mut scratch) = try_filled(3 * d + score_len, 0.0f32) else {
        out.fill(T::ZERO);
        return;
    };
    let (q_row, rest) = scratch.split_at_mut(d);
    let (acc, rest) = rest.split_at_mut(d);
    let (kv_buf, scores) = rest.split_at_mut(d);

    for i in 0..seq_q {
        T::decode_into(&q[i * d..(i + 1) * d], q_row);
        acc.fill(0.0);
        let mask_row = mask.map(|m| &m[i * seq_kv..(i + 1) * seq_kv]);
        let dst = &mut out[i * d..(i + 1) * d];

        if seq_kv <= SMALL_KV {
            score_block(scores, q_row, k, 0, d, scale, mask_row, kv_buf);
            let row_max = vector::max(scores);
            if row_max == f32::NEG_INFINITY {
                dst.fill(T::ZERO);
                continue;
            }
            let sum = vector::exp_shifted_in_place(scores, row_max);
            accumulate_block(acc, scores, v, 0, d, kv_buf);
            store_row(dst, acc, sum);
            continue;
        }

        let mut running_max = f32::NEG_INFINITY;
        let mut running_sum = 0.0f32;
        let mut start = 0;
        while start < seq_kv {
            let len = BLOCK_KV.min(seq_kv - start);
            let block = &mut scores[..len];
            score_block(block, q_row, k, start, d, scale, mask_row, kv_buf);
            let block_max = vector::max(block);
            if block_max != f32::NEG_INFINITY {
                if block_max > running_max {
                    let r = (running_max - block_max).exp();
                    vector::scale(acc, r);
                    running_sum *= r;
                    running_max = block_max;
                }
                running_sum += vector::exp_shifted_in_place(block, running_max);
                accumulate_block(acc, block, v, start, d, kv_buf);
            }
            start += len;
        }
        store_row(dst, acc, running_sum);
    }
}
