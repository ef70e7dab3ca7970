use ic_tensor::Element;

use super::{attention, AttentionPath};
use crate::isa;

/// Multi-head runs with at most this many (batch, head) pairs stay on the
/// calling thread.
pub const PARALLEL_HEAD_THRESHOLD: usize = 4;

/// Dimensions of a batched multi-head (or grouped-query) attention call.
///
/// Tensor layouts, all row-major:
/// - `q`, `out`: `[batch, q_heads, seq_q, head_dim]`
/// - `k`, `v`: `[batch, kv_heads, seq_kv, head_dim]`
/// - mask: `[seq_q, seq_kv]`, shared by every (batch, head) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttentionShape {
    pub batch: usize,
    pub q_heads: usize,
    pub kv_heads: usize,
    pub seq_q: usize,
    pub seq_kv: usize,
    pub head_dim: usize,
}

impl AttentionShape {
    /// True when `kv_heads` is nonzero and divides `q_heads`.
    pub fn is_valid(&self) -> bool {
        self.kv_heads > 0 && self.q_heads % self.kv_heads == 0
    }

    /// Query heads sharing one key/value head.
    pub fn group_size(&self) -> usize {
        self.q_heads / self.kv_heads
    }

    pub fn q_len(&self) -> usize {
        self.batch * self.q_heads * self.seq_q * self.head_dim
    }

    pub fn kv_len(&self) -> usize {
        self.batch * self.kv_heads * self.seq_kv * self.head_dim
    }

    pub fn mask_len(&self) -> usize {
        self.seq_q * self.seq_kv
    }

    /// `1 / sqrt(head_dim)`.
    pub fn default_scale(&self) -> f32 {
        1.0 / (self.head_dim.max(1) as f32).sqrt()
    }
}

/// Runs attention for every (batch, head) pair.
///
/// Query head `h` reads key/value head `h / group_size`. When there are more
/// than [`PARALLEL_HEAD_THRESHOLD`] pairs and more than one thread is
/// allowed, pairs are split into contiguous ranges across scoped worker
/// threads; each worker owns a disjoint slice of `out`, so the result does
/// not depend on the thread count. `threads = None` uses
/// [`isa::available_threads`].
///
/// # Panics
/// Panics if the shape is invalid or a buffer length disagrees with it.
#[allow(clippy::too_many_arguments)]
pub fn multi_head_attention<T: Element>(
    path: AttentionPath,
    out: &mut [T],
    q: &[T],
    k: &[T],
    v: &[T],
    shape: &AttentionShape,
    scale: f32,
    mask: Option<&[f32]>,
    threads: Option<usize>,
) {
    assert!(
        shape.is_valid(),
        "multi_head_attention: q_heads {} not divisible by kv_heads {}",
        shape.q_heads,
        shape.kv_heads
    );
    assert_eq!(q.len(), shape.q_len(), "multi_head_attention: q length");
    assert_eq!(out.len(), shape.q_len(), "multi_head_attention: out length");
    assert_eq!(k.len(), shape.kv_len(), "multi_head_attention: k length");
    assert_eq!(v.len(), shape.kv_len(), "multi_head_attention: v length");
    if let Some(mask) = mask {
        assert_eq!(mask.len(), shape.mask_len(), "multi_head_attention: mask length");
    }

    let pairs = shape.batch * shape.q_heads;
    if out.is_empty() || pairs == 0 {
        return;
    }
    let head_out = shape.seq_q * shape.head_dim;
    let threads = threads.unwrap_or_else(isa::available_threads).max(1);

    if pairs <= PARALLEL_HEAD_THRESHOLD || threads == 1 {
        run_pairs(path, 0, out, q, k, v, shape, scale, mask);
        return;
    }

    let workers = threads.min(pairs);
    let per_worker = pairs.div_ceil(workers);
    std::thread::scope(|s| {
        for (w, chunk) in out.chunks_mut(per_worker * head_out).enumerate() {
            s.spawn(move || {
                run_pairs(path, w * per_worker, chunk, q, k, v, shape, scale, mask);
            });
        }
    });
}

/// Processes the pairs whose outputs make up `out`, starting at `first`.
#[allow(clippy::too_many_arguments)]
fn run_pairs<T: Element>(
    path: AttentionPath,
    first: usize,
    out: &mut [T],
    q: &[T],
    k: &[T],
    v: &[T],
    shape: &AttentionShape,
    scale: f32,
    mask: Option<&[f32]>,
) {
    let q_span = shape.seq_q * shape.head_dim;
    let kv_span = shape.seq_kv * shape.head_dim;
    let group = shape.group_size();

    for (local, head_out) in out.chunks_mut(q_span).enumerate() {
        let pair = first + local;
        let b = pair / shape.q_heads;
        let h = pair % shape.q_heads;
        let kv_pair = b * shape.kv_heads + h / group;

        attention(
            path,
            head_out,
            &q[pair * q_span..(pair + 1) * q_span],
            &k[kv_pair * kv_span..(kv_pair + 1) * kv_span],
            &v[kv_pair * kv_span..(kv_pair + 1) * kv_span],
            shape.seq_q,
            shape.seq_kv,
            shape.head_dim,
            scale,
            mask,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::pseudo_random;
    use super::*;
    use half::f16;

    fn shape(batch: usize, q_heads: usize, kv_heads: usize) -> AttentionShape {
        AttentionShape {
            batch,
            q_heads,
            kv_heads,
            seq_q: 3,
            seq_kv: 10,
            head_dim: 8,
        }
    }

    #[test]
    fn test_shape_helpers() {
        let s = shape(2, 8, 2);
        assert!(s.is_valid());
        assert_eq!(s.group_size(), 4);
        assert_eq!(s.q_len(), 2 * 8 * 3 * 8);
        assert_eq!(s.kv_len(), 2 * 2 * 10 * 8);
        assert_eq!(s.mask_len(), 30);
        assert!((s.default_scale() - 1.0 / 8f32.sqrt()).abs() < 1e-7);
        assert!(!shape(1, 6, 4).is_valid());
        assert!(!shape(1, 6, 0).is_valid());
    }

    #[test]
    fn test_grouped_heads_share_kv() {
        let s = shape(2, 4, 2);
        let q = pseudo_random(s.q_len(), 1);
        let k = pseudo_random(s.kv_len(), 2);
        let v = pseudo_random(s.kv_len(), 3);
        let mut out = vec![0.0f32; s.q_len()];
        multi_head_attention(AttentionPath::Scalar, &mut out, &q, &k, &v, &s, 0.3, None, Some(1));

        let q_span = s.seq_q * s.head_dim;
        let kv_span = s.seq_kv * s.head_dim;
        for pair in 0..s.batch * s.q_heads {
            let b = pair / s.q_heads;
            let kv_pair = b * s.kv_heads + (pair % s.q_heads) / 2;
            let mut single = vec![0.0f32; q_span];
            attention(
                AttentionPath::Scalar,
                &mut single,
                &q[pair * q_span..(pair + 1) * q_span],
                &k[kv_pair * kv_span..(kv_pair + 1) * kv_span],
                &v[kv_pair * kv_span..(kv_pair + 1) * kv_span],
                s.seq_q,
                s.seq_kv,
                s.head_dim,
                0.3,
                None,
            );
            assert_eq!(&out[pair * q_span..(pair + 1) * q_span], single.as_slice());
        }
    }

    #[test]
    fn test_thread_count_does_not_change_result() {
        let s = shape(3, 6, 3);
        let q: Vec<f16> = pseudo_random(s.q_len(), 7).into_iter().map(f16::from_f32).collect();
        let k: Vec<f16> = pseudo_random(s.kv_len(), 8).into_iter().map(f16::from_f32).collect();
        let v: Vec<f16> = pseudo_random(s.kv_len(), 9).into_iter().map(f16::from_f32).collect();
        let mut mask = vec![0.0f32; s.mask_len()];
        mask[5] = f32::NEG_INFINITY;

        let mut baseline = vec![f16::ZERO; s.q_len()];
        let path = AttentionPath::detect();
        multi_head_attention(path, &mut baseline, &q, &k, &v, &s, 0.35, Some(&mask), Some(1));
        for threads in [2, 3, 4, 7, 64] {
            let mut out = vec![f16::ZERO; s.q_len()];
            multi_head_attention(path, &mut out, &q, &k, &v, &s, 0.35, Some(&mask), Some(threads));
            assert_eq!(out, baseline, "threads = {}", threads);
        }
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let s = shape(0, 4, 2);
        let mut out: Vec<f32> = Vec::new();
        multi_head_attention(AttentionPath::Scalar, &mut out, &[], &[], &[], &s, 1.0, None, None);
    }

    #[test]
    #[should_panic]
    fn test_indivisible_heads_panics() {
        let s = shape(1, 3, 2);
        let q = vec![0.0f32; s.q_len()];
        let mut out = vec![0.0f32; s.q_len()];
        let kv = vec![0.0f32; s.kv_len()];
        multi_head_attention(AttentionPath::Scalar, &mut out, &q, &kv, &kv, &s, 1.0, None, None);
    }
}
