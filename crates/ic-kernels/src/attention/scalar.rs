use ic_tensor::Element;

use super::{assert_single_head, store_row};
use crate::scratch::try_filled;

/// Streaming-softmax attention, one key position at a time.
///
/// For each query row the running maximum starts at negative infinity and
/// the normalizer at zero. A position whose score exceeds the maximum
/// rescales the accumulator and normalizer by `exp(old - new)` and enters
/// with weight one; any other position enters with `exp(score - max)`.
///
/// # Panics
/// Panics if a buffer length disagrees with the dimensions.
#[allow(clippy::too_many_arguments)]
pub fn attention_scalar<T: Element>(
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

    let Some(mut scratch) = try_filled(2 * d, 0.0f32) else {
        out.fill(T::ZERO);
        return;
    };
    let (q_row, acc) = scratch.split_at_mut(d);

    for i in 0..seq_q {
        T::decode_into(&q[i * d..(i + 1) * d], q_row);
        acc.fill(0.0);
        let mut running_max = f32::NEG_INFINITY;
        let mut running_sum = 0.0f32;

        for j in 0..seq_kv {
            let k_row = &k[j * d..(j + 1) * d];
            let mut score = 0.0f32;
            for t in 0..d {
                score += q_row[t] * k_row[t].to_f32();
            }
            score *= scale;
            if let Some(mask) = mask {
                score += mask[i * seq_kv + j];
            }
            if score == f32::NEG_INFINITY {
                continue;
            }

            let weight = if score > running_max {
                let r = (running_max - score).exp();
                for a in acc.iter_mut() {
                    *a *= r;
                }
                running_sum *= r;
                running_max = score;
                1.0
            } else {
                (score - running_max).exp()
            };

            let v_row = &v[j * d..(j + 1) * d];
            for t in 0..d {
                acc[t] += weight * v_row[t].to_f32();
            }
            running_sum += weight;
        }

        store_row(&mut out[i * d..(i + 1) * d], acc, running_sum);
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{pseudo_random, reference};
    use super::*;
    use approx::assert_abs_diff_eq;
    use half::f16;

    #[test]
    fn test_single_position_copies_value() {
        let q = [1.0f32, 0.0];
        let k = [0.5f32, 0.5];
        let v = [3.0f32, -2.0];
        let mut out = [0.0f32; 2];
        attention_scalar(&mut out, &q, &k, &v, 1, 1, 2, 1.0, None);
        assert_eq!(out, [3.0, -2.0]);
    }

    #[test]
    fn test_equal_scores_average_values() {
        let q = [1.0f32, 1.0];
        let k = [1.0f32, 0.0, 0.0, 1.0];
        let v = [2.0f32, 0.0, 0.0, 4.0];
        let mut out = [0.0f32; 2];
        attention_scalar(&mut out, &q, &k, &v, 1, 2, 2, 1.0, None);
        assert_abs_diff_eq!(out[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(out[1], 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_matches_two_pass_reference() {
        let (sq, skv, d) = (5, 37, 16);
        let q = pseudo_random(sq * d, 11);
        let k = pseudo_random(skv * d, 12);
        let v = pseudo_random(skv * d, 13);
        let scale = 1.0 / (d as f32).sqrt();
        let mut out = vec![0.0f32; sq * d];
        attention_scalar(&mut out, &q, &k, &v, sq, skv, d, scale, None);
        let expected = reference(&q, &k, &v, sq, skv, d, scale, None);
        for (a, b) in out.iter().zip(&expected) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_causal_mask() {
        let (s, d) = (4, 8);
        let q = pseudo_random(s * d, 21);
        let k = pseudo_random(s * d, 22);
        let v = pseudo_random(s * d, 23);
        let mut mask = vec![0.0f32; s * s];
        for i in 0..s {
            for j in i + 1..s {
                mask[i * s + j] = f32::NEG_INFINITY;
            }
        }
        let mut out = vec![0.0f32; s * d];
        attention_scalar(&mut out, &q, &k, &v, s, s, d, 0.5, Some(&mask));
        // Row 0 only sees position 0.
        assert_eq!(&out[..d], &v[..d]);
        let expected = reference(&q, &k, &v, s, s, d, 0.5, Some(&mask));
        for (a, b) in out.iter().zip(&expected) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_fully_masked_row_is_zero() {
        let q = [1.0f32; 4];
        let k = [1.0f32; 4];
        let v = [7.0f32; 4];
        let mask = [0.0f32, 0.0, f32::NEG_INFINITY, f32::NEG_INFINITY];
        let mut out = [9.0f32; 4];
        attention_scalar(&mut out, &q, &k, &v, 2, 2, 2, 1.0, Some(&mask));
        assert_eq!(&out[..2], &[7.0, 7.0]);
        assert_eq!(&out[2..], &[0.0, 0.0]);
    }

    #[test]
    fn test_large_scores_stay_finite() {
        let q = [100.0f32, 100.0];
        let k = [100.0f32, 100.0, -100.0, -100.0, 99.0, 99.0];
        let v = [1.0f32, 1.0, 2.0, 2.0, 3.0, 3.0];
        let mut out = [0.0f32; 2];
        attention_scalar(&mut out, &q, &k, &v, 1, 3, 2, 1.0, None);
        assert!(out.iter().all(|x| x.is_finite()));
        assert_abs_diff_eq!(out[0], 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_f16_inputs() {
        let (sq, skv, d) = (3, 9, 8);
        let q: Vec<f16> = pseudo_random(sq * d, 31).into_iter().map(f16::from_f32).collect();
        let k: Vec<f16> = pseudo_random(skv * d, 32).into_iter().map(f16::from_f32).collect();
        let v: Vec<f16> = pseudo_random(skv * d, 33).into_iter().map(f16::from_f32).collect();
        let mut out = vec![f16::ZERO; sq * d];
        attention_scalar(&mut out, &q, &k, &v, sq, skv, d, 0.35, None);
        let expected = reference(&q, &k, &v, sq, skv, d, 0.35, None);
        for (a, b) in out.iter().zip(&expected) {
            assert_abs_diff_eq!(a.to_f32(), b, epsilon = 2e-3);
        }
    }

    #[test]
    fn test_empty_kv_gives_zero_rows() {
        let q = [1.0f32, 2.0];
        let mut out = [5.0f32; 2];
        attention_scalar(&mut out, &q, &[], &[], 1, 0, 2, 1.0, None);
        assert_eq!(out, [0.0, 0.0]);
    }

    #[test]
    #[should_panic]
    fn test_bad_mask_length_panics() {
        let mut out = [0.0f32; 2];
        attention_scalar(&mut out, &[1.0, 1.0], &[1.0, 1.0], &[1.0, 1.0], 1, 1, 2, 1.0, Some(&[0.0, 0.0]));
    }
}
