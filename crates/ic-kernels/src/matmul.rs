//! Plain (untiled) matrix multiply: `C[m, n] = A[m, k] @ B[k, n]`, row-major.

use ic_tensor::Element;

use crate::scratch::try_filled;
use crate::vector;

fn assert_dims<T>(a: &[T], b: &[T], c: &[T], m: usize, k: usize, n: usize) {
    assert_eq!(a.len(), m * k, "matmul: a.len() != m*k");
    assert_eq!(b.len(), k * n, "matmul: b.len() != k*n");
    assert_eq!(c.len(), m * n, "matmul: c.len() != m*n");
}

/// Naive triple loop. Each product is formed from decoded f32 operands and
/// summed in k order in f32; the sum is encoded once with the element's
/// conversion rule. The tiled kernels are checked against this.
///
/// # Panics
/// Panics if a slice length disagrees with `m`, `k`, `n`.
pub fn matmul_reference<T: Element>(a: &[T], b: &[T], c: &mut [T], m: usize, k: usize, n: usize) {
    assert_dims(a, b, c, m, k, n);
    for i in 0..m {
        for j in 0..n {
            let mut sum = 0.0f32;
            for p in 0..k {
                sum += a[i * k + p].to_f32() * b[p * n + j].to_f32();
            }
            c[i * n + j] = T::from_f32(sum);
        }
    }
}

/// Row-broadcast matmul on f32 lanes: each output row accumulates
/// `a[i, p] * B[p, :]` for p in order.
///
/// Leaves `c` untouched if scratch allocation fails.
pub fn matmul_vectorized<T: Element>(
    a: &[T],
    b: &[T],
    c: &mut [T],
    m: usize,
    k: usize,
    n: usize,
) {
    assert_dims(a, b, c, m, k, n);

    let b_owned;
    let b32: &[f32] = match T::as_f32_slice(b) {
        Some(b) => b,
        None => {
            let Some(mut buf) = try_filled(k * n, 0.0f32) else {
                return;
            };
            T::decode_into(b, &mut buf);
            b_owned = buf;
            &b_owned
        }
    };
    let Some(mut acc) = try_filled(n, 0.0f32) else {
        return;
    };

    for i in 0..m {
        acc.fill(0.0);
        for p in 0..k {
            let av = a[i * k + p].to_f32();
            vector::axpy(&mut acc, av, &b32[p * n..(p + 1) * n]);
        }
        for (o, &v) in c[i * n..(i + 1) * n].iter_mut().zip(&acc) {
            *o = T::from_f32(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use half::f16;

    #[test]
    fn test_matmul_identity() {
        // 2x2 identity @ [1,2;3,4]
        let a = [1.0f32, 0.0, 0.0, 1.0];
        let x = [1.0f32, 2.0, 3.0, 4.0];
        let mut c = [0.0f32; 4];
        matmul_reference(&a, &x, &mut c, 2, 2, 2);
        assert_eq!(c, [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_matmul_basic() {
        // [1,2;3,4] @ [5,6;7,8] = [19,22;43,50]
        let a = [1.0f32, 2.0, 3.0, 4.0];
        let x = [5.0f32, 6.0, 7.0, 8.0];
        let mut c = [0.0f32; 4];
        matmul_reference(&a, &x, &mut c, 2, 2, 2);
        assert_eq!(c, [19.0, 22.0, 43.0, 50.0]);
        let mut v = [0.0f32; 4];
        matmul_vectorized(&a, &x, &mut v, 2, 2, 2);
        assert_eq!(v, c);
    }

    #[test]
    fn test_matmul_vectorized_rectangular() {
        let (m, k, n) = (3, 5, 19);
        let a: Vec<f32> = (0..m * k).map(|i| (i as f32 * 0.3).cos()).collect();
        let b: Vec<f32> = (0..k * n).map(|i| (i as f32 * 0.7).sin()).collect();
        let mut r = vec![0.0f32; m * n];
        let mut v = vec![0.0f32; m * n];
        matmul_reference(&a, &b, &mut r, m, k, n);
        matmul_vectorized(&a, &b, &mut v, m, k, n);
        for (x, y) in r.iter().zip(&v) {
            assert_relative_eq!(x, y, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_matmul_f16_small_integers_exact() {
        let a: Vec<f16> = [1.0f32, 2.0, 3.0, 4.0].iter().map(|&v| f16::from_f32(v)).collect();
        let b: Vec<f16> = [5.0f32, 6.0, 7.0, 8.0].iter().map(|&v| f16::from_f32(v)).collect();
        let mut c = vec![f16::ZERO; 4];
        matmul_vectorized(&a, &b, &mut c, 2, 2, 2);
        let out: Vec<f32> = c.iter().map(|v| v.to_f32()).collect();
        assert_eq!(out, vec![19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    #[should_panic]
    fn test_matmul_dimension_mismatch() {
        let mut c = [0.0f32; 2];
        matmul_reference(&[1.0f32, 2.0, 3.0], &[1.0f32, 2.0, 3.0, 4.0], &mut c, 1, 3, 2);
    }
}
