//! Row-wise normalization and activation kernels.
//!
//! Each op has a straightforward scalar form, kept as the reference and
//! fallback, and a vectorized form built on [`crate::vector`]. Inputs are
//! generic over [`Element`]; arithmetic is always f32.

use ic_tensor::Element;

use crate::scratch::try_filled;
use crate::vector;

fn assert_rows(len: usize, row_len: usize, what: &str) -> usize {
    assert!(row_len > 0, "{}: row length must be > 0", what);
    assert_eq!(
        len % row_len,
        0,
        "{}: {} elements do not split into rows of {}",
        what,
        len,
        row_len
    );
    len / row_len
}

/// RMS normalization over rows of `weight.len()` elements.
///
/// For each row: `out[i] = x[i] * weight[i] / sqrt(mean(x^2) + eps)`.
///
/// # Panics
/// Panics if `weight` is empty, `x.len()` is not a multiple of
/// `weight.len()`, or `out.len() != x.len()`.
pub fn rms_norm_scalar<T: Element>(x: &[T], weight: &[T], eps: f32, out: &mut [T]) {
    let hidden = weight.len();
    let n_rows = assert_rows(x.len(), hidden, "rms_norm");
    assert_eq!(out.len(), x.len(), "rms_norm: output length");

    for row in 0..n_rows {
        let offset = row * hidden;
        let row_data = &x[offset..offset + hidden];

        let mean_sq: f32 = row_data
            .iter()
            .map(|v| {
                let v = v.to_f32();
                v * v
            })
            .sum::<f32>()
            / hidden as f32;
        let rms = (mean_sq + eps).sqrt();

        for i in 0..hidden {
            out[offset + i] = T::from_f32(row_data[i].to_f32() * weight[i].to_f32() / rms);
        }
    }
}

/// Vectorized [`rms_norm_scalar`].
pub fn rms_norm_vectorized<T: Element>(x: &[T], weight: &[T], eps: f32, out: &mut [T]) {
    let hidden = weight.len();
    let n_rows = assert_rows(x.len(), hidden, "rms_norm");
    assert_eq!(out.len(), x.len(), "rms_norm: output length");

    let Some(mut row_buf) = try_filled(hidden, 0.0f32) else {
        return;
    };
    let w_owned;
    let w: &[f32] = match T::as_f32_slice(weight) {
        Some(w) => w,
        None => {
            let Some(mut buf) = try_filled(hidden, 0.0f32) else {
                return;
            };
            T::decode_into(weight, &mut buf);
            w_owned = buf;
            &w_owned
        }
    };

    for row in 0..n_rows {
        let offset = row * hidden;
        T::decode_into(&x[offset..offset + hidden], &mut row_buf);
        let mean_sq = vector::sum_squares(&row_buf) / hidden as f32;
        let inv = 1.0 / (mean_sq + eps).sqrt();
        vector::mul_scaled(&mut row_buf, w, inv);
        for (o, &v) in out[offset..offset + hidden].iter_mut().zip(&row_buf) {
            *o = T::from_f32(v);
        }
    }
}

/// SiLU activation: `out[i] = x[i] / (1 + exp(-x[i]))`.
///
/// # Panics
/// Panics if `out.len() != x.len()`.
pub fn silu_scalar<T: Element>(x: &[T], out: &mut [T]) {
    assert_eq!(out.len(), x.len(), "silu: output length");
    for (o, &v) in out.iter_mut().zip(x) {
        let v = v.to_f32();
        *o = T::from_f32(v / (1.0 + (-v).exp()));
    }
}

/// SiLU over f32 lanes: the exponentials stay scalar, the divide goes
/// through [`vector::div_elementwise`].
pub fn silu_vectorized<T: Element>(x: &[T], out: &mut [T]) {
    assert_eq!(out.len(), x.len(), "silu: output length");
    const BLOCK: usize = 256;
    let mut xs = [0.0f32; BLOCK];
    let mut den = [0.0f32; BLOCK];
    for (xc, oc) in x.chunks(BLOCK).zip(out.chunks_mut(BLOCK)) {
        let n = xc.len();
        T::decode_into(xc, &mut xs[..n]);
        for (d, &v) in den[..n].iter_mut().zip(&xs[..n]) {
            *d = 1.0 + (-v).exp();
        }
        vector::div_elementwise(&mut xs[..n], &den[..n]);
        for (o, &v) in oc.iter_mut().zip(&xs[..n]) {
            *o = T::from_f32(v);
        }
    }
}

/// Numerically stable softmax over consecutive rows of `row_len` elements.
///
/// # Panics
/// Panics if `row_len` is zero, does not divide `x.len()`, or
/// `out.len() != x.len()`.
pub fn softmax_scalar<T: Element>(x: &[T], row_len: usize, out: &mut [T]) {
    let n_rows = assert_rows(x.len(), row_len, "softmax");
    assert_eq!(out.len(), x.len(), "softmax: output length");

    let Some(mut exps) = try_filled(row_len, 0.0f32) else {
        return;
    };
    for row in 0..n_rows {
        let offset = row * row_len;
        let row_data = &x[offset..offset + row_len];

        let max_val = row_data
            .iter()
            .map(|v| v.to_f32())
            .fold(f32::NEG_INFINITY, f32::max);

        let mut sum = 0.0f32;
        for i in 0..row_len {
            let e = (row_data[i].to_f32() - max_val).exp();
            exps[i] = e;
            sum += e;
        }

        for i in 0..row_len {
            out[offset + i] = T::from_f32(exps[i] / sum);
        }
    }
}

/// Vectorized [`softmax_scalar`].
pub fn softmax_vectorized<T: Element>(x: &[T], row_len: usize, out: &mut [T]) {
    let n_rows = assert_rows(x.len(), row_len, "softmax");
    assert_eq!(out.len(), x.len(), "softmax: output length");

    let Some(mut row_buf) = try_filled(row_len, 0.0f32) else {
        return;
    };
    let Some(mut exps) = try_filled(row_len, 0.0f32) else {
        return;
    };
    for row in 0..n_rows {
        let offset = row * row_len;
        T::decode_into(&x[offset..offset + row_len], &mut row_buf);
        let max_val = vector::max(&row_buf);
        let sum = vector::exp_shifted(&row_buf, max_val, &mut exps);
        vector::div_scalar(&mut exps, sum);
        for (o, &v) in out[offset..offset + row_len].iter_mut().zip(&exps) {
            *o = T::from_f32(v);
        }
    }
}
