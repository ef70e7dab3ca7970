//! Eight-lane f32 helpers shared by the vectorized kernels.
//!
//! Built on `wide::f32x8`, which lowers to AVX/NEON where available and to
//! plain arrays elsewhere, so these helpers are correct on every target.
//! Reductions accumulate lane-wise and fold the lanes at the end, then add
//! the tail; their rounding therefore differs from a sequential loop by a
//! few ULPs.

use wide::f32x8;

pub const LANES: usize = 8;

#[inline(always)]
fn load(src: &[f32]) -> f32x8 {
    let mut arr = [0.0f32; LANES];
    arr.copy_from_slice(&src[..LANES]);
    f32x8::from(arr)
}

#[inline(always)]
fn store(v: f32x8, dst: &mut [f32]) {
    let arr: [f32; LANES] = v.into();
    dst[..LANES].copy_from_slice(&arr);
}

#[inline(always)]
fn hsum(v: f32x8) -> f32 {
    let arr: [f32; LANES] = v.into();
    arr.iter().sum()
}

/// Dot product of two equal-length slices.
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let body = a.len() / LANES * LANES;
    let mut acc = f32x8::ZERO;
    for (ca, cb) in a[..body]
        .chunks_exact(LANES)
        .zip(b[..body].chunks_exact(LANES))
    {
        acc = load(ca).mul_add(load(cb), acc);
    }
    let mut s = hsum(acc);
    for i in body..a.len() {
        s += a[i] * b[i];
    }
    s
}

/// Maximum element, or negative infinity for an empty slice.
#[inline]
pub fn max(x: &[f32]) -> f32 {
    let body = x.len() / LANES * LANES;
    let mut m = f32x8::splat(f32::NEG_INFINITY);
    for c in x[..body].chunks_exact(LANES) {
        m = m.max(load(c));
    }
    let arr: [f32; LANES] = m.into();
    let mut best = arr.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    for &v in &x[body..] {
        best = best.max(v);
    }
    best
}

/// Sum of all elements.
#[inline]
pub fn sum(x: &[f32]) -> f32 {
    let body = x.len() / LANES * LANES;
    let mut acc = f32x8::ZERO;
    for c in x[..body].chunks_exact(LANES) {
        acc += load(c);
    }
    hsum(acc) + x[body..].iter().sum::<f32>()
}

/// Sum of squares, for rms-norm.
#[inline]
pub fn sum_squares(x: &[f32]) -> f32 {
    dot(x, x)
}

/// `y += a * x`.
#[inline]
pub fn axpy(y: &mut [f32], a: f32, x: &[f32]) {
    debug_assert_eq!(x.len(), y.len());
    let body = y.len() / LANES * LANES;
    let va = f32x8::splat(a);
    for (cy, cx) in y[..body]
        .chunks_exact_mut(LANES)
        .zip(x[..body].chunks_exact(LANES))
    {
        let r = va.mul_add(load(cx), load(cy));
        store(r, cy);
    }
    for i in body..y.len() {
        y[i] += a * x[i];
    }
}

/// `x *= s`.
#[inline]
pub fn scale(x: &mut [f32], s: f32) {
    let body = x.len() / LANES * LANES;
    let vs = f32x8::splat(s);
    for c in x[..body].chunks_exact_mut(LANES) {
        let r = load(c) * vs;
        store(r, c);
    }
    for v in &mut x[body..] {
        *v *= s;
    }
}

/// `x /= d`, lane by lane. IEEE division is exact per lane, so the result is
/// bit-identical to the scalar loop.
#[inline]
pub fn div_scalar(x: &mut [f32], d: f32) {
    let body = x.len() / LANES * LANES;
    let vd = f32x8::splat(d);
    for c in x[..body].chunks_exact_mut(LANES) {
        let r = load(c) / vd;
        store(r, c);
    }
    for v in &mut x[body..] {
        *v /= d;
    }
}

/// `x[i] /= d[i]`, lane by lane; bit-identical to the scalar loop.
#[inline]
pub fn div_elementwise(x: &mut [f32], d: &[f32]) {
    debug_assert_eq!(x.len(), d.len());
    let body = x.len() / LANES * LANES;
    for (cx, cd) in x[..body]
        .chunks_exact_mut(LANES)
        .zip(d[..body].chunks_exact(LANES))
    {
        let r = load(cx) / load(cd);
        store(r, cx);
    }
    for i in body..x.len() {
        x[i] /= d[i];
    }
}

/// `dst[i] = exp(src[i] - shift)`; returns the sum of `dst`.
///
/// The exponential itself is evaluated per lane with `f32::exp`, so only the
/// summation order differs from the scalar form.
#[inline]
pub fn exp_shifted(src: &[f32], shift: f32, dst: &mut [f32]) -> f32 {
    debug_assert_eq!(src.len(), dst.len());
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = (s - shift).exp();
    }
    sum(dst)
}

/// In-place [`exp_shifted`].
#[inline]
pub fn exp_shifted_in_place(x: &mut [f32], shift: f32) -> f32 {
    for v in x.iter_mut() {
        *v = (*v - shift).exp();
    }
    sum(x)
}

/// `x[i] *= w[i] * inv`, the scaling step of rms-norm.
#[inline]
pub fn mul_scaled(x: &mut [f32], w: &[f32], inv: f32) {
    debug_assert_eq!(x.len(), w.len());
    let body = x.len() / LANES * LANES;
    let vinv = f32x8::splat(inv);
    for (cx, cw) in x[..body]
        .chunks_exact_mut(LANES)
        .zip(w[..body].chunks_exact(LANES))
    {
        let r = load(cx) * vinv * load(cw);
        store(r, cx);
    }
    for i in body..x.len() {
        x[i] = x[i] * inv * w[i];
    }
}
