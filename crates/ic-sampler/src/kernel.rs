//! Arithmetic behind the sampling pipeline, in a scalar and an eight-lane
//! flavour. Both compute the same quantities; only the summation order (and
//! so the last bits of a sum) can differ.

use ic_kernels::vector;

pub trait SamplingKernel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Largest element, negative infinity for an empty slice.
    fn max(&self, x: &[f32]) -> f32;

    /// `dst[i] = exp(src[i] - shift)`; returns the sum of `dst`.
    fn exp_shifted(&self, src: &[f32], shift: f32, dst: &mut [f32]) -> f32;

    /// `sum(exp(x[i] - shift))` without writing anything.
    fn sum_exp(&self, x: &[f32], shift: f32) -> f32;

    fn sum(&self, x: &[f32]) -> f32;

    /// Divides by the sum when it is positive; returns the sum.
    fn normalize(&self, x: &mut [f32]) -> f32;
}

pub struct ScalarKernel;

impl SamplingKernel for ScalarKernel {
    fn name(&self) -> &'static str {
        "scalar"
    }

    fn max(&self, x: &[f32]) -> f32 {
        x.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    fn exp_shifted(&self, src: &[f32], shift: f32, dst: &mut [f32]) -> f32 {
        let mut sum = 0.0f32;
        for (d, &s) in dst.iter_mut().zip(src) {
            *d = (s - shift).exp();
            sum += *d;
        }
        sum
    }

    fn sum_exp(&self, x: &[f32], shift: f32) -> f32 {
        x.iter().map(|&v| (v - shift).exp()).sum()
    }

    fn sum(&self, x: &[f32]) -> f32 {
        x.iter().sum()
    }

    fn normalize(&self, x: &mut [f32]) -> f32 {
        let sum = self.sum(x);
        if sum > 0.0 {
            for v in x.iter_mut() {
                *v /= sum;
            }
        }
        sum
    }
}

pub struct VectorKernel;

const SUM_EXP_BLOCK: usize = 256;

impl SamplingKernel for VectorKernel {
    fn name(&self) -> &'static str {
        "vector"
    }

    fn max(&self, x: &[f32]) -> f32 {
        vector::max(x)
    }

    fn exp_shifted(&self, src: &[f32], shift: f32, dst: &mut [f32]) -> f32 {
        vector::exp_shifted(src, shift, dst)
    }

    fn sum_exp(&self, x: &[f32], shift: f32) -> f32 {
        let mut buf = [0.0f32; SUM_EXP_BLOCK];
        let mut total = 0.0f32;
        for chunk in x.chunks(SUM_EXP_BLOCK) {
            total += vector::exp_shifted(chunk, shift, &mut buf[..chunk.len()]);
        }
        total
    }

    fn sum(&self, x: &[f32]) -> f32 {
        vector::sum(x)
    }

    fn normalize(&self, x: &mut [f32]) -> f32 {
        let sum = vector::sum(x);
        if sum > 0.0 {
            vector::div_scalar(x, sum);
        }
        sum
    }
}

pub static SCALAR_KERNEL: ScalarKernel = ScalarKernel;
pub static VECTOR_KERNEL: VectorKernel = VectorKernel;
