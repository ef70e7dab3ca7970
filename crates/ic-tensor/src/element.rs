use half::{bf16, f16};

use crate::convert;
use crate::dtype::DType;

/// Storage element the kernels are generic over.
///
/// Every kernel accumulates in f32; `to_f32`/`from_f32` are the only way
/// values enter or leave that domain, so the conversion rules of
/// [`crate::convert`] apply uniformly.
pub trait Element: Copy + Send + Sync + std::fmt::Debug + 'static {
    /// The tag reported by tensor views holding this element.
    const DTYPE: DType;
    /// Additive identity, used for zero-padding.
    const ZERO: Self;

    fn to_f32(self) -> f32;
    fn from_f32(v: f32) -> Self;

    /// Zero-copy view for slices that already hold f32.
    #[inline(always)]
    fn as_f32_slice(_src: &[Self]) -> Option<&[f32]> {
        None
    }

    /// Widens `src` into `dst` element by element.
    ///
    /// # Panics
    /// Panics if the slices differ in length.
    #[inline]
    fn decode_into(src: &[Self], dst: &mut [f32]) {
        assert_eq!(src.len(), dst.len());
        for (d, &s) in dst.iter_mut().zip(src) {
            *d = s.to_f32();
        }
    }
}

impl Element for f32 {
    const DTYPE: DType = DType::F32;
    const ZERO: Self = 0.0;

    #[inline(always)]
    fn to_f32(self) -> f32 {
        self
    }

    #[inline(always)]
    fn from_f32(v: f32) -> Self {
        v
    }

    #[inline(always)]
    fn as_f32_slice(src: &[Self]) -> Option<&[f32]> {
        Some(src)
    }

    #[inline]
    fn decode_into(src: &[Self], dst: &mut [f32]) {
        dst.copy_from_slice(src);
    }
}

impl Element for f16 {
    const DTYPE: DType = DType::F16;
    const ZERO: Self = f16::ZERO;

    #[inline(always)]
    fn to_f32(self) -> f32 {
        convert::f16_to_f32(self)
    }

    #[inline(always)]
    fn from_f32(v: f32) -> Self {
        convert::f32_to_f16(v)
    }

    #[inline]
    fn decode_into(src: &[Self], dst: &mut [f32]) {
        convert::decode_f16_slice(src, dst);
    }
}

impl Element for bf16 {
    const DTYPE: DType = DType::BF16;
    const ZERO: Self = bf16::ZERO;

    #[inline(always)]
    fn to_f32(self) -> f32 {
        convert::bf16_to_f32(self)
    }

    #[inline(always)]
    fn from_f32(v: f32) -> Self {
        convert::f32_to_bf16(v)
    }
}
