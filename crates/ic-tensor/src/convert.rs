//! Bit-level conversion between `f32` and the two 16-bit float formats.
//!
//! Half precision (1 sign, 5 exponent, 10 mantissa, bias 15) is rebiased
//! to/from the f32 layout (bias 127) by hand. Encoding truncates toward zero:
//! finite values too large for the format saturate to a signed infinity,
//! values below the smallest subnormal become a signed zero.
//!
//! Brain float shares the f32 exponent range, so decoding is a 16-bit left
//! shift and encoding drops the low 16 mantissa bits. Kernels rely on the
//! truncating encoder; [`f32_to_bf16_rounded`] exists for callers that want
//! round-to-nearest-even instead.

use half::slice::HalfFloatSliceExt;
use half::{bf16, f16};

const F16_EXP_MASK: u16 = 0x7c00;
const F16_MANT_MASK: u16 = 0x03ff;
const F16_SIGN_MASK: u16 = 0x8000;
const F16_QUIET_BIT: u16 = 0x0200;
const BF16_QUIET_BIT: u16 = 0x0040;

/// Decodes an IEEE half-precision value.
///
/// Subnormals are renormalized into the f32 normal range; infinities and
/// NaNs keep their sign and mantissa payload.
#[inline]
pub fn f16_to_f32(h: f16) -> f32 {
    let h = h.to_bits();
    let sign = ((h & F16_SIGN_MASK) as u32) << 16;
    let exp = ((h & F16_EXP_MASK) >> 10) as u32;
    let mut mant = (h & F16_MANT_MASK) as u32;

    let bits = match exp {
        0 if mant == 0 => sign,
        0 => {
            // Shift the leading one up to the implicit-bit position.
            let mut e: i32 = 1;
            while mant & 0x0400 == 0 {
                mant <<= 1;
                e -= 1;
            }
            mant &= F16_MANT_MASK as u32;
            sign | (((e + 127 - 15) as u32) << 23) | (mant << 13)
        }
        0x1f => sign | 0x7f80_0000 | (mant << 13),
        _ => sign | ((exp + 127 - 15) << 23) | (mant << 13),
    };
    f32::from_bits(bits)
}

/// Encodes an `f32` as IEEE half precision, truncating toward zero.
#[inline]
pub fn f32_to_f16(x: f32) -> f16 {
    let bits = x.to_bits();
    let sign = ((bits >> 16) as u16) & F16_SIGN_MASK;
    let exp = ((bits >> 23) & 0xff) as i32;
    let mant = bits & 0x007f_ffff;

    if exp == 0xff {
        let payload = if mant != 0 {
            F16_QUIET_BIT | (mant >> 13) as u16
        } else {
            0
        };
        return f16::from_bits(sign | F16_EXP_MASK | payload);
    }

    let e = exp - 127 + 15;
    if e >= 0x1f {
        return f16::from_bits(sign | F16_EXP_MASK);
    }
    if e <= 0 {
        // Below the smallest subnormal the value flushes to a signed zero.
        if e < -10 {
            return f16::from_bits(sign);
        }
        let m = mant | 0x0080_0000;
        let shift = (14 - e) as u32;
        return f16::from_bits(sign | (m >> shift) as u16);
    }
    f16::from_bits(sign | ((e as u16) << 10) | (mant >> 13) as u16)
}

/// Decodes a brain float: the 16 bits become the high half of an f32.
#[inline(always)]
pub fn bf16_to_f32(b: bf16) -> f32 {
    f32::from_bits((b.to_bits() as u32) << 16)
}

/// Encodes an `f32` as brain float by dropping the low 16 mantissa bits.
///
/// NaNs whose payload lives entirely in the dropped bits are kept as a quiet
/// NaN instead of collapsing into an infinity.
#[inline(always)]
pub fn f32_to_bf16(x: f32) -> bf16 {
    let bits = x.to_bits();
    if x.is_nan() {
        return bf16::from_bits((bits >> 16) as u16 | BF16_QUIET_BIT);
    }
    bf16::from_bits((bits >> 16) as u16)
}

/// Encodes an `f32` as brain float with round-to-nearest-even.
#[inline]
pub fn f32_to_bf16_rounded(x: f32) -> bf16 {
    let bits = x.to_bits();
    if x.is_nan() {
        return bf16::from_bits((bits >> 16) as u16 | BF16_QUIET_BIT);
    }
    let lsb = (bits >> 16) & 1;
    let rounded = bits.wrapping_add(0x7fff + lsb);
    bf16::from_bits((rounded >> 16) as u16)
}

/// Bulk half-precision decode.
///
/// Uses `half`'s slice conversion, which lowers to the native conversion
/// instructions (F16C, NEON fp16) when the CPU has them. Results match
/// [`f16_to_f32`] for every non-NaN input.
///
/// # Panics
/// Panics if the slices differ in length.
pub fn decode_f16_slice(src: &[f16], dst: &mut [f32]) {
    assert_eq!(src.len(), dst.len(), "decode_f16_slice length mismatch");
    src.convert_to_f32_slice(dst);
}

/// Bulk half-precision encode with [`f32_to_f16`] semantics.
///
/// # Panics
/// Panics if the slices differ in length.
pub fn encode_f16_slice(src: &[f32], dst: &mut [f16]) {
    assert_eq!(src.len(), dst.len(), "encode_f16_slice length mismatch");
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = f32_to_f16(s);
    }
}

/// Bulk brain-float decode.
///
/// # Panics
/// Panics if the slices differ in length.
pub fn decode_bf16_slice(src: &[bf16], dst: &mut [f32]) {
    assert_eq!(src.len(), dst.len(), "decode_bf16_slice length mismatch");
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = bf16_to_f32(s);
    }
}

/// Bulk brain-float encode with truncation.
///
/// # Panics
/// Panics if the slices differ in length.
pub fn encode_bf16_slice(src: &[f32], dst: &mut [bf16]) {
    assert_eq!(src.len(), dst.len(), "encode_bf16_slice length mismatch");
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = f32_to_bf16(s);
    }
}
