//! Software model of a register-file matrix unit.
//!
//! The unit has eight X and eight Y operand registers of 64 bytes each and a
//! Z accumulator of 64 rows x 64 bytes (16 f32 lanes per row). Operand
//! registers are untyped; the instruction decides whether they hold 32 f16
//! or 16 f32 lanes.
//!
//! `fma16` is the widening f16 instruction: it forms the 32x32 outer product
//! `Y[i] * X[j]` in f32 and accumulates it into Z in paired-row order, entry
//! `(i, j)` living at `Z[2i + (j & 1)][j >> 1]`. Stores must de-interleave.
//! `fma32` forms a 16x16 f32 outer product at `Z[i][j]`.
//!
//! Products and sums are plain f32 operations (no fused multiply-add), so a
//! tile accumulated slice by slice reproduces a sequential dot product bit
//! for bit.

use half::f16;
use ic_tensor::convert::f16_to_f32;

/// Bytes in one operand register.
pub const REG_BYTES: usize = 64;
/// Operand registers per side.
pub const REGS: usize = 8;
/// f16 lanes per operand register.
pub const F16_LANES: usize = REG_BYTES / 2;
/// f32 lanes per operand register and per accumulator row.
pub const F32_LANES: usize = REG_BYTES / 4;
/// Accumulator rows.
pub const Z_ROWS: usize = 64;

type Register = [u32; F32_LANES];

pub struct MatrixUnit {
    x: [Register; REGS],
    y: [Register; REGS],
    z: [[f32; F32_LANES]; Z_ROWS],
}

impl Default for MatrixUnit {
    fn default() -> Self {
        Self::new()
    }
}

impl MatrixUnit {
    pub fn new() -> Self {
        Self {
            x: [[0; F32_LANES]; REGS],
            y: [[0; F32_LANES]; REGS],
            z: [[0.0; F32_LANES]; Z_ROWS],
        }
    }

    fn load(reg: &mut Register, src: &[u16]) {
        let lanes: &mut [u16; F16_LANES] = bytemuck::cast_mut(reg);
        lanes.copy_from_slice(src);
    }

    fn load32(reg: &mut Register, src: &[f32]) {
        let lanes: &mut [f32; F32_LANES] = bytemuck::cast_mut(reg);
        lanes.copy_from_slice(src);
    }

    /// Loads 32 f16 bit patterns into X register `reg`.
    ///
    /// # Panics
    /// Panics unless `src.len() == 32` and `reg < 8`.
    pub fn load_x(&mut self, reg: usize, src: &[u16]) {
        Self::load(&mut self.x[reg], src);
    }

    /// Loads 32 f16 bit patterns into Y register `reg`.
    pub fn load_y(&mut self, reg: usize, src: &[u16]) {
        Self::load(&mut self.y[reg], src);
    }

    /// Loads 16 f32 lanes into X register `reg`.
    pub fn load_x32(&mut self, reg: usize, src: &[f32]) {
        Self::load32(&mut self.x[reg], src);
    }

    /// Loads 16 f32 lanes into Y register `reg`.
    pub fn load_y32(&mut self, reg: usize, src: &[f32]) {
        Self::load32(&mut self.y[reg], src);
    }

    /// Widening f16 outer product of Y `yr` and X `xr` into all of Z.
    /// `first` clears the accumulator before adding.
    pub fn fma16(&mut self, xr: usize, yr: usize, first: bool) {
        if first {
            self.clear();
        }
        let xs: &[u16; F16_LANES] = bytemuck::cast_ref(&self.x[xr]);
        let ys: &[u16; F16_LANES] = bytemuck::cast_ref(&self.y[yr]);
        let mut xv = [0.0f32; F16_LANES];
        for (d, &bits) in xv.iter_mut().zip(xs.iter()) {
            *d = f16_to_f32(f16::from_bits(bits));
        }
        for (i, &ybits) in ys.iter().enumerate() {
            let yv = f16_to_f32(f16::from_bits(ybits));
            let (even, odd) = self.z[2 * i..2 * i + 2].split_at_mut(1);
            for c in 0..F32_LANES {
                even[0][c] += yv * xv[2 * c];
                odd[0][c] += yv * xv[2 * c + 1];
            }
        }
    }

    /// f32 outer product of Y `yr` and X `xr` into Z rows 0..16.
    pub fn fma32(&mut self, xr: usize, yr: usize, first: bool) {
        if first {
            for row in &mut self.z[..F32_LANES] {
                row.fill(0.0);
            }
        }
        let xv: &[f32; F32_LANES] = bytemuck::cast_ref(&self.x[xr]);
        let yv: &[f32; F32_LANES] = bytemuck::cast_ref(&self.y[yr]);
        for (row, &y) in self.z[..F32_LANES].iter_mut().zip(yv.iter()) {
            for (z, &x) in row.iter_mut().zip(xv.iter()) {
                *z += y * x;
            }
        }
    }

    /// Zeroes the accumulator.
    pub fn clear(&mut self) {
        for row in &mut self.z {
            row.fill(0.0);
        }
    }

    /// Raw accumulator row.
    pub fn z_row(&self, row: usize) -> &[f32; F32_LANES] {
        &self.z[row]
    }

    /// Element `(i, j)` of the 32x32 tile produced by [`Self::fma16`].
    #[inline]
    pub fn tile16(&self, i: usize, j: usize) -> f32 {
        self.z[2 * i + (j & 1)][j >> 1]
    }

    /// Element `(i, j)` of the 16x16 tile produced by [`Self::fma32`].
    #[inline]
    pub fn tile32(&self, i: usize, j: usize) -> f32 {
        self.z[i][j]
    }
}
