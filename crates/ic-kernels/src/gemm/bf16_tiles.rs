//! 16x16 bf16 tiles. The unit has no bf16 instruction, so both operands are
//! widened to f32 on pack and multiplied with `fma32`.

use half::bf16;
use ic_tensor::convert::{bf16_to_f32, f32_to_bf16};

use super::assert_dims;
use super::unit::MatrixUnit;

/// Rows, columns and K-depth per tile.
pub const TILE: usize = 16;

/// Computes rows `row0..row0 + c_rows.len() / n` of the product.
fn compute_rows(a: &[bf16], b: &[bf16], c_rows: &mut [bf16], row0: usize, k: usize, n: usize) {
    let rows_total = c_rows.len() / n;
    let mut unit = MatrixUnit::new();
    // Slice-major: lane `ii` of slice `kk` is A[row0 + ii][k0 + kk].
    let mut a_pack = [[0.0f32; TILE]; TILE];
    // Lane `jj` of slice `kk` is B[k0 + kk][col0 + jj].
    let mut b_pack = [[0.0f32; TILE]; TILE];

    for r0 in (0..rows_total).step_by(TILE) {
        let rows = TILE.min(rows_total - r0);
        for col0 in (0..n).step_by(TILE) {
            let cols = TILE.min(n - col0);
            for k0 in (0..k).step_by(TILE) {
                let depth = TILE.min(k - k0);
                for (kk, slice) in a_pack[..depth].iter_mut().enumerate() {
                    for (ii, lane) in slice.iter_mut().enumerate() {
                        *lane = if ii < rows {
                            bf16_to_f32(a[(row0 + r0 + ii) * k + k0 + kk])
                        } else {
                            0.0
                        };
                    }
                }
                for (kk, slice) in b_pack[..depth].iter_mut().enumerate() {
                    let src = &b[(k0 + kk) * n + col0..(k0 + kk) * n + col0 + cols];
                    for (lane, &v) in slice.iter_mut().zip(src) {
                        *lane = bf16_to_f32(v);
                    }
                    slice[cols..].fill(0.0);
                }
                for kk in 0..depth {
                    unit.load_x32(0, &b_pack[kk]);
                    unit.load_y32(0, &a_pack[kk]);
                    unit.fma32(0, 0, k0 + kk == 0);
                }
            }
            for ii in 0..rows {
                let base = (r0 + ii) * n + col0;
                for (jj, o) in c_rows[base..base + cols].iter_mut().enumerate() {
                    *o = f32_to_bf16(unit.tile32(ii, jj));
                }
            }
        }
    }
}

fn trivial(c: &mut [bf16], m: usize, k: usize, n: usize) -> bool {
    if m == 0 || n == 0 {
        return true;
    }
    if k == 0 {
        c.fill(bf16::ZERO);
        return true;
    }
    false
}

/// `C[m, n] = A[m, k] @ B[k, n]` in bf16, row-major, accumulated in f32.
///
/// Stores truncate f32 to bf16 (no rounding), matching
/// [`Element::from_f32`](ic_tensor::Element::from_f32) for bf16, so the
/// result is bit-identical to [`crate::matmul::matmul_reference`].
///
/// # Panics
/// Panics if a slice length disagrees with `m`, `k`, `n`.
pub fn gemm_bf16(a: &[bf16], b: &[bf16], c: &mut [bf16], m: usize, k: usize, n: usize) {
    assert_dims(a, b, c, m, k, n);
    if trivial(c, m, k, n) {
        return;
    }
    compute_rows(a, b, c, 0, k, n);
}

/// Multi-threaded [`gemm_bf16`]: rows are split statically into
/// `threads` contiguous ranges, each a multiple of 16 rows, and every range
/// runs on its own scoped thread.
///
/// # Panics
/// Panics if a slice length disagrees with `m`, `k`, `n`.
pub fn gemm_bf16_mt(
    a: &[bf16],
    b: &[bf16],
    c: &mut [bf16],
    m: usize,
    k: usize,
    n: usize,
    threads: usize,
) {
    assert_dims(a, b, c, m, k, n);
    if trivial(c, m, k, n) {
        return;
    }
    let rows_per_thread = m.div_ceil(threads.max(1)).next_multiple_of(TILE);
    if threads <= 1 || rows_per_thread >= m {
        compute_rows(a, b, c, 0, k, n);
        return;
    }

    log::debug!(
        "gemm_bf16_mt: {}x{}x{}, {} rows per thread",
        m,
        n,
        k,
        rows_per_thread
    );
    std::thread::scope(|s| {
        for (t, c_rows) in c.chunks_mut(rows_per_thread * n).enumerate() {
            s.spawn(move || compute_rows(a, b, c_rows, t * rows_per_thread, k, n));
        }
    });
}
