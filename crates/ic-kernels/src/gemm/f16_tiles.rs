//! 32x32 f16 tiles on the widening `fma16` instruction.

use std::cell::RefCell;

use half::f16;
use ic_tensor::convert::f32_to_f16;
use rayon::prelude::*;

use super::unit::MatrixUnit;
use super::assert_dims;
use crate::scratch::try_filled;

/// Rows and columns per tile.
pub const TILE: usize = 32;
/// Slices in flight in the accumulate loop.
const PIPELINE: usize = 4;
/// Problems under this many flops (2*m*n*k) stay single-threaded.
pub const MT_FLOP_THRESHOLD: usize = 1 << 22;

thread_local! {
    static PACK_A: RefCell<Vec<u16>> = const { RefCell::new(Vec::new()) };
}

/// Packs all of B into per-column-tile buffers. Tile `jt` occupies
/// `k * TILE` lanes; slice `p` holds row `p` of that tile's columns,
/// zero-padded past `n`.
fn pack_b(b: &[f16], k: usize, n: usize) -> Option<Vec<u16>> {
    let tiles_n = n.div_ceil(TILE);
    let mut packed = try_filled(tiles_n * k * TILE, 0u16)?;
    for (jt, tile) in packed.chunks_exact_mut(k * TILE).enumerate() {
        let col0 = jt * TILE;
        let cols = TILE.min(n - col0);
        for (p, slice) in tile.chunks_exact_mut(TILE).enumerate() {
            for (dst, src) in slice[..cols].iter_mut().zip(&b[p * n + col0..p * n + col0 + cols]) {
                *dst = src.to_bits();
            }
        }
    }
    Some(packed)
}

/// Packs rows `row0..row0 + rows` of A so that slice `p` holds column `p`
/// of the row tile, zero-padded past `rows`.
fn pack_a(a: &[f16], k: usize, row0: usize, rows: usize, dst: &mut [u16]) {
    for (p, slice) in dst.chunks_exact_mut(TILE).enumerate() {
        for (ii, lane) in slice.iter_mut().enumerate() {
            *lane = if ii < rows {
                a[(row0 + ii) * k + p].to_bits()
            } else {
                0
            };
        }
    }
}

#[inline]
fn slice(buf: &[u16], p: usize) -> &[u16] {
    &buf[p * TILE..(p + 1) * TILE]
}

/// Accumulates one 32x32 tile over all `k` slices. Requires `k > 0`.
///
/// Four slices are loaded up front into registers `0..4`; each step then
/// issues the multiply for slice `s` and reloads its register with slice
/// `s + 4`. The last four loaded slices are drained, and slices past the
/// last multiple of four go one at a time through register 0.
fn accumulate_tile(unit: &mut MatrixUnit, a_tile: &[u16], b_tile: &[u16], k: usize) {
    if k < PIPELINE {
        for s in 0..k {
            unit.load_x(0, slice(b_tile, s));
            unit.load_y(0, slice(a_tile, s));
            unit.fma16(0, 0, s == 0);
        }
        return;
    }

    let body = k / PIPELINE * PIPELINE;
    for s in 0..PIPELINE {
        unit.load_x(s, slice(b_tile, s));
        unit.load_y(s, slice(a_tile, s));
    }
    for s in 0..body - PIPELINE {
        let reg = s % PIPELINE;
        unit.fma16(reg, reg, s == 0);
        unit.load_x(reg, slice(b_tile, s + PIPELINE));
        unit.load_y(reg, slice(a_tile, s + PIPELINE));
    }
    for s in body - PIPELINE..body {
        let reg = s % PIPELINE;
        unit.fma16(reg, reg, s == 0);
    }
    for s in body..k {
        unit.load_x(0, slice(b_tile, s));
        unit.load_y(0, slice(a_tile, s));
        unit.fma16(0, 0, false);
    }
}

/// Computes the output rows in `c_rows` (starting at A row `row0`) against
/// every column tile of the packed B.
#[allow(clippy::too_many_arguments)]
fn row_tile(
    unit: &mut MatrixUnit,
    a: &[f16],
    packed_b: &[u16],
    a_buf: &mut [u16],
    c_rows: &mut [f16],
    row0: usize,
    k: usize,
    n: usize,
) {
    let rows = c_rows.len() / n;
    pack_a(a, k, row0, rows, a_buf);
    for (jt, b_tile) in packed_b.chunks_exact(k * TILE).enumerate() {
        accumulate_tile(unit, a_buf, b_tile, k);
        let col0 = jt * TILE;
        let cols = TILE.min(n - col0);
        for ii in 0..rows {
            let dst = &mut c_rows[ii * n + col0..ii * n + col0 + cols];
            for (jj, o) in dst.iter_mut().enumerate() {
                *o = f32_to_f16(unit.tile16(ii, jj));
            }
        }
    }
}

/// Handles the degenerate shapes; returns true when nothing is left to do.
fn trivial(c: &mut [f16], m: usize, k: usize, n: usize) -> bool {
    if m == 0 || n == 0 {
        return true;
    }
    if k == 0 {
        c.fill(f16::ZERO);
        return true;
    }
    false
}

fn run_single(a: &[f16], packed_b: &[u16], c: &mut [f16], k: usize, n: usize) {
    let Some(mut a_buf) = try_filled(k * TILE, 0u16) else {
        return;
    };
    let mut unit = MatrixUnit::new();
    for (it, c_rows) in c.chunks_mut(TILE * n).enumerate() {
        row_tile(&mut unit, a, packed_b, &mut a_buf, c_rows, it * TILE, k, n);
    }
}

/// `C[m, n] = A[m, k] @ B[k, n]` in f16, row-major, accumulated in f32.
///
/// B is packed once per call and shared by every row tile. Partial edge
/// tiles are zero-padded on pack and clipped on store; outputs are encoded
/// with [`f32_to_f16`]. The result is bit-identical to
/// [`crate::matmul::matmul_reference`]. Leaves `c` untouched if scratch
/// allocation fails.
///
/// # Panics
/// Panics if a slice length disagrees with `m`, `k`, `n`.
pub fn gemm_f16(a: &[f16], b: &[f16], c: &mut [f16], m: usize, k: usize, n: usize) {
    assert_dims(a, b, c, m, k, n);
    if trivial(c, m, k, n) {
        return;
    }
    let Some(packed_b) = pack_b(b, k, n) else {
        return;
    };
    run_single(a, &packed_b, c, k, n);
}

/// Row tiles handed to one task: several tasks per thread once there is
/// enough work to balance, one per thread otherwise.
fn tiles_per_task(row_tiles: usize, threads: usize) -> usize {
    let tasks = if row_tiles >= 8 * threads {
        4 * threads
    } else {
        threads
    };
    row_tiles.div_ceil(tasks).max(1)
}

fn with_pack_buffer<R>(len: usize, f: impl FnOnce(&mut [u16]) -> R) -> Option<R> {
    PACK_A.with(|cell| {
        let mut buf = cell.borrow_mut();
        if buf.len() < len {
            let extra = len - buf.len();
            if buf.try_reserve_exact(extra).is_err() {
                log::warn!("gemm_f16: packing buffer of {} lanes unavailable", len);
                return None;
            }
            buf.resize(len, 0);
        }
        Some(f(&mut buf[..len]))
    })
}

/// Multi-threaded [`gemm_f16`].
///
/// Row-tile groups are distributed over a rayon pool of `threads` workers
/// that is built and joined within the call; each worker packs A into a
/// thread-local buffer reused across its tiles. Small problems (under
/// [`MT_FLOP_THRESHOLD`]), a single row tile, or `threads <= 1` run on the
/// calling thread. Output is identical for every thread count.
///
/// # Panics
/// Panics if a slice length disagrees with `m`, `k`, `n`.
pub fn gemm_f16_mt(
    a: &[f16],
    b: &[f16],
    c: &mut [f16],
    m: usize,
    k: usize,
    n: usize,
    threads: usize,
) {
    assert_dims(a, b, c, m, k, n);
    if trivial(c, m, k, n) {
        return;
    }
    let row_tiles = m.div_ceil(TILE);
    let flops = m.saturating_mul(n).saturating_mul(k).saturating_mul(2);
    let Some(packed_b) = pack_b(b, k, n) else {
        return;
    };
    if threads <= 1 || row_tiles < 2 || flops < MT_FLOP_THRESHOLD {
        run_single(a, &packed_b, c, k, n);
        return;
    }

    let group = tiles_per_task(row_tiles, threads);
    log::debug!(
        "gemm_f16_mt: {}x{}x{} on {} threads, {} row tiles per task",
        m,
        n,
        k,
        threads,
        group
    );
    let packed_b = packed_b.as_slice();
    let built = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_scoped(
            |thread| thread.run(),
            |pool| {
                pool.install(|| {
                    c.par_chunks_mut(group * TILE * n)
                        .enumerate()
                        .for_each(|(g, c_group)| {
                            let mut unit = MatrixUnit::new();
                            with_pack_buffer(k * TILE, |a_buf| {
                                for (t, c_rows) in c_group.chunks_mut(TILE * n).enumerate() {
                                    let row0 = (g * group + t) * TILE;
                                    row_tile(&mut unit, a, packed_b, a_buf, c_rows, row0, k, n);
                                }
                            });
                        });
                });
            },
        );
    if let Err(err) = built {
        log::warn!("gemm_f16_mt: thread pool unavailable ({}), running single-threaded", err);
        run_single(a, packed_b, c, k, n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matmul::matmul_reference;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_f16(len: usize, rng: &mut StdRng) -> Vec<f16> {
        (0..len).map(|_| f16::from_f32(rng.gen_range(-1.0f32..1.0))).collect()
    }

    fn bits(v: &[f16]) -> Vec<u16> {
        v.iter().map(|x| x.to_bits()).collect()
    }

    fn check(m: usize, k: usize, n: usize, seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        let a = random_f16(m * k, &mut rng);
        let b = random_f16(k * n, &mut rng);
        let mut expected = vec![f16::ZERO; m * n];
        matmul_reference(&a, &b, &mut expected, m, k, n);
        let mut c = vec![f16::from_f32(9.0); m * n];
        gemm_f16(&a, &b, &mut c, m, k, n);
        assert_eq!(bits(&c), bits(&expected), "m={} k={} n={}", m, k, n);
    }

    #[test]
    fn test_square_sizes_match_reference() {
        for (i, s) in [1, 5, 32, 33, 65].into_iter().enumerate() {
            check(s, s, s, i as u64);
        }
    }

    #[test]
    fn test_rectangular_and_pipeline_remainders() {
        // k = 3 skips the pipeline; 4, 7 and 9 exercise prime, drain and tail.
        for k in [1, 3, 4, 7, 8, 9, 70] {
            check(40, k, 17, 100 + k as u64);
        }
        check(3, 64, 70, 7);
        check(70, 2, 3, 8);
    }

    #[test]
    fn test_zero_k_writes_zeros() {
        let mut c = vec![f16::ONE; 6];
        gemm_f16(&[], &[], &mut c, 2, 0, 3);
        assert!(c.iter().all(|v| v.to_bits() == 0));
    }

    #[test]
    fn test_known_product() {
        let a: Vec<f16> = [1.0f32, 2.0, 3.0, 4.0].iter().map(|&v| f16::from_f32(v)).collect();
        let b: Vec<f16> = [5.0f32, 6.0, 7.0, 8.0].iter().map(|&v| f16::from_f32(v)).collect();
        let mut c = vec![f16::ZERO; 4];
        gemm_f16(&a, &b, &mut c, 2, 2, 2);
        let out: Vec<f32> = c.iter().map(|v| v.to_f32()).collect();
        assert_eq!(out, vec![19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_multithreaded_matches_single() {
        let (m, k, n) = (200, 96, 130);
        let mut rng = StdRng::seed_from_u64(42);
        let a = random_f16(m * k, &mut rng);
        let b = random_f16(k * n, &mut rng);
        let mut single = vec![f16::ZERO; m * n];
        gemm_f16(&a, &b, &mut single, m, k, n);
        assert!(2 * m * n * k >= MT_FLOP_THRESHOLD);
        for threads in [1, 2, 3, 8] {
            let mut c = vec![f16::ZERO; m * n];
            gemm_f16_mt(&a, &b, &mut c, m, k, n, threads);
            assert_eq!(bits(&c), bits(&single), "threads = {}", threads);
        }
    }

    #[test]
    fn test_multithreaded_small_problem() {
        let mut rng = StdRng::seed_from_u64(3);
        let a = random_f16(33 * 33, &mut rng);
        let b = random_f16(33 * 33, &mut rng);
        let mut expected = vec![f16::ZERO; 33 * 33];
        matmul_reference(&a, &b, &mut expected, 33, 33, 33);
        let mut c = vec![f16::ZERO; 33 * 33];
        gemm_f16_mt(&a, &b, &mut c, 33, 33, 33, 4);
        assert_eq!(bits(&c), bits(&expected));
    }

    #[test]
    fn test_tiles_per_task() {
        assert_eq!(tiles_per_task(2, 4), 1);
        assert_eq!(tiles_per_task(7, 2), 4);
        assert_eq!(tiles_per_task(64, 4), 4);
        assert_eq!(tiles_per_task(100, 2), 13);
    }
}
