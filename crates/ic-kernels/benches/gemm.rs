use std::time::Duration;

use criterion::measurement::WallTime;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkGroup, Criterion, Throughput};
use half::{bf16, f16};
use ic_kernels::matmul::matmul_vectorized;
use ic_kernels::{available_threads, gemm_bf16, gemm_bf16_mt, gemm_f16, gemm_f16_mt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SIZES: [usize; 3] = [64, 256, 512];

fn configure_group(group: &mut BenchmarkGroup<'_, WallTime>) {
    group.sample_size(10);
    group.warm_up_time(Duration::from_millis(500));
    group.measurement_time(Duration::from_secs(2));
}

fn random_f32(len: usize, rng: &mut StdRng) -> Vec<f32> {
    (0..len).map(|_| rng.gen_range(-1.0f32..1.0)).collect()
}

fn bench_gemm_f16(c: &mut Criterion) {
    let mut group = c.benchmark_group("gemm_f16");
    configure_group(&mut group);
    let threads = available_threads();
    let mut rng = StdRng::seed_from_u64(0);

    for &s in &SIZES {
        let a: Vec<f16> = random_f32(s * s, &mut rng).into_iter().map(f16::from_f32).collect();
        let b: Vec<f16> = random_f32(s * s, &mut rng).into_iter().map(f16::from_f32).collect();
        let mut out = vec![f16::ZERO; s * s];
        group.throughput(Throughput::Elements((2 * s * s * s) as u64));

        group.bench_function(format!("tiled_{s}"), |bch| {
            bch.iter(|| gemm_f16(black_box(&a), black_box(&b), &mut out, s, s, s))
        });
        group.bench_function(format!("tiled_mt{threads}_{s}"), |bch| {
            bch.iter(|| gemm_f16_mt(black_box(&a), black_box(&b), &mut out, s, s, s, threads))
        });
        group.bench_function(format!("vectorized_{s}"), |bch| {
            bch.iter(|| matmul_vectorized(black_box(&a), black_box(&b), &mut out, s, s, s))
        });
    }
    group.finish();
}

fn bench_gemm_bf16(c: &mut Criterion) {
    let mut group = c.benchmark_group("gemm_bf16");
    configure_group(&mut group);
    let threads = available_threads();
    let mut rng = StdRng::seed_from_u64(1);

    for &s in &SIZES {
        let a: Vec<bf16> = random_f32(s * s, &mut rng).into_iter().map(bf16::from_f32).collect();
        let b: Vec<bf16> = random_f32(s * s, &mut rng).into_iter().map(bf16::from_f32).collect();
        let mut out = vec![bf16::ZERO; s * s];
        group.throughput(Throughput::Elements((2 * s * s * s) as u64));

        group.bench_function(format!("tiled_{s}"), |bch| {
            bch.iter(|| gemm_bf16(black_box(&a), black_box(&b), &mut out, s, s, s))
        });
        group.bench_function(format!("tiled_mt{threads}_{s}"), |bch| {
            bch.iter(|| gemm_bf16_mt(black_box(&a), black_box(&b), &mut out, s, s, s, threads))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_gemm_f16, bench_gemm_bf16);
criterion_main!(benches);
