use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mdstream_core::layout::Float4;
use mdstream_core::{compare_streams, Device};

const SIZES: [usize; 4] = [1_024, 10_000, 100_000, 1_000_000];

fn benchmark_collapse(c: &mut Criterion) {
    let mut group = c.benchmark_group("collapse_8_to_1");
    let device = Device::cpu();

    for size in SIZES.iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &n| {
            let length = n / 8;
            let mut force = device.stream::<Float4>(length, 8, "force4").unwrap();
            for (i, v) in force.as_mut_slice().iter_mut().enumerate() {
                *v = Float4::new(i as f32, 0.0, 0.0, 0.0);
            }

            b.iter(|| {
                // expand back out so every iteration reshapes 8 buffers into 1
                force.collapse(1, 1).unwrap();
                force.collapse(8, 1).unwrap();
                black_box(force.stride());
            });
        });
    }

    group.finish();
}

fn benchmark_transfer(c: &mut Criterion) {
    let mut group = c.benchmark_group("upload_download");
    let device = Device::cpu();

    for size in SIZES.iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &n| {
            let mut posq = device.stream::<Float4>(n, 1, "posq").unwrap();
            posq.fill(Float4::new(1.0, 2.0, 3.0, -0.5));

            b.iter(|| {
                posq.upload().unwrap();
                posq.download().unwrap();
                black_box(posq.size_bytes());
            });
        });
    }

    group.finish();
}

fn benchmark_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("compare_streams");
    let device = Device::cpu();

    for size in SIZES.iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &n| {
            let mut reference = device.stream::<f32>(n / 4, 4, "reference").unwrap();
            let mut result = device.stream::<f32>(n / 4, 4, "result").unwrap();
            for (i, v) in reference.as_mut_slice().iter_mut().enumerate() {
                *v = (i as f32).sin();
            }
            result.as_mut_slice().copy_from_slice(reference.as_slice());

            b.iter(|| {
                let cmp = compare_streams(&reference, &result, 1e-5, 0).unwrap();
                black_box(cmp.max_error);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_collapse, benchmark_transfer, benchmark_compare);
criterion_main!(benches);
