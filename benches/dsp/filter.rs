//! Benchmarks for the decay shelving filters.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use fdn_verb::dsp::filter::ShelfFilter;

use crate::BLOCK_SIZES;

pub fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/filter");
    let sample_rate = 48_000.0;

    for &size in BLOCK_SIZES {
        let input: Vec<f32> = (0..size).map(|i| (i as f32 * 0.1).sin()).collect();

        let mut shelf = ShelfFilter::new();
        shelf.update_low_shelf(2.0, 400.0, 241.0, sample_rate);
        let mut buffer = input.clone();
        group.bench_with_input(BenchmarkId::new("low_shelf", size), &size, |b, _| {
            b.iter(|| {
                buffer.copy_from_slice(&input);
                shelf.render(black_box(&mut buffer));
            })
        });

        // Three shelves in series, as on every line
        let mut low = ShelfFilter::new();
        let mut high = ShelfFilter::new();
        let mut end = ShelfFilter::new();
        low.update_low_shelf(2.0, 400.0, 241.0, sample_rate);
        high.update_high_shelf(0.5, 2500.0, 241.0, sample_rate);
        end.update_high_shelf(0.5, 20_200.0, 241.0, sample_rate);
        group.bench_with_input(BenchmarkId::new("line_chain", size), &size, |b, _| {
            b.iter(|| {
                let mut sum = 0.0f32;
                for &sample in &input {
                    let x = low.process_sample(black_box(sample));
                    let x = high.process_sample(x);
                    sum += end.process_sample(x);
                }
                sum
            })
        });

        // Coefficient recompute, done on every delay or decay change
        group.bench_function(BenchmarkId::new("update_coefficients", size), |b| {
            b.iter(|| {
                for i in 0..size {
                    shelf.update_low_shelf(black_box(1.5), 400.0, 241.0 + i as f32, sample_rate);
                }
            })
        });
    }

    group.finish();
}
