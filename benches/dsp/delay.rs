//! Benchmarks for delay line operations.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use fdn_verb::dsp::delay::DelayLine;

use crate::BLOCK_SIZES;

pub fn bench_delay(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/delay");

    let delay_times: &[f32] = &[
        241.0,   // shortest default prime at 48kHz
        959.5,   // fractional, near the 20ms bound
        4800.25, // 100ms
    ];

    for &size in BLOCK_SIZES {
        let input: Vec<f32> = (0..size).map(|i| (i as f32 * 0.1).sin()).collect();

        for &delay_samples in delay_times {
            let mut delay = DelayLine::new(8192);
            delay.set_delay(delay_samples);
            group.bench_with_input(
                BenchmarkId::new(format!("fixed_{}", delay_samples), size),
                &size,
                |b, _| {
                    b.iter(|| {
                        let mut sum = 0.0f32;
                        for &sample in &input {
                            sum += delay.next_sample(black_box(sample));
                        }
                        sum
                    })
                },
            );
        }

        // Delay length changes every sample, as under modulation
        let mut delay = DelayLine::new(8192);
        group.bench_with_input(BenchmarkId::new("modulated", size), &size, |b, _| {
            b.iter(|| {
                let mut sum = 0.0f32;
                for (i, &sample) in input.iter().enumerate() {
                    delay.set_delay(480.0 + (i as f32 * 0.01).sin() * 6.0);
                    sum += delay.next_sample(black_box(sample));
                }
                sum
            })
        });
    }

    group.finish();
}
