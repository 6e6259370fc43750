//! Benchmarks for the full network.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use fdn_verb::dsp::matrix::householder;
use fdn_verb::{FdnConfig, FdnReverb, NetworkOrder};

use crate::BLOCK_SIZES;

pub fn bench_fdn(c: &mut Criterion) {
    for order in NetworkOrder::ALL {
        let n = order.get();
        let mut group = c.benchmark_group(format!("fdn/order_{}", n));

        for &size in BLOCK_SIZES {
            let input: Vec<f32> = (0..size)
                .map(|i| {
                    if i < 10 {
                        1.0 - (i as f32 / 10.0)
                    } else {
                        (i as f32 * 0.05).sin() * 0.1
                    }
                })
                .collect();

            let config = FdnConfig::default().with_order(order).with_seed(1);
            let Ok(mut fdn) = FdnReverb::new(config) else {
                continue;
            };
            if fdn.set_matrix(&householder(n)).is_err() {
                continue;
            }

            let mut left = input.clone();
            let mut right = input.clone();
            group.bench_with_input(BenchmarkId::new("stereo_block", size), &size, |b, _| {
                b.iter(|| {
                    left.copy_from_slice(&input);
                    right.copy_from_slice(&input);
                    let mut buffers = [left.as_mut_slice(), right.as_mut_slice()];
                    fdn.process_block(black_box(&mut buffers));
                })
            });
        }

        group.finish();
    }
}
