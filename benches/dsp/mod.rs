//! Benchmarks for the DSP primitives and the assembled network.

mod delay;
mod fdn;
mod filter;

pub use delay::bench_delay;
pub use fdn::bench_fdn;
pub use filter::bench_filter;
