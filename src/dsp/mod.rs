//! Low-level DSP primitives used by the reverb engine.
//!
//! These components are allocation-free once constructed and realtime-safe,
//! so the engine can pre-allocate them for the largest network and drive them
//! straight from the audio callback. They stay focused on the signal math;
//! the `fdn` module layers on orchestration and reconfiguration.

/// Fractional delay line with Lagrange interpolation.
pub mod delay;
/// Decay-time shelving filters.
pub mod filter;
/// Sine LFO that modulates delay lengths.
pub mod lfo;
/// Feedback mixing matrix and lossless constructors.
pub mod matrix;
/// Prime delay-length search.
pub mod primes;
/// Linear parameter ramps.
pub mod smoothing;

pub use matrix::MatrixTopology;
