//! Per-band decay analysis of a rendered impulse response.
//!
//! The response is cut into Hann-windowed frames and each frame's power is
//! summed over a frequency band. Backward (Schroeder) integration of those
//! band energies gives a smooth decay curve; the −5 dB to −35 dB span of that
//! curve is extrapolated to a 60 dB decay time.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

const FRAME_LEN: usize = 2048;
const HOP: usize = 512;

/// Frequency band to report, `[low_hz, high_hz)`.
#[derive(Debug, Clone, Copy)]
pub struct Band {
    pub name: &'static str,
    pub low_hz: f32,
    pub high_hz: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct BandDecay {
    pub band: Band,
    /// Estimated T60 in seconds, `None` if the response never fell 35 dB.
    pub t60: Option<f32>,
}

pub struct DecayAnalyzer {
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
    sample_rate: f32,
}

impl DecayAnalyzer {
    pub fn new(sample_rate: f32) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(FRAME_LEN);
        let denom = (FRAME_LEN - 1) as f32;
        let window = (0..FRAME_LEN)
            .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / denom).cos()))
            .collect();

        Self {
            window,
            fft,
            scratch: vec![Complex::new(0.0, 0.0); FRAME_LEN],
            sample_rate,
        }
    }

    pub fn analyze(&mut self, response: &[f32], bands: &[Band]) -> Vec<BandDecay> {
        let energies = self.band_energies(response, bands);
        bands
            .iter()
            .zip(energies)
            .map(|(&band, frames)| BandDecay {
                band,
                t60: self.schroeder_t60(&frames),
            })
            .collect()
    }

    /// Energy per frame for each band.
    fn band_energies(&mut self, response: &[f32], bands: &[Band]) -> Vec<Vec<f64>> {
        let bin_hz = self.sample_rate / FRAME_LEN as f32;
        let half = FRAME_LEN / 2;
        let ranges: Vec<(usize, usize)> = bands
            .iter()
            .map(|b| {
                let lo = ((b.low_hz / bin_hz).ceil() as usize).min(half);
                let hi = ((b.high_hz / bin_hz).ceil() as usize).clamp(lo, half);
                (lo, hi)
            })
            .collect();

        let mut energies = vec![Vec::new(); bands.len()];
        let mut start = 0;
        while start < response.len() {
            for (i, slot) in self.scratch.iter_mut().enumerate() {
                let sample = response.get(start + i).copied().unwrap_or(0.0);
                *slot = Complex::new(sample * self.window[i], 0.0);
            }
            self.fft.process(&mut self.scratch);

            for (band, &(lo, hi)) in energies.iter_mut().zip(&ranges) {
                let power: f64 = self.scratch[lo..hi]
                    .iter()
                    .map(|c| (c.re * c.re + c.im * c.im) as f64)
                    .sum();
                band.push(power);
            }
            start += HOP;
        }
        energies
    }

    fn schroeder_t60(&self, frames: &[f64]) -> Option<f32> {
        let mut tail = vec![0.0f64; frames.len()];
        let mut acc = 0.0;
        for (i, &e) in frames.iter().enumerate().rev() {
            acc += e;
            tail[i] = acc;
        }
        let total = *tail.first()?;
        if total <= 0.0 {
            return None;
        }

        let level_db = |i: usize| 10.0 * (tail[i] / total).max(1e-30).log10();
        let t5 = (0..tail.len()).find(|&i| level_db(i) <= -5.0)?;
        let t35 = (t5..tail.len()).find(|&i| level_db(i) <= -35.0)?;

        let seconds = (t35 - t5) as f32 * HOP as f32 / self.sample_rate;
        Some(2.0 * seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn test_exponential_decay_is_measured() {
        let sample_rate = 48_000.0;
        let t60 = 0.8f32;
        // Noise shaped by exp decay reaching -60 dB at t60.
        let mut rng = StdRng::seed_from_u64(12345);
        let response: Vec<f32> = (0..(2.0 * sample_rate) as usize)
            .map(|n| {
                let noise: f32 = rng.random_range(-1.0..1.0);
                let t = n as f32 / sample_rate;
                noise * 10f32.powf(-3.0 * t / t60)
            })
            .collect();

        let band = Band {
            name: "full",
            low_hz: 100.0,
            high_hz: 10_000.0,
        };
        let mut analyzer = DecayAnalyzer::new(sample_rate);
        let report = analyzer.analyze(&response, &[band]);
        let measured = report[0].t60.expect("decay found");
        assert!((measured - t60).abs() < 0.1, "measured {}", measured);
    }
}
