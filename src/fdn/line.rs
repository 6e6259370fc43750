use crate::dsp::{delay::DelayLine, filter::ShelfFilter, lfo::SineLfo, smoothing::LinearSmoother};

use super::config::FilterParams;

/// Fixed safety roll-off that sits after the user's high shelf.
pub const END_SHELF_HZ: f32 = 20_200.0;

/// The end shelf is pulled below Nyquist at low sample rates.
const END_SHELF_MAX_RATIO: f32 = 0.49;

/// Time for a delay line to glide to a new length.
pub const DELAY_RAMP_SECONDS: f32 = 0.05;

/// Per-channel signal state of one line: its history and filter memory.
pub(crate) struct LineTap {
    pub delay: DelayLine,
    pub low_shelf: ShelfFilter,
    pub high_shelf: ShelfFilter,
    pub end_shelf: ShelfFilter,
}

impl LineTap {
    fn new(capacity: usize) -> Self {
        Self {
            delay: DelayLine::new(capacity),
            low_shelf: ShelfFilter::new(),
            high_shelf: ShelfFilter::new(),
            end_shelf: ShelfFilter::new(),
        }
    }

    /// Delay, then low shelf, high shelf and end shelf, in that order.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.delay.push(input);
        let delayed = self.delay.pop();
        let low = self.low_shelf.process_sample(delayed);
        let high = self.high_shelf.process_sample(low);
        self.end_shelf.process_sample(high)
    }

    fn reset(&mut self) {
        self.delay.reset();
        self.low_shelf.reset();
        self.high_shelf.reset();
        self.end_shelf.reset();
    }
}

/// One feedback path of the network.
///
/// Gains, nominal length and modulation are shared by every channel; each
/// channel keeps its own [`LineTap`].
pub(crate) struct FdnLine {
    pub taps: Vec<LineTap>,
    pub lfo: SineLfo,
    pub smoother: LinearSmoother,
    /// Nominal (unmodulated) length in samples.
    pub length: u32,
    pub input_gain: f32,
    pub output_gain: f32,
    pub mod_depth: f32,
}

impl FdnLine {
    pub fn new(channels: usize, capacity: usize, sample_rate: f32, lfo_rate: f32) -> Self {
        Self {
            taps: (0..channels).map(|_| LineTap::new(capacity)).collect(),
            lfo: SineLfo::new(lfo_rate, sample_rate),
            smoother: LinearSmoother::new(0.0, DELAY_RAMP_SECONDS, sample_rate),
            length: 0,
            input_gain: 0.0,
            output_gain: 0.0,
            mod_depth: 0.0,
        }
    }

    pub fn set_delay(&mut self, delay_samples: f32) {
        for tap in &mut self.taps {
            tap.delay.set_delay(delay_samples);
        }
    }

    /// Jump straight to `length` samples, cancelling any ramp.
    pub fn seed_length(&mut self, length: u32) {
        self.length = length;
        self.smoother.set_current_and_target(length as f32);
        self.set_delay(length as f32);
    }

    /// Glide to `length` samples over the ramp time.
    pub fn ramp_to_length(&mut self, length: u32) {
        self.length = length;
        self.smoother.set_target(length as f32);
    }

    /// Advance the length ramp and the LFO by one sample.
    #[inline]
    pub fn tick(&mut self) {
        let smoothing = self.smoother.is_smoothing();
        let base = self.smoother.next_value();
        if self.mod_depth == 0.0 {
            if smoothing {
                self.set_delay(base);
            }
            return;
        }
        let offset = self.mod_depth * self.lfo.process_sample();
        self.apply_modulated(base + offset);
    }

    /// Set the modulation depth. Turning modulation off puts the line back
    /// on its nominal (or ramping) length.
    pub fn set_mod_depth(&mut self, depth: f32) {
        self.mod_depth = depth;
        if depth == 0.0 {
            self.set_delay(self.smoother.current());
        }
    }

    /// Apply a modulated length unless it lands exactly on zero.
    pub fn apply_modulated(&mut self, delay_samples: f32) {
        if delay_samples != 0.0 {
            self.set_delay(delay_samples);
        }
    }

    pub fn update_filters(&mut self, params: &FilterParams, sample_rate: f32) {
        let length = self.length as f32;
        let end_hz = END_SHELF_HZ.min(END_SHELF_MAX_RATIO * sample_rate);
        for tap in &mut self.taps {
            tap.low_shelf.update_low_shelf(
                params.low_t60,
                params.low_transition_hz,
                length,
                sample_rate,
            );
            tap.high_shelf.update_high_shelf(
                params.high_t60,
                params.high_transition_hz,
                length,
                sample_rate,
            );
            tap.end_shelf
                .update_high_shelf(params.high_t60, end_hz, length, sample_rate);
        }
    }

    pub fn reset_history(&mut self) {
        for tap in &mut self.taps {
            tap.reset();
        }
    }
}
