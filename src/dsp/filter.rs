use std::f32::consts::PI;

/*
Decay Shelving Filters
======================

Each pass around the network a signal loses a little energy. A shelving
filter makes that loss frequency dependent so lows and highs can ring for
different lengths of time.

| type       | passes at unity | attenuates by g |
| ---------- | --------------- | --------------- |
| low-shelf  | above fT        | below fT        |
| high-shelf | below fT        | above fT        |

Gain per pass
-------------

A target decay of T60 seconds means -60 dB after T60 · fs samples, so every
sample costs

    gdB = -60 / (T60 · fs)

A line D samples long applies that loss D times per round trip:

    g = (10^(gdB / 20)) ^ floor(D)

Long lines get a stronger shelf, short lines a gentler one, and every line
reaches -60 dB after the same amount of time.

Coefficients
------------

With tc = tan(π · fT / fs) (bilinear prewarp of the transition frequency):

    low-shelf:   b0 = g·tc + √g    b1 = g·tc - √g    a0 = tc + √g     a1 = tc - √g
    high-shelf:  b0 = √g·tc + g    b1 = √g·tc - g    a0 = √g·tc + 1   a1 = √g·tc - 1

All normalized by 1/a0, then

    y[n] = b0·x[n] + b1·x[n-1] - a1·y[n-1]

No validation happens here: T60 must be > 0 and fT below Nyquist.
*/

/// Linear gain a line of `delay_samples` applies per round trip to reach
/// -60 dB after `t60` seconds.
#[inline]
pub fn decay_gain(t60: f32, delay_samples: f32, sample_rate: f32) -> f32 {
    let gain_db = -60.0 / (t60 * sample_rate);
    let per_sample = 10f32.powf(gain_db / 20.0);
    per_sample.powf(delay_samples.floor())
}

#[derive(Debug, Clone, Copy)]
pub struct ShelfFilter {
    b0: f32,
    b1: f32,
    a1: f32,
    prev_input: f32,
    prev_output: f32,
}

impl Default for ShelfFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl ShelfFilter {
    /// A filter with all-zero coefficients (outputs silence until updated).
    pub fn new() -> Self {
        Self {
            b0: 0.0,
            b1: 0.0,
            a1: 0.0,
            prev_input: 0.0,
            prev_output: 0.0,
        }
    }

    pub fn update_low_shelf(
        &mut self,
        t60: f32,
        transition_hz: f32,
        delay_samples: f32,
        sample_rate: f32,
    ) {
        let g = decay_gain(t60, delay_samples, sample_rate);
        let sqrt_g = g.sqrt();
        let tc = prewarp(transition_hz, sample_rate);

        self.set_normalized(g * tc + sqrt_g, g * tc - sqrt_g, tc + sqrt_g, tc - sqrt_g);
    }

    pub fn update_high_shelf(
        &mut self,
        t60: f32,
        transition_hz: f32,
        delay_samples: f32,
        sample_rate: f32,
    ) {
        let g = decay_gain(t60, delay_samples, sample_rate);
        let sqrt_g = g.sqrt();
        let tc = prewarp(transition_hz, sample_rate);

        self.set_normalized(sqrt_g * tc + g, sqrt_g * tc - g, sqrt_g * tc + 1.0, sqrt_g * tc - 1.0);
    }

    #[inline]
    pub fn process_sample(&mut self, input: f32) -> f32 {
        let output = self.b0 * input + self.b1 * self.prev_input - self.a1 * self.prev_output;
        self.prev_input = input;
        self.prev_output = output;
        output
    }

    pub fn render(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    /// Clear history, keep coefficients.
    pub fn reset(&mut self) {
        self.prev_input = 0.0;
        self.prev_output = 0.0;
    }

    /// Normalized `(b0, b1, a1)`.
    pub fn coefficients(&self) -> (f32, f32, f32) {
        (self.b0, self.b1, self.a1)
    }

    /// Steady-state magnitude at `freq_hz`.
    pub fn magnitude_at(&self, freq_hz: f32, sample_rate: f32) -> f32 {
        let w = 2.0 * PI * freq_hz / sample_rate;
        let (sin, cos) = w.sin_cos();
        // H(e^jw) = (b0 + b1 e^-jw) / (1 + a1 e^-jw)
        let num_re = self.b0 + self.b1 * cos;
        let num_im = -self.b1 * sin;
        let den_re = 1.0 + self.a1 * cos;
        let den_im = -self.a1 * sin;
        ((num_re * num_re + num_im * num_im) / (den_re * den_re + den_im * den_im)).sqrt()
    }

    fn set_normalized(&mut self, b0: f32, b1: f32, a0: f32, a1: f32) {
        let a0_inv = 1.0 / a0;
        self.b0 = b0 * a0_inv;
        self.b1 = b1 * a0_inv;
        self.a1 = a1 * a0_inv;
    }
}

#[inline]
fn prewarp(transition_hz: f32, sample_rate: f32) -> f32 {
    let wc = 2.0 * PI * transition_hz / sample_rate;
    (wc * 0.5).tan()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const FS: f32 = 48_000.0;

    #[test]
    fn test_decay_gain_matches_t60() {
        // After T60 · fs samples the accumulated loss is -60 dB.
        let delay = 1000.0;
        let t60 = 2.0;
        let g = decay_gain(t60, delay, FS);
        let passes = t60 * FS / delay;
        let total_db = 20.0 * g.log10() * passes;
        assert_relative_eq!(total_db, -60.0, epsilon = 0.05);
    }

    #[test]
    fn test_decay_gain_floors_fractional_delay() {
        assert_eq!(decay_gain(1.0, 240.9, FS), decay_gain(1.0, 240.0, FS));
    }

    #[test]
    fn test_low_shelf_attenuates_lows_only() {
        let mut filter = ShelfFilter::new();
        filter.update_low_shelf(0.5, 400.0, 1200.0, FS);
        let g = decay_gain(0.5, 1200.0, FS);

        assert_relative_eq!(filter.magnitude_at(0.0, FS), g, epsilon = 1e-4);
        assert_relative_eq!(filter.magnitude_at(FS / 2.0, FS), 1.0, epsilon = 1e-4);
        // Geometric midpoint at the transition frequency.
        assert_relative_eq!(filter.magnitude_at(400.0, FS), g.sqrt(), epsilon = 1e-3);
    }

    #[test]
    fn test_high_shelf_attenuates_highs_only() {
        let mut filter = ShelfFilter::new();
        filter.update_high_shelf(0.5, 2500.0, 1200.0, FS);
        let g = decay_gain(0.5, 1200.0, FS);

        assert_relative_eq!(filter.magnitude_at(0.0, FS), 1.0, epsilon = 1e-4);
        assert_relative_eq!(filter.magnitude_at(FS / 2.0, FS), g, epsilon = 1e-4);
    }

    #[test]
    fn test_dc_step_settles_to_shelf_gain() {
        let mut filter = ShelfFilter::new();
        filter.update_low_shelf(1.0, 400.0, 2000.0, FS);
        let g = decay_gain(1.0, 2000.0, FS);

        let mut buffer = vec![1.0; 4096];
        filter.render(&mut buffer);
        assert!(
            (buffer[4095] - g).abs() < 1e-3,
            "expected {}, got {}",
            g,
            buffer[4095]
        );
    }

    #[test]
    fn test_longer_t60_means_gentler_shelf() {
        let short = decay_gain(0.2, 1000.0, FS);
        let long = decay_gain(5.0, 1000.0, FS);
        assert!(short < long, "short={} long={}", short, long);
        assert!(long < 1.0);
    }

    #[test]
    fn test_default_filter_is_silent_until_updated() {
        let mut filter = ShelfFilter::default();
        assert_eq!(filter.process_sample(1.0), 0.0);
    }

    #[test]
    fn test_reset_keeps_coefficients() {
        let mut filter = ShelfFilter::new();
        filter.update_high_shelf(1.0, 2500.0, 500.0, FS);
        let coeffs = filter.coefficients();
        filter.process_sample(1.0);
        filter.reset();
        assert_eq!(filter.coefficients(), coeffs);
        let (b0, _, _) = coeffs;
        assert_relative_eq!(filter.process_sample(1.0), b0, epsilon = 1e-7);
    }
}
