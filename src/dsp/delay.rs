/*
Fractional Delay Line
=====================

A circular buffer that remembers the last `capacity` samples and reads them
back at an arbitrary, possibly fractional, distance into the past.

    push(x)   write x at the cursor
    pop()     read `delay` samples behind the newest sample, advance cursor

With delay D and a push/pop pair per sample, pop() returns x[n - D].

Interpolation
-------------

Modulated delay lengths sweep continuously between integer positions. Reading
the nearest sample would make the output jump each time the read position
crosses an integer, which is heard as clicks and zipper noise. A 3rd-order
Lagrange kernel fits a cubic through four neighbouring samples:

    taps:    x0      x1      x2      x3
    offset:  i       i+1     i+2     i+3        (samples behind newest)

    c0 = -(f-1)(f-2)(f-3) / 6
    c1 =   f   (f-2)(f-3) / 2
    c2 =  -f(f-1)   (f-3) / 2
    c3 =   f(f-1)(f-2)    / 6

The read point is shifted so that `f` lies in [1, 2), the centre interval of
the kernel where the cubic is best behaved. For integer delays f = 1 and the
kernel collapses to the exact stored sample.
*/

/// Taps needed by the interpolation kernel behind the read point.
const KERNEL_TAPS: usize = 4;

/// Longest whole delay a line of `capacity` samples can serve.
pub const fn max_delay_for(capacity: usize) -> usize {
    let capacity = if capacity > KERNEL_TAPS { capacity } else { KERNEL_TAPS + 1 };
    capacity - KERNEL_TAPS
}

pub struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
    delay: f32,
}

impl DelayLine {
    /// Allocate a delay line holding `capacity` samples of history.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(KERNEL_TAPS + 1);
        Self {
            buffer: vec![0.0; capacity],
            write_pos: 0,
            delay: 0.0,
        }
    }

    /// Longest delay that can be read without leaving the buffer.
    pub fn max_delay(&self) -> f32 {
        max_delay_for(self.buffer.len()) as f32
    }

    pub fn delay(&self) -> f32 {
        self.delay
    }

    /// Set the read offset in samples. Out-of-range requests are clamped.
    pub fn set_delay(&mut self, delay_samples: f32) {
        self.delay = if delay_samples.is_finite() {
            delay_samples.clamp(0.0, self.max_delay())
        } else {
            0.0
        };
    }

    pub fn push(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
    }

    pub fn pop(&mut self) -> f32 {
        let mut whole = self.delay.floor();
        let mut frac = self.delay - whole;
        if whole >= 1.0 {
            whole -= 1.0;
            frac += 1.0;
        }
        let i = whole as usize;

        let x0 = self.tap(i);
        let x1 = self.tap(i + 1);
        let x2 = self.tap(i + 2);
        let x3 = self.tap(i + 3);

        let d1 = frac - 1.0;
        let d2 = frac - 2.0;
        let d3 = frac - 3.0;

        let c0 = -d1 * d2 * d3 / 6.0;
        let c1 = d2 * d3 * 0.5;
        let c2 = -d1 * d3 * 0.5;
        let c3 = d1 * d2 / 6.0;

        let out = x0 * c0 + frac * (x1 * c1 + x2 * c2 + x3 * c3);

        self.write_pos = (self.write_pos + 1) % self.buffer.len();
        out
    }

    /// Push then pop in one call.
    pub fn next_sample(&mut self, sample: f32) -> f32 {
        self.push(sample);
        self.pop()
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }

    #[inline]
    fn tap(&self, samples_back: usize) -> f32 {
        let len = self.buffer.len();
        self.buffer[(self.write_pos + len - samples_back % len) % len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impulse_position(line: &mut DelayLine, max: usize) -> Option<usize> {
        (0..max).find(|&n| {
            let input = if n == 0 { 1.0 } else { 0.0 };
            line.next_sample(input).abs() > 0.5
        })
    }

    #[test]
    fn test_integer_delay_is_exact() {
        let mut line = DelayLine::new(1024);
        line.set_delay(37.0);

        let mut outputs = Vec::new();
        for n in 0..64 {
            let input = if n == 0 { 1.0 } else { 0.0 };
            outputs.push(line.next_sample(input));
        }

        for (n, &y) in outputs.iter().enumerate() {
            let expected = if n == 37 { 1.0 } else { 0.0 };
            assert!(
                (y - expected).abs() < 1e-6,
                "sample {} expected {}, got {}",
                n,
                expected,
                y
            );
        }
    }

    #[test]
    fn test_zero_delay_passes_through() {
        let mut line = DelayLine::new(64);
        line.set_delay(0.0);
        assert!((line.next_sample(0.75) - 0.75).abs() < 1e-6);
        assert!((line.next_sample(-0.25) + 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_fractional_delay_interpolates_ramp() {
        // A cubic kernel reproduces a linear ramp exactly.
        let mut line = DelayLine::new(256);
        line.set_delay(10.5);

        let mut last = 0.0;
        for n in 0..100 {
            last = line.next_sample(n as f32);
        }
        // Newest sample is 99, so 10.5 samples back is 88.5.
        assert!((last - 88.5).abs() < 1e-3, "got {}", last);
    }

    #[test]
    fn test_delay_is_clamped_to_capacity() {
        let mut line = DelayLine::new(128);
        line.set_delay(1_000_000.0);
        assert_eq!(line.delay(), line.max_delay());

        line.set_delay(-5.0);
        assert_eq!(line.delay(), 0.0);

        line.set_delay(f32::NAN);
        assert_eq!(line.delay(), 0.0);
    }

    #[test]
    fn test_max_delay_still_reads_history() {
        let mut line = DelayLine::new(64);
        line.set_delay(line.max_delay());
        let expected = line.max_delay() as usize;
        assert_eq!(impulse_position(&mut line, 128), Some(expected));
    }

    #[test]
    fn test_reset_clears_history() {
        let mut line = DelayLine::new(64);
        line.set_delay(4.0);
        line.next_sample(1.0);
        line.reset();

        for _ in 0..16 {
            assert_eq!(line.next_sample(0.0), 0.0);
        }
    }

    #[test]
    fn test_sweeping_delay_stays_smooth() {
        let mut line = DelayLine::new(4096);
        let freq = 220.0;
        let sample_rate = 48_000.0;

        let mut prev: Option<f32> = None;
        for n in 0..4096 {
            let t = n as f32 / sample_rate;
            line.set_delay(500.0 + 8.0 * (t * 3.0).sin());
            let y = line.next_sample((std::f32::consts::TAU * freq * t).sin());
            if n > 600 {
                if let Some(p) = prev {
                    // A 220 Hz sine moves at most ~0.03 per sample.
                    assert!((y - p).abs() < 0.05, "jump of {} at {}", y - p, n);
                }
            }
            prev = Some(y);
        }
    }
}
