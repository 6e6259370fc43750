//! Linear parameter ramps for click-free delay changes.

/// Linear ramp from the current value to a target over a fixed number of
/// samples. Retargeting mid-ramp starts a fresh ramp from wherever the value
/// currently is.
#[derive(Debug, Clone, Copy)]
pub struct LinearSmoother {
    current: f32,
    target: f32,
    step: f32,
    remaining: u32,
    ramp_samples: u32,
}

impl LinearSmoother {
    pub fn new(initial: f32, ramp_seconds: f32, sample_rate: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            step: 0.0,
            remaining: 0,
            ramp_samples: ramp_length(ramp_seconds, sample_rate),
        }
    }

    pub fn set_target(&mut self, target: f32) {
        if target == self.target {
            return;
        }
        self.target = target;
        if self.ramp_samples == 0 {
            self.current = target;
            self.remaining = 0;
            return;
        }
        self.remaining = self.ramp_samples;
        self.step = (target - self.current) / self.ramp_samples as f32;
    }

    /// Jump to `value` with no ramp.
    pub fn set_current_and_target(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.remaining = 0;
    }

    #[inline]
    pub fn next_value(&mut self) -> f32 {
        if self.remaining == 0 {
            return self.target;
        }
        self.remaining -= 1;
        self.current = if self.remaining == 0 {
            self.target
        } else {
            self.current + self.step
        };
        self.current
    }

    pub fn current(&self) -> f32 {
        if self.remaining == 0 {
            self.target
        } else {
            self.current
        }
    }

    pub fn is_smoothing(&self) -> bool {
        self.remaining > 0
    }
}

fn ramp_length(ramp_seconds: f32, sample_rate: f32) -> u32 {
    (ramp_seconds * sample_rate).max(0.0).floor() as u32
}
