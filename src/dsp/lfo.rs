//! Low Frequency Oscillator used to detune the delay lines.

use std::f32::consts::TAU;

/*
Delay Modulation
================

A static FDN has fixed modal frequencies. With long decay times those modes
ring out as metallic tones. Slowly wobbling each line's length by a few
samples smears the modes so the tail sounds diffuse, the same trick a chorus
uses to thicken a voice.

    delay[i](t) = nominal[i] + depth · sin(phase[i](t))

Each line owns its own oscillator. Different rates per line keep the lines
from moving in lockstep.

The oscillator is a control signal only: its output never reaches the audio
path directly, it only moves a delay line's read position.

Typical values
--------------

    rate    0.1 - 2 Hz      slow drift, no audible pitch wobble
    depth   1 - 10 samples  enough to break up ringing modes
*/

#[derive(Debug, Clone, Copy)]
pub struct SineLfo {
    phase: f32,
    frequency_hz: f32,
    sample_rate: f32,
}

impl SineLfo {
    pub fn new(frequency_hz: f32, sample_rate: f32) -> Self {
        Self {
            phase: 0.0,
            frequency_hz,
            sample_rate,
        }
    }

    pub fn frequency(&self) -> f32 {
        self.frequency_hz
    }

    pub fn set_frequency(&mut self, frequency_hz: f32) {
        self.frequency_hz = frequency_hz;
    }

    /// Phase advanced per call at the current frequency.
    #[inline]
    pub fn phase_increment(&self) -> f32 {
        TAU * self.frequency_hz / self.sample_rate
    }

    /// Return the current value and advance one sample.
    #[inline]
    pub fn process_sample(&mut self) -> f32 {
        let increment = self.phase_increment();
        self.advance(increment)
    }

    /// Return the current value and advance the phase by `increment` radians.
    #[inline]
    pub fn advance(&mut self, increment: f32) -> f32 {
        let value = self.phase.sin();
        self.phase += increment;
        if self.phase >= TAU {
            self.phase -= TAU;
        } else if self.phase < 0.0 {
            self.phase += TAU;
        }
        value
    }
}
