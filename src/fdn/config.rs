#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dsp::delay::max_delay_for;
use crate::dsp::primes::ms_to_samples;
use crate::error::{FdnError, Result};
use crate::DEFAULT_DELAY_CAPACITY;

/// Number of active delay lines.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkOrder {
    Four,
    Eight,
    Sixteen,
    ThirtyTwo,
}

impl NetworkOrder {
    pub const ALL: [NetworkOrder; 4] = [
        NetworkOrder::Four,
        NetworkOrder::Eight,
        NetworkOrder::Sixteen,
        NetworkOrder::ThirtyTwo,
    ];

    pub fn new(lines: usize) -> Result<Self> {
        match lines {
            4 => Ok(NetworkOrder::Four),
            8 => Ok(NetworkOrder::Eight),
            16 => Ok(NetworkOrder::Sixteen),
            32 => Ok(NetworkOrder::ThirtyTwo),
            other => Err(FdnError::UnsupportedOrder(other)),
        }
    }

    #[inline]
    pub const fn get(self) -> usize {
        match self {
            NetworkOrder::Four => 4,
            NetworkOrder::Eight => 8,
            NetworkOrder::Sixteen => 16,
            NetworkOrder::ThirtyTwo => 32,
        }
    }
}

impl TryFrom<usize> for NetworkOrder {
    type Error = FdnError;

    fn try_from(lines: usize) -> Result<Self> {
        Self::new(lines)
    }
}

/// Decay targets for the low and high shelving filters.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterParams {
    /// Decay time below the low transition frequency (seconds).
    pub low_t60: f32,
    /// Decay time above the high transition frequency (seconds).
    pub high_t60: f32,
    pub low_transition_hz: f32,
    pub high_transition_hz: f32,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            low_t60: 1.0,
            high_t60: 0.5,
            low_transition_hz: 400.0,
            high_transition_hz: 2500.0,
        }
    }
}

impl FilterParams {
    /// Same decay time across the whole band.
    pub fn uniform(t60: f32, low_transition_hz: f32, high_transition_hz: f32) -> Self {
        Self {
            low_t60: t60,
            high_t60: t60,
            low_transition_hz,
            high_transition_hz,
        }
    }

    pub fn validate(&self, sample_rate: f32) -> Result<()> {
        positive("low_t60", self.low_t60)?;
        positive("high_t60", self.high_t60)?;
        below_nyquist("low_transition_hz", self.low_transition_hz, sample_rate)?;
        below_nyquist("high_transition_hz", self.high_transition_hz, sample_rate)?;
        Ok(())
    }
}

/// Everything needed to build an [`FdnReverb`](crate::fdn::FdnReverb).
///
/// Defaults follow the plugin this engine grew out of: a 16-line network,
/// 5-20 ms delays, 1 s lows and 0.5 s highs, half wet.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct FdnConfig {
    pub sample_rate: f32,
    pub channels: usize,
    pub order: NetworkOrder,
    pub low_delay_ms: f32,
    pub high_delay_ms: f32,
    /// History per delay line, in samples.
    pub delay_capacity: usize,
    pub filter: FilterParams,
    /// Wet fraction of the output mix (0.0 = dry, 1.0 = wet).
    pub dry_wet: f32,
    /// Dry signal added inside the network, ahead of the output mix.
    pub direct_gain: f32,
    /// Modulation depth in samples.
    pub mod_depth: f32,
    /// Shared modulation rate in Hz. `None` keeps the random per-line rates.
    pub mod_rate: Option<f32>,
    /// Seed for the gain randomizer. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for FdnConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            channels: 2,
            order: NetworkOrder::Sixteen,
            low_delay_ms: 5.0,
            high_delay_ms: 20.0,
            delay_capacity: DEFAULT_DELAY_CAPACITY,
            filter: FilterParams::default(),
            dry_wet: 0.5,
            direct_gain: 0.0,
            mod_depth: 6.0,
            mod_rate: None,
            seed: None,
        }
    }
}

impl FdnConfig {
    pub fn with_sample_rate(mut self, sample_rate: f32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_order(mut self, order: NetworkOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_delay_range_ms(mut self, low_ms: f32, high_ms: f32) -> Self {
        self.low_delay_ms = low_ms;
        self.high_delay_ms = high_ms;
        self
    }

    pub fn with_delay_capacity(mut self, samples: usize) -> Self {
        self.delay_capacity = samples;
        self
    }

    pub fn with_filter(mut self, filter: FilterParams) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_dry_wet(mut self, dry_wet: f32) -> Self {
        self.dry_wet = dry_wet;
        self
    }

    pub fn with_direct_gain(mut self, gain: f32) -> Self {
        self.direct_gain = gain;
        self
    }

    pub fn with_modulation(mut self, depth: f32, rate: Option<f32>) -> Self {
        self.mod_depth = depth;
        self.mod_rate = rate;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Longest line length, in samples, the configured capacity can hold.
    pub fn max_delay(&self) -> u32 {
        max_delay_for(self.delay_capacity) as u32
    }

    pub fn validate(&self) -> Result<()> {
        positive("sample_rate", self.sample_rate)?;
        if self.channels == 0 {
            return Err(FdnError::InvalidParameter {
                name: "channels",
                value: 0.0,
            });
        }
        positive("low_delay_ms", self.low_delay_ms)?;
        positive("high_delay_ms", self.high_delay_ms)?;
        if self.high_delay_ms < self.low_delay_ms {
            return Err(FdnError::InvalidParameter {
                name: "high_delay_ms",
                value: self.high_delay_ms,
            });
        }
        if self.delay_capacity < 8 {
            return Err(FdnError::InvalidParameter {
                name: "delay_capacity",
                value: self.delay_capacity as f32,
            });
        }
        check_capacity(
            ms_to_samples(self.high_delay_ms, self.sample_rate),
            self.max_delay(),
        )?;
        self.filter.validate(self.sample_rate)?;
        finite("dry_wet", self.dry_wet)?;
        finite("direct_gain", self.direct_gain)?;
        finite("mod_depth", self.mod_depth)?;
        if let Some(rate) = self.mod_rate {
            non_negative("mod_rate", rate)?;
        }
        Ok(())
    }
}

pub(crate) fn check_capacity(samples: u32, max: u32) -> Result<()> {
    if samples <= max {
        Ok(())
    } else {
        Err(FdnError::DelayExceedsCapacity { samples, max })
    }
}

pub(crate) fn expect_len(expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(FdnError::LengthMismatch { expected, actual })
    }
}

pub(crate) fn finite_all(name: &'static str, values: &[f32]) -> Result<()> {
    values.iter().try_for_each(|&v| finite(name, v))
}

pub(crate) fn finite(name: &'static str, value: f32) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(FdnError::InvalidParameter { name, value })
    }
}

pub(crate) fn positive(name: &'static str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(FdnError::InvalidParameter { name, value })
    }
}

pub(crate) fn non_negative(name: &'static str, value: f32) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(FdnError::InvalidParameter { name, value })
    }
}

fn below_nyquist(name: &'static str, value: f32, sample_rate: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 && value < sample_rate * 0.5 {
        Ok(())
    } else {
        Err(FdnError::InvalidParameter { name, value })
    }
}
