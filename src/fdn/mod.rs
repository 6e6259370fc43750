//! Feedback Delay Network reverb engine.

/*
Feedback Delay Network
======================

N delay lines run in parallel. Their filtered outputs are mixed by an N×N
matrix and fed back into their inputs one sample later:

            ┌──────────────────── A · out[n-1] ◄──────────────────┐
            │                                                     │
 x ──► b[i]·x + fb[i] ──► [delay D_i] ──► [low]─►[high]─►[end] ──►┴─► out[i]
                                                                  │
                                                     c[i]·out[i] ─┴─► Σ ──► wet

    wet[n] = Σ c[i]·out[i][n] + d·x[n]
    fb[n+1] = A · out[n]

The extra sample of delay on the feedback path keeps the loop causal: the
matrix output computed at sample n feeds the lines at sample n+1.

Output stage
------------

    y = 0.6 · ((1 - w)·x + w·wet)

w is the dry/wet fraction; 0.6 is a fixed headroom attenuation.

Reconfiguration
---------------

Changing N touches every dimension-sensitive piece of state at once: the
matrix, the delay table and the gain vectors. While that happens the
`ReconfigGate` is raised and `process_sample` returns exactly 0.0.

All per-line state is pre-allocated for MAX_ORDER lines, so reconfiguring
rewrites contents and never allocates. That makes it safe to apply a queued
order change from inside the audio callback.

Channels
--------

Every channel drives the same lines (same lengths, gains, filters and
matrix) but keeps its own history, so left and right do not bleed into each
other. Channel 0 starts a frame: it drains control messages, latches the
gate for the whole frame and advances delay ramps and LFOs.
*/

pub mod config;
pub mod gate;
mod line;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::control::{ControlMessage, MessageReceiver};
use crate::dsp::matrix::{FeedbackMatrix, MatrixTopology};
use crate::dsp::primes::{find_primes_in_range, ms_to_samples};
use crate::error::{FdnError, Result};
use crate::MAX_ORDER;

pub use config::{FdnConfig, FilterParams, NetworkOrder};
pub use gate::ReconfigGate;
pub use line::{DELAY_RAMP_SECONDS, END_SHELF_HZ};

use config::{check_capacity, expect_len, finite, finite_all, non_negative, positive};
use line::FdnLine;

/// Fixed attenuation applied to the mixed output.
pub const OUTPUT_GAIN: f32 = 0.6;

/// Lower delay bound as a fraction of the target when retargeting.
pub const LOW_DELAY_RATIO: f32 = 0.6;

/// Random per-line LFO rates are drawn from `[0, MAX_RANDOM_LFO_HZ)`.
const MAX_RANDOM_LFO_HZ: f32 = 2.0;

/// Feedback state of one channel.
struct ChannelState {
    feedback: [f32; MAX_ORDER],
    filtered: [f32; MAX_ORDER],
}

impl ChannelState {
    fn new() -> Self {
        Self {
            feedback: [0.0; MAX_ORDER],
            filtered: [0.0; MAX_ORDER],
        }
    }

    fn clear(&mut self) {
        self.feedback.fill(0.0);
        self.filtered.fill(0.0);
    }
}

/// Read-only view of the engine's control state.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct FdnSnapshot {
    pub order: usize,
    pub topology: MatrixTopology,
    pub input_gains: Vec<f32>,
    pub output_gains: Vec<f32>,
    pub delay_lengths: Vec<u32>,
    /// Effective matrix, row-major, `order × order`.
    pub matrix: Vec<f32>,
    pub dry_wet: f32,
    pub direct_gain: f32,
    pub filter: FilterParams,
    pub low_delay_ms: f32,
    pub high_delay_ms: f32,
    pub mod_depths: Vec<f32>,
    pub mod_rates: Vec<f32>,
}

pub struct FdnReverb {
    lines: Vec<FdnLine>,
    channels: Vec<ChannelState>,
    matrix: FeedbackMatrix,
    order: NetworkOrder,
    sample_rate: f32,
    low_delay_ms: f32,
    high_delay_ms: f32,
    filter: FilterParams,
    dry_wet: f32,
    direct_gain: f32,
    rng: StdRng,
    gate: Arc<ReconfigGate>,
    frame_muted: bool,
    rx: Option<Box<dyn MessageReceiver + Send>>,
    /// Messages the audio thread could not apply; read on the control side.
    dropped: Arc<AtomicU32>,
    scratch_table: [u32; MAX_ORDER],
    max_delay: u32,
}

impl FdnReverb {
    /// Build the network: lines for MAX_ORDER, prime delay table for the
    /// configured order, random gains, identity matrix, zeroed feedback.
    pub fn new(config: FdnConfig) -> Result<Self> {
        config.validate()?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let sample_rate = config.sample_rate;
        let lines = (0..MAX_ORDER)
            .map(|_| {
                let rate = config
                    .mod_rate
                    .unwrap_or_else(|| rng.random_range(0.0..MAX_RANDOM_LFO_HZ));
                let mut line =
                    FdnLine::new(config.channels, config.delay_capacity, sample_rate, rate);
                line.input_gain = rng.random_range(-1.0..=1.0);
                line.output_gain = rng.random_range(-1.0..=1.0);
                line.set_mod_depth(config.mod_depth);
                line
            })
            .collect();

        let mut engine = Self {
            lines,
            channels: (0..config.channels).map(|_| ChannelState::new()).collect(),
            matrix: FeedbackMatrix::identity(config.order.get()),
            order: config.order,
            sample_rate,
            low_delay_ms: config.low_delay_ms,
            high_delay_ms: config.high_delay_ms,
            filter: config.filter,
            dry_wet: config.dry_wet.clamp(0.0, 1.0),
            direct_gain: config.direct_gain,
            rng,
            gate: Arc::new(ReconfigGate::new()),
            frame_muted: false,
            rx: None,
            dropped: Arc::new(AtomicU32::new(0)),
            scratch_table: [0; MAX_ORDER],
            max_delay: config.max_delay(),
        };

        let n = engine.order.get();
        engine.search_delay_table(config.low_delay_ms, config.high_delay_ms, n)?;
        for i in 0..n {
            let length = engine.scratch_table[i];
            engine.lines[i].seed_length(length);
        }
        engine.recompute_filters();

        log::debug!(
            "fdn ready: {} lines at {} Hz, delays {:?}",
            n,
            sample_rate,
            engine.delay_lengths()
        );
        Ok(engine)
    }

    /// Engine plus a controller that reaches it through a lock-free queue.
    #[cfg(feature = "rtrb")]
    pub fn with_controller(
        config: FdnConfig,
        queue_capacity: usize,
    ) -> Result<(Self, crate::control::FdnController)> {
        let mut engine = Self::new(config)?;
        let (tx, rx) = rtrb::RingBuffer::<ControlMessage>::new(queue_capacity);
        engine.set_receiver(Box::new(rx));
        let controller = crate::control::FdnController::new(tx, &engine);
        Ok((engine, controller))
    }

    /// Attach a message source drained at the start of every frame.
    pub fn set_receiver(&mut self, rx: Box<dyn MessageReceiver + Send>) {
        self.rx = Some(rx);
    }

    pub fn gate(&self) -> Arc<ReconfigGate> {
        Arc::clone(&self.gate)
    }

    pub fn is_reconfiguring(&self) -> bool {
        self.gate.is_raised()
    }

    /// Counter of queued messages that failed to apply on the audio thread.
    pub fn dropped_messages(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.dropped)
    }

    // ---------------------------------------------------------------------
    // Audio path
    // ---------------------------------------------------------------------

    /// Process one sample of one channel.
    ///
    /// Call channel 0 first for every frame. Returns silence while a
    /// reconfiguration is pending and for channels the engine wasn't built
    /// with.
    #[inline]
    pub fn process_sample(&mut self, channel: usize, input: f32) -> f32 {
        if channel == 0 {
            self.begin_frame();
        }
        if self.frame_muted || self.gate.is_raised() || channel >= self.channels.len() {
            return 0.0;
        }

        let wet = self.process_network(channel, input);
        OUTPUT_GAIN * ((1.0 - self.dry_wet) * input + self.dry_wet * wet)
    }

    /// Process deinterleaved channel buffers in place.
    ///
    /// Applies one modulation step per block, then runs every frame through
    /// [`process_sample`](Self::process_sample).
    pub fn process_block(&mut self, buffers: &mut [&mut [f32]]) {
        if !self.gate.is_raised() {
            self.modulation_step();
        }
        let frames = buffers.iter().map(|b| b.len()).min().unwrap_or(0);
        for n in 0..frames {
            for (channel, buffer) in buffers.iter_mut().enumerate() {
                buffer[n] = self.process_sample(channel, buffer[n]);
            }
        }
    }

    fn begin_frame(&mut self) {
        let was_raised = self.gate.is_raised();
        self.drain_messages();
        self.frame_muted = was_raised || self.gate.is_raised();
        if !self.frame_muted {
            let n = self.order.get();
            for line in &mut self.lines[..n] {
                line.tick();
            }
        }
    }

    #[inline]
    fn process_network(&mut self, channel: usize, input: f32) -> f32 {
        let n = self.order.get();
        let state = &mut self.channels[channel];

        let mut wet = 0.0;
        for (i, line) in self.lines[..n].iter_mut().enumerate() {
            let filtered = line.taps[channel].process(line.input_gain * input + state.feedback[i]);
            state.filtered[i] = filtered;
            wet += line.output_gain * filtered;
        }
        wet += self.direct_gain * input;

        // Consumed by the next sample.
        self.matrix.apply(&state.filtered, &mut state.feedback);
        wet
    }

    fn drain_messages(&mut self) {
        let Some(mut rx) = self.rx.take() else {
            return;
        };
        while let Some(message) = rx.pop() {
            if self.apply_message(message).is_err() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.rx = Some(rx);
    }

    /// Apply one control message as if the matching mutator were called.
    pub fn apply_message(&mut self, message: ControlMessage) -> Result<()> {
        match message {
            ControlMessage::SetInputGain { index, gain } => self.set_input_gain(index, gain),
            ControlMessage::SetOutputGain { index, gain } => self.set_output_gain(index, gain),
            ControlMessage::SetDryWet(fraction) => self.set_dry_wet(fraction),
            ControlMessage::SetDirectGain(gain) => self.set_direct_gain(gain),
            ControlMessage::SetFilter(params) => self.update_filter(params),
            ControlMessage::UpdateDelay { target_ms } => self.update_delay(target_ms),
            ControlMessage::SetDelayMs { index, ms } => self.set_delay_ms(index, ms),
            ControlMessage::ClearHistory => {
                self.reset();
                Ok(())
            }
            ControlMessage::SetMatrixCell { row, col, value } => {
                self.set_matrix_cell(row, col, value)
            }
            ControlMessage::SelectTopology(topology) => {
                self.select_topology(topology);
                Ok(())
            }
            ControlMessage::SetOrder { order, topology } => self.update_order(order, topology),
            ControlMessage::SetModulation { depth, rate } => self.update_modulation(depth, rate),
            ControlMessage::SetLineModDepth { index, depth } => {
                self.set_line_mod_depth(index, depth)
            }
            ControlMessage::SetLineModRate { index, rate } => self.set_line_mod_rate(index, rate),
            ControlMessage::Commit => {
                self.gate.lower();
                Ok(())
            }
        }
    }

    // ---------------------------------------------------------------------
    // Reconfiguration
    // ---------------------------------------------------------------------

    /// Change the number of active lines.
    ///
    /// Clears history, re-randomizes gains, recomputes the prime delay table
    /// and rebuilds the matrix at the new size, all behind the gate. Fails
    /// without touching anything if the delay window can't supply enough
    /// primes for the new order.
    pub fn update_order(&mut self, order: NetworkOrder, topology: MatrixTopology) -> Result<()> {
        let n = order.get();
        self.search_delay_table(self.low_delay_ms, self.high_delay_ms, n)?;

        let gate = Arc::clone(&self.gate);
        let _guard = gate.hold();

        self.order = order;
        for line in &mut self.lines[..n] {
            line.reset_history();
            line.input_gain = self.rng.random_range(-1.0..=1.0);
            line.output_gain = self.rng.random_range(-1.0..=1.0);
        }
        for (line, &length) in self.lines[..n].iter_mut().zip(&self.scratch_table[..n]) {
            line.seed_length(length);
        }
        self.matrix.resize(n);
        self.matrix.set_topology(topology);
        for state in &mut self.channels {
            state.clear();
        }
        self.recompute_filters();
        Ok(())
    }

    /// Retarget the delay window to `(0.6·target, target)` ms and glide every
    /// line to its new prime length.
    pub fn update_delay(&mut self, target_ms: f32) -> Result<()> {
        positive("target_ms", target_ms)?;
        let low_ms = target_ms * LOW_DELAY_RATIO;
        let n = self.order.get();
        self.search_delay_table(low_ms, target_ms, n)?;

        self.low_delay_ms = low_ms;
        self.high_delay_ms = target_ms;
        for (line, &length) in self.lines[..n].iter_mut().zip(&self.scratch_table[..n]) {
            line.ramp_to_length(length);
        }
        self.recompute_filters();
        Ok(())
    }

    /// Set every active line's length directly in milliseconds.
    ///
    /// Lengths need not be prime. History is cleared since the lines jump.
    pub fn set_delays_ms(&mut self, delays_ms: &[f32]) -> Result<()> {
        let n = self.order.get();
        expect_len(n, delays_ms.len())?;
        for &ms in delays_ms {
            non_negative("delay_ms", ms)?;
            check_capacity(ms_to_samples(ms, self.sample_rate), self.max_delay)?;
        }

        for (line, &ms) in self.lines[..n].iter_mut().zip(delays_ms) {
            line.reset_history();
            line.seed_length(ms_to_samples(ms, self.sample_rate));
        }
        self.recompute_filters();
        Ok(())
    }

    /// Set one line's length directly in milliseconds, without a ramp.
    pub fn set_delay_ms(&mut self, index: usize, ms: f32) -> Result<()> {
        self.check_index(index)?;
        non_negative("delay_ms", ms)?;
        let length = ms_to_samples(ms, self.sample_rate);
        check_capacity(length, self.max_delay)?;
        let line = &mut self.lines[index];
        line.seed_length(length);
        line.update_filters(&self.filter, self.sample_rate);
        Ok(())
    }

    pub fn update_filter(&mut self, params: FilterParams) -> Result<()> {
        params.validate(self.sample_rate)?;
        self.filter = params;
        self.recompute_filters();
        Ok(())
    }

    /// Clear every active line's history and the feedback vectors.
    pub fn reset(&mut self) {
        let n = self.order.get();
        for line in &mut self.lines[..n] {
            line.reset_history();
        }
        for state in &mut self.channels {
            state.clear();
        }
    }

    // ---------------------------------------------------------------------
    // Gains and mix
    // ---------------------------------------------------------------------

    pub fn set_input_gains(&mut self, gains: &[f32]) -> Result<()> {
        self.set_gains(gains, |line, gain| line.input_gain = gain)
    }

    pub fn set_output_gains(&mut self, gains: &[f32]) -> Result<()> {
        self.set_gains(gains, |line, gain| line.output_gain = gain)
    }

    pub fn set_input_gain(&mut self, index: usize, gain: f32) -> Result<()> {
        self.check_index(index)?;
        finite("input_gain", gain)?;
        self.lines[index].input_gain = gain;
        Ok(())
    }

    pub fn set_output_gain(&mut self, index: usize, gain: f32) -> Result<()> {
        self.check_index(index)?;
        finite("output_gain", gain)?;
        self.lines[index].output_gain = gain;
        Ok(())
    }

    pub fn input_gain(&self, index: usize) -> Result<f32> {
        self.check_index(index)?;
        Ok(self.lines[index].input_gain)
    }

    pub fn output_gain(&self, index: usize) -> Result<f32> {
        self.check_index(index)?;
        Ok(self.lines[index].output_gain)
    }

    /// Wet fraction of the output, clamped to `[0, 1]`.
    pub fn set_dry_wet(&mut self, fraction: f32) -> Result<()> {
        finite("dry_wet", fraction)?;
        self.dry_wet = fraction.clamp(0.0, 1.0);
        Ok(())
    }

    pub fn set_direct_gain(&mut self, gain: f32) -> Result<()> {
        finite("direct_gain", gain)?;
        self.direct_gain = gain;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Matrix
    // ---------------------------------------------------------------------

    /// Load `N²` row-major coefficients and switch to the custom topology.
    pub fn set_matrix(&mut self, row_major: &[f32]) -> Result<()> {
        let n = self.order.get();
        expect_len(n * n, row_major.len())?;
        finite_all("matrix coefficient", row_major)?;
        self.matrix.set_custom(row_major);
        self.matrix.set_topology(MatrixTopology::Custom);
        Ok(())
    }

    /// Set one custom coefficient and switch to the custom topology.
    pub fn set_matrix_cell(&mut self, row: usize, col: usize, value: f32) -> Result<()> {
        let n = self.order.get();
        if row >= n || col >= n {
            return Err(FdnError::CellOutOfRange { row, col, order: n });
        }
        finite("matrix coefficient", value)?;
        self.matrix.set_cell(row, col, value);
        self.matrix.set_topology(MatrixTopology::Custom);
        Ok(())
    }

    pub fn select_topology(&mut self, topology: MatrixTopology) {
        self.matrix.set_topology(topology);
    }

    pub fn topology(&self) -> MatrixTopology {
        self.matrix.topology()
    }

    pub fn matrix_order(&self) -> usize {
        self.matrix.order()
    }

    /// Effective matrix, row-major.
    pub fn matrix(&self) -> Vec<f32> {
        self.matrix.to_row_major()
    }

    // ---------------------------------------------------------------------
    // Modulation
    // ---------------------------------------------------------------------

    /// Set depth (samples) and rate (Hz) on every active line, then take one
    /// modulation step.
    pub fn update_modulation(&mut self, depth: f32, rate: f32) -> Result<()> {
        finite("mod_depth", depth)?;
        non_negative("mod_rate", rate)?;
        let n = self.order.get();
        for line in &mut self.lines[..n] {
            line.set_mod_depth(depth);
            line.lfo.set_frequency(rate);
        }
        self.modulation_step();
        Ok(())
    }

    pub fn set_line_mod_depth(&mut self, index: usize, depth: f32) -> Result<()> {
        self.check_index(index)?;
        finite("mod_depth", depth)?;
        self.lines[index].set_mod_depth(depth);
        Ok(())
    }

    pub fn set_line_mod_rate(&mut self, index: usize, rate: f32) -> Result<()> {
        self.check_index(index)?;
        non_negative("mod_rate", rate)?;
        self.lines[index].lfo.set_frequency(rate);
        Ok(())
    }

    /// Offset every active line from its nominal length by one LFO step.
    fn modulation_step(&mut self) {
        let n = self.order.get();
        for line in &mut self.lines[..n] {
            let offset = line.mod_depth * line.lfo.process_sample();
            let nominal = line.smoother.current();
            line.apply_modulated(nominal + offset);
        }
    }

    // ---------------------------------------------------------------------
    // Read-back
    // ---------------------------------------------------------------------

    pub fn order(&self) -> NetworkOrder {
        self.order
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Longest line length, in samples, the delay capacity can hold.
    pub fn max_delay(&self) -> u32 {
        self.max_delay
    }

    pub fn channels(&self) -> usize {
        self.channels.len()
    }

    pub fn dry_wet(&self) -> f32 {
        self.dry_wet
    }

    pub fn direct_gain(&self) -> f32 {
        self.direct_gain
    }

    pub fn filter(&self) -> FilterParams {
        self.filter
    }

    /// Current `(low, high)` delay window in milliseconds.
    pub fn delay_range_ms(&self) -> (f32, f32) {
        (self.low_delay_ms, self.high_delay_ms)
    }

    pub fn input_gains(&self) -> Vec<f32> {
        self.active().iter().map(|l| l.input_gain).collect()
    }

    pub fn output_gains(&self) -> Vec<f32> {
        self.active().iter().map(|l| l.output_gain).collect()
    }

    /// Nominal delay lengths in samples.
    pub fn delay_lengths(&self) -> Vec<u32> {
        self.active().iter().map(|l| l.length).collect()
    }

    /// Delay each line is reading at right now, modulation included.
    pub fn current_delays(&self) -> Vec<f32> {
        self.active()
            .iter()
            .map(|l| l.taps.first().map_or(0.0, |t| t.delay.delay()))
            .collect()
    }

    pub fn snapshot(&self) -> FdnSnapshot {
        FdnSnapshot {
            order: self.order.get(),
            topology: self.matrix.topology(),
            input_gains: self.input_gains(),
            output_gains: self.output_gains(),
            delay_lengths: self.delay_lengths(),
            matrix: self.matrix(),
            dry_wet: self.dry_wet,
            direct_gain: self.direct_gain,
            filter: self.filter,
            low_delay_ms: self.low_delay_ms,
            high_delay_ms: self.high_delay_ms,
            mod_depths: self.active().iter().map(|l| l.mod_depth).collect(),
            mod_rates: self.active().iter().map(|l| l.lfo.frequency()).collect(),
        }
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    /// The one place the active line count is derived.
    #[inline]
    fn active(&self) -> &[FdnLine] {
        &self.lines[..self.order.get()]
    }

    fn check_index(&self, index: usize) -> Result<()> {
        let len = self.order.get();
        if index < len {
            Ok(())
        } else {
            Err(FdnError::OutOfRange { index, len })
        }
    }

    fn set_gains(&mut self, gains: &[f32], mut assign: impl FnMut(&mut FdnLine, f32)) -> Result<()> {
        let n = self.order.get();
        expect_len(n, gains.len())?;
        finite_all("gain", gains)?;
        for (line, &gain) in self.lines[..n].iter_mut().zip(gains) {
            assign(line, gain);
        }
        Ok(())
    }

    /// Fill `scratch_table[..n]` with primes from the ms window, or fail
    /// leaving the live table alone.
    fn search_delay_table(&mut self, low_ms: f32, high_ms: f32, n: usize) -> Result<()> {
        let low = ms_to_samples(low_ms, self.sample_rate);
        let high = ms_to_samples(high_ms, self.sample_rate);
        check_capacity(high, self.max_delay)?;
        let found = find_primes_in_range(low, high, &mut self.scratch_table[..n]);
        if found < n {
            return Err(FdnError::InsufficientPrimes {
                low,
                high,
                found,
                needed: n,
            });
        }
        Ok(())
    }

    fn recompute_filters(&mut self) {
        let n = self.order.get();
        for line in &mut self.lines[..n] {
            line.update_filters(&self.filter, self.sample_rate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::primes::is_prime;

    fn quiet_config() -> FdnConfig {
        FdnConfig::default()
            .with_order(NetworkOrder::Four)
            .with_dry_wet(1.0)
            .with_modulation(0.0, Some(0.0))
            .with_delay_capacity(4096)
            .with_seed(42)
    }

    fn engine() -> FdnReverb {
        FdnReverb::new(quiet_config()).expect("valid config")
    }

    #[test]
    fn test_init_builds_prime_table() {
        let fdn = engine();
        assert_eq!(fdn.delay_lengths(), vec![241, 251, 257, 263]);
        assert_eq!(fdn.matrix_order(), 4);
        assert_eq!(fdn.topology(), MatrixTopology::Identity);
    }

    #[test]
    fn test_gains_are_random_in_unit_range() {
        let fdn = engine();
        for g in fdn.input_gains().into_iter().chain(fdn.output_gains()) {
            assert!((-1.0..=1.0).contains(&g), "gain {} out of range", g);
        }
    }

    #[test]
    fn test_same_seed_same_gains() {
        assert_eq!(engine().input_gains(), engine().input_gains());
    }

    #[test]
    fn test_out_of_range_index_is_reported() {
        let mut fdn = engine();
        assert_eq!(
            fdn.set_input_gain(4, 0.5),
            Err(FdnError::OutOfRange { index: 4, len: 4 })
        );
        assert!(fdn.output_gain(9).is_err());
        assert_eq!(
            fdn.set_matrix_cell(0, 4, 1.0),
            Err(FdnError::CellOutOfRange { row: 0, col: 4, order: 4 })
        );
        assert!(fdn.set_line_mod_rate(31, 1.0).is_err());
    }

    #[test]
    fn test_whole_vector_length_is_checked() {
        let mut fdn = engine();
        assert_eq!(
            fdn.set_input_gains(&[1.0; 3]),
            Err(FdnError::LengthMismatch { expected: 4, actual: 3 })
        );
        assert!(fdn.set_matrix(&[0.0; 15]).is_err());
        assert!(fdn.set_output_gains(&[0.25; 4]).is_ok());
        assert_eq!(fdn.output_gains(), vec![0.25; 4]);
    }

    #[test]
    fn test_matrix_cell_switches_to_custom() {
        let mut fdn = engine();
        fdn.set_matrix_cell(1, 2, 0.5).unwrap();
        assert_eq!(fdn.topology(), MatrixTopology::Custom);
        assert_eq!(fdn.matrix()[6], 0.5);
    }

    #[test]
    fn test_update_delay_sets_window_and_ramps() {
        let mut fdn = engine();
        fdn.update_delay(30.0).unwrap();
        let (low, high) = fdn.delay_range_ms();
        assert!((low - 18.0).abs() < 1e-4);
        assert_eq!(high, 30.0);

        let lengths = fdn.delay_lengths();
        assert!(lengths.iter().all(|&l| is_prime(l) && (863..=1440).contains(&l)));
        // Still reading the old length until the ramp runs.
        assert_eq!(fdn.current_delays()[0], 241.0);

        let ramp = (DELAY_RAMP_SECONDS * 48_000.0) as usize;
        for _ in 0..ramp {
            fdn.process_sample(0, 0.0);
            fdn.process_sample(1, 0.0);
        }
        assert_eq!(fdn.current_delays()[0], lengths[0] as f32);
    }

    #[test]
    fn test_update_delay_with_too_few_primes_keeps_table() {
        let mut fdn = FdnReverb::new(quiet_config().with_order(NetworkOrder::ThirtyTwo)).unwrap();
        let before = fdn.delay_lengths();
        let err = fdn.update_delay(10.0).unwrap_err();
        assert!(matches!(
            err,
            FdnError::InsufficientPrimes { needed: 32, found, .. } if found < 32
        ));
        assert_eq!(fdn.delay_lengths(), before);
        assert_eq!(fdn.delay_range_ms(), (5.0, 20.0));
    }

    #[test]
    fn test_delay_window_past_capacity_keeps_table() {
        let mut fdn = engine();
        let before = fdn.delay_lengths();
        assert_eq!(fdn.max_delay(), 4092);

        let err = fdn.update_delay(1000.0).unwrap_err();
        assert_eq!(
            err,
            FdnError::DelayExceedsCapacity {
                samples: 48_000,
                max: 4092
            }
        );
        assert_eq!(fdn.delay_lengths(), before);
        assert_eq!(fdn.delay_range_ms(), (5.0, 20.0));

        for _ in 0..5000 {
            fdn.process_sample(0, 0.0);
            fdn.process_sample(1, 0.0);
        }
        let current: Vec<u32> = fdn.current_delays().iter().map(|&d| d as u32).collect();
        assert_eq!(current, before);
    }

    #[test]
    fn test_direct_delay_past_capacity_is_rejected() {
        let mut fdn = engine();
        assert!(matches!(
            fdn.set_delay_ms(0, 100.0),
            Err(FdnError::DelayExceedsCapacity { samples: 4800, .. })
        ));
        assert!(fdn.set_delays_ms(&[10.0, 10.0, 10.0, 90.0]).is_err());
        assert_eq!(fdn.delay_lengths(), vec![241, 251, 257, 263]);
        assert!(fdn.set_delay_ms(0, 85.0).is_ok());
    }

    #[test]
    fn test_zero_line_depth_restores_nominal_length() {
        let mut fdn = engine();
        fdn.update_modulation(6.0, 1.0).unwrap();
        for _ in 0..12_000 {
            fdn.process_sample(0, 0.0);
            fdn.process_sample(1, 0.0);
        }
        assert_ne!(fdn.current_delays()[0], 241.0);

        fdn.set_line_mod_depth(0, 0.0).unwrap();
        for _ in 0..48_000 {
            fdn.process_sample(0, 0.0);
            fdn.process_sample(1, 0.0);
        }
        assert_eq!(fdn.current_delays()[0], 241.0);
        assert_eq!(fdn.snapshot().mod_depths[0], 0.0);
    }

    #[test]
    fn test_rejected_queued_message_is_counted() {
        struct Queue(std::collections::VecDeque<ControlMessage>);

        impl MessageReceiver for Queue {
            fn pop(&mut self) -> Option<ControlMessage> {
                self.0.pop_front()
            }
        }

        let mut fdn = engine();
        let dropped = fdn.dropped_messages();
        fdn.set_receiver(Box::new(Queue(
            [
                ControlMessage::SetInputGain { index: 9, gain: 0.5 },
                ControlMessage::SetDryWet(0.25),
                ControlMessage::UpdateDelay { target_ms: 1000.0 },
            ]
            .into(),
        )));

        fdn.process_sample(0, 0.0);
        assert_eq!(dropped.load(Ordering::Relaxed), 2);
        assert_eq!(fdn.dry_wet(), 0.25);
    }

    #[test]
    fn test_set_delays_ms_converts_to_samples() {
        let mut fdn = engine();
        fdn.set_delays_ms(&[10.0, 11.0, 12.5, 13.0]).unwrap();
        assert_eq!(fdn.delay_lengths(), vec![480, 528, 600, 624]);
        fdn.set_delay_ms(2, 1.0).unwrap();
        assert_eq!(fdn.delay_lengths()[2], 48);
        assert!(fdn.set_delay_ms(2, -1.0).is_err());
    }

    #[test]
    fn test_update_modulation_offsets_delays() {
        let mut fdn = engine();
        fdn.update_modulation(5.0, 1.0).unwrap();
        // First LFO sample is sin(0) = 0, the second moves off nominal.
        fdn.update_modulation(5.0, 1.0).unwrap();
        let nominal = fdn.delay_lengths();
        let current = fdn.current_delays();
        for (n, c) in nominal.iter().zip(&current) {
            let offset = c - *n as f32;
            assert!(offset > 0.0 && offset <= 5.0, "offset {}", offset);
        }
        assert!(fdn.snapshot().mod_rates.iter().all(|&r| r == 1.0));
    }

    #[test]
    fn test_filter_validation() {
        let mut fdn = engine();
        let bad = FilterParams {
            low_t60: -1.0,
            ..FilterParams::default()
        };
        assert!(fdn.update_filter(bad).is_err());
        assert_eq!(fdn.filter(), FilterParams::default());
    }

    #[test]
    fn test_unknown_channel_is_silent() {
        let mut fdn = engine();
        fdn.process_sample(0, 1.0);
        assert_eq!(fdn.process_sample(5, 1.0), 0.0);
    }

    #[test]
    fn test_raised_gate_mutes_every_channel() {
        let mut fdn = engine();
        fdn.set_dry_wet(0.0).unwrap();
        let gate = fdn.gate();
        gate.raise();
        assert_eq!(fdn.process_sample(0, 1.0), 0.0);
        assert_eq!(fdn.process_sample(1, 1.0), 0.0);
        gate.lower();
        assert_eq!(fdn.process_sample(0, 1.0), OUTPUT_GAIN);
    }

    #[test]
    fn test_apply_commit_lowers_gate() {
        let mut fdn = engine();
        fdn.gate().raise();
        fdn.apply_message(ControlMessage::Commit).unwrap();
        assert!(!fdn.is_reconfiguring());
    }
}
