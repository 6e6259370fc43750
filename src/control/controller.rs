use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use rtrb::Producer;

use super::ControlMessage;
use crate::dsp::matrix::MatrixTopology;
use crate::dsp::primes::{count_primes_in_range, ms_to_samples};
use crate::error::{FdnError, Result};
use crate::fdn::config::{check_capacity, expect_len, finite, finite_all, non_negative, positive};
use crate::fdn::{FdnReverb, FilterParams, NetworkOrder, ReconfigGate, LOW_DELAY_RATIO};

/// Non-realtime handle that drives an [`FdnReverb`] through a lock-free queue.
///
/// Mirrors the engine's order and delay window so bad requests are rejected
/// here instead of on the audio thread. Changes that touch several lines go
/// out as one batch: the gate is raised first, the messages follow, and a
/// `Commit` closes the batch. The engine stays silent until it applies the
/// commit, so a half-applied batch is never heard.
pub struct FdnController {
    tx: Producer<ControlMessage>,
    gate: Arc<ReconfigGate>,
    order: NetworkOrder,
    sample_rate: f32,
    low_delay_ms: f32,
    high_delay_ms: f32,
    max_delay: u32,
    dropped: Arc<AtomicU32>,
}

impl FdnController {
    pub fn new(tx: Producer<ControlMessage>, engine: &FdnReverb) -> Self {
        let (low_delay_ms, high_delay_ms) = engine.delay_range_ms();
        Self {
            tx,
            gate: engine.gate(),
            order: engine.order(),
            sample_rate: engine.sample_rate(),
            low_delay_ms,
            high_delay_ms,
            max_delay: engine.max_delay(),
            dropped: engine.dropped_messages(),
        }
    }

    pub fn order(&self) -> NetworkOrder {
        self.order
    }

    pub fn delay_range_ms(&self) -> (f32, f32) {
        (self.low_delay_ms, self.high_delay_ms)
    }

    pub fn is_reconfiguring(&self) -> bool {
        self.gate.is_raised()
    }

    /// Take the count of messages the engine dropped since the last call,
    /// logging it if any were.
    pub fn take_dropped(&self) -> u32 {
        let dropped = self.dropped.swap(0, Ordering::Relaxed);
        if dropped > 0 {
            log::warn!("engine dropped {} control messages", dropped);
        }
        dropped
    }

    // ---------------------------------------------------------------------
    // Structural changes (gated batches)
    // ---------------------------------------------------------------------

    pub fn set_order(&mut self, order: NetworkOrder, topology: MatrixTopology) -> Result<()> {
        self.check_primes(self.low_delay_ms, self.high_delay_ms, order.get())?;
        self.send_batch(&[ControlMessage::SetOrder { order, topology }])?;
        self.order = order;
        log::info!("order change to {} queued", order.get());
        Ok(())
    }

    /// Load a full `N²` row-major matrix.
    pub fn set_matrix(&mut self, row_major: &[f32]) -> Result<()> {
        let n = self.order.get();
        expect_len(n * n, row_major.len())?;
        finite_all("matrix coefficient", row_major)?;
        let batch: Vec<ControlMessage> = row_major
            .iter()
            .enumerate()
            .map(|(k, &value)| ControlMessage::SetMatrixCell {
                row: k / n,
                col: k % n,
                value,
            })
            .collect();
        self.send_batch(&batch)
    }

    pub fn set_input_gains(&mut self, gains: &[f32]) -> Result<()> {
        expect_len(self.order.get(), gains.len())?;
        finite_all("input_gain", gains)?;
        let batch: Vec<ControlMessage> = gains
            .iter()
            .enumerate()
            .map(|(index, &gain)| ControlMessage::SetInputGain { index, gain })
            .collect();
        self.send_batch(&batch)
    }

    pub fn set_output_gains(&mut self, gains: &[f32]) -> Result<()> {
        expect_len(self.order.get(), gains.len())?;
        finite_all("output_gain", gains)?;
        let batch: Vec<ControlMessage> = gains
            .iter()
            .enumerate()
            .map(|(index, &gain)| ControlMessage::SetOutputGain { index, gain })
            .collect();
        self.send_batch(&batch)
    }

    /// Set every line's length in milliseconds. History is cleared.
    pub fn set_delays_ms(&mut self, delays_ms: &[f32]) -> Result<()> {
        expect_len(self.order.get(), delays_ms.len())?;
        for &ms in delays_ms {
            non_negative("delay_ms", ms)?;
            check_capacity(ms_to_samples(ms, self.sample_rate), self.max_delay)?;
        }
        let batch: Vec<ControlMessage> = std::iter::once(ControlMessage::ClearHistory)
            .chain(
                delays_ms
                    .iter()
                    .enumerate()
                    .map(|(index, &ms)| ControlMessage::SetDelayMs { index, ms }),
            )
            .collect();
        self.send_batch(&batch)
    }

    // ---------------------------------------------------------------------
    // Continuous parameters
    // ---------------------------------------------------------------------

    pub fn set_input_gain(&mut self, index: usize, gain: f32) -> Result<()> {
        self.check_index(index)?;
        finite("input_gain", gain)?;
        self.send(ControlMessage::SetInputGain { index, gain })
    }

    pub fn set_output_gain(&mut self, index: usize, gain: f32) -> Result<()> {
        self.check_index(index)?;
        finite("output_gain", gain)?;
        self.send(ControlMessage::SetOutputGain { index, gain })
    }

    pub fn set_dry_wet(&mut self, fraction: f32) -> Result<()> {
        finite("dry_wet", fraction)?;
        self.send(ControlMessage::SetDryWet(fraction))
    }

    pub fn set_direct_gain(&mut self, gain: f32) -> Result<()> {
        finite("direct_gain", gain)?;
        self.send(ControlMessage::SetDirectGain(gain))
    }

    pub fn update_filter(&mut self, params: FilterParams) -> Result<()> {
        params.validate(self.sample_rate)?;
        self.send(ControlMessage::SetFilter(params))
    }

    /// Retarget the delay window; lines glide to their new lengths.
    pub fn update_delay(&mut self, target_ms: f32) -> Result<()> {
        positive("target_ms", target_ms)?;
        let low_ms = target_ms * LOW_DELAY_RATIO;
        self.check_primes(low_ms, target_ms, self.order.get())?;
        self.send(ControlMessage::UpdateDelay { target_ms })?;
        self.low_delay_ms = low_ms;
        self.high_delay_ms = target_ms;
        log::debug!("delay window {:.2}-{:.2} ms queued", low_ms, target_ms);
        Ok(())
    }

    pub fn set_delay_ms(&mut self, index: usize, ms: f32) -> Result<()> {
        self.check_index(index)?;
        non_negative("delay_ms", ms)?;
        check_capacity(ms_to_samples(ms, self.sample_rate), self.max_delay)?;
        self.send(ControlMessage::SetDelayMs { index, ms })
    }

    pub fn set_matrix_cell(&mut self, row: usize, col: usize, value: f32) -> Result<()> {
        let order = self.order.get();
        if row >= order || col >= order {
            return Err(FdnError::CellOutOfRange { row, col, order });
        }
        finite("matrix coefficient", value)?;
        self.send(ControlMessage::SetMatrixCell { row, col, value })
    }

    pub fn select_topology(&mut self, topology: MatrixTopology) -> Result<()> {
        self.send(ControlMessage::SelectTopology(topology))
    }

    pub fn update_modulation(&mut self, depth: f32, rate: f32) -> Result<()> {
        finite("mod_depth", depth)?;
        non_negative("mod_rate", rate)?;
        self.send(ControlMessage::SetModulation { depth, rate })
    }

    pub fn set_line_mod_depth(&mut self, index: usize, depth: f32) -> Result<()> {
        self.check_index(index)?;
        finite("mod_depth", depth)?;
        self.send(ControlMessage::SetLineModDepth { index, depth })
    }

    pub fn set_line_mod_rate(&mut self, index: usize, rate: f32) -> Result<()> {
        self.check_index(index)?;
        non_negative("mod_rate", rate)?;
        self.send(ControlMessage::SetLineModRate { index, rate })
    }

    pub fn clear_history(&mut self) -> Result<()> {
        self.send(ControlMessage::ClearHistory)
    }

    // ---------------------------------------------------------------------
    // Queue plumbing
    // ---------------------------------------------------------------------

    fn send(&mut self, message: ControlMessage) -> Result<()> {
        self.tx.push(message).map_err(|_| FdnError::QueueFull)
    }

    /// Raise the gate, queue `batch`, then `Commit`.
    ///
    /// Nothing is queued and the gate stays down unless the whole batch fits.
    fn send_batch(&mut self, batch: &[ControlMessage]) -> Result<()> {
        if self.tx.slots() < batch.len() + 1 {
            log::warn!(
                "control queue has {} free slots, batch needs {}",
                self.tx.slots(),
                batch.len() + 1
            );
            return Err(FdnError::QueueFull);
        }

        self.gate.raise();
        for &message in batch.iter().chain(std::iter::once(&ControlMessage::Commit)) {
            if self.tx.push(message).is_err() {
                // Single producer: the slot check makes this unreachable in practice.
                self.gate.lower();
                return Err(FdnError::QueueFull);
            }
        }
        Ok(())
    }

    fn check_index(&self, index: usize) -> Result<()> {
        let len = self.order.get();
        if index < len {
            Ok(())
        } else {
            Err(FdnError::OutOfRange { index, len })
        }
    }

    fn check_primes(&self, low_ms: f32, high_ms: f32, needed: usize) -> Result<()> {
        let low = ms_to_samples(low_ms, self.sample_rate);
        let high = ms_to_samples(high_ms, self.sample_rate);
        check_capacity(high, self.max_delay)?;
        let found = count_primes_in_range(low, high, needed);
        if found < needed {
            return Err(FdnError::InsufficientPrimes {
                low,
                high,
                found,
                needed,
            });
        }
        Ok(())
    }
}
