#[cfg(feature = "rtrb")]
use rtrb::Consumer;

use crate::dsp::matrix::MatrixTopology;
use crate::fdn::{FilterParams, NetworkOrder};

/// One parameter change for the audio thread.
///
/// Messages are applied at the start of a frame in the order they were
/// queued. Structural changes arrive as a batch closed by [`Commit`], with the
/// reconfiguration gate held for the whole batch.
///
/// [`Commit`]: ControlMessage::Commit
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ControlMessage {
    SetInputGain { index: usize, gain: f32 },
    SetOutputGain { index: usize, gain: f32 },
    SetDryWet(f32),
    SetDirectGain(f32),
    SetFilter(FilterParams),
    UpdateDelay { target_ms: f32 },
    SetDelayMs { index: usize, ms: f32 },
    ClearHistory,
    SetMatrixCell { row: usize, col: usize, value: f32 },
    SelectTopology(MatrixTopology),
    SetModulation { depth: f32, rate: f32 },
    SetLineModDepth { index: usize, depth: f32 },
    SetLineModRate { index: usize, rate: f32 },
    SetOrder {
        order: NetworkOrder,
        topology: MatrixTopology,
    },
    /// Closes a batch and lowers the gate.
    Commit,
}

pub trait MessageReceiver {
    fn pop(&mut self) -> Option<ControlMessage>;
}

#[cfg(feature = "rtrb")]
impl MessageReceiver for Consumer<ControlMessage> {
    fn pop(&mut self) -> Option<ControlMessage> {
        Consumer::pop(self).ok()
    }
}
