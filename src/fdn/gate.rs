use std::sync::atomic::{AtomicU32, Ordering};

/// Shared "reconfiguring" flag between the control path and the audio path.
///
/// Counts reconfigurations in flight so overlapping batches from the control
/// side keep the audio muted until the last one commits. The audio path only
/// ever reads it (and lowers it when it applies a commit).
#[derive(Debug, Default)]
pub struct ReconfigGate {
    pending: AtomicU32,
}

impl ReconfigGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.pending.fetch_add(1, Ordering::AcqRel);
    }

    /// Saturates at zero so a stray commit can't wrap the counter.
    pub fn lower(&self) {
        let _ = self
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    #[inline]
    pub fn is_raised(&self) -> bool {
        self.pending.load(Ordering::Acquire) > 0
    }

    /// Raise for the lifetime of the returned guard.
    pub fn hold(&self) -> GateGuard<'_> {
        self.raise();
        GateGuard { gate: self }
    }
}

pub struct GateGuard<'a> {
    gate: &'a ReconfigGate,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.lower();
    }
}
