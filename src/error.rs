use thiserror::Error;

/// Errors reported by the control-path mutators.
///
/// The per-sample path never fails: bad delay requests are clamped and an
/// in-progress reconfiguration produces silence.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FdnError {
    #[error("index {index} out of range for {len} active lines")]
    OutOfRange { index: usize, len: usize },

    #[error("matrix cell ({row}, {col}) out of range for a {order}x{order} matrix")]
    CellOutOfRange { row: usize, col: usize, order: usize },

    #[error("expected {expected} values, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("unsupported network order {0}; expected one of 4, 8, 16, 32")]
    UnsupportedOrder(usize),

    #[error("delay window [{low}, {high}] samples holds {found} primes, {needed} required")]
    InsufficientPrimes {
        low: u32,
        high: u32,
        found: usize,
        needed: usize,
    },

    #[error("delay of {samples} samples exceeds the {max}-sample line capacity")]
    DelayExceedsCapacity { samples: u32, max: u32 },

    #[error("invalid {name}: {value}")]
    InvalidParameter { name: &'static str, value: f32 },

    #[error("control queue is full")]
    QueueFull,
}

pub type Result<T> = std::result::Result<T, FdnError>;
