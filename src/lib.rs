//! Feedback Delay Network reverb.
//!
//! ```ignore
//! use fdn_verb::{FdnConfig, FdnReverb, NetworkOrder};
//!
//! let mut fdn = FdnReverb::new(FdnConfig::default().with_order(NetworkOrder::Eight))?;
//! let left = fdn.process_sample(0, input_l);
//! let right = fdn.process_sample(1, input_r);
//! ```

pub mod control; // Messages and the non-realtime controller
pub mod dsp; // Delay, filter, matrix and modulation primitives
pub mod error;
pub mod fdn; // The reverb engine

pub use control::{ControlMessage, MessageReceiver};
#[cfg(feature = "rtrb")]
pub use control::FdnController;
pub use dsp::MatrixTopology;
pub use error::{FdnError, Result};
pub use fdn::{FdnConfig, FdnReverb, FdnSnapshot, FilterParams, NetworkOrder, OUTPUT_GAIN};

/// Largest supported network; all per-line storage is sized for it.
pub const MAX_ORDER: usize = 32;

/// Default history per delay line, in samples.
pub const DEFAULT_DELAY_CAPACITY: usize = 65_536;

pub const MAX_BLOCK_SIZE: usize = 2048;
