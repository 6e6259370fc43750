//! Control path: messages from a UI or host thread to the audio thread.

#[cfg(feature = "rtrb")]
mod controller;
mod message;

#[cfg(feature = "rtrb")]
pub use controller::FdnController;
pub use message::{ControlMessage, MessageReceiver};
