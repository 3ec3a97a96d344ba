//! Collaborator implementations for the route engine
//!
//! - `simulated`: in-process platform audio session
//! - `bluetooth`: simulated headset with SCO link state
//! - `signal_queue`: bounded delivery of signals to the control thread
//! - `cpal_probe`: capability probe backed by CPAL (feature `cpal-probe`)

pub mod bluetooth;
pub mod signal_queue;
pub mod simulated;

#[cfg(feature = "cpal-probe")]
pub mod cpal_probe;

pub use bluetooth::SimulatedHeadset;
pub use signal_queue::{QueueError, SignalQueue, SignalSender};
pub use simulated::{PlatformCall, SimulatedPlatform, CALL_LOG_CAPACITY};

#[cfg(feature = "cpal-probe")]
pub use cpal_probe::CpalProbe;
