//! CPAL-backed capability probe
//!
//! A host counts as having a loudspeaker when the audio stack exposes a
//! default output device. Desktop audio stacks have no notion of a handset
//! earpiece, so that flag is supplied by the caller.

use cpal::traits::HostTrait;
use std::fmt;
use tracing::{debug, info};

use callroute_core::domain::CapabilityProbe;

pub struct CpalProbe {
    host: cpal::Host,
    telephony: bool,
}

impl Default for CpalProbe {
    fn default() -> Self {
        Self::new(false)
    }
}

impl CpalProbe {
    /// `telephony` reports whether the host has a handset earpiece
    pub fn new(telephony: bool) -> Self {
        let host = cpal::default_host();
        info!(host = ?host.id(), telephony, "Initializing CPAL capability probe");
        Self { host, telephony }
    }
}

impl CapabilityProbe for CpalProbe {
    fn has_earpiece(&self) -> bool {
        self.telephony
    }

    fn has_speakerphone(&self) -> bool {
        let found = self.host.default_output_device().is_some();
        debug!(found, "Queried default output device");
        found
    }
}

impl fmt::Debug for CpalProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpalProbe")
            .field("host", &self.host.id())
            .field("telephony", &self.telephony)
            .finish()
    }
}
