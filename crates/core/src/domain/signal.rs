//! Inbound signals and outbound route-change notifications

use serde::{Deserialize, Serialize};

use crate::domain::bluetooth::BluetoothState;
use crate::domain::device::{AudioDevice, DeviceKind};

/// Proximity sensor reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProximityState {
    Near,
    Far,
}

impl ProximityState {
    /// Device the hint forces when only the handset pair is available
    pub fn preferred_kind(&self) -> DeviceKind {
        match self {
            ProximityState::Near => DeviceKind::Earpiece,
            ProximityState::Far => DeviceKind::Speakerphone,
        }
    }
}

/// Message delivered to the session on the control thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// Wired headset plugged or unplugged
    ///
    /// `has_microphone` is carried through but not acted upon.
    WiredHeadset { plugged: bool, has_microphone: bool },

    /// Bluetooth collaborator changed state
    Bluetooth {
        state: BluetoothState,
        headset: Option<String>,
    },

    /// SCO link did not come up; the collaborator is back to `HeadsetAvailable`
    ScoConnectFailed,

    Proximity(ProximityState),

    /// Explicit user choice (`None` returns to automatic selection)
    SelectDevice(Option<AudioDevice>),
}

/// Notification sent to the call layer when the route or inventory changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteChange {
    pub selected: Option<AudioDevice>,
    pub available: Vec<AudioDevice>,
}

/// Callback receiving route changes
pub type RouteCallback = Box<dyn FnMut(&RouteChange) + Send>;

/// Creates a [`RouteCallback`] from a closure.
pub fn route_callback<F>(f: F) -> RouteCallback
where
    F: FnMut(&RouteChange) + Send + 'static,
{
    Box::new(f)
}
