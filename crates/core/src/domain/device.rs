//! Audio endpoints and the device inventory
//!
//! This module defines the call audio endpoints (earpiece, speakerphone,
//! wired headset, Bluetooth), the ordered inventory the route engine rebuilds
//! on every signal, and the host capability probe queried once per engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::session::LifecycleState;

/// Errors that can occur while routing call audio
#[derive(Debug, Error)]
pub enum RouteError {
    /// Operation invoked outside its legal lifecycle state
    #[error("Invalid state transition: {operation} is not allowed while {state}")]
    InvalidStateTransition {
        operation: &'static str,
        state: LifecycleState,
    },

    /// Requested device is not in the current inventory
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(AudioDevice),

    /// Platform refused to realize the route for a device
    #[error("Route apply failed for {device}: {reason}")]
    RouteApplyFailure { device: AudioDevice, reason: String },
}

pub type Result<T> = std::result::Result<T, RouteError>;

/// Kind of call audio endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Earpiece,
    Speakerphone,
    WiredHeadset,
    Bluetooth,
    None,
}

impl DeviceKind {
    /// Label used for built-in endpoints
    pub fn default_label(&self) -> &'static str {
        match self {
            DeviceKind::Earpiece => "Earpiece",
            DeviceKind::Speakerphone => "Speakerphone",
            DeviceKind::WiredHeadset => "Wired Headset",
            DeviceKind::Bluetooth => "Bluetooth",
            DeviceKind::None => "None",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceKind::Earpiece => "earpiece",
            DeviceKind::Speakerphone => "speakerphone",
            DeviceKind::WiredHeadset => "wired_headset",
            DeviceKind::Bluetooth => "bluetooth",
            DeviceKind::None => "none",
        };
        f.write_str(name)
    }
}

impl FromStr for DeviceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "earpiece" => Ok(DeviceKind::Earpiece),
            "speaker" | "speakerphone" => Ok(DeviceKind::Speakerphone),
            "wired" | "headset" | "wired_headset" => Ok(DeviceKind::WiredHeadset),
            "bluetooth" | "bt" => Ok(DeviceKind::Bluetooth),
            "none" => Ok(DeviceKind::None),
            other => Err(format!("unknown device kind: {}", other)),
        }
    }
}

/// A selectable call audio endpoint
///
/// Equality covers both kind and label, so two paired Bluetooth headsets
/// with different names are distinct devices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioDevice {
    pub kind: DeviceKind,
    pub label: String,
}

impl AudioDevice {
    pub fn new(kind: DeviceKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
        }
    }

    pub fn earpiece() -> Self {
        Self::new(DeviceKind::Earpiece, DeviceKind::Earpiece.default_label())
    }

    pub fn speakerphone() -> Self {
        Self::new(
            DeviceKind::Speakerphone,
            DeviceKind::Speakerphone.default_label(),
        )
    }

    pub fn wired_headset() -> Self {
        Self::new(
            DeviceKind::WiredHeadset,
            DeviceKind::WiredHeadset.default_label(),
        )
    }

    pub fn bluetooth(name: impl Into<String>) -> Self {
        Self::new(DeviceKind::Bluetooth, name)
    }
}

impl fmt::Display for AudioDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.kind)
    }
}

/// Host capability queries, called once when an engine is built
pub trait CapabilityProbe {
    /// Whether the host can place a call through a handset earpiece
    fn has_earpiece(&self) -> bool;

    /// Whether the host has a physical loudspeaker
    fn has_speakerphone(&self) -> bool;
}

/// Static capability flags of the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub has_earpiece: bool,
    pub has_speakerphone: bool,
}

impl Capabilities {
    /// A phone: earpiece and loudspeaker
    pub const PHONE: Capabilities = Capabilities {
        has_earpiece: true,
        has_speakerphone: true,
    };

    /// A tablet: loudspeaker only
    pub const TABLET: Capabilities = Capabilities {
        has_earpiece: false,
        has_speakerphone: true,
    };

    pub fn probe(probe: &dyn CapabilityProbe) -> Self {
        Self {
            has_earpiece: probe.has_earpiece(),
            has_speakerphone: probe.has_speakerphone(),
        }
    }
}

impl CapabilityProbe for Capabilities {
    fn has_earpiece(&self) -> bool {
        self.has_earpiece
    }

    fn has_speakerphone(&self) -> bool {
        self.has_speakerphone
    }
}

/// Ordered set of available devices, highest priority first
///
/// Always rebuilt from scratch; never patched in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Inventory {
    devices: Vec<AudioDevice>,
}

impl Inventory {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build the inventory in priority order:
    /// Bluetooth > wired headset > earpiece > speakerphone.
    pub fn build(
        bluetooth: Option<AudioDevice>,
        wired_headset: bool,
        capabilities: Capabilities,
    ) -> Self {
        let mut devices = Vec::with_capacity(4);
        if let Some(headset) = bluetooth {
            devices.push(headset);
        }
        if wired_headset {
            devices.push(AudioDevice::wired_headset());
        }
        if capabilities.has_earpiece {
            devices.push(AudioDevice::earpiece());
        }
        if capabilities.has_speakerphone {
            devices.push(AudioDevice::speakerphone());
        }
        Self { devices }
    }

    /// Drop every device of the given kind
    pub fn without(mut self, kind: DeviceKind) -> Self {
        self.devices.retain(|d| d.kind != kind);
        self
    }

    pub fn contains(&self, device: &AudioDevice) -> bool {
        self.devices.contains(device)
    }

    pub fn find(&self, kind: DeviceKind) -> Option<&AudioDevice> {
        self.devices.iter().find(|d| d.kind == kind)
    }

    /// Highest-priority device
    pub fn first(&self) -> Option<&AudioDevice> {
        self.devices.first()
    }

    /// True when only the built-in earpiece and loudspeaker are available
    pub fn is_handset_pair(&self) -> bool {
        self.devices.len() == 2
            && self.find(DeviceKind::Earpiece).is_some()
            && self.find(DeviceKind::Speakerphone).is_some()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AudioDevice> {
        self.devices.iter()
    }

    pub fn as_slice(&self) -> &[AudioDevice] {
        &self.devices
    }

    pub fn to_vec(&self) -> Vec<AudioDevice> {
        self.devices.clone()
    }
}
