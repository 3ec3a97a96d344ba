//! Bluetooth headset collaborator
//!
//! The collaborator owns the SCO link; the route engine asks it to start or
//! stop SCO audio and reads its current state on every recomputation. Queued
//! state signals only tell the engine when to look.

use serde::{Deserialize, Serialize};
use std::fmt;

/// State reported by the Bluetooth collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BluetoothState {
    HeadsetUnavailable,
    HeadsetAvailable,
    ScoConnecting,
    ScoConnected,
    ScoDisconnecting,
}

impl BluetoothState {
    /// Whether a usable headset is present for call routing
    pub fn is_routable(&self) -> bool {
        matches!(
            self,
            BluetoothState::HeadsetAvailable
                | BluetoothState::ScoConnecting
                | BluetoothState::ScoConnected
        )
    }

    /// Whether an SCO link is up or being brought up
    pub fn is_sco_engaged(&self) -> bool {
        matches!(
            self,
            BluetoothState::ScoConnecting | BluetoothState::ScoConnected
        )
    }
}

impl fmt::Display for BluetoothState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BluetoothState::HeadsetUnavailable => "headset_unavailable",
            BluetoothState::HeadsetAvailable => "headset_available",
            BluetoothState::ScoConnecting => "sco_connecting",
            BluetoothState::ScoConnected => "sco_connected",
            BluetoothState::ScoDisconnecting => "sco_disconnecting",
        };
        f.write_str(name)
    }
}

/// Commands the route engine issues to the Bluetooth collaborator
///
/// State changes are announced as [`Signal::Bluetooth`](crate::domain::Signal)
/// messages, which may be stale by the time they are delivered.
pub trait BluetoothRoute: Send {
    /// Current state, ahead of any signal still queued
    fn state(&self) -> BluetoothState;

    /// Begin monitoring headset presence and return the initial state
    fn start(&mut self) -> BluetoothState;

    /// Stop monitoring and tear down any SCO link
    fn stop(&mut self);

    /// Ask for an SCO link. Returns false if the request was refused.
    fn start_sco_audio(&mut self) -> bool;

    fn stop_sco_audio(&mut self);

    /// Re-query headset presence and return the resulting state
    fn update_device(&mut self) -> BluetoothState;

    /// Name of the connected headset, if any
    fn headset_name(&self) -> Option<String>;
}
