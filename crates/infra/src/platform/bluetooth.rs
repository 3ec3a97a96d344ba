//! Simulated Bluetooth headset
//!
//! Models headset pairing and the SCO link lifecycle. The link does not come
//! up on its own: a driver (test or script) completes it with
//! [`SimulatedHeadset::sco_connected`] or fails it with
//! [`SimulatedHeadset::sco_timeout`]. Both post the matching signal.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use callroute_core::domain::{BluetoothConfig, BluetoothRoute, BluetoothState, Signal};

use super::signal_queue::SignalSender;

#[derive(Debug)]
struct State {
    state: BluetoothState,
    headset: Option<String>,
    monitoring: bool,
    refuse_sco: bool,
    sco_attempts: u32,
    sco_max_attempts: u32,
    signals: Option<SignalSender>,
}

/// In-memory [`BluetoothRoute`] implementation
#[derive(Debug, Clone)]
pub struct SimulatedHeadset {
    state: Arc<Mutex<State>>,
}

impl SimulatedHeadset {
    pub fn new(config: &BluetoothConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                state: BluetoothState::HeadsetUnavailable,
                headset: None,
                monitoring: false,
                refuse_sco: false,
                sco_attempts: 0,
                sco_max_attempts: config.sco_max_attempts,
                signals: None,
            })),
        }
    }

    /// Post state changes to this queue
    pub fn with_signals(self, sender: SignalSender) -> Self {
        self.lock().signals = Some(sender);
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn sco_attempts(&self) -> u32 {
        self.lock().sco_attempts
    }

    /// Connect a headset, replacing any current one
    pub fn pair(&self, name: &str) {
        let mut state = self.lock();
        info!(headset = name, "Bluetooth headset connected");
        state.headset = Some(name.to_string());
        state.state = BluetoothState::HeadsetAvailable;
        state.sco_attempts = 0;
        Self::post_state(&state);
    }

    pub fn unpair(&self) {
        let mut state = self.lock();
        if state.headset.take().is_none() {
            return;
        }
        info!("Bluetooth headset disconnected");
        state.state = BluetoothState::HeadsetUnavailable;
        state.sco_attempts = 0;
        Self::post_state(&state);
    }

    /// Reject future SCO start requests
    pub fn refuse_sco(&self, refuse: bool) {
        self.lock().refuse_sco = refuse;
    }

    /// Complete a pending SCO connection
    pub fn sco_connected(&self) -> bool {
        let mut state = self.lock();
        if state.state != BluetoothState::ScoConnecting {
            warn!(state = %state.state, "No SCO connection pending");
            return false;
        }
        state.state = BluetoothState::ScoConnected;
        info!("SCO audio connected");
        Self::post_state(&state);
        true
    }

    /// Fail a pending SCO connection
    pub fn sco_timeout(&self) -> bool {
        let mut state = self.lock();
        if state.state != BluetoothState::ScoConnecting {
            warn!(state = %state.state, "No SCO connection pending");
            return false;
        }
        state.state = BluetoothState::HeadsetAvailable;
        warn!(attempts = state.sco_attempts, "SCO connection timed out");
        Self::post(&state, Signal::ScoConnectFailed);
        true
    }

    fn post_state(state: &State) {
        Self::post(
            state,
            Signal::Bluetooth {
                state: state.state,
                headset: state.headset.clone(),
            },
        );
    }

    fn post(state: &State, signal: Signal) {
        if !state.monitoring {
            return;
        }
        if let Some(sender) = &state.signals {
            if let Err(e) = sender.try_send(signal) {
                warn!(error = %e, "Failed to post Bluetooth signal");
            }
        }
    }
}

impl BluetoothRoute for SimulatedHeadset {
    fn state(&self) -> BluetoothState {
        self.lock().state
    }

    fn start(&mut self) -> BluetoothState {
        let mut state = self.lock();
        state.monitoring = true;
        debug!(state = %state.state, "Bluetooth monitoring started");
        state.state
    }

    fn stop(&mut self) {
        let mut state = self.lock();
        state.monitoring = false;
        if state.state.is_sco_engaged() {
            state.state = BluetoothState::HeadsetAvailable;
        }
        debug!("Bluetooth monitoring stopped");
    }

    fn start_sco_audio(&mut self) -> bool {
        let mut state = self.lock();
        if state.state != BluetoothState::HeadsetAvailable {
            warn!(state = %state.state, "SCO start requested without an idle headset");
            return false;
        }
        if state.refuse_sco {
            warn!("SCO start refused");
            return false;
        }
        if state.sco_attempts >= state.sco_max_attempts {
            warn!(
                attempts = state.sco_attempts,
                max = state.sco_max_attempts,
                "SCO start attempts exhausted"
            );
            return false;
        }
        state.sco_attempts += 1;
        state.state = BluetoothState::ScoConnecting;
        debug!(attempt = state.sco_attempts, "SCO connection started");
        true
    }

    fn stop_sco_audio(&mut self) {
        let mut state = self.lock();
        if state.state.is_sco_engaged() {
            state.state = BluetoothState::ScoDisconnecting;
            debug!("SCO connection stopping");
        }
    }

    fn update_device(&mut self) -> BluetoothState {
        let mut state = self.lock();
        if !state.state.is_sco_engaged() {
            state.state = if state.headset.is_some() {
                BluetoothState::HeadsetAvailable
            } else {
                BluetoothState::HeadsetUnavailable
            };
        }
        state.state
    }

    fn headset_name(&self) -> Option<String> {
        self.lock().headset.clone()
    }
}
