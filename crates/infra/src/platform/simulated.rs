//! Simulated platform audio session
//!
//! Holds the mode, mute and speakerphone flags in memory and records the
//! most recent commands it receives. Handles are cheap clones sharing one
//! state, so a test or script can keep one while the engine owns another.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use callroute_core::domain::{AudioMode, FocusRequest, PlatformAudio, PlatformError, Signal};

use super::signal_queue::SignalSender;

/// Commands kept in the log; older ones are dropped first
pub const CALL_LOG_CAPACITY: usize = 256;

/// A command received by the simulated platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum PlatformCall {
    SetMode { mode: String },
    SetMicrophoneMuted { muted: bool },
    SetSpeakerphoneOn { on: bool },
    RequestFocus { granted: bool },
    AbandonFocus,
}

#[derive(Debug)]
struct State {
    mode: AudioMode,
    microphone_muted: bool,
    speakerphone_on: bool,
    wired_headset: bool,
    focus_held: bool,
    grant_focus: bool,
    refuse_speakerphone: bool,
    calls: VecDeque<PlatformCall>,
    signals: Option<SignalSender>,
}

impl State {
    fn record(&mut self, call: PlatformCall) {
        if self.calls.len() == CALL_LOG_CAPACITY {
            self.calls.pop_front();
        }
        self.calls.push_back(call);
    }
}

/// In-memory [`PlatformAudio`] implementation
#[derive(Debug, Clone)]
pub struct SimulatedPlatform {
    state: Arc<Mutex<State>>,
}

impl Default for SimulatedPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedPlatform {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                mode: AudioMode::Normal,
                microphone_muted: false,
                speakerphone_on: false,
                wired_headset: false,
                focus_held: false,
                grant_focus: true,
                refuse_speakerphone: false,
                calls: VecDeque::with_capacity(CALL_LOG_CAPACITY),
                signals: None,
            })),
        }
    }

    /// Post wired headset changes to this queue
    pub fn with_signals(self, sender: SignalSender) -> Self {
        self.lock().signals = Some(sender);
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Plug in a wired headset
    pub fn plug_headset(&self, has_microphone: bool) {
        self.set_wired_headset(true, has_microphone);
    }

    pub fn unplug_headset(&self) {
        self.set_wired_headset(false, false);
    }

    fn set_wired_headset(&self, plugged: bool, has_microphone: bool) {
        let sender = {
            let mut state = self.lock();
            if state.wired_headset == plugged {
                return;
            }
            state.wired_headset = plugged;
            state.signals.clone()
        };
        info!(plugged, has_microphone, "Wired headset changed");

        if let Some(sender) = sender {
            if let Err(e) = sender.try_send(Signal::WiredHeadset {
                plugged,
                has_microphone,
            }) {
                warn!(error = %e, "Failed to post wired headset signal");
            }
        }
    }

    /// Make audio focus requests fail
    pub fn deny_focus(&self) {
        self.lock().grant_focus = false;
    }

    /// Make requests to turn the loudspeaker on fail
    pub fn refuse_speakerphone(&self, refuse: bool) {
        self.lock().refuse_speakerphone = refuse;
    }

    pub fn focus_held(&self) -> bool {
        self.lock().focus_held
    }

    /// Most recent commands, oldest first
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.lock().calls.iter().cloned().collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }
}

impl PlatformAudio for SimulatedPlatform {
    fn mode(&self) -> AudioMode {
        self.lock().mode
    }

    fn set_mode(&mut self, mode: AudioMode) {
        let mut state = self.lock();
        debug!(?mode, "Audio mode set");
        state.mode = mode;
        state.record(PlatformCall::SetMode {
            mode: format!("{:?}", mode),
        });
    }

    fn is_microphone_muted(&self) -> bool {
        self.lock().microphone_muted
    }

    fn set_microphone_muted(&mut self, muted: bool) {
        let mut state = self.lock();
        state.microphone_muted = muted;
        state.record(PlatformCall::SetMicrophoneMuted { muted });
    }

    fn is_speakerphone_on(&self) -> bool {
        self.lock().speakerphone_on
    }

    fn set_speakerphone_on(&mut self, on: bool) -> Result<(), PlatformError> {
        let mut state = self.lock();
        if on && state.refuse_speakerphone {
            return Err(PlatformError::Refused {
                command: "set_speakerphone_on",
                reason: "loudspeaker unavailable".to_string(),
            });
        }
        state.speakerphone_on = on;
        state.record(PlatformCall::SetSpeakerphoneOn { on });
        Ok(())
    }

    fn is_wired_headset_on(&self) -> bool {
        self.lock().wired_headset
    }

    fn request_audio_focus(&mut self, request: FocusRequest) -> bool {
        let mut state = self.lock();
        let granted = state.grant_focus;
        debug!(?request, granted, "Audio focus requested");
        state.focus_held = granted;
        state.record(PlatformCall::RequestFocus { granted });
        granted
    }

    fn abandon_audio_focus(&mut self) {
        let mut state = self.lock();
        state.focus_held = false;
        state.record(PlatformCall::AbandonFocus);
    }
}
