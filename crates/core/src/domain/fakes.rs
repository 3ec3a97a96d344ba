//! In-memory collaborators for unit tests

use std::sync::{Arc, Mutex};

use crate::domain::bluetooth::{BluetoothRoute, BluetoothState};
use crate::domain::config::CallRouteConfig;
use crate::domain::device::Capabilities;
use crate::domain::platform::{AudioMode, FocusRequest, PlatformAudio, PlatformError};
use crate::domain::router::RouteEngine;
use crate::domain::session::SessionController;
use crate::domain::signal::{route_callback, RouteChange};

#[derive(Debug)]
struct PlatformInner {
    mode: AudioMode,
    muted: bool,
    speaker: bool,
    wired: bool,
    focus: bool,
    refuse_focus: bool,
    refuse_speakerphone: bool,
    speaker_writes: usize,
    mute_writes: usize,
}

#[derive(Debug, Clone)]
pub struct FakePlatform {
    inner: Arc<Mutex<PlatformInner>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(PlatformInner {
                mode: AudioMode::Normal,
                muted: false,
                speaker: false,
                wired: false,
                focus: false,
                refuse_focus: false,
                refuse_speakerphone: false,
                speaker_writes: 0,
                mute_writes: 0,
            })),
        }
    }

    pub fn set_wired(&self, plugged: bool) {
        self.inner.lock().unwrap().wired = plugged;
    }

    pub fn refuse_focus(&self) {
        self.inner.lock().unwrap().refuse_focus = true;
    }

    pub fn refuse_speakerphone(&self) {
        self.inner.lock().unwrap().refuse_speakerphone = true;
    }

    pub fn focus_held(&self) -> bool {
        self.inner.lock().unwrap().focus
    }

    pub fn speaker_writes(&self) -> usize {
        self.inner.lock().unwrap().speaker_writes
    }

    pub fn mute_writes(&self) -> usize {
        self.inner.lock().unwrap().mute_writes
    }
}

impl PlatformAudio for FakePlatform {
    fn mode(&self) -> AudioMode {
        self.inner.lock().unwrap().mode
    }

    fn set_mode(&mut self, mode: AudioMode) {
        self.inner.lock().unwrap().mode = mode;
    }

    fn is_microphone_muted(&self) -> bool {
        self.inner.lock().unwrap().muted
    }

    fn set_microphone_muted(&mut self, muted: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.muted = muted;
        inner.mute_writes += 1;
    }

    fn is_speakerphone_on(&self) -> bool {
        self.inner.lock().unwrap().speaker
    }

    fn set_speakerphone_on(&mut self, on: bool) -> Result<(), PlatformError> {
        let mut inner = self.inner.lock().unwrap();
        if on && inner.refuse_speakerphone {
            return Err(PlatformError::Refused {
                command: "speakerphone",
                reason: "test refusal".to_string(),
            });
        }
        inner.speaker = on;
        inner.speaker_writes += 1;
        Ok(())
    }

    fn is_wired_headset_on(&self) -> bool {
        self.inner.lock().unwrap().wired
    }

    fn request_audio_focus(&mut self, _request: FocusRequest) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.refuse_focus {
            return false;
        }
        inner.focus = true;
        true
    }

    fn abandon_audio_focus(&mut self) {
        self.inner.lock().unwrap().focus = false;
    }
}

#[derive(Debug)]
struct BluetoothInner {
    state: BluetoothState,
    name: Option<String>,
    present: bool,
    accept_sco: bool,
    monitoring: bool,
    sco_starts: usize,
    sco_stops: usize,
}

#[derive(Debug, Clone)]
pub struct FakeBluetooth {
    inner: Arc<Mutex<BluetoothInner>>,
}

impl FakeBluetooth {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(BluetoothInner {
                state: BluetoothState::HeadsetUnavailable,
                name: None,
                present: false,
                accept_sco: true,
                monitoring: false,
                sco_starts: 0,
                sco_stops: 0,
            })),
        }
    }

    /// Move the headset to a new state, without posting any signal
    pub fn set_state(&self, state: BluetoothState, name: Option<&str>) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = state;
        inner.present = state != BluetoothState::HeadsetUnavailable;
        if state == BluetoothState::HeadsetUnavailable {
            inner.name = None;
        } else if let Some(name) = name {
            inner.name = Some(name.to_string());
        }
    }

    /// Headset leaves while its link state is still pending teardown
    pub fn drop_headset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.present = false;
        inner.name = None;
    }

    pub fn refuse_sco(&self) {
        self.inner.lock().unwrap().accept_sco = false;
    }

    pub fn is_monitoring(&self) -> bool {
        self.inner.lock().unwrap().monitoring
    }

    pub fn sco_starts(&self) -> usize {
        self.inner.lock().unwrap().sco_starts
    }

    pub fn sco_stops(&self) -> usize {
        self.inner.lock().unwrap().sco_stops
    }
}

impl BluetoothRoute for FakeBluetooth {
    fn state(&self) -> BluetoothState {
        self.inner.lock().unwrap().state
    }

    fn start(&mut self) -> BluetoothState {
        let mut inner = self.inner.lock().unwrap();
        inner.monitoring = true;
        inner.state
    }

    fn stop(&mut self) {
        self.inner.lock().unwrap().monitoring = false;
    }

    fn start_sco_audio(&mut self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        inner.sco_starts += 1;
        if !inner.accept_sco || inner.state != BluetoothState::HeadsetAvailable {
            return false;
        }
        inner.state = BluetoothState::ScoConnecting;
        true
    }

    fn stop_sco_audio(&mut self) {
        let mut inner = self.inner.lock().unwrap();
        inner.sco_stops += 1;
        inner.state = BluetoothState::ScoDisconnecting;
    }

    fn update_device(&mut self) -> BluetoothState {
        let mut inner = self.inner.lock().unwrap();
        if !inner.state.is_sco_engaged() {
            inner.state = if inner.present {
                BluetoothState::HeadsetAvailable
            } else {
                BluetoothState::HeadsetUnavailable
            };
        }
        inner.state
    }

    fn headset_name(&self) -> Option<String> {
        self.inner.lock().unwrap().name.clone()
    }
}

/// Engine wired to fakes, with every route change recorded
pub struct Harness {
    pub engine: RouteEngine,
    pub platform: FakePlatform,
    pub bluetooth: FakeBluetooth,
    pub changes: Arc<Mutex<Vec<RouteChange>>>,
}

impl Harness {
    pub fn new(config: &CallRouteConfig, capabilities: Capabilities) -> Self {
        let platform = FakePlatform::new();
        let bluetooth = FakeBluetooth::new();
        let changes = Arc::new(Mutex::new(Vec::new()));

        let mut engine = RouteEngine::new(
            config,
            capabilities,
            Box::new(platform.clone()),
            Box::new(bluetooth.clone()),
        );
        let sink = changes.clone();
        engine.set_route_callback(route_callback(move |change| {
            sink.lock().unwrap().push(change.clone());
        }));

        Self {
            engine,
            platform,
            bluetooth,
            changes,
        }
    }

    pub fn phone() -> Self {
        Self::new(&CallRouteConfig::default(), Capabilities::PHONE)
    }

    pub fn change_count(&self) -> usize {
        self.changes.lock().unwrap().len()
    }

    pub fn last_change(&self) -> Option<RouteChange> {
        self.changes.lock().unwrap().last().cloned()
    }

    /// Hand the engine to a session, keeping handles on the fakes
    pub fn into_session(self) -> (SessionController, Probes) {
        let probes = Probes {
            platform: self.platform,
            bluetooth: self.bluetooth,
            changes: self.changes,
        };
        (SessionController::new(self.engine), probes)
    }
}

/// Fakes shared with a session under test
pub struct Probes {
    pub platform: FakePlatform,
    pub bluetooth: FakeBluetooth,
    pub changes: Arc<Mutex<Vec<RouteChange>>>,
}

impl Probes {
    pub fn change_count(&self) -> usize {
        self.changes.lock().unwrap().len()
    }
}
