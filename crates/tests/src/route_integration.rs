//! Integration tests for a full call session
//!
//! These tests wire the session to the simulated platform and headset, with
//! every collaborator signal travelling through the bounded signal queue.

use std::sync::{Arc, Mutex};

use callroute_core::domain::{
    route_callback, AudioDevice, AudioMode, BluetoothRoute, BluetoothState, CallRouteConfig,
    Capabilities,
    DeviceKind, LifecycleState, PlatformAudio, RouteChange, RouteEngine, RouteError,
    SessionController, SpeakerphoneBehavior,
};
use callroute_infra::platform::{PlatformCall, SignalQueue, SimulatedHeadset, SimulatedPlatform};

struct Call {
    session: SessionController,
    queue: SignalQueue,
    platform: SimulatedPlatform,
    headset: SimulatedHeadset,
    changes: Arc<Mutex<Vec<RouteChange>>>,
}

impl Call {
    fn new(config: &CallRouteConfig, capabilities: Capabilities) -> Self {
        let queue = SignalQueue::with_capacity(config.engine.signal_queue_capacity);
        let platform = SimulatedPlatform::new().with_signals(queue.sender());
        let headset = SimulatedHeadset::new(&config.bluetooth).with_signals(queue.sender());
        let engine = RouteEngine::new(
            config,
            capabilities,
            Box::new(platform.clone()),
            Box::new(headset.clone()),
        );

        let mut session = SessionController::new(engine);
        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = changes.clone();
        session.set_route_callback(route_callback(move |change| {
            sink.lock().unwrap().push(change.clone());
        }));

        Self {
            session,
            queue,
            platform,
            headset,
            changes,
        }
    }

    fn phone() -> Self {
        Self::new(&CallRouteConfig::default(), Capabilities::PHONE)
    }

    fn pump(&mut self) -> usize {
        self.queue.pump(&mut self.session)
    }

    fn selected_kind(&self) -> Option<DeviceKind> {
        self.session.selected_device().map(|d| d.kind)
    }

    fn change_count(&self) -> usize {
        self.changes.lock().unwrap().len()
    }
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[test]
fn test_full_call_restores_platform() {
    let mut call = Call::phone();
    let mut platform = call.platform.clone();
    platform.set_microphone_muted(true);
    platform.set_mode(AudioMode::Ringtone);
    call.platform.clear_calls();

    call.session.start().unwrap();
    call.session.activate().unwrap();

    assert_eq!(platform.mode(), AudioMode::InCommunication);
    assert!(!platform.is_microphone_muted());
    assert!(call.platform.focus_held());

    call.session
        .select_device(Some(AudioDevice::speakerphone()))
        .unwrap();
    assert!(platform.is_speakerphone_on());

    call.session.deactivate().unwrap();
    call.session.stop().unwrap();

    assert_eq!(platform.mode(), AudioMode::Ringtone);
    assert!(platform.is_microphone_muted());
    assert!(!platform.is_speakerphone_on());
    assert!(!call.platform.focus_held());
    assert_eq!(call.session.state(), LifecycleState::Stopped);

    let calls = call.platform.calls();
    assert_eq!(calls.first(), Some(&PlatformCall::SetMicrophoneMuted { muted: false }));
    assert_eq!(calls.last(), Some(&PlatformCall::AbandonFocus));
}

#[test]
fn test_focus_denied_call_still_routes() {
    let mut call = Call::phone();
    call.platform.deny_focus();

    call.session.start().unwrap();
    call.session.activate().unwrap();

    assert_eq!(call.session.state(), LifecycleState::Active);
    assert_eq!(call.platform.mode(), AudioMode::InCommunication);
    assert_eq!(call.selected_kind(), Some(DeviceKind::Earpiece));
}

#[test]
fn test_signals_before_start_are_dropped() {
    let mut call = Call::phone();

    call.headset.pair("Buds");
    call.platform.plug_headset(true);
    // Headset posts nothing until monitored; the wired headset still posts
    assert_eq!(call.pump(), 1);
    assert!(call.session.available_devices().is_empty());
    assert_eq!(call.change_count(), 0);

    // Initial state is read at start instead
    call.session.start().unwrap();
    assert_eq!(call.selected_kind(), Some(DeviceKind::Bluetooth));
    assert_eq!(call.session.available_devices().len(), 4);
}

// ============================================================================
// ROUTING THROUGH THE SIGNAL QUEUE
// ============================================================================

#[test]
fn test_headset_hotplug_during_call() {
    let mut call = Call::phone();
    call.session.start().unwrap();
    call.session.activate().unwrap();

    call.platform.plug_headset(true);
    call.pump();
    assert_eq!(call.selected_kind(), Some(DeviceKind::WiredHeadset));

    call.headset.pair("Car Kit");
    call.pump();
    assert_eq!(
        call.session.selected_device(),
        Some(&AudioDevice::bluetooth("Car Kit"))
    );
    assert_eq!(call.headset.state(), BluetoothState::ScoConnecting);

    call.headset.sco_connected();
    call.pump();
    assert_eq!(
        call.session.engine().bluetooth_state(),
        BluetoothState::ScoConnected
    );

    call.headset.unpair();
    call.pump();
    assert_eq!(call.selected_kind(), Some(DeviceKind::WiredHeadset));

    call.platform.unplug_headset();
    call.pump();
    assert_eq!(call.selected_kind(), Some(DeviceKind::Earpiece));
    assert_eq!(call.change_count(), 5);
}

#[test]
fn test_signals_processed_in_delivery_order() {
    let mut call = Call::phone();
    call.session.start().unwrap();

    call.platform.plug_headset(true);
    call.platform.unplug_headset();
    call.platform.plug_headset(false);

    assert_eq!(call.pump(), 3);
    assert_eq!(call.selected_kind(), Some(DeviceKind::WiredHeadset));
    assert_eq!(call.change_count(), 4);
}

#[test]
fn test_sco_retry_budget() {
    let mut call = Call::phone();
    call.session.start().unwrap();
    call.session.activate().unwrap();

    call.headset.pair("Buds");
    call.pump();
    assert_eq!(call.headset.sco_attempts(), 1);

    call.headset.sco_timeout();
    call.pump();
    assert_eq!(call.selected_kind(), Some(DeviceKind::Earpiece));

    // Reconnecting the same headset lifts the exclusion and resets the budget
    call.headset.unpair();
    call.headset.pair("Buds");
    call.pump();
    assert_eq!(call.selected_kind(), Some(DeviceKind::Bluetooth));
    assert_eq!(call.headset.sco_attempts(), 1);
}

#[test]
fn test_stale_sco_report_after_leaving_bluetooth() {
    let mut call = Call::phone();
    call.session.start().unwrap();
    call.session.activate().unwrap();

    call.headset.pair("Buds");
    call.pump();
    assert_eq!(call.headset.sco_attempts(), 1);

    // The connected report is still queued when the user picks the earpiece
    call.headset.sco_connected();
    call.session
        .select_device(Some(AudioDevice::earpiece()))
        .unwrap();
    assert_eq!(call.headset.state(), BluetoothState::HeadsetAvailable);

    call.pump();
    assert_eq!(
        call.session.engine().bluetooth_state(),
        BluetoothState::HeadsetAvailable
    );

    call.session
        .select_device(Some(AudioDevice::bluetooth("Buds")))
        .unwrap();
    assert_eq!(call.selected_kind(), Some(DeviceKind::Bluetooth));
    assert_eq!(call.headset.state(), BluetoothState::ScoConnecting);
    assert_eq!(call.headset.sco_attempts(), 2);
}

#[test]
fn test_refused_sco_keeps_wired_route() {
    let mut call = Call::phone();
    call.session.start().unwrap();
    call.session.activate().unwrap();
    call.platform.plug_headset(true);
    call.headset.refuse_sco(true);

    call.headset.pair("Buds");
    call.pump();

    assert_eq!(call.selected_kind(), Some(DeviceKind::WiredHeadset));
    assert!(call
        .session
        .available_devices()
        .iter()
        .all(|d| d.kind != DeviceKind::Bluetooth));
}

#[test]
fn test_refused_speakerphone_falls_back() {
    let mut call = Call::phone();
    call.platform.refuse_speakerphone(true);
    call.session.start().unwrap();
    call.session.activate().unwrap();

    call.session
        .select_device(Some(AudioDevice::speakerphone()))
        .unwrap();

    assert_eq!(call.selected_kind(), Some(DeviceKind::Earpiece));
    assert!(!call.platform.is_speakerphone_on());
}

#[test]
fn test_selection_rejected_when_absent() {
    let mut call = Call::phone();
    call.session.start().unwrap();

    let err = call
        .session
        .select_device(Some(AudioDevice::wired_headset()))
        .unwrap_err();

    assert!(matches!(err, RouteError::DeviceUnavailable(_)));
    assert_eq!(call.selected_kind(), Some(DeviceKind::Earpiece));
}

// ============================================================================
// CONFIGURED BEHAVIOUR
// ============================================================================

#[test]
fn test_tablet_routes_to_speaker() {
    let mut call = Call::new(&CallRouteConfig::default(), Capabilities::TABLET);
    call.session.start().unwrap();
    call.session.activate().unwrap();

    assert_eq!(call.selected_kind(), Some(DeviceKind::Speakerphone));
    assert!(call.platform.is_speakerphone_on());
}

#[test]
fn test_speakerphone_always() {
    let mut config = CallRouteConfig::default();
    config.routing.speakerphone = SpeakerphoneBehavior::Always;
    let mut call = Call::new(&config, Capabilities::PHONE);
    call.session.start().unwrap();
    call.session.activate().unwrap();

    assert_eq!(call.selected_kind(), Some(DeviceKind::Speakerphone));

    call.platform.plug_headset(true);
    call.pump();
    assert_eq!(call.selected_kind(), Some(DeviceKind::WiredHeadset));
    assert!(!call.platform.is_speakerphone_on());
}
