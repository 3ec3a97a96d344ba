//! Route arbitration engine
//!
//! Owns the device inventory, the user override and the applied route.
//! Every input signal triggers a full recomputation: rebuild the inventory,
//! drop an override whose device left, pick a winner, and if anything
//! changed, apply it to the platform and notify the call layer once.
//!
//! Bluetooth presence is read from the collaborator itself, never from the
//! signal that triggered the recomputation. A queued report can be older than
//! a command the engine has issued since.

use std::fmt;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::domain::bluetooth::{BluetoothRoute, BluetoothState};
use crate::domain::config::{CallRouteConfig, RoutingConfig};
use crate::domain::device::{AudioDevice, Capabilities, DeviceKind, Inventory, Result, RouteError};
use crate::domain::platform::PlatformAudio;
use crate::domain::signal::{ProximityState, RouteCallback, RouteChange, Signal};

/// Upper bound on recomputation passes per refresh, one per device kind plus
/// a settling pass
const MAX_PASSES: usize = 6;

/// Call audio route engine
pub struct RouteEngine {
    capabilities: Capabilities,
    routing: RoutingConfig,
    default_handset: DeviceKind,
    bluetooth_label: String,

    platform: Box<dyn PlatformAudio>,
    bluetooth: Box<dyn BluetoothRoute>,
    callback: Option<RouteCallback>,

    // Inputs
    listening: bool,
    wired_headset: bool,
    /// Headset name from the last Bluetooth report, to spot a new connection
    reported_headset: Option<String>,
    proximity: Option<ProximityState>,
    excluded: Vec<DeviceKind>,

    // Selection
    inventory: Inventory,
    user_override: Option<AudioDevice>,
    current: Option<AudioDevice>,

    /// Platform commands are only issued while the call is active
    armed: bool,
}

impl RouteEngine {
    /// Create an engine. Capabilities are fixed for its lifetime.
    pub fn new(
        config: &CallRouteConfig,
        capabilities: Capabilities,
        platform: Box<dyn PlatformAudio>,
        bluetooth: Box<dyn BluetoothRoute>,
    ) -> Self {
        debug!(
            earpiece = capabilities.has_earpiece,
            speakerphone = capabilities.has_speakerphone,
            "Creating route engine"
        );

        Self {
            capabilities,
            routing: config.routing.clone(),
            default_handset: config.routing.speakerphone.default_handset(),
            bluetooth_label: config.bluetooth.fallback_label.clone(),
            platform,
            bluetooth,
            callback: None,
            listening: false,
            wired_headset: false,
            reported_headset: None,
            proximity: None,
            excluded: Vec::new(),
            inventory: Inventory::empty(),
            user_override: None,
            current: None,
            armed: false,
        }
    }

    /// Register the route-change listener, replacing any previous one
    pub fn set_route_callback(&mut self, callback: RouteCallback) {
        self.callback = Some(callback);
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn selected(&self) -> Option<&AudioDevice> {
        self.current.as_ref()
    }

    pub fn user_override(&self) -> Option<&AudioDevice> {
        self.user_override.as_ref()
    }

    /// The collaborator's current state, or unavailable while not listening
    pub fn bluetooth_state(&self) -> BluetoothState {
        if self.listening {
            self.bluetooth.state()
        } else {
            BluetoothState::HeadsetUnavailable
        }
    }

    pub fn proximity_hint(&self) -> Option<ProximityState> {
        self.proximity
    }

    /// Whether platform commands are being issued
    pub fn is_routing(&self) -> bool {
        self.armed
    }

    pub fn platform(&self) -> &dyn PlatformAudio {
        self.platform.as_ref()
    }

    pub(crate) fn platform_mut(&mut self) -> &mut dyn PlatformAudio {
        self.platform.as_mut()
    }

    /// Start monitoring devices and run the first selection
    pub fn begin(&mut self) {
        self.listening = true;
        let bluetooth = self.bluetooth.start();
        self.reported_headset = self.bluetooth.headset_name();
        self.wired_headset = self.platform.is_wired_headset_on();
        info!(
            wired_headset = self.wired_headset,
            bluetooth = %bluetooth,
            "Listening for audio device changes"
        );
        self.refresh();
    }

    /// Stop monitoring and forget the session's devices and selection
    pub fn end(&mut self) {
        self.bluetooth.stop();
        self.listening = false;
        self.armed = false;
        self.wired_headset = false;
        self.reported_headset = None;
        self.proximity = None;
        self.excluded.clear();
        self.inventory = Inventory::empty();
        self.user_override = None;
        self.current = None;
        self.default_handset = self.routing.speakerphone.default_handset();
        info!("Stopped listening for audio device changes");
    }

    /// Process one inbound signal
    pub fn handle(&mut self, signal: Signal) {
        debug!(?signal, "Signal received");
        match signal {
            Signal::WiredHeadset { plugged, .. } => {
                self.wired_headset = plugged;
                self.refresh();
            }
            Signal::Bluetooth { state, headset } => self.on_bluetooth(state, headset),
            Signal::ScoConnectFailed => {
                warn!("Bluetooth SCO connection failed");
                self.exclude(DeviceKind::Bluetooth);
                self.refresh();
            }
            Signal::Proximity(reading) => self.on_proximity(reading),
            Signal::SelectDevice(device) => {
                // Unavailable selections are logged by select_device
                let _ = self.select_device(device);
            }
        }
    }

    /// Explicit user choice; `None` returns to automatic selection
    pub fn select_device(&mut self, device: Option<AudioDevice>) -> Result<()> {
        match device {
            Some(device) if !self.inventory.contains(&device) => {
                warn!(device = %device, "Selected device is not available");
                Err(RouteError::DeviceUnavailable(device))
            }
            device => {
                match &device {
                    Some(d) => info!(device = %d, "User selected device"),
                    None => info!("User cleared device selection"),
                }
                self.user_override = device;
                self.proximity = None;
                self.refresh();
                Ok(())
            }
        }
    }

    /// Change the handset used when no headset is present
    pub fn set_default_handset(&mut self, kind: DeviceKind) -> Result<()> {
        let handset = match kind {
            DeviceKind::Speakerphone => DeviceKind::Speakerphone,
            DeviceKind::Earpiece if self.capabilities.has_earpiece => DeviceKind::Earpiece,
            DeviceKind::Earpiece => DeviceKind::Speakerphone,
            other => {
                warn!(kind = %other, "Only earpiece or speakerphone can be the default handset");
                return Err(RouteError::DeviceUnavailable(AudioDevice::new(
                    other,
                    other.default_label(),
                )));
            }
        };
        info!(handset = %handset, "Default handset changed");
        self.default_handset = handset;
        self.refresh();
        Ok(())
    }

    /// Recompute inventory and selection from the current inputs
    ///
    /// Idempotent: with unchanged inputs nothing is applied or notified.
    pub fn refresh(&mut self) {
        let mut changed = false;

        // Applying a route can move the Bluetooth state or exclude a device,
        // so recompute until the selection and the SCO link settle.
        for _ in 0..MAX_PASSES {
            let inventory = self.build_inventory();
            let inventory_changed = inventory != self.inventory;
            if inventory_changed {
                debug!(devices = ?inventory.as_slice(), "Inventory rebuilt");
                if self.proximity.take().is_some() {
                    debug!("Proximity hint cleared by device change");
                }
            }

            if let Some(device) = &self.user_override {
                if !inventory.contains(device) {
                    info!(device = %device, "Selected device left, back to automatic selection");
                    self.user_override = None;
                }
            }

            let candidate = self.pick(&inventory);
            if candidate != self.current || inventory_changed {
                self.inventory = inventory;
                self.current = candidate;
                changed = true;
            } else if !self.armed || self.link_matches_route() {
                break;
            } else {
                debug!(
                    bluetooth = %self.bluetooth.state(),
                    "SCO link out of step with the route, reapplying"
                );
            }

            if !self.armed {
                break;
            }
            self.apply_or_exclude();
        }

        if changed {
            self.notify();
        } else {
            trace!("Route unchanged");
        }
    }

    /// Arm platform commands and realize the current selection
    #[instrument(skip(self))]
    pub fn engage(&mut self) {
        self.armed = true;
        self.apply_or_exclude();
        self.refresh();
    }

    /// Tear down SCO and stop issuing platform commands
    ///
    /// A headset found gone while stopping SCO leaves the inventory here.
    #[instrument(skip(self))]
    pub fn disengage(&mut self) {
        self.disconnect_bluetooth();
        self.armed = false;
        self.refresh();
    }

    /// A reported transition lifts a Bluetooth exclusion; the recomputation
    /// itself reads the collaborator's current state
    fn on_bluetooth(&mut self, reported: BluetoothState, headset: Option<String>) {
        let renamed = headset.is_some() && headset != self.reported_headset;
        if reported == BluetoothState::HeadsetUnavailable {
            self.reported_headset = None;
        } else if headset.is_some() {
            self.reported_headset = headset;
        }

        if renamed
            || matches!(
                reported,
                BluetoothState::HeadsetUnavailable | BluetoothState::ScoConnected
            )
        {
            self.excluded.retain(|k| *k != DeviceKind::Bluetooth);
        }

        let current = self.bluetooth.state();
        if current == reported {
            debug!(state = %current, "Bluetooth state changed");
        } else {
            debug!(%reported, %current, "Stale Bluetooth report, using current state");
        }
        self.refresh();
    }

    fn on_proximity(&mut self, reading: ProximityState) {
        if !self.routing.follows_proximity() {
            trace!(?reading, "Proximity hints disabled");
            return;
        }
        if !self.inventory.is_handset_pair() {
            debug!(?reading, "Proximity ignored, headset routing available");
            return;
        }
        self.proximity = Some(reading);
        self.refresh();
    }

    fn build_inventory(&self) -> Inventory {
        if !self.listening {
            return Inventory::empty();
        }

        let bluetooth = self.bluetooth.state().is_routable().then(|| {
            AudioDevice::bluetooth(
                self.bluetooth
                    .headset_name()
                    .unwrap_or_else(|| self.bluetooth_label.clone()),
            )
        });

        self.excluded.iter().fold(
            Inventory::build(bluetooth, self.wired_headset, self.capabilities),
            |inventory, kind| inventory.without(*kind),
        )
    }

    fn pick(&self, inventory: &Inventory) -> Option<AudioDevice> {
        if let Some(reading) = self.proximity {
            if inventory.is_handset_pair() {
                return inventory.find(reading.preferred_kind()).cloned();
            }
        }

        if let Some(device) = &self.user_override {
            return Some(device.clone());
        }

        match inventory.first() {
            Some(top) if top.kind == DeviceKind::Earpiece => inventory
                .find(self.default_handset)
                .or(Some(top))
                .cloned(),
            top => top.cloned(),
        }
    }

    /// SCO is up or coming up exactly when Bluetooth is the route
    fn link_matches_route(&self) -> bool {
        let wants_sco = self
            .current
            .as_ref()
            .is_some_and(|d| d.kind == DeviceKind::Bluetooth);
        wants_sco == self.bluetooth.state().is_sco_engaged()
    }

    fn apply_or_exclude(&mut self) {
        match self.apply() {
            Ok(()) => {}
            Err(RouteError::RouteApplyFailure { device, reason }) => {
                warn!(device = %device, reason = %reason, "Route apply failed, excluding device");
                self.exclude(device.kind);
            }
            Err(e) => warn!(error = %e, "Route apply failed"),
        }
    }

    /// Issue the platform commands for the current selection
    fn apply(&mut self) -> Result<()> {
        let Some(device) = self.current.clone() else {
            self.release_outputs();
            return Ok(());
        };

        info!(device = %device, "Applying route");
        match device.kind {
            DeviceKind::Speakerphone => {
                self.set_speakerphone(&device, true)?;
                self.disconnect_bluetooth();
            }
            DeviceKind::Earpiece | DeviceKind::WiredHeadset => {
                self.set_speakerphone(&device, false)?;
                self.disconnect_bluetooth();
            }
            DeviceKind::Bluetooth => {
                self.set_speakerphone(&device, false)?;
                self.connect_bluetooth(&device)?;
            }
            DeviceKind::None => self.release_outputs(),
        }
        Ok(())
    }

    fn set_speakerphone(&mut self, device: &AudioDevice, on: bool) -> Result<()> {
        if self.platform.is_speakerphone_on() == on {
            return Ok(());
        }
        self.platform
            .set_speakerphone_on(on)
            .map_err(|e| RouteError::RouteApplyFailure {
                device: device.clone(),
                reason: e.to_string(),
            })
    }

    fn connect_bluetooth(&mut self, device: &AudioDevice) -> Result<()> {
        match self.bluetooth.state() {
            BluetoothState::ScoConnecting | BluetoothState::ScoConnected => Ok(()),
            BluetoothState::HeadsetAvailable => {
                if self.bluetooth.start_sco_audio() {
                    debug!("SCO audio requested");
                    Ok(())
                } else {
                    Err(RouteError::RouteApplyFailure {
                        device: device.clone(),
                        reason: "SCO audio start refused".to_string(),
                    })
                }
            }
            state @ (BluetoothState::HeadsetUnavailable | BluetoothState::ScoDisconnecting) => {
                Err(RouteError::RouteApplyFailure {
                    device: device.clone(),
                    reason: format!("no usable headset ({})", state),
                })
            }
        }
    }

    fn disconnect_bluetooth(&mut self) {
        let state = self.bluetooth.state();
        if !state.is_sco_engaged() {
            return;
        }
        debug!(%state, "Stopping SCO audio");
        self.bluetooth.stop_sco_audio();
        let state = self.bluetooth.update_device();
        debug!(%state, "Headset re-queried");
    }

    /// No device selected: loudspeaker off, SCO down
    fn release_outputs(&mut self) {
        if self.platform.is_speakerphone_on() {
            if let Err(e) = self.platform.set_speakerphone_on(false) {
                error!(error = %e, "Failed to disable speakerphone");
            }
        }
        self.disconnect_bluetooth();
    }

    fn exclude(&mut self, kind: DeviceKind) {
        if !self.excluded.contains(&kind) {
            debug!(kind = %kind, "Excluding device from inventory");
            self.excluded.push(kind);
        }
    }

    fn notify(&mut self) {
        let change = RouteChange {
            selected: self.current.clone(),
            available: self.inventory.to_vec(),
        };
        info!(
            selected = ?change.selected.as_ref().map(|d| d.label.as_str()),
            available = change.available.len(),
            "Route changed"
        );
        if let Some(callback) = self.callback.as_mut() {
            callback(&change);
        }
    }
}

impl fmt::Debug for RouteEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEngine")
            .field("capabilities", &self.capabilities)
            .field("inventory", &self.inventory)
            .field("user_override", &self.user_override)
            .field("current", &self.current)
            .field("bluetooth", &self.bluetooth_state())
            .field("armed", &self.armed)
            .finish()
    }
}
