//! Session lifecycle controller
//!
//! Wraps the route engine with the `Stopped -> Started -> Active` lifecycle.
//! The platform audio session is owned for the duration of `Active` through
//! an [`AudioSessionGuard`], acquired by `activate` and released by
//! `deactivate`.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, instrument, warn};

use crate::domain::device::{AudioDevice, DeviceKind, Result, RouteError};
use crate::domain::platform::{AudioSessionGuard, SavedSettings};
use crate::domain::router::RouteEngine;
use crate::domain::signal::{RouteCallback, Signal};

/// Lifecycle state of a call audio session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Stopped,
    Started,
    Active,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Stopped => "stopped",
            LifecycleState::Started => "started",
            LifecycleState::Active => "active",
        };
        f.write_str(name)
    }
}

/// Drives a [`RouteEngine`] through the call lifecycle
#[derive(Debug)]
pub struct SessionController {
    state: LifecycleState,
    engine: RouteEngine,
    guard: Option<AudioSessionGuard>,
}

impl SessionController {
    pub fn new(engine: RouteEngine) -> Self {
        Self {
            state: LifecycleState::Stopped,
            engine,
            guard: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn engine(&self) -> &RouteEngine {
        &self.engine
    }

    /// Settings captured at activation, while the session is active
    pub fn saved_settings(&self) -> Option<&SavedSettings> {
        self.guard.as_ref().map(AudioSessionGuard::saved)
    }

    pub fn set_route_callback(&mut self, callback: RouteCallback) {
        self.engine.set_route_callback(callback);
    }

    /// Begin listening for device signals
    #[instrument(skip(self), fields(state = %self.state))]
    pub fn start(&mut self) -> Result<()> {
        self.require("start", &[LifecycleState::Stopped])?;
        self.engine.begin();
        self.state = LifecycleState::Started;
        info!("Call audio session started");
        Ok(())
    }

    /// Stop listening. The session must be deactivated first.
    #[instrument(skip(self), fields(state = %self.state))]
    pub fn stop(&mut self) -> Result<()> {
        self.require("stop", &[LifecycleState::Started])?;
        self.engine.end();
        self.state = LifecycleState::Stopped;
        info!("Call audio session stopped");
        Ok(())
    }

    /// Take the platform audio session and apply the current route
    ///
    /// Calling again while active re-applies the selection without saving
    /// the platform settings a second time.
    #[instrument(skip(self), fields(state = %self.state))]
    pub fn activate(&mut self) -> Result<()> {
        match self.state {
            LifecycleState::Started => {
                let guard = AudioSessionGuard::acquire(self.engine.platform_mut());
                self.guard = Some(guard);
                self.engine.engage();
                self.state = LifecycleState::Active;
                info!(
                    device = ?self.engine.selected().map(|d| d.label.as_str()),
                    "Call audio session active"
                );
                Ok(())
            }
            LifecycleState::Active => {
                debug!("Re-applying route");
                self.engine.engage();
                Ok(())
            }
            LifecycleState::Stopped => Err(self.invalid("activate")),
        }
    }

    /// Give the platform audio session back and return to `Started`
    #[instrument(skip(self), fields(state = %self.state))]
    pub fn deactivate(&mut self) -> Result<()> {
        self.require("deactivate", &[LifecycleState::Active])?;
        self.engine.disengage();
        if let Some(guard) = self.guard.take() {
            guard.release(self.engine.platform_mut());
        }
        self.state = LifecycleState::Started;
        info!("Call audio session deactivated");
        Ok(())
    }

    /// Explicit user device choice; `None` returns to automatic selection
    pub fn select_device(&mut self, device: Option<AudioDevice>) -> Result<()> {
        self.require("select_device", &[LifecycleState::Started, LifecycleState::Active])?;
        self.engine.select_device(device)
    }

    pub fn set_default_handset(&mut self, kind: DeviceKind) -> Result<()> {
        self.require(
            "set_default_handset",
            &[LifecycleState::Started, LifecycleState::Active],
        )?;
        self.engine.set_default_handset(kind)
    }

    /// Current inventory, highest priority first
    pub fn available_devices(&self) -> &[AudioDevice] {
        self.engine.inventory().as_slice()
    }

    pub fn selected_device(&self) -> Option<&AudioDevice> {
        self.engine.selected()
    }

    /// Deliver one signal. Signals are dropped while stopped.
    pub fn handle(&mut self, signal: Signal) {
        if self.state == LifecycleState::Stopped {
            debug!(?signal, "Session stopped, dropping signal");
            return;
        }
        self.engine.handle(signal);
    }

    fn require(&self, operation: &'static str, allowed: &[LifecycleState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(self.invalid(operation))
        }
    }

    fn invalid(&self, operation: &'static str) -> RouteError {
        warn!(operation, state = %self.state, "Operation not allowed in current state");
        RouteError::InvalidStateTransition {
            operation,
            state: self.state,
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(guard) = self.guard.take() {
            warn!("Session dropped while active, restoring platform audio settings");
            self.engine.disengage();
            guard.release(self.engine.platform_mut());
        }
    }
}
