//! Domain entities and business rules

pub mod bluetooth;
pub mod config;
pub mod device;
pub mod platform;
pub mod router;
pub mod session;
pub mod signal;

#[cfg(test)]
mod fakes;

// Re-export specific items to avoid ambiguous glob imports
pub use bluetooth::{BluetoothRoute, BluetoothState};
pub use config::{
    BluetoothConfig, CallRouteConfig, CapabilityOverrides, ConfigError, ConfigManager,
    EngineConfig, RoutingConfig, SpeakerphoneBehavior,
};
pub use device::{
    AudioDevice, Capabilities, CapabilityProbe, DeviceKind, Inventory, Result, RouteError,
};
pub use platform::{
    AudioMode, AudioSessionGuard, FocusRequest, PlatformAudio, PlatformError, SavedSettings,
};
pub use router::RouteEngine;
pub use session::{LifecycleState, SessionController};
pub use signal::{route_callback, ProximityState, RouteCallback, RouteChange, Signal};
