//! Platform audio session binding
//!
//! The platform owns the global call audio flags (mode, microphone mute,
//! speakerphone) and audio focus. The route engine toggles speakerphone;
//! everything else belongs to the session controller while a call is active.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

/// Errors reported by a platform binding
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    /// Platform refused a routing command
    #[error("Platform refused {command}: {reason}")]
    Refused {
        command: &'static str,
        reason: String,
    },
}

/// Platform audio mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioMode {
    Normal,
    Ringtone,
    InCall,
    InCommunication,
}

/// Kind of audio focus requested from the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusRequest {
    /// Transient focus for a voice call stream
    VoiceCommunication,
}

/// Platform audio session operations
///
/// Implementations live in the `infra` crate. All calls happen on the
/// control thread.
pub trait PlatformAudio: Send {
    fn mode(&self) -> AudioMode;

    fn set_mode(&mut self, mode: AudioMode);

    fn is_microphone_muted(&self) -> bool;

    fn set_microphone_muted(&mut self, muted: bool);

    fn is_speakerphone_on(&self) -> bool;

    /// Route output to the loudspeaker (or away from it)
    fn set_speakerphone_on(&mut self, on: bool) -> Result<(), PlatformError>;

    /// Current wired-headset jack state, used to seed a new session
    fn is_wired_headset_on(&self) -> bool;

    /// Returns true if focus was granted
    fn request_audio_focus(&mut self, request: FocusRequest) -> bool;

    fn abandon_audio_focus(&mut self);
}

/// Platform flags captured when a call enters its routed session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedSettings {
    pub mode: AudioMode,
    pub microphone_muted: bool,
    pub speakerphone_on: bool,
}

impl SavedSettings {
    pub fn capture(platform: &dyn PlatformAudio) -> Self {
        Self {
            mode: platform.mode(),
            microphone_muted: platform.is_microphone_muted(),
            speakerphone_on: platform.is_speakerphone_on(),
        }
    }
}

/// Scoped ownership of the platform audio session
///
/// Acquiring captures the previous settings, unmutes the microphone, takes
/// voice-communication focus and switches to communication mode. Releasing
/// puts everything back.
#[derive(Debug)]
#[must_use = "the previous platform settings are only restored by `release`"]
pub struct AudioSessionGuard {
    saved: SavedSettings,
}

impl AudioSessionGuard {
    pub fn acquire(platform: &mut dyn PlatformAudio) -> Self {
        let saved = SavedSettings::capture(platform);
        debug!(?saved, "Captured platform audio settings");

        set_microphone_muted(platform, false);

        if platform.request_audio_focus(FocusRequest::VoiceCommunication) {
            debug!("Audio focus granted for voice communication");
        } else {
            error!("Audio focus request failed");
        }
        platform.set_mode(AudioMode::InCommunication);

        Self { saved }
    }

    pub fn saved(&self) -> &SavedSettings {
        &self.saved
    }

    pub fn release(self, platform: &mut dyn PlatformAudio) {
        platform.set_mode(self.saved.mode);
        set_microphone_muted(platform, self.saved.microphone_muted);
        if platform.is_speakerphone_on() != self.saved.speakerphone_on {
            if let Err(e) = platform.set_speakerphone_on(self.saved.speakerphone_on) {
                error!(error = %e, "Failed to restore speakerphone state");
            }
        }
        platform.abandon_audio_focus();
        info!("Restored platform audio settings");
    }
}

/// Write the mute flag only if it differs
fn set_microphone_muted(platform: &mut dyn PlatformAudio, muted: bool) {
    if platform.is_microphone_muted() != muted {
        platform.set_microphone_muted(muted);
    }
}
