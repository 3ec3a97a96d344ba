//! Call audio route selection
//!
//! Arbitrates between earpiece, speakerphone, wired headset and Bluetooth
//! for an ongoing voice call. Platform bindings live in the `infra` crate.

pub mod domain;
