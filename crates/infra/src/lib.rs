//! Platform bindings for the call route engine
//!
//! Simulated platform and Bluetooth collaborators, the bounded signal queue
//! that feeds the control thread, and an optional host capability probe.

pub mod platform;
