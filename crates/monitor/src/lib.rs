//! PowerMate device tracking and polling
//!
//! This crate is the core of the monitor:
//! - [`DeviceTracker`] keeps at most one tracked PowerMate across hot-plug events
//! - [`Poller`] reads the tracked device and reports knob and button events
//! - [`KnobObserver`] is the callback interface both of them report to
//! - [`ControlTransport`] is the capability the USB layer hands in for each device
//!
//! The core keeps no accumulated knob state. Every successful poll reports the
//! raw button level and knob delta; the observer owns the history.

pub mod observer;
pub mod poller;
pub mod test_utils;
pub mod tracker;
pub mod transport;

pub use observer::{KnobObserver, ObserverRef, PollError};
pub use poller::{PollOutcome, Poller, spawn_poller};
pub use tracker::{DeviceTracker, Snapshot, TrackedDevice, Transition};
pub use transport::ControlTransport;
