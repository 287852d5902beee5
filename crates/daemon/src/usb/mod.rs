//! USB subsystem
//!
//! Finds PowerMates, keeps the tracker informed about them, and provides the
//! control transfer handle the poller reads through.
//!
//! Everything libusb related runs in a dedicated thread (worker) so the Tokio
//! runtime is never blocked.

pub mod device;
pub mod manager;
pub mod worker;

pub use worker::spawn_usb_worker;
