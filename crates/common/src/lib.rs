//! Common utilities for powermate-monitor
//!
//! This crate provides functionality shared by the binary and its tests:
//! error handling, logging setup, and the channel bridge between the Tokio
//! runtime and the USB worker thread.

pub mod channel;
pub mod error;
pub mod logging;

pub use channel::{UsbBridge, UsbWorker, WorkerCommand, create_usb_bridge};
pub use error::{Error, Result};
pub use logging::setup_logging;
