//! Transfer error types

use thiserror::Error;

/// Failure of the knob state control transfer
///
/// Neither variant is fatal: the poller reports it and tries again on the next
/// iteration.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum TransferError {
    /// The transfer interface of the device could not be resolved, typically
    /// because the device has just been unplugged
    #[error("Device interface not found")]
    InterfaceUnavailable,

    /// The USB stack reported a non-success status
    #[error("Transfer failed with status {0}")]
    TransferFailed(i32),
}
