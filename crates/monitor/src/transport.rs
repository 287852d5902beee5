//! Device handle abstraction

use protocol::{TransferError, TransferRequest, TransferResponse};

/// A way to issue the knob state control transfer to one attached device
///
/// Implemented by the USB layer; the core only calls it. Implementations must
/// return within a bounded time, and must keep returning errors (never panic)
/// once the device has been unplugged.
pub trait ControlTransport: Send + Sync {
    /// Issue the control transfer described by `request` and return the response
    fn issue_control_transfer(
        &self,
        request: &TransferRequest,
    ) -> Result<TransferResponse, TransferError>;
}
