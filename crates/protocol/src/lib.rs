//! Wire protocol for the Griffin PowerMate
//!
//! The knob is read with a single vendor control transfer. This crate builds the
//! fixed 6-byte request, describes the control setup packet, and decodes the
//! 6-byte response into a button level and a signed knob delta.
//!
//! # Example
//!
//! ```
//! use protocol::{ControlSetup, KnobReport, TransferResponse};
//!
//! let setup = ControlSetup::knob_state();
//! assert_eq!(setup.request_type, 0xc0);
//!
//! let response = TransferResponse::from_bytes(&[1, 0xfd, 0, 0, 0, 0]);
//! assert_eq!(
//!     response.report(),
//!     KnobReport { button_pressed: true, knob_delta: -3 }
//! );
//! ```

pub mod codec;
pub mod error;
pub mod types;

pub use codec::{
    ControlSetup, KnobReport, POWERMATE_PRODUCT_ID, POWERMATE_VENDOR_ID, TRANSFER_LEN,
    TransferRequest, TransferResponse,
};
pub use error::TransferError;
pub use types::{BusId, Direction, PeripheralIdentity, Recipient, RequestKind};
