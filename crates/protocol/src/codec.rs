//! Knob state transfer codec
//!
//! The PowerMate answers one vendor request on the default control pipe. The
//! host sends a 6-byte buffer and the device overwrites it with its state:
//!
//! ```text
//! byte 0   button level (1 = pressed, anything else = released)
//! byte 1   knob movement since the previous read, two's complement
//! byte 2-5 reserved
//! ```

use crate::types::{Direction, Recipient, RequestKind, request_type};

/// Griffin Technology vendor id
pub const POWERMATE_VENDOR_ID: u16 = 0x077d;

/// PowerMate product id
pub const POWERMATE_PRODUCT_ID: u16 = 0x0410;

/// Size of both the request and the response buffer
pub const TRANSFER_LEN: usize = 6;

/// Vendor request code for reading the knob state
const GET_KNOB_STATE: u8 = 0x01;

/// Control setup packet fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlSetup {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: u16,
}

impl ControlSetup {
    /// Setup packet for the knob state read
    pub const fn knob_state() -> Self {
        Self {
            request_type: request_type(Direction::In, RequestKind::Vendor, Recipient::Device),
            request: GET_KNOB_STATE,
            value: 0,
            index: 0,
            length: TRANSFER_LEN as u16,
        }
    }
}

/// Request buffer for the knob state read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRequest {
    buf: [u8; TRANSFER_LEN],
}

impl TransferRequest {
    /// Build the request with its fixed control bytes
    ///
    /// Bytes 0-2 stay zero; the device ignores them.
    pub fn new() -> Self {
        let mut buf = [0u8; TRANSFER_LEN];
        buf[3] = 0;
        buf[4] = (0x7f_u16 & !(0_u16 << 8)) as u8;
        buf[5] = 0;
        Self { buf }
    }

    /// Setup packet to send alongside this buffer
    pub fn setup(&self) -> ControlSetup {
        ControlSetup::knob_state()
    }

    /// Raw request bytes
    pub fn as_bytes(&self) -> &[u8; TRANSFER_LEN] {
        &self.buf
    }

    /// Copy of the buffer to hand to the USB stack as the IN data stage
    pub fn to_buffer(&self) -> [u8; TRANSFER_LEN] {
        self.buf
    }
}

impl Default for TransferRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// Response buffer returned by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferResponse {
    buf: [u8; TRANSFER_LEN],
}

impl TransferResponse {
    /// Wrap a response read by the USB stack
    ///
    /// Missing trailing bytes read as zero and anything past the sixth byte is
    /// dropped, matching a read into a zeroed fixed-size buffer.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut buf = [0u8; TRANSFER_LEN];
        let len = data.len().min(TRANSFER_LEN);
        buf[..len].copy_from_slice(&data[..len]);
        Self { buf }
    }

    /// Build the response a device would send for `report`
    pub fn from_report(report: KnobReport) -> Self {
        let mut buf = [0u8; TRANSFER_LEN];
        buf[0] = report.button_pressed as u8;
        buf[1] = report.knob_delta as u8;
        Self { buf }
    }

    /// Button level; only an exact `1` counts as pressed
    pub fn button_pressed(&self) -> bool {
        self.buf[0] == 1
    }

    /// Knob movement since the previous read
    pub fn knob_delta(&self) -> i8 {
        self.buf[1] as i8
    }

    /// Decode both fields
    pub fn report(&self) -> KnobReport {
        KnobReport {
            button_pressed: self.button_pressed(),
            knob_delta: self.knob_delta(),
        }
    }

    /// Raw response bytes
    pub fn as_bytes(&self) -> &[u8; TRANSFER_LEN] {
        &self.buf
    }
}

/// Decoded knob state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KnobReport {
    pub button_pressed: bool,
    pub knob_delta: i8,
}
