//! Device identity and control request type definitions

use std::fmt;

/// Bus-level identifier of an attached peripheral
///
/// Assigned by the USB subsystem when the device appears and unique for as long
/// as the device stays attached. The core only compares it for equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BusId(pub u64);

impl BusId {
    /// Derive a bus id from a libusb bus number and device address
    pub fn from_bus_address(bus_number: u8, address: u8) -> Self {
        Self(((bus_number as u64) << 8) | address as u64)
    }
}

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Identity of a peripheral as observed at attach time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralIdentity {
    /// Unique bus id
    pub bus_id: BusId,
    /// USB Vendor ID
    pub vendor_id: u16,
    /// USB Product ID
    pub product_id: u16,
    /// Product name read from the string descriptor
    pub name: String,
}

impl fmt::Display for PeripheralIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "`{}` ({:04x}:{:04x}, bus id {})",
            self.name, self.vendor_id, self.product_id, self.bus_id
        )
    }
}

/// Data phase direction of a control transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host to device
    Out,
    /// Device to host
    In,
}

/// Request type field of bmRequestType
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Standard,
    Class,
    Vendor,
    Reserved,
}

/// Recipient field of bmRequestType
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    Device,
    Interface,
    Endpoint,
    Other,
}

/// Pack direction, kind and recipient into a bmRequestType byte
pub const fn request_type(direction: Direction, kind: RequestKind, recipient: Recipient) -> u8 {
    let direction = match direction {
        Direction::Out => 0x00,
        Direction::In => 0x80,
    };
    let kind = match kind {
        RequestKind::Standard => 0,
        RequestKind::Class => 1,
        RequestKind::Vendor => 2,
        RequestKind::Reserved => 3,
    };
    let recipient = match recipient {
        Recipient::Device => 0,
        Recipient::Interface => 1,
        Recipient::Endpoint => 2,
        Recipient::Other => 3,
    };

    direction | (kind << 5) | recipient
}
