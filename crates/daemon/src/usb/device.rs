//! rusb-backed PowerMate handle
//!
//! Wraps an open `rusb::DeviceHandle` and implements the monitor's
//! `ControlTransport` with the knob state vendor request.

use monitor::ControlTransport;
use protocol::{
    BusId, PeripheralIdentity, TRANSFER_LEN, TransferError, TransferRequest, TransferResponse,
};
use rusb::{Context, Device, DeviceHandle};
use std::time::Duration;
use tracing::{debug, trace};

/// Name used when the product string cannot be read
pub const FALLBACK_NAME: &str = "Griffin PowerMate";

// libusb_error values, reported as transfer status codes
const LIBUSB_ERROR_IO: i32 = -1;
const LIBUSB_ERROR_INVALID_PARAM: i32 = -2;
const LIBUSB_ERROR_ACCESS: i32 = -3;
const LIBUSB_ERROR_BUSY: i32 = -6;
const LIBUSB_ERROR_TIMEOUT: i32 = -7;
const LIBUSB_ERROR_OVERFLOW: i32 = -8;
const LIBUSB_ERROR_PIPE: i32 = -9;
const LIBUSB_ERROR_INTERRUPTED: i32 = -10;
const LIBUSB_ERROR_NO_MEM: i32 = -11;
const LIBUSB_ERROR_NOT_SUPPORTED: i32 = -12;
const LIBUSB_ERROR_OTHER: i32 = -99;

/// Bus id of a rusb device
pub fn bus_id_of(device: &Device<Context>) -> BusId {
    BusId::from_bus_address(device.bus_number(), device.address())
}

/// Open PowerMate
pub struct RusbTransport {
    handle: DeviceHandle<Context>,
    bus_id: BusId,
    timeout: Duration,
}

impl RusbTransport {
    /// Open `device` and read its identity
    pub fn open(
        device: &Device<Context>,
        timeout: Duration,
    ) -> Result<(Self, PeripheralIdentity), rusb::Error> {
        let descriptor = device.device_descriptor()?;
        let handle = device.open()?;
        let bus_id = bus_id_of(device);

        let name = handle
            .read_product_string_ascii(&descriptor)
            .unwrap_or_else(|e| {
                debug!("Could not read product string of {}: {}", bus_id, e);
                FALLBACK_NAME.to_string()
            });

        let identity = PeripheralIdentity {
            bus_id,
            vendor_id: descriptor.vendor_id(),
            product_id: descriptor.product_id(),
            name,
        };

        debug!("Opened {}", identity);

        Ok((
            Self {
                handle,
                bus_id,
                timeout,
            },
            identity,
        ))
    }
}

impl ControlTransport for RusbTransport {
    fn issue_control_transfer(
        &self,
        request: &TransferRequest,
    ) -> Result<TransferResponse, TransferError> {
        let setup = request.setup();
        let mut buffer = request.to_buffer();

        let len = self
            .handle
            .read_control(
                setup.request_type,
                setup.request,
                setup.value,
                setup.index,
                &mut buffer,
                self.timeout,
            )
            .map_err(map_rusb_error)?;

        if len < TRANSFER_LEN {
            trace!("Short read from {}: {} bytes", self.bus_id, len);
        }

        Ok(TransferResponse::from_bytes(&buffer[..len]))
    }
}

/// Map rusb::Error to the poller's transfer error
///
/// A vanished device surfaces as `InterfaceUnavailable`; everything else keeps
/// its libusb status code.
pub fn map_rusb_error(err: rusb::Error) -> TransferError {
    let code = match err {
        rusb::Error::NoDevice | rusb::Error::NotFound => {
            return TransferError::InterfaceUnavailable;
        }
        rusb::Error::Io => LIBUSB_ERROR_IO,
        rusb::Error::InvalidParam => LIBUSB_ERROR_INVALID_PARAM,
        rusb::Error::Access => LIBUSB_ERROR_ACCESS,
        rusb::Error::Busy => LIBUSB_ERROR_BUSY,
        rusb::Error::Timeout => LIBUSB_ERROR_TIMEOUT,
        rusb::Error::Overflow => LIBUSB_ERROR_OVERFLOW,
        rusb::Error::Pipe => LIBUSB_ERROR_PIPE,
        rusb::Error::Interrupted => LIBUSB_ERROR_INTERRUPTED,
        rusb::Error::NoMem => LIBUSB_ERROR_NO_MEM,
        rusb::Error::NotSupported => LIBUSB_ERROR_NOT_SUPPORTED,
        _ => LIBUSB_ERROR_OTHER,
    };
    TransferError::TransferFailed(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_rusb_error() {
        assert_eq!(
            map_rusb_error(rusb::Error::NoDevice),
            TransferError::InterfaceUnavailable
        );
        assert_eq!(
            map_rusb_error(rusb::Error::NotFound),
            TransferError::InterfaceUnavailable
        );
        assert_eq!(
            map_rusb_error(rusb::Error::Timeout),
            TransferError::TransferFailed(-7)
        );
        assert_eq!(
            map_rusb_error(rusb::Error::Pipe),
            TransferError::TransferFailed(-9)
        );
        assert_eq!(
            map_rusb_error(rusb::Error::Other),
            TransferError::TransferFailed(-99)
        );
    }
}
