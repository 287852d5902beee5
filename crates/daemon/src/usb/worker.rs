//! USB worker thread
//!
//! Dedicated thread that owns the libusb context. It runs the hot-plug event
//! loop (or the rescan fallback) and answers commands from the Tokio runtime.

use crate::config::UsbSettings;
use crate::usb::manager::DeviceManager;
use common::{Error, Result, UsbWorker, WorkerCommand};
use monitor::DeviceTracker;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Upper bound on one pass of the event loop, so commands are picked up promptly
const EVENT_TIMEOUT: Duration = Duration::from_millis(100);

/// USB worker thread
pub struct UsbWorkerThread {
    manager: DeviceManager,
    /// Communication channel with Tokio runtime
    worker: UsbWorker,
}

impl UsbWorkerThread {
    /// Create a new USB worker thread
    pub fn new(
        worker: UsbWorker,
        tracker: Arc<DeviceTracker>,
        settings: &UsbSettings,
    ) -> Result<Self> {
        let manager = DeviceManager::new(tracker, settings).map_err(usb_error)?;
        Ok(Self { manager, worker })
    }

    /// Run the event loop until a Shutdown command arrives or the bridge is dropped
    pub fn run(mut self) -> Result<()> {
        info!("USB worker thread started");

        loop {
            match self.worker.try_recv_command() {
                Some(WorkerCommand::Shutdown) => {
                    info!("USB worker shutting down");
                    break;
                }
                Some(WorkerCommand::ListDevices { response }) => {
                    let devices = self.manager.list_devices();
                    debug!("Listing {} devices", devices.len());
                    let _ = response.send(devices);
                }
                None if self.worker.is_disconnected() => {
                    info!("Command bridge closed, USB worker shutting down");
                    break;
                }
                None => {}
            }

            self.manager.handle_events(EVENT_TIMEOUT);
        }

        info!("USB worker thread stopped");
        Ok(())
    }
}

fn usb_error(e: rusb::Error) -> Error {
    Error::Usb(format!("Failed to start USB discovery: {}", e))
}

/// Spawn the USB worker thread
pub fn spawn_usb_worker(
    worker: UsbWorker,
    tracker: Arc<DeviceTracker>,
    settings: UsbSettings,
) -> std::thread::JoinHandle<Result<()>> {
    std::thread::Builder::new()
        .name("usb-worker".to_string())
        .spawn(move || {
            let worker_thread = UsbWorkerThread::new(worker, tracker, &settings)?;
            worker_thread.run()
        })
        .expect("Failed to spawn USB worker thread")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usb_error_keeps_cause() {
        let err = usb_error(rusb::Error::Access);
        assert!(matches!(err, Error::Usb(_)));
        assert!(err.to_string().starts_with("USB error: Failed to start USB discovery"));
    }
}
