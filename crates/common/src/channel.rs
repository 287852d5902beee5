//! Async channel bridge between Tokio runtime and USB thread

use async_channel::{Receiver, Sender, bounded};
use protocol::PeripheralIdentity;

/// Commands from Tokio runtime to USB thread
#[derive(Debug)]
pub enum WorkerCommand {
    /// List attached PowerMates
    ListDevices {
        /// Channel to send response back
        response: tokio::sync::oneshot::Sender<Vec<PeripheralIdentity>>,
    },

    /// Shutdown the USB thread gracefully
    Shutdown,
}

/// Handle for Tokio runtime (async)
#[derive(Clone)]
pub struct UsbBridge {
    cmd_tx: Sender<WorkerCommand>,
}

impl UsbBridge {
    /// Send a command to the USB thread
    pub async fn send_command(&self, cmd: WorkerCommand) -> crate::Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Ask the USB thread for the attached devices
    pub async fn list_devices(&self) -> crate::Result<Vec<PeripheralIdentity>> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.send_command(WorkerCommand::ListDevices { response: tx })
            .await?;
        rx.await.map_err(|e| crate::Error::Channel(e.to_string()))
    }
}

/// Handle for USB thread (blocking)
pub struct UsbWorker {
    cmd_rx: Receiver<WorkerCommand>,
}

impl UsbWorker {
    /// Try to receive a command without blocking
    pub fn try_recv_command(&self) -> Option<WorkerCommand> {
        self.cmd_rx.try_recv().ok()
    }

    /// Whether every bridge handle has been dropped
    pub fn is_disconnected(&self) -> bool {
        self.cmd_rx.is_closed()
    }
}

/// Create the channel bridge between Tokio and USB thread
///
/// Returns (UsbBridge for Tokio, UsbWorker for USB thread)
pub fn create_usb_bridge() -> (UsbBridge, UsbWorker) {
    let (cmd_tx, cmd_rx) = bounded(16);

    (UsbBridge { cmd_tx }, UsbWorker { cmd_rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::BusId;
    use std::time::Duration;

    fn wait_for_command(worker: &UsbWorker) -> Option<WorkerCommand> {
        for _ in 0..200 {
            if let Some(cmd) = worker.try_recv_command() {
                return Some(cmd);
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        None
    }

    #[tokio::test]
    async fn test_channel_bridge() {
        let (bridge, worker) = create_usb_bridge();

        let handle = std::thread::spawn(move || {
            matches!(wait_for_command(&worker), Some(WorkerCommand::Shutdown))
        });

        bridge.send_command(WorkerCommand::Shutdown).await.unwrap();

        assert!(handle.join().unwrap());
    }

    #[tokio::test]
    async fn test_list_devices_round_trip() {
        let (bridge, worker) = create_usb_bridge();

        let handle = std::thread::spawn(move || {
            if let Some(WorkerCommand::ListDevices { response }) = wait_for_command(&worker) {
                let _ = response.send(vec![PeripheralIdentity {
                    bus_id: BusId(0x0102),
                    vendor_id: 0x077d,
                    product_id: 0x0410,
                    name: "Griffin PowerMate".to_string(),
                }]);
            }
        });

        let devices = bridge.list_devices().await.unwrap();
        handle.join().unwrap();

        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].bus_id, BusId(0x0102));
    }

    #[test]
    fn test_try_recv_empty() {
        let (_bridge, worker) = create_usb_bridge();
        assert!(worker.try_recv_command().is_none());
        assert!(!worker.is_disconnected());
    }

    #[test]
    fn test_worker_sees_dropped_bridge() {
        let (bridge, worker) = create_usb_bridge();
        drop(bridge);
        assert!(worker.is_disconnected());
    }
}
