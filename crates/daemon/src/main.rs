//! powermate-monitor
//!
//! Tracks a Griffin PowerMate across hot-plug events and logs knob rotation and
//! button presses.

mod config;
mod presenter;
mod usb;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use common::{UsbBridge, WorkerCommand, create_usb_bridge, setup_logging};
use monitor::{DeviceTracker, ObserverRef, Poller, spawn_poller};
use presenter::Presenter;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use usb::spawn_usb_worker;

#[derive(Parser, Debug)]
#[command(name = "powermate-monitor")]
#[command(
    author,
    version,
    about = "Track a Griffin PowerMate and log knob and button events"
)]
#[command(long_about = "
Tracks a Griffin PowerMate (077d:0410) across hot-plug events and polls it for
knob rotation and button presses.

EXAMPLES:
    # Run with default config
    powermate-monitor

    # Run with custom config
    powermate-monitor --config /path/to/monitor.toml

    # List attached PowerMates and exit
    powermate-monitor --list-devices

    # Run with debug logging
    powermate-monitor --log-level debug

CONFIGURATION:
    The monitor looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/powermate-monitor/monitor.toml
    3. /etc/powermate-monitor/monitor.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<std::path::PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// List attached PowerMates and exit
    #[arg(long)]
    list_devices: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = config::MonitorConfig::default();
        let path = config::MonitorConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = if let Some(ref path) = args.config {
        config::MonitorConfig::load(Some(path.clone())).context("Failed to load configuration")?
    } else {
        config::MonitorConfig::load_or_default()
    };

    // CLI log level wins over the config value
    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.monitor.log_level);
    config::MonitorConfig::validate_log_level(log_level)?;

    setup_logging(log_level).context("Failed to setup logging")?;

    info!("powermate-monitor v{}", env!("CARGO_PKG_VERSION"));

    // The tracker only holds a weak reference; `presenter` keeps it alive.
    let presenter = Arc::new(Presenter::new(&config.presenter));
    let tracker = tracker_for(args.list_devices, &presenter);

    let (usb_bridge, worker) = create_usb_bridge();
    let usb_worker_handle = spawn_usb_worker(worker, Arc::clone(&tracker), config.usb.clone());

    let result = if args.list_devices {
        list_devices_mode(&usb_bridge).await
    } else {
        run_monitor(&config, Arc::clone(&tracker)).await
    };

    info!("Shutting down USB subsystem...");
    if let Err(e) = shutdown_usb_worker(&usb_bridge).await {
        error!("Error shutting down USB worker: {:#}", e);
    }

    match usb_worker_handle.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("USB worker failed: {}", e),
        Err(e) => error!("USB worker thread panicked: {:?}", e),
    }

    if !args.list_devices {
        info!("Final knob value: {}", presenter.state().absolute_value);
    }
    result
}

/// Tracker fed by the USB worker
///
/// Listing only enumerates, so its tracker is not connected to the presenter.
fn tracker_for(list_only: bool, presenter: &Arc<Presenter>) -> Arc<DeviceTracker> {
    if list_only {
        Arc::new(DeviceTracker::new(ObserverRef::detached()))
    } else {
        Arc::new(DeviceTracker::with_observer(presenter))
    }
}

/// List attached PowerMates and exit
async fn list_devices_mode(usb_bridge: &UsbBridge) -> Result<()> {
    let devices = usb_bridge
        .list_devices()
        .await
        .context("Failed to list devices")?;

    if devices.is_empty() {
        println!("No PowerMate found.");
    } else {
        println!("Found {} PowerMate(s):\n", devices.len());
        for device in devices {
            println!(
                "  [{}] {:04x}:{:04x} - {}",
                device.bus_id, device.vendor_id, device.product_id, device.name
            );
        }
    }

    Ok(())
}

/// Poll until Ctrl+C
async fn run_monitor(config: &config::MonitorConfig, tracker: Arc<DeviceTracker>) -> Result<()> {
    let poller = Poller::new(Arc::clone(&tracker))
        .with_poll_interval(config.monitor.poll_interval())
        .with_idle_wait(config.monitor.idle_wait());
    let poller_handle = spawn_poller(poller);

    info!("Waiting for a PowerMate, press Ctrl+C to exit");

    let signal_result = signal::ctrl_c().await;
    match &signal_result {
        Ok(()) => info!("Received Ctrl+C, shutting down..."),
        Err(e) => error!("Error waiting for Ctrl+C: {}", e),
    }

    tracker.shutdown();
    poller_handle
        .join()
        .map_err(|e| anyhow!("Poller thread panicked: {:?}", e))?;

    signal_result.context("Failed to listen for Ctrl+C")
}

/// Shutdown USB worker thread gracefully
async fn shutdown_usb_worker(usb_bridge: &UsbBridge) -> Result<()> {
    usb_bridge
        .send_command(WorkerCommand::Shutdown)
        .await
        .context("Failed to send Shutdown command")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PresenterSettings;

    #[test]
    fn test_list_mode_tracker_is_detached() {
        let presenter = Arc::new(Presenter::new(&PresenterSettings::default()));

        assert!(tracker_for(true, &presenter).observer().is_dropped());
        assert!(!tracker_for(false, &presenter).observer().is_dropped());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["powermate-monitor", "--list-devices", "-l", "debug"]);
        assert!(args.list_devices);
        assert!(!args.save_config);
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.config.is_none());
    }
}
