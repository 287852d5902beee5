//! Knob poller
//!
//! Reads the tracked device in a loop. Every successful read reports both the
//! button level and the knob delta, changed or not; change detection is left to
//! the observer.
//!
//! The loop does not spin: while idle it blocks on the tracker until a device is
//! available, and while tracking it sleeps `poll_interval` between reads.

use crate::observer::{ObserverRef, PollError};
use crate::tracker::DeviceTracker;
use protocol::{KnobReport, TransferRequest};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Default delay between two reads of a tracked device
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Shortest delay between two reads; smaller intervals are raised to this
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Default bound on a single idle wait, so shutdown is noticed
pub const DEFAULT_IDLE_WAIT: Duration = Duration::from_millis(250);

/// Result of a single poll iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// No device tracked; no transfer issued
    Idle,
    /// Transfer succeeded and both events were reported
    Reported(KnobReport),
    /// Transfer failed and the error was reported
    Failed(PollError),
    /// The device was cleared or replaced during the transfer; nothing reported
    Stale,
}

/// Polling loop over a [`DeviceTracker`]
pub struct Poller {
    tracker: Arc<DeviceTracker>,
    observer: ObserverRef,
    poll_interval: Duration,
    idle_wait: Duration,
}

impl Poller {
    /// Create a poller reporting to the tracker's observer
    pub fn new(tracker: Arc<DeviceTracker>) -> Self {
        let observer = tracker.observer().clone();
        Self {
            tracker,
            observer,
            poll_interval: DEFAULT_POLL_INTERVAL,
            idle_wait: DEFAULT_IDLE_WAIT,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        self
    }

    pub fn with_idle_wait(mut self, idle_wait: Duration) -> Self {
        self.idle_wait = idle_wait;
        self
    }

    /// Run one iteration
    ///
    /// The tracker lock is only held to take the snapshot and to re-check it
    /// afterwards, never across the transfer.
    pub fn poll_once(&self) -> PollOutcome {
        let Some(snapshot) = self.tracker.snapshot() else {
            return PollOutcome::Idle;
        };

        let request = TransferRequest::new();
        let result = snapshot.transport.issue_control_transfer(&request);

        if !self.tracker.is_current(snapshot.generation) {
            debug!(
                "Dropping poll result for {}, device changed during transfer",
                snapshot.identity
            );
            return PollOutcome::Stale;
        }

        match result {
            Ok(response) => {
                let report = response.report();
                trace!(
                    "Poll: pressed={}, delta={}",
                    report.button_pressed, report.knob_delta
                );
                self.observer.with(|o| {
                    o.on_button_state_changed(report.button_pressed);
                    o.on_knob_turn(report.knob_delta);
                });
                PollOutcome::Reported(report)
            }
            Err(error) => {
                warn!("Poll of {} failed: {}", snapshot.identity, error);
                self.observer.with(|o| o.on_error(&error));
                PollOutcome::Failed(error)
            }
        }
    }

    /// Poll until the tracker is shut down
    pub fn run(&self) {
        info!("Poller started");

        while !self.tracker.is_shut_down() {
            match self.poll_once() {
                PollOutcome::Idle => {
                    self.tracker.wait_for_device(self.idle_wait);
                }
                _ => thread::sleep(self.poll_interval),
            }
        }

        info!("Poller stopped");
    }
}

/// Spawn the poller on its own thread
///
/// The thread exits once the tracker is shut down.
pub fn spawn_poller(poller: Poller) -> thread::JoinHandle<()> {
    thread::Builder::new()
        .name("knob-poller".to_string())
        .spawn(move || poller.run())
        .expect("Failed to spawn poller thread")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{RecordingObserver, ScriptedTransport, mock_identity};
    use protocol::TransferError;

    #[test]
    fn test_idle_poll_is_noop() {
        let observer = Arc::new(RecordingObserver::new());
        let tracker = Arc::new(DeviceTracker::with_observer(&observer));
        let poller = Poller::new(tracker);

        assert_eq!(poller.poll_once(), PollOutcome::Idle);
        assert!(observer.events().is_empty());
    }

    #[test]
    fn test_failed_poll_reports_error_only() {
        let observer = Arc::new(RecordingObserver::new());
        let tracker = Arc::new(DeviceTracker::with_observer(&observer));
        let transport = Arc::new(ScriptedTransport::failing(TransferError::TransferFailed(-9)));
        tracker.device_arrived(mock_identity(1), transport);
        observer.clear();

        let poller = Poller::new(tracker);
        assert_eq!(
            poller.poll_once(),
            PollOutcome::Failed(TransferError::TransferFailed(-9))
        );
        assert_eq!(observer.errors(), vec![TransferError::TransferFailed(-9)]);
        assert!(observer.knob_turns().is_empty());
        assert!(observer.button_states().is_empty());
    }

    #[test]
    fn test_zero_poll_interval_is_clamped() {
        let tracker = Arc::new(DeviceTracker::with_observer(&Arc::new(
            RecordingObserver::new(),
        )));
        let poller = Poller::new(tracker).with_poll_interval(Duration::ZERO);
        assert_eq!(poller.poll_interval, MIN_POLL_INTERVAL);

        let poller = poller.with_poll_interval(Duration::from_millis(20));
        assert_eq!(poller.poll_interval, Duration::from_millis(20));
    }

    #[test]
    fn test_run_exits_on_shutdown() {
        let observer = Arc::new(RecordingObserver::new());
        let tracker = Arc::new(DeviceTracker::with_observer(&observer));
        let handle = spawn_poller(
            Poller::new(Arc::clone(&tracker)).with_idle_wait(Duration::from_millis(5)),
        );

        thread::sleep(Duration::from_millis(20));
        tracker.shutdown();
        handle.join().unwrap();
    }
}
