//! Hot-plug tracker
//!
//! Keeps the one device the poller reads from. Arrivals go through the
//! observer's replace decision; any departure while tracking clears the
//! tracked device, including departures of a device that was never tracked.

use crate::observer::{KnobObserver, ObserverRef};
use crate::transport::ControlTransport;
use protocol::{BusId, PeripheralIdentity};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

/// The device currently being polled
#[derive(Clone)]
pub struct TrackedDevice {
    pub identity: PeripheralIdentity,
    pub transport: Arc<dyn ControlTransport>,
}

impl std::fmt::Debug for TrackedDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedDevice")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

/// Tracked device captured for one poll
///
/// Holding a snapshot does not hold the tracker lock. The generation tells the
/// poller whether the device was replaced or cleared while it was transferring.
#[derive(Clone)]
pub struct Snapshot {
    pub generation: u64,
    pub identity: PeripheralIdentity,
    pub transport: Arc<dyn ControlTransport>,
}

/// State change caused by a hot-plug event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Idle -> Tracking
    Tracked { device: PeripheralIdentity },
    /// Tracking -> Tracking with the new device
    Replaced {
        previous: PeripheralIdentity,
        device: PeripheralIdentity,
    },
    /// Tracking unchanged; the new device was declined
    Kept {
        current: PeripheralIdentity,
        declined: PeripheralIdentity,
    },
    /// Tracking -> Idle
    Cleared {
        previous: PeripheralIdentity,
        bus_id: BusId,
        was_current: bool,
    },
    /// Departure while Idle
    Unchanged { bus_id: BusId },
}

struct TrackerState {
    current: Option<TrackedDevice>,
    /// Bumped on every change of `current`
    generation: u64,
    shutdown: bool,
}

/// Owner of the single tracked device
pub struct DeviceTracker {
    state: Mutex<TrackerState>,
    available: Condvar,
    observer: ObserverRef,
}

impl DeviceTracker {
    /// Create an idle tracker reporting to `observer`
    pub fn new(observer: ObserverRef) -> Self {
        Self {
            state: Mutex::new(TrackerState {
                current: None,
                generation: 0,
                shutdown: false,
            }),
            available: Condvar::new(),
            observer,
        }
    }

    /// Create an idle tracker holding a weak reference to `observer`
    pub fn with_observer<O: KnobObserver + 'static>(observer: &Arc<O>) -> Self {
        Self::new(ObserverRef::new(observer))
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Observer this tracker reports to
    pub fn observer(&self) -> &ObserverRef {
        &self.observer
    }

    /// Handle a "device appeared" event
    pub fn device_arrived(
        &self,
        identity: PeripheralIdentity,
        transport: Arc<dyn ControlTransport>,
    ) -> Transition {
        // Always asked, even when idle: this doubles as the arrival notification.
        let replace = self
            .observer
            .with(|o| o.decide_replace(&identity))
            .unwrap_or(false);

        let transition = {
            let mut state = self.lock();
            match state.current.take() {
                None => {
                    state.current = Some(TrackedDevice {
                        identity: identity.clone(),
                        transport,
                    });
                    state.generation += 1;
                    Transition::Tracked { device: identity }
                }
                Some(previous) if replace => {
                    state.current = Some(TrackedDevice {
                        identity: identity.clone(),
                        transport,
                    });
                    state.generation += 1;
                    Transition::Replaced {
                        previous: previous.identity,
                        device: identity,
                    }
                }
                Some(current) => {
                    let kept = current.identity.clone();
                    state.current = Some(current);
                    Transition::Kept {
                        current: kept,
                        declined: identity,
                    }
                }
            }
        };

        match &transition {
            Transition::Tracked { device } => {
                info!("Tracking {}", device);
                self.available.notify_all();
            }
            Transition::Replaced { previous, device } => {
                info!("Tracking {} (replaced {})", device, previous);
                self.available.notify_all();
            }
            Transition::Kept { current, declined } => {
                info!("Keeping {}, ignoring {}", current, declined);
            }
            _ => {}
        }

        transition
    }

    /// Handle a "device vanished" event
    ///
    /// Any departure clears the tracked device, whether or not `bus_id` matches it.
    pub fn device_left(&self, bus_id: BusId) -> Transition {
        let transition = {
            let mut state = self.lock();
            match state.current.take() {
                Some(previous) => {
                    state.generation += 1;
                    let was_current = previous.identity.bus_id == bus_id;
                    Transition::Cleared {
                        previous: previous.identity,
                        bus_id,
                        was_current,
                    }
                }
                None => Transition::Unchanged { bus_id },
            }
        };

        let is_current = match &transition {
            Transition::Cleared {
                previous,
                was_current,
                ..
            } => {
                if *was_current {
                    info!("Tracked device {} disconnected", previous);
                } else {
                    info!(
                        "Device {} disconnected, no longer tracking {}",
                        bus_id, previous
                    );
                }
                *was_current
            }
            _ => {
                debug!("Device {} disconnected while idle", bus_id);
                false
            }
        };

        self.observer
            .with(|o| o.on_device_disconnected(bus_id, is_current));

        transition
    }

    /// Identity of the tracked device, if any
    pub fn current(&self) -> Option<PeripheralIdentity> {
        self.lock().current.as_ref().map(|d| d.identity.clone())
    }

    /// Whether a device is tracked
    pub fn is_tracking(&self) -> bool {
        self.lock().current.is_some()
    }

    /// Capture the tracked device for one poll
    pub fn snapshot(&self) -> Option<Snapshot> {
        let state = self.lock();
        Self::snapshot_of(&state)
    }

    fn snapshot_of(state: &TrackerState) -> Option<Snapshot> {
        state.current.as_ref().map(|device| Snapshot {
            generation: state.generation,
            identity: device.identity.clone(),
            transport: Arc::clone(&device.transport),
        })
    }

    /// Whether `generation` still refers to the tracked device
    pub fn is_current(&self, generation: u64) -> bool {
        let state = self.lock();
        state.current.is_some() && state.generation == generation
    }

    /// Block until a device is tracked, the tracker shuts down, or `timeout` passes
    pub fn wait_for_device(&self, timeout: Duration) -> Option<Snapshot> {
        let state = self.lock();
        let (state, _timeout) = self
            .available
            .wait_timeout_while(state, timeout, |s| s.current.is_none() && !s.shutdown)
            .unwrap_or_else(PoisonError::into_inner);

        if state.shutdown {
            return None;
        }
        Self::snapshot_of(&state)
    }

    /// Stop the tracker and wake any waiting poller
    pub fn shutdown(&self) {
        self.lock().shutdown = true;
        self.available.notify_all();
        debug!("Device tracker shut down");
    }

    /// Whether [`shutdown`](Self::shutdown) has been called
    pub fn is_shut_down(&self) -> bool {
        self.lock().shutdown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{RecordingObserver, ScriptedTransport, mock_identity};

    fn transport() -> Arc<dyn ControlTransport> {
        Arc::new(ScriptedTransport::new())
    }

    #[test]
    fn test_generation_changes_on_replace() {
        let observer = Arc::new(RecordingObserver::new());
        let tracker = DeviceTracker::with_observer(&observer);

        tracker.device_arrived(mock_identity(1), transport());
        let first = tracker.snapshot().unwrap();
        assert!(tracker.is_current(first.generation));

        tracker.device_arrived(mock_identity(2), transport());
        assert!(!tracker.is_current(first.generation));
        assert_eq!(tracker.current().unwrap().bus_id, BusId(2));
    }

    #[test]
    fn test_declined_arrival_keeps_generation() {
        let observer = Arc::new(RecordingObserver::new());
        observer.set_replace(false);
        let tracker = DeviceTracker::with_observer(&observer);

        tracker.device_arrived(mock_identity(1), transport());
        let first = tracker.snapshot().unwrap();
        tracker.device_arrived(mock_identity(2), transport());

        assert!(tracker.is_current(first.generation));
    }

    #[test]
    fn test_wait_for_device_times_out_when_idle() {
        let observer = Arc::new(RecordingObserver::new());
        let tracker = DeviceTracker::with_observer(&observer);

        assert!(tracker.wait_for_device(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn test_wait_for_device_returns_tracked_device() {
        let observer = Arc::new(RecordingObserver::new());
        let tracker = Arc::new(DeviceTracker::with_observer(&observer));

        let waiter = {
            let tracker = Arc::clone(&tracker);
            std::thread::spawn(move || tracker.wait_for_device(Duration::from_secs(5)))
        };

        std::thread::sleep(Duration::from_millis(20));
        tracker.device_arrived(mock_identity(7), transport());

        let snapshot = waiter.join().unwrap().unwrap();
        assert_eq!(snapshot.identity.bus_id, BusId(7));
    }

    #[test]
    fn test_shutdown_wakes_waiter() {
        let observer = Arc::new(RecordingObserver::new());
        let tracker = Arc::new(DeviceTracker::with_observer(&observer));

        let waiter = {
            let tracker = Arc::clone(&tracker);
            std::thread::spawn(move || tracker.wait_for_device(Duration::from_secs(30)))
        };

        std::thread::sleep(Duration::from_millis(20));
        tracker.shutdown();

        assert!(waiter.join().unwrap().is_none());
        assert!(tracker.is_shut_down());
    }
}
