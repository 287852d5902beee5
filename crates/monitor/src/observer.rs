//! Observer interface

use protocol::{BusId, PeripheralIdentity, TransferError};
use std::sync::{Arc, Weak};
use tracing::trace;

/// Error reported to the observer when a poll fails
pub type PollError = TransferError;

/// Receiver of tracker and poller events
///
/// All methods are called from the hot-plug worker thread or the poller thread,
/// never while the tracker lock is held.
pub trait KnobObserver: Send + Sync {
    /// A matching device appeared
    ///
    /// Called for every arrival. Returning `true` replaces the currently tracked
    /// device. When nothing is tracked the new device is taken regardless of
    /// the answer.
    fn decide_replace(&self, device: &PeripheralIdentity) -> bool;

    /// A matching device was unplugged
    ///
    /// `is_current_device` is `true` when it was the tracked device.
    fn on_device_disconnected(&self, bus_id: BusId, is_current_device: bool);

    /// Knob movement since the previous poll. Zero when the knob is idle.
    fn on_knob_turn(&self, offset: i8);

    /// Current button level, reported on every successful poll
    fn on_button_state_changed(&self, pressed: bool);

    /// A poll failed
    fn on_error(&self, error: &PollError);
}

/// Non-owning reference to an observer
///
/// The caller owns the observer. Once it is dropped, events are discarded.
#[derive(Clone)]
pub struct ObserverRef(Weak<dyn KnobObserver>);

impl ObserverRef {
    pub fn new<O: KnobObserver + 'static>(observer: &Arc<O>) -> Self {
        let weak = Arc::downgrade(observer);
        Self(weak)
    }

    /// Reference that never reaches an observer
    pub fn detached() -> Self {
        let weak: Weak<Detached> = Weak::new();
        Self(weak)
    }

    /// Run `f` against the observer if it is still alive
    pub fn with<R>(&self, f: impl FnOnce(&dyn KnobObserver) -> R) -> Option<R> {
        match self.0.upgrade() {
            Some(observer) => Some(f(observer.as_ref())),
            None => {
                trace!("Observer dropped, discarding event");
                None
            }
        }
    }

    /// Whether the observer has been dropped
    pub fn is_dropped(&self) -> bool {
        self.0.strong_count() == 0
    }
}

/// Uninhabited; only gives [`ObserverRef::detached`] a concrete type
enum Detached {}

impl KnobObserver for Detached {
    fn decide_replace(&self, _device: &PeripheralIdentity) -> bool {
        false
    }
    fn on_device_disconnected(&self, _bus_id: BusId, _is_current_device: bool) {}
    fn on_knob_turn(&self, _offset: i8) {}
    fn on_button_state_changed(&self, _pressed: bool) {}
    fn on_error(&self, _error: &PollError) {}
}

impl std::fmt::Debug for ObserverRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRef")
            .field("alive", &!self.is_dropped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::RecordingObserver;

    #[test]
    fn test_events_reach_live_observer() {
        let observer = Arc::new(RecordingObserver::new());
        let reference = ObserverRef::new(&observer);

        let delivered = reference.with(|o| o.on_knob_turn(4));
        assert!(delivered.is_some());
        assert_eq!(observer.knob_turns(), vec![4]);
    }

    #[test]
    fn test_dropped_observer_discards_events() {
        let observer = Arc::new(RecordingObserver::new());
        let reference = ObserverRef::new(&observer);
        drop(observer);

        assert!(reference.is_dropped());
        assert!(reference.with(|o| o.on_knob_turn(1)).is_none());
    }

    #[test]
    fn test_reference_from_concrete_observer() {
        let observer = Arc::new(RecordingObserver::new());
        let reference = ObserverRef::new(&observer);
        let copy = reference.clone();

        assert!(!copy.is_dropped());
        copy.with(|o| o.on_button_state_changed(true));
        assert_eq!(observer.button_states(), vec![true]);
    }

    #[test]
    fn test_detached_reference_discards_events() {
        let reference = ObserverRef::detached();
        assert!(reference.is_dropped());
        assert!(reference.with(|o| o.on_knob_turn(2)).is_none());
    }
}
