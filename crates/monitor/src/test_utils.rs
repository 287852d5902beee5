//! Test utilities for the monitor
//!
//! Provides a scripted transport and a recording observer for exercising the
//! tracker and poller without hardware.
//!
//! # Example
//!
//! ```
//! use monitor::test_utils::{RecordingObserver, ScriptedTransport, mock_identity};
//! use monitor::{DeviceTracker, Poller};
//! use std::sync::Arc;
//!
//! let observer = Arc::new(RecordingObserver::new());
//! let tracker = Arc::new(DeviceTracker::with_observer(&observer));
//! tracker.device_arrived(mock_identity(1), Arc::new(ScriptedTransport::with_deltas([4])));
//!
//! Poller::new(tracker).poll_once();
//! assert_eq!(observer.knob_turns(), vec![4]);
//! ```

use crate::observer::{KnobObserver, PollError};
use crate::transport::ControlTransport;
use protocol::{
    BusId, KnobReport, POWERMATE_PRODUCT_ID, POWERMATE_VENDOR_ID, PeripheralIdentity,
    TransferError, TransferRequest, TransferResponse,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Create a PowerMate identity with bus id `id`
pub fn mock_identity(id: u64) -> PeripheralIdentity {
    PeripheralIdentity {
        bus_id: BusId(id),
        vendor_id: POWERMATE_VENDOR_ID,
        product_id: POWERMATE_PRODUCT_ID,
        name: format!("Griffin PowerMate {}", id),
    }
}

type TransferResult = Result<TransferResponse, TransferError>;
type TransferHook = Box<dyn Fn() + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Transport that replays queued results
///
/// Once the queue is empty every transfer returns the fallback result, which
/// defaults to an idle report (released, delta 0).
pub struct ScriptedTransport {
    script: Mutex<VecDeque<TransferResult>>,
    fallback: TransferResult,
    transfers: AtomicUsize,
    on_transfer: Mutex<Option<TransferHook>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Ok(TransferResponse::from_report(KnobReport::default())),
            transfers: AtomicUsize::new(0),
            on_transfer: Mutex::new(None),
        }
    }

    /// Transport whose every transfer fails with `error`
    pub fn failing(error: TransferError) -> Self {
        Self {
            fallback: Err(error),
            ..Self::new()
        }
    }

    /// Transport that reports the given knob deltas with the button released
    pub fn with_deltas(deltas: impl IntoIterator<Item = i8>) -> Self {
        let transport = Self::new();
        for delta in deltas {
            transport.push_report(KnobReport {
                button_pressed: false,
                knob_delta: delta,
            });
        }
        transport
    }

    /// Queue a successful response carrying `report`
    pub fn push_report(&self, report: KnobReport) {
        lock(&self.script).push_back(Ok(TransferResponse::from_report(report)));
    }

    /// Queue a raw response
    pub fn push_bytes(&self, bytes: &[u8]) {
        lock(&self.script).push_back(Ok(TransferResponse::from_bytes(bytes)));
    }

    /// Queue a failure
    pub fn push_error(&self, error: TransferError) {
        lock(&self.script).push_back(Err(error));
    }

    /// Run `hook` inside every transfer, before the result is returned
    pub fn set_on_transfer(&self, hook: impl Fn() + Send + Sync + 'static) {
        *lock(&self.on_transfer) = Some(Box::new(hook));
    }

    /// Number of transfers issued so far
    pub fn transfer_count(&self) -> usize {
        self.transfers.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlTransport for ScriptedTransport {
    fn issue_control_transfer(&self, _request: &TransferRequest) -> TransferResult {
        self.transfers.fetch_add(1, Ordering::SeqCst);

        if let Some(hook) = lock(&self.on_transfer).as_ref() {
            hook();
        }

        lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| self.fallback)
    }
}

/// One observer callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedEvent {
    Connected(PeripheralIdentity),
    Disconnected { bus_id: BusId, is_current: bool },
    KnobTurn(i8),
    ButtonState(bool),
    Error(PollError),
}

/// Observer that records every callback in order
pub struct RecordingObserver {
    events: Mutex<Vec<ObservedEvent>>,
    replace: AtomicBool,
}

impl RecordingObserver {
    /// Observer that answers `true` to every replace decision
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            replace: AtomicBool::new(true),
        }
    }

    /// Set the answer to future replace decisions
    pub fn set_replace(&self, replace: bool) {
        self.replace.store(replace, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<ObservedEvent> {
        lock(&self.events).clone()
    }

    pub fn clear(&self) {
        lock(&self.events).clear();
    }

    pub fn connected(&self) -> Vec<PeripheralIdentity> {
        self.filter(|e| match e {
            ObservedEvent::Connected(identity) => Some(identity.clone()),
            _ => None,
        })
    }

    pub fn disconnects(&self) -> Vec<(BusId, bool)> {
        self.filter(|e| match e {
            ObservedEvent::Disconnected { bus_id, is_current } => Some((*bus_id, *is_current)),
            _ => None,
        })
    }

    pub fn knob_turns(&self) -> Vec<i8> {
        self.filter(|e| match e {
            ObservedEvent::KnobTurn(offset) => Some(*offset),
            _ => None,
        })
    }

    pub fn button_states(&self) -> Vec<bool> {
        self.filter(|e| match e {
            ObservedEvent::ButtonState(pressed) => Some(*pressed),
            _ => None,
        })
    }

    pub fn errors(&self) -> Vec<PollError> {
        self.filter(|e| match e {
            ObservedEvent::Error(error) => Some(*error),
            _ => None,
        })
    }

    fn filter<T>(&self, f: impl Fn(&ObservedEvent) -> Option<T>) -> Vec<T> {
        lock(&self.events).iter().filter_map(f).collect()
    }

    fn record(&self, event: ObservedEvent) {
        lock(&self.events).push(event);
    }
}

impl Default for RecordingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl KnobObserver for RecordingObserver {
    fn decide_replace(&self, device: &PeripheralIdentity) -> bool {
        self.record(ObservedEvent::Connected(device.clone()));
        self.replace.load(Ordering::SeqCst)
    }

    fn on_device_disconnected(&self, bus_id: BusId, is_current_device: bool) {
        self.record(ObservedEvent::Disconnected {
            bus_id,
            is_current: is_current_device,
        });
    }

    fn on_knob_turn(&self, offset: i8) {
        self.record(ObservedEvent::KnobTurn(offset));
    }

    fn on_button_state_changed(&self, pressed: bool) {
        self.record(ObservedEvent::ButtonState(pressed));
    }

    fn on_error(&self, error: &PollError) {
        self.record(ObservedEvent::Error(*error));
    }
}
