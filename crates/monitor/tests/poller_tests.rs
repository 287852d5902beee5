//! Integration tests for the poller
//!
//! Tests polling behavior including:
//! - No transfers while idle
//! - Error reporting on failing transfers
//! - Unconditional event emission on successful polls
//! - Disconnects during a transfer
//!
//! Run with: `cargo test -p monitor --test poller_tests`

use monitor::test_utils::{ObservedEvent, RecordingObserver, ScriptedTransport, mock_identity};
use monitor::{DeviceTracker, PollOutcome, Poller, spawn_poller};
use protocol::{BusId, KnobReport, TransferError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn setup() -> (Arc<RecordingObserver>, Arc<DeviceTracker>) {
    let observer = Arc::new(RecordingObserver::new());
    let tracker = Arc::new(DeviceTracker::with_observer(&observer));
    (observer, tracker)
}

#[test]
fn test_no_device_means_no_transfers_or_events() {
    let (observer, tracker) = setup();
    let poller = Poller::new(Arc::clone(&tracker));

    for _ in 0..10 {
        assert_eq!(poller.poll_once(), PollOutcome::Idle);
    }

    assert!(observer.events().is_empty());
}

#[test]
fn test_cleared_device_is_not_polled() {
    let (observer, tracker) = setup();
    let transport = Arc::new(ScriptedTransport::new());
    tracker.device_arrived(mock_identity(1), transport.clone());
    tracker.device_left(BusId(1));
    observer.clear();

    let poller = Poller::new(tracker);
    for _ in 0..5 {
        poller.poll_once();
    }

    assert_eq!(transport.transfer_count(), 0);
    assert!(observer.knob_turns().is_empty());
    assert!(observer.button_states().is_empty());
}

#[test]
fn test_failing_transfer_reports_one_error_per_iteration() {
    let (observer, tracker) = setup();
    let transport = Arc::new(ScriptedTransport::failing(
        TransferError::InterfaceUnavailable,
    ));
    tracker.device_arrived(mock_identity(1), transport.clone());
    observer.clear();

    let poller = Poller::new(tracker);
    for _ in 0..4 {
        assert_eq!(
            poller.poll_once(),
            PollOutcome::Failed(TransferError::InterfaceUnavailable)
        );
    }

    assert_eq!(transport.transfer_count(), 4);
    assert_eq!(observer.errors().len(), 4);
    assert!(observer.knob_turns().is_empty());
    assert!(observer.button_states().is_empty());
}

#[test]
fn test_knob_deltas_reported_in_order() {
    let (observer, tracker) = setup();
    let transport = Arc::new(ScriptedTransport::new());
    for byte in [5u8, 0xfd, 0x00, 0x7f, 0x80] {
        transport.push_bytes(&[0, byte, 0, 0, 0, 0]);
    }
    tracker.device_arrived(mock_identity(1), transport);

    let poller = Poller::new(tracker);
    for _ in 0..5 {
        assert!(matches!(poller.poll_once(), PollOutcome::Reported(_)));
    }

    assert_eq!(observer.knob_turns(), vec![5, -3, 0, 127, -128]);
}

#[test]
fn test_unchanged_state_is_still_reported() {
    let (observer, tracker) = setup();
    let transport = Arc::new(ScriptedTransport::new());
    tracker.device_arrived(mock_identity(1), transport);
    observer.clear();

    let poller = Poller::new(tracker);
    for _ in 0..3 {
        poller.poll_once();
    }

    assert_eq!(observer.button_states(), vec![false, false, false]);
    assert_eq!(observer.knob_turns(), vec![0, 0, 0]);
}

#[test]
fn test_button_reported_before_knob() {
    let (observer, tracker) = setup();
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_report(KnobReport {
        button_pressed: true,
        knob_delta: 2,
    });
    tracker.device_arrived(mock_identity(1), transport);
    observer.clear();

    Poller::new(tracker).poll_once();

    assert_eq!(
        observer.events(),
        vec![ObservedEvent::ButtonState(true), ObservedEvent::KnobTurn(2)]
    );
}

#[test]
fn test_errors_do_not_stop_polling() {
    let (observer, tracker) = setup();
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_error(TransferError::TransferFailed(-7));
    transport.push_report(KnobReport {
        button_pressed: false,
        knob_delta: 1,
    });
    tracker.device_arrived(mock_identity(1), transport);

    let poller = Poller::new(tracker);
    assert!(matches!(poller.poll_once(), PollOutcome::Failed(_)));
    assert!(matches!(poller.poll_once(), PollOutcome::Reported(_)));

    assert_eq!(observer.errors(), vec![TransferError::TransferFailed(-7)]);
    assert_eq!(observer.knob_turns(), vec![1]);
}

#[test]
fn test_disconnect_during_transfer_drops_result() {
    let (observer, tracker) = setup();
    let transport = Arc::new(ScriptedTransport::with_deltas([9]));
    {
        let tracker = Arc::downgrade(&tracker);
        transport.set_on_transfer(move || {
            if let Some(tracker) = tracker.upgrade() {
                tracker.device_left(BusId(1));
            }
        });
    }
    tracker.device_arrived(mock_identity(1), transport.clone());

    let poller = Poller::new(Arc::clone(&tracker));
    assert_eq!(poller.poll_once(), PollOutcome::Stale);

    assert_eq!(transport.transfer_count(), 1);
    assert!(observer.knob_turns().is_empty());
    assert_eq!(observer.disconnects(), vec![(BusId(1), true)]);
}

#[test]
fn test_running_poller_picks_up_new_device() {
    let (observer, tracker) = setup();
    let handle = spawn_poller(
        Poller::new(Arc::clone(&tracker))
            .with_poll_interval(Duration::from_millis(1))
            .with_idle_wait(Duration::from_millis(5)),
    );

    thread::sleep(Duration::from_millis(20));
    assert!(observer.knob_turns().is_empty());

    tracker.device_arrived(mock_identity(1), Arc::new(ScriptedTransport::with_deltas([3])));

    let mut seen = false;
    for _ in 0..200 {
        if observer.knob_turns().first() == Some(&3) {
            seen = true;
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }

    tracker.shutdown();
    handle.join().unwrap();
    assert!(seen, "poller never reported the scripted delta");
}

#[test]
fn test_zero_interval_does_not_spin_on_failures() {
    let (observer, tracker) = setup();
    let transport = Arc::new(ScriptedTransport::failing(
        TransferError::InterfaceUnavailable,
    ));
    tracker.device_arrived(mock_identity(1), transport.clone());

    let handle = spawn_poller(Poller::new(Arc::clone(&tracker)).with_poll_interval(Duration::ZERO));
    thread::sleep(Duration::from_millis(100));
    tracker.shutdown();
    handle.join().unwrap();

    // At least 1ms between reads bounds the count to about 100.
    let transfers = transport.transfer_count();
    assert!(transfers > 0);
    assert!(transfers < 250, "{} transfers in 100ms", transfers);
    assert_eq!(observer.errors().len(), transfers);
}
