//! Console presenter
//!
//! Observer that accumulates knob deltas into an absolute value, times button
//! presses, and logs what changed.

use crate::config::PresenterSettings;
use monitor::{KnobObserver, PollError};
use protocol::{BusId, PeripheralIdentity};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Knob history owned by the presenter
#[derive(Debug, Clone, Copy)]
pub struct KnobState {
    pub absolute_value: i64,
    pub button_pressed: bool,
    pub last_button_change: Instant,
}

impl KnobState {
    fn new() -> Self {
        Self {
            absolute_value: 0,
            button_pressed: false,
            last_button_change: Instant::now(),
        }
    }
}

/// What a knob turn did to the state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KnobChange {
    Unchanged,
    Moved(i64),
}

/// What a button report did to the state
#[derive(Debug, Clone, Copy, PartialEq)]
enum ButtonChange {
    Unchanged,
    Pressed,
    Released { held: Duration },
}

/// Logging observer
pub struct Presenter {
    state: Mutex<KnobState>,
    precision: u32,
    replace_on_connect: bool,
}

impl Presenter {
    pub fn new(settings: &PresenterSettings) -> Self {
        Self {
            state: Mutex::new(KnobState::new()),
            precision: settings.precision,
            replace_on_connect: settings.replace_on_connect,
        }
    }

    fn lock(&self) -> MutexGuard<'_, KnobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current knob state
    pub fn state(&self) -> KnobState {
        *self.lock()
    }

    fn apply_knob_turn(&self, offset: i8) -> KnobChange {
        let mut state = self.lock();
        if offset == 0 {
            return KnobChange::Unchanged;
        }
        state.absolute_value += offset as i64;
        KnobChange::Moved(state.absolute_value)
    }

    fn apply_button_state(&self, pressed: bool, now: Instant) -> ButtonChange {
        let mut state = self.lock();
        if state.button_pressed == pressed {
            return ButtonChange::Unchanged;
        }

        let held = now.saturating_duration_since(state.last_button_change);
        state.button_pressed = pressed;
        state.last_button_change = now;

        if pressed {
            ButtonChange::Pressed
        } else {
            ButtonChange::Released { held }
        }
    }
}

impl KnobObserver for Presenter {
    fn decide_replace(&self, device: &PeripheralIdentity) -> bool {
        info!(
            "Connected to new Griffin `{}` (VID: {:#06x}, PID: {:#06x})",
            device.name, device.vendor_id, device.product_id
        );
        self.replace_on_connect
    }

    fn on_device_disconnected(&self, bus_id: BusId, is_current_device: bool) {
        info!("Disconnected from Griffin ({})", bus_id);
        if is_current_device {
            info!("No device is currently selected");
        }
    }

    fn on_knob_turn(&self, offset: i8) {
        if let KnobChange::Moved(value) = self.apply_knob_turn(offset) {
            info!("New absolute knob value: {}", value);
        }
    }

    fn on_button_state_changed(&self, pressed: bool) {
        match self.apply_button_state(pressed, Instant::now()) {
            ButtonChange::Unchanged => {}
            ButtonChange::Pressed => info!("New button state: pressed"),
            ButtonChange::Released { held } => {
                info!(
                    "Button was held for: {} seconds",
                    round_to_precision(held.as_secs_f64(), self.precision)
                );
                info!("New button state: released");
            }
        }
    }

    fn on_error(&self, error: &PollError) {
        warn!("An error occurred: {}", error);
    }
}

/// Round `value` to `precision` decimal places
pub fn round_to_precision(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}
