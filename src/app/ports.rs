//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (clock, valves, lick sensor, host link) implement these
//! traits.  The [`AppService`](super::service::AppService) consumes them via
//! generics, so the domain core never touches hardware directly.

use crate::error::OutputError;

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic millisecond time source with a blocking delay.
pub trait Clock {
    /// Milliseconds since boot.  Never goes backwards.
    fn now_ms(&self) -> u64;

    /// Busy-wait for `ms`.  Used only where millisecond-exact timing
    /// matters more than responsiveness (reward pulses, hardware tests).
    fn delay_ms(&mut self, ms: u32);
}

// ───────────────────────────────────────────────────────────────
// Output port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Raw pin writes.  Only [`OutputController`](crate::drivers::solenoid::OutputController)
/// calls the valve methods.
pub trait OutputPort {
    /// `Err` means the level on the pin is unknown.
    fn write_odor(&mut self, on: bool) -> Result<(), OutputError>;

    fn write_reward(&mut self, on: bool) -> Result<(), OutputError>;

    /// Best effort; the LED is cosmetic.
    fn write_status_led(&mut self, on: bool);
}

// ───────────────────────────────────────────────────────────────
// Lick sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

pub trait LickSensorPort {
    /// Current contact level, already corrected for polarity.
    fn is_touched(&mut self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → host link)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Each event's `Display` form is one protocol line.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

/// Everything the control loop needs from the rig in one bound.
pub trait RigPorts: Clock + OutputPort + LickSensorPort {}

impl<T: Clock + OutputPort + LickSensorPort> RigPorts for T {}
