//! Rig pin assignments for the ESP32-S3 carrier board.
//!
//! Single source of truth for every GPIO the firmware touches.

// ── Valves (via MOSFET drivers, active high) ──────────────────
/// Odor delivery solenoid.
pub const ODOR_VALVE_GPIO: i32 = 4;
/// Water reward solenoid.
pub const REWARD_VALVE_GPIO: i32 = 5;

// ── Sensors ───────────────────────────────────────────────────
/// Capacitive touch board output.
pub const LICK_SENSOR_GPIO: i32 = 6;
/// The touch board pulls the line high on contact.
pub const LICK_ACTIVE_HIGH: bool = true;

// ── Indicators ────────────────────────────────────────────────
pub const STATUS_LED_GPIO: i32 = 7;

// ── Host serial (UART0 via USB bridge) ────────────────────────
pub const UART_TX_GPIO: i32 = 43;
pub const UART_RX_GPIO: i32 = 44;
