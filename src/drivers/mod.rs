//! Actuator drivers: valve controller and status LED.

pub mod solenoid;
pub mod status_led;
