//! Application core: pure domain logic, zero I/O.
//!
//! Trial sequencing, output safety, lick detection and the host command
//! set.  All interaction with hardware happens through **port traits**
//! defined in [`ports`], keeping this layer fully testable without real
//! peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
