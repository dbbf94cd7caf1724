//! Behavioral sensors.

pub mod lick;
