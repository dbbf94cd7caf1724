//! OHRBETS rig firmware library.
//!
//! Exposes the pure-logic modules for integration testing.  Everything
//! that needs ESP-IDF is behind the `espidf` feature; the rest builds and
//! tests on the host.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod fsm;
pub mod pins;
pub mod protocol;
pub mod safety;
pub mod trial;

pub mod adapters;
pub mod drivers;
pub mod sensors;
