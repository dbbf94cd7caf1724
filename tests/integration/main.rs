//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that drives the full
//! line → parser → AppService → FSM → valves pipeline against the mock rig.
//! All tests run on the host with no real hardware required.

mod command_tests;
mod session_tests;
