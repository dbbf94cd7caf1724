//! Single-colour status LED pattern generator.
//!
//! The LED tells the operator at a glance what the rig is doing:
//!
//! | Phase group          | Pattern                    |
//! |----------------------|----------------------------|
//! | Idle                 | heartbeat, 100 ms every 2 s |
//! | Session (ITI..Complete) | solid on                |
//! | Manual / hardware test  | fast blink, 4 Hz        |
//!
//! `level()` is pure; the service writes the pin through
//! [`OutputPort::write_status_led`](crate::app::ports::OutputPort::write_status_led)
//! only when the level changes.

use crate::fsm::StateId;

/// LED patterns, one per phase group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedPattern {
    Heartbeat,
    Solid,
    FastBlink,
}

impl LedPattern {
    pub const fn for_state(state: StateId) -> Self {
        if state.in_session() {
            Self::Solid
        } else if state.is_side_state() {
            Self::FastBlink
        } else {
            Self::Heartbeat
        }
    }

    /// LED level at time `now_ms`.
    pub const fn level(self, now_ms: u64) -> bool {
        match self {
            Self::Solid => true,
            Self::Heartbeat => now_ms % 2_000 < 100,
            Self::FastBlink => now_ms % 250 < 125,
        }
    }
}

pub struct StatusIndicator {
    lit: Option<bool>,
}

impl StatusIndicator {
    pub const fn new() -> Self {
        Self { lit: None }
    }

    /// Compute the level for `state` at `now_ms`.  Returns `Some(level)`
    /// when the pin needs rewriting.
    pub fn refresh(&mut self, state: StateId, now_ms: u64) -> Option<bool> {
        let level = LedPattern::for_state(state).level(now_ms);
        if self.lit == Some(level) {
            return None;
        }
        self.lit = Some(level);
        Some(level)
    }

    pub fn is_lit(&self) -> bool {
        self.lit.unwrap_or(false)
    }
}

impl Default for StatusIndicator {
    fn default() -> Self {
        Self::new()
    }
}
