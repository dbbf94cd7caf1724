//! Behavioral event records and the session-relative event logger.
//!
//! Every record that reaches the host is an `(EventCode, timestamp)` pair,
//! with the timestamp measured in milliseconds from *session zero*: the
//! instant `START` was accepted (or boot, before the first session).  Raw
//! device uptime never leaves the firmware.
//!
//! ```text
//!  OutputController ──┐
//!  LickDetector ──────┼──▶ EventLogger ──▶ EventSink ──▶ "DATA:<code>,<ms>"
//!  Trial FSM ─────────┘
//! ```

use core::fmt;

use serde::Serialize;

use crate::app::events::AppEvent;
use crate::app::ports::{Clock, EventSink};

/// Event codes understood by the recorder and analysis tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum EventCode {
    TrialStart = 1,
    TrialEnd = 2,
    OdorOn = 3,
    OdorOff = 4,
    RewardOn = 5,
    RewardOff = 6,
    Lick = 7,
    SessionStart = 8,
}

impl EventCode {
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::TrialStart),
            2 => Some(Self::TrialEnd),
            3 => Some(Self::OdorOn),
            4 => Some(Self::OdorOff),
            5 => Some(Self::RewardOn),
            6 => Some(Self::RewardOff),
            7 => Some(Self::Lick),
            8 => Some(Self::SessionStart),
            _ => None,
        }
    }
}

/// One timestamped behavioral event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventRecord {
    pub code: EventCode,
    /// Milliseconds since session zero.
    pub timestamp_ms: u64,
}

impl fmt::Display for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DATA:{},{}", self.code.code(), self.timestamp_ms)
    }
}

/// Stamps events relative to session zero and pushes them to the sink.
#[derive(Debug, Clone, Copy)]
pub struct EventLogger {
    session_zero_ms: u64,
}

impl EventLogger {
    pub const fn new(session_zero_ms: u64) -> Self {
        Self { session_zero_ms }
    }

    /// Re-anchor timestamps; called when a session starts.
    pub fn rebase(&mut self, session_zero_ms: u64) {
        self.session_zero_ms = session_zero_ms;
    }

    pub fn session_zero_ms(&self) -> u64 {
        self.session_zero_ms
    }

    /// Build a record for an event observed at absolute time `now_ms`.
    pub fn record(&self, code: EventCode, now_ms: u64) -> EventRecord {
        EventRecord {
            code,
            timestamp_ms: now_ms.saturating_sub(self.session_zero_ms),
        }
    }

    /// Emit an event observed at absolute time `now_ms`.
    pub fn emit_at(&self, code: EventCode, now_ms: u64, sink: &mut impl EventSink) -> EventRecord {
        let record = self.record(code, now_ms);
        sink.emit(&AppEvent::Data(record));
        record
    }

    /// Emit an event stamped with the clock's current reading.
    pub fn emit(
        &self,
        code: EventCode,
        clock: &impl Clock,
        sink: &mut impl EventSink,
    ) -> EventRecord {
        self.emit_at(code, clock.now_ms(), sink)
    }
}
