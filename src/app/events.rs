//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  The `Display` impl is the
//! wire format: one event, one protocol line, no terminator.

use core::fmt;

use crate::config::TimingConfig;
use crate::diagnostics::DebugSnapshot;
use crate::error::{CommandError, InitError, SafetyFault};
use crate::events::EventRecord;
use crate::fsm::StateId;
use crate::trial::TrialType;

/// Which blocking hardware test is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareTest {
    Odor,
    Reward,
}

impl HardwareTest {
    const fn tag(self) -> &'static str {
        match self {
            Self::Odor => "TEST_ODOR",
            Self::Reward => "TEST_REWARD",
        }
    }
}

/// Snapshot answered to `STATUS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub state: StateId,
    /// Trials finished in the current (or last) session.
    pub trials_done: usize,
    pub trials_total: usize,
    pub trial_type: Option<TrialType>,
    pub odor: bool,
    pub reward: bool,
    pub licks: u32,
    pub timing: TimingConfig,
}

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Boot complete, accepting commands.
    Ready,

    /// Timestamped behavioral event.
    Data(EventRecord),

    /// The FSM moved between phases.
    StateChanged { from: StateId, to: StateId },

    SessionStarted,
    SessionComplete,
    SessionAborted,

    /// `RESET` acknowledged.
    EmergencyStop,

    /// A safety correction was applied.
    Safety(SafetyFault),

    /// Echo of the active timing after `SET_TIMING`.
    Timing(TimingConfig),

    SequenceLoaded {
        len: usize,
        excitatory: usize,
        neutral: usize,
    },

    Status(StatusReport),

    ManualOdor(bool),
    ManualReward(bool),

    TestStarted(HardwareTest),
    TestComplete(HardwareTest),

    LickCountReset,

    /// Raw lick sensor level for `TEST_LICK`.
    LickSensor { touched: bool, count: u32 },

    Debug(DebugSnapshot),

    /// A command was refused.
    Rejected(CommandError),

    /// Fatal peripheral failure at boot.
    InitFailed(InitError),
}

const fn on_off(on: bool) -> &'static str {
    if on { "ON" } else { "OFF" }
}

impl fmt::Display for AppEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => f.write_str("READY"),
            Self::Data(record) => write!(f, "{record}"),
            Self::StateChanged { from, to } => write!(f, "STATE:{from}->{to}"),
            Self::SessionStarted => f.write_str("SESSION_STARTED"),
            Self::SessionComplete => f.write_str("SESSION_COMPLETE"),
            Self::SessionAborted => f.write_str("SESSION_ABORTED"),
            Self::EmergencyStop => f.write_str("EMERGENCY_STOP:RESET"),
            Self::Safety(fault) => write!(f, "SAFETY:{}", fault.token()),
            Self::Timing(t) => write!(
                f,
                "TIMING:ITI={},INIT={},ODOR={},TRACE={},REWARD={},CONSUME={}",
                t.iti_ms, t.trial_init_ms, t.odor_ms, t.trace_ms, t.reward_ms, t.consummatory_ms
            ),
            Self::SequenceLoaded {
                len,
                excitatory,
                neutral,
            } => write!(f, "SEQUENCE_LOADED:{len},{excitatory},{neutral}"),
            Self::Status(s) => write!(
                f,
                "STATUS:STATE={},TRIAL={}/{},TYPE={},ODOR={},REWARD={},LICKS={},\
                 ITI={},INIT={},ODOR_MS={},TRACE={},REWARD_MS={},CONSUME={}",
                s.state,
                s.trials_done,
                s.trials_total,
                s.trial_type.map_or("NONE", TrialType::label),
                on_off(s.odor),
                on_off(s.reward),
                s.licks,
                s.timing.iti_ms,
                s.timing.trial_init_ms,
                s.timing.odor_ms,
                s.timing.trace_ms,
                s.timing.reward_ms,
                s.timing.consummatory_ms,
            ),
            Self::ManualOdor(on) => write!(f, "MANUAL_ODOR:{}", on_off(*on)),
            Self::ManualReward(on) => write!(f, "MANUAL_REWARD:{}", on_off(*on)),
            Self::TestStarted(test) => write!(f, "{}:START", test.tag()),
            Self::TestComplete(test) => write!(f, "{}:COMPLETE", test.tag()),
            Self::LickCountReset => f.write_str("LICK_COUNT_RESET"),
            Self::LickSensor { touched, count } => {
                write!(f, "LICK_SENSOR:{},COUNT={count}", u8::from(*touched))
            }
            Self::Debug(snapshot) => match serde_json::to_string(snapshot) {
                Ok(json) => write!(f, "DEBUG:{json}"),
                Err(_) => f.write_str("DEBUG:{}"),
            },
            Self::Rejected(e) => write!(f, "ERROR:{}", e.token()),
            Self::InitFailed(e) => write!(f, "ERROR:INIT:{}", e.token()),
        }
    }
}
