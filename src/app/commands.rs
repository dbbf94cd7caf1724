//! Inbound commands to the application service.
//!
//! Produced by [`parse_command`](crate::protocol::parser::parse_command)
//! from host serial lines and interpreted by
//! [`AppService`](super::service::AppService).

use crate::config::TimingUpdate;
use crate::error::CommandError;
use crate::trial::TrialSequence;

/// Commands the host can send into the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    /// Emergency stop back to Idle.
    Reset,

    /// Replace some or all phase durations (Idle only).
    SetTiming(TimingUpdate),

    /// Replace the trial sequence (Idle only).  A parse failure is carried
    /// through so the service can clear the old sequence.
    LoadSequence(Result<TrialSequence, CommandError>),

    /// Begin a session over the loaded sequence.
    Start,

    /// Stop whatever is running.
    Abort,

    /// One-line status report.
    Status,

    /// Hold the odor valve open for the fixed test duration.
    TestOdor,

    /// Run one reward pulse pattern.
    TestReward,

    /// Report the raw lick sensor level and the lick count.
    TestLick,

    /// Manual odor valve override.
    ManualOdor(bool),

    /// Manual reward valve override.
    ManualReward(bool),

    /// Zero the lick counter.
    ResetLickCount,

    /// JSON dump of internal state.
    Debug,
}

impl AppCommand {
    /// Keyword for log messages.
    pub const fn keyword(&self) -> &'static str {
        match self {
            Self::Reset => "RESET",
            Self::SetTiming(_) => "SET_TIMING",
            Self::LoadSequence(_) => "SEQUENCE",
            Self::Start => "START",
            Self::Abort => "ABORT",
            Self::Status => "STATUS",
            Self::TestOdor => "TEST_ODOR",
            Self::TestReward => "TEST_REWARD",
            Self::TestLick => "TEST_LICK",
            Self::ManualOdor(true) => "MANUAL_ODOR_ON",
            Self::ManualOdor(false) => "MANUAL_ODOR_OFF",
            Self::ManualReward(true) => "MANUAL_REWARD_ON",
            Self::ManualReward(false) => "MANUAL_REWARD_OFF",
            Self::ResetLickCount => "RESET_LICK_COUNT",
            Self::Debug => "DEBUG",
        }
    }
}
