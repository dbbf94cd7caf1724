//! Runtime diagnostics.
//!
//! [`DebugSnapshot`] is collected on demand for `DEBUG` and serialized to
//! a single JSON line.  [`CommandCounters`] tracks host traffic since boot.

use serde::Serialize;

use crate::config::TimingConfig;
use crate::drivers::solenoid::OutputState;
use crate::error::CommandError;
use crate::safety::SafetyCounters;
use crate::trial::TrialType;

/// Host command traffic since boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CommandCounters {
    pub accepted: u32,
    pub busy: u32,
    pub malformed: u32,
    pub overflows: u32,
}

impl CommandCounters {
    pub fn record_ok(&mut self) {
        self.accepted = self.accepted.saturating_add(1);
    }

    pub fn record_err(&mut self, err: CommandError) {
        let slot = match err {
            CommandError::Busy | CommandError::NoSequence => &mut self.busy,
            CommandError::LineTooLong => &mut self.overflows,
            CommandError::BadSequence | CommandError::UnknownCommand => &mut self.malformed,
        };
        *slot = slot.saturating_add(1);
    }
}

/// Everything `DEBUG` reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugSnapshot {
    pub state: &'static str,
    pub uptime_ms: u64,
    pub ms_in_state: u64,
    pub session_zero_ms: u64,
    pub trial_index: usize,
    pub trials_total: usize,
    pub trial_type: Option<TrialType>,
    pub outputs: OutputState,
    pub licks: u32,
    pub licks_rejected: u32,
    pub last_lick_ms: Option<u64>,
    pub rewards_delivered: u32,
    pub transitions: u64,
    pub timing: TimingConfig,
    pub safety: SafetyCounters,
    pub commands: CommandCounters,
}
