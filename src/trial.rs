//! Trial types and the per-session trial sequence.

use heapless::Vec;
use serde::Serialize;

use crate::config::MAX_TRIALS;
use crate::error::CommandError;

/// Kind of trial.  The wire code is what the host sends in `SEQUENCE:`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum TrialType {
    /// CS+: odor followed by reward.
    Excitatory = 1,
    /// CS-: odor, never rewarded.
    Neutral = 2,
}

impl TrialType {
    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::Excitatory),
            2 => Some(Self::Neutral),
            _ => None,
        }
    }

    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Excitatory => "CS+",
            Self::Neutral => "CS-",
        }
    }

    pub const fn is_rewarded(self) -> bool {
        matches!(self, Self::Excitatory)
    }
}

/// Ordered, fixed-capacity list of trials for one session.
///
/// Only ever replaced as a whole: build a new one with [`TrialSequence::parse_csv`]
/// and swap it in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrialSequence {
    trials: Vec<TrialType, MAX_TRIALS>,
}

impl TrialSequence {
    pub const fn new() -> Self {
        Self { trials: Vec::new() }
    }

    /// Parse a comma-separated list of trial codes (`1,2,1`).
    ///
    /// Unparsable tokens read as `0`, which is not a trial type, so any bad
    /// token rejects the whole list.  An empty list or one longer than
    /// [`MAX_TRIALS`] is rejected too.
    pub fn parse_csv(text: &str) -> Result<Self, CommandError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CommandError::BadSequence);
        }
        let mut trials = Vec::new();
        for token in text.split(',') {
            let code = token.trim().parse::<u32>().unwrap_or(0);
            let kind = TrialType::from_code(code).ok_or(CommandError::BadSequence)?;
            trials.push(kind).map_err(|_| CommandError::BadSequence)?;
        }
        Ok(Self { trials })
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<TrialType> {
        self.trials.get(index).copied()
    }

    /// Number of trials of the given type.
    pub fn count(&self, kind: TrialType) -> usize {
        self.trials.iter().filter(|&&t| t == kind).count()
    }
}

impl TryFrom<&[TrialType]> for TrialSequence {
    type Error = CommandError;

    fn try_from(trials: &[TrialType]) -> Result<Self, Self::Error> {
        if trials.is_empty() {
            return Err(CommandError::BadSequence);
        }
        let trials = Vec::from_slice(trials).map_err(|_| CommandError::BadSequence)?;
        Ok(Self { trials })
    }
}
