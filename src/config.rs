//! Trial timing configuration and fixed rig constants.
//!
//! [`TimingConfig`] holds the six host-tunable phase durations.  It is only
//! replaced through `SET_TIMING` while the rig is idle.  Everything else in
//! this module is a compile-time constant: the reward pulse pattern, the lick
//! refractory window and the safety ceilings are properties of the rig, not
//! of an experiment.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Fixed constants
// ---------------------------------------------------------------------------

/// Serial link baud rate.
pub const SERIAL_BAUD: u32 = 115_200;

/// Minimum time between two accepted licks (ms).
pub const LICK_MIN_INTERVAL_MS: u64 = 50;

/// Any supervised phase running longer than this is treated as wedged.
pub const STUCK_STATE_CEILING_MS: u64 = 120_000;

/// Upper bound for a single host-configured phase duration.
/// Kept well below [`STUCK_STATE_CEILING_MS`] so a valid configuration can
/// never trip the stuck-state timeout.
pub const MAX_PHASE_DURATION_MS: u32 = 60_000;

/// How long `TEST_ODOR` holds the odor valve open.
pub const TEST_ODOR_DURATION_MS: u32 = 2_000;

/// Maximum number of trials in one sequence.
pub const MAX_TRIALS: usize = 200;

/// Receive buffer for one command line.  Sized for a full `SEQUENCE:`
/// command at [`MAX_TRIALS`] entries.
pub const MAX_LINE_LEN: usize = 512;

/// Two-pulse reward valve pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RewardPattern {
    pub pulse1_ms: u32,
    pub gap_ms: u32,
    pub pulse2_ms: u32,
}

impl RewardPattern {
    /// Total time the pattern blocks the control loop.
    pub const fn total_ms(&self) -> u32 {
        self.pulse1_ms + self.gap_ms + self.pulse2_ms
    }
}

/// 40 ms on, 140 ms off, 40 ms on.
pub const REWARD_PATTERN: RewardPattern = RewardPattern {
    pulse1_ms: 40,
    gap_ms: 140,
    pulse2_ms: 40,
};

// ---------------------------------------------------------------------------
// Host-tunable timing
// ---------------------------------------------------------------------------

/// Phase durations for one trial, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Gap between the end of one trial and the cue of the next.
    pub iti_ms: u32,
    /// Settle time between trial start bookkeeping and odor onset.
    pub trial_init_ms: u32,
    /// How long the odor valve stays open.
    pub odor_ms: u32,
    /// Delay between odor offset and the reward phase.
    pub trace_ms: u32,
    /// Length of the reward phase (the pulse pattern runs at its start).
    pub reward_ms: u32,
    /// Post-reward window for consummatory licking.
    pub consummatory_ms: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            iti_ms: 5_000,
            trial_init_ms: 1_000,
            odor_ms: 2_000,
            trace_ms: 1_000,
            reward_ms: 500,
            consummatory_ms: 3_000,
        }
    }
}

impl TimingConfig {
    /// Every duration set to `ms`.  Handy for fast bench sessions.
    pub const fn uniform(ms: u32) -> Self {
        Self {
            iti_ms: ms,
            trial_init_ms: ms,
            odor_ms: ms,
            trace_ms: ms,
            reward_ms: ms,
            consummatory_ms: ms,
        }
    }
}

/// Partial timing update parsed from `SET_TIMING`.
///
/// Fields are positional on the wire: iti, odor, reward, init, trace,
/// consummatory.  The first three match the order used by the session GUI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimingUpdate {
    pub iti_ms: Option<u32>,
    pub odor_ms: Option<u32>,
    pub reward_ms: Option<u32>,
    pub trial_init_ms: Option<u32>,
    pub trace_ms: Option<u32>,
    pub consummatory_ms: Option<u32>,
}

impl TimingUpdate {
    /// True if no field was supplied.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply to `config`, clamping each value to [`MAX_PHASE_DURATION_MS`].
    /// Returns `true` if any value had to be clamped.
    pub fn apply_to(&self, config: &mut TimingConfig) -> bool {
        let mut clamped = false;
        let mut set = |slot: &mut u32, value: Option<u32>| {
            if let Some(ms) = value {
                if ms > MAX_PHASE_DURATION_MS {
                    clamped = true;
                }
                *slot = ms.min(MAX_PHASE_DURATION_MS);
            }
        };
        set(&mut config.iti_ms, self.iti_ms);
        set(&mut config.odor_ms, self.odor_ms);
        set(&mut config.reward_ms, self.reward_ms);
        set(&mut config.trial_init_ms, self.trial_init_ms);
        set(&mut config.trace_ms, self.trace_ms);
        set(&mut config.consummatory_ms, self.consummatory_ms);
        clamped
    }
}
