//! Safety supervisor.
//!
//! Two checks, both pure:
//!
//! 1. **Output authorization** runs after every FSM advance.  Each phase
//!    has a row in [`PHASE_POLICY`] naming which valves it may hold open.
//!    Any valve open outside its row is reported so the service can force
//!    it closed through
//!    [`OutputController::fault_shutdown`](crate::drivers::solenoid::OutputController::fault_shutdown).
//! 2. **Stuck state** runs before the FSM advance.  A supervised phase that
//!    has lasted longer than [`STUCK_STATE_CEILING_MS`] triggers an
//!    emergency stop.
//!
//! The supervisor never drives hardware itself.  It only counts what it
//! caught so `DEBUG` can report it.

use log::error;
use serde::Serialize;

use crate::config::STUCK_STATE_CEILING_MS;
use crate::drivers::solenoid::OutputState;
use crate::error::SafetyFault;
use crate::fsm::StateId;

/// What one phase is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhasePolicy {
    pub odor: bool,
    pub reward: bool,
    /// Subject to the stuck-state ceiling.
    pub supervised: bool,
}

const fn policy(odor: bool, reward: bool, supervised: bool) -> PhasePolicy {
    PhasePolicy {
        odor,
        reward,
        supervised,
    }
}

/// Authorization table, indexed by `StateId as usize`.
pub const PHASE_POLICY: [PhasePolicy; StateId::COUNT] = [
    policy(false, false, false), // Idle
    policy(false, false, true),  // InterTrialInterval
    policy(false, false, true),  // TrialInit
    policy(true, false, true),   // OdorPeriod
    policy(false, false, true),  // TraceInterval
    policy(false, true, true),   // RewardSequence
    policy(false, false, true),  // Consummatory
    policy(false, false, true),  // TrialOff
    policy(false, false, true),  // Complete
    policy(true, false, true),   // TestOdor
    policy(false, true, true),   // TestReward
    policy(true, false, false),  // ManualOdorControl
    policy(false, true, false),  // ManualRewardControl
];

/// Look up the policy row for a phase.
pub const fn policy_for(state: StateId) -> PhasePolicy {
    PHASE_POLICY[state as usize]
}

/// How often each correction has fired since boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SafetyCounters {
    pub odor_shutdowns: u32,
    pub reward_shutdowns: u32,
    pub timeouts: u32,
}

#[derive(Debug, Default)]
pub struct SafetySupervisor {
    counters: SafetyCounters,
}

impl SafetySupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a fault bitmask of valves open outside `state`'s policy.
    pub fn check_outputs(&mut self, state: StateId, outputs: OutputState) -> u8 {
        let allowed = policy_for(state);
        let mut faults = 0u8;
        if outputs.odor && !allowed.odor {
            error!("SAFETY: odor valve open in {state}");
            self.counters.odor_shutdowns = self.counters.odor_shutdowns.saturating_add(1);
            faults |= SafetyFault::UnauthorizedOdor.mask();
        }
        if outputs.reward && !allowed.reward {
            error!("SAFETY: reward valve open in {state}");
            self.counters.reward_shutdowns = self.counters.reward_shutdowns.saturating_add(1);
            faults |= SafetyFault::UnauthorizedReward.mask();
        }
        faults
    }

    /// True if `state` is supervised and has outlived the ceiling.
    pub fn check_stuck(&mut self, state: StateId, ms_in_state: u64) -> bool {
        if !policy_for(state).supervised || ms_in_state <= STUCK_STATE_CEILING_MS {
            return false;
        }
        error!("SAFETY: {state} stuck for {ms_in_state} ms");
        self.counters.timeouts = self.counters.timeouts.saturating_add(1);
        true
    }

    pub fn counters(&self) -> SafetyCounters {
        self.counters
    }
}
