//! Concrete state handler functions and table builder.
//!
//! Each state is defined by plain `fn` pointers: no closures, no dynamic
//! dispatch, no heap.
//!
//! ```text
//!  IDLE ──[START]──▶ ITI ──▶ TRIAL_INIT ──▶ ODOR ──▶ TRACE ──▶ REWARD
//!    ▲                ▲                                          │
//!    │                │                                          ▼
//!    │                └───[trials left]──── TRIAL_OFF ◀── CONSUMMATORY
//!    │                                         │
//!    └──────────────── COMPLETE ◀──[exhausted]─┘
//!
//!  IDLE ◀──▶ TEST_ODOR | TEST_REWARD | MANUAL_ODOR | MANUAL_REWARD
//!  any  ──[ABORT / RESET / stuck timeout]──▶ IDLE
//! ```
//!
//! Phase durations come from `ctx.timing` and are identical for both trial
//! types; the trial type only decides whether REWARD asks for the pulse
//! pattern.

use super::context::{FsmContext, OutputCommands, SessionMarker};
use super::{StateDescriptor, StateId};
use crate::config::{REWARD_PATTERN, TEST_ODOR_DURATION_MS};
use log::{debug, info};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0: Idle
        StateDescriptor {
            id: StateId::Idle,
            name: "IDLE",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_update: idle_update,
        },
        // Index 1: InterTrialInterval
        StateDescriptor {
            id: StateId::InterTrialInterval,
            name: "ITI",
            on_enter: Some(iti_enter),
            on_exit: None,
            on_update: iti_update,
        },
        // Index 2: TrialInit
        StateDescriptor {
            id: StateId::TrialInit,
            name: "TRIAL_INIT",
            on_enter: None,
            on_exit: None,
            on_update: trial_init_update,
        },
        // Index 3: OdorPeriod
        StateDescriptor {
            id: StateId::OdorPeriod,
            name: "ODOR",
            on_enter: Some(odor_enter),
            on_exit: Some(odor_exit),
            on_update: odor_update,
        },
        // Index 4: TraceInterval
        StateDescriptor {
            id: StateId::TraceInterval,
            name: "TRACE",
            on_enter: None,
            on_exit: None,
            on_update: trace_update,
        },
        // Index 5: RewardSequence
        StateDescriptor {
            id: StateId::RewardSequence,
            name: "REWARD",
            on_enter: Some(reward_enter),
            on_exit: None,
            on_update: reward_update,
        },
        // Index 6: Consummatory
        StateDescriptor {
            id: StateId::Consummatory,
            name: "CONSUMMATORY",
            on_enter: None,
            on_exit: None,
            on_update: consummatory_update,
        },
        // Index 7: TrialOff
        StateDescriptor {
            id: StateId::TrialOff,
            name: "TRIAL_OFF",
            on_enter: Some(trial_off_enter),
            on_exit: None,
            on_update: trial_off_update,
        },
        // Index 8: Complete
        StateDescriptor {
            id: StateId::Complete,
            name: "COMPLETE",
            on_enter: Some(complete_enter),
            on_exit: None,
            on_update: complete_update,
        },
        // Index 9: TestOdor
        StateDescriptor {
            id: StateId::TestOdor,
            name: "TEST_ODOR",
            on_enter: Some(test_odor_enter),
            on_exit: Some(side_state_exit),
            on_update: test_odor_update,
        },
        // Index 10: TestReward
        StateDescriptor {
            id: StateId::TestReward,
            name: "TEST_REWARD",
            on_enter: Some(test_reward_enter),
            on_exit: Some(side_state_exit),
            on_update: test_reward_update,
        },
        // Index 11: ManualOdorControl
        StateDescriptor {
            id: StateId::ManualOdorControl,
            name: "MANUAL_ODOR",
            on_enter: Some(manual_odor_enter),
            on_exit: Some(side_state_exit),
            on_update: hold,
        },
        // Index 12: ManualRewardControl
        StateDescriptor {
            id: StateId::ManualRewardControl,
            name: "MANUAL_REWARD",
            on_enter: Some(manual_reward_enter),
            on_exit: Some(side_state_exit),
            on_update: hold,
        },
    ]
}

/// Stay put until a command moves us.
fn hold(_ctx: &mut FsmContext) -> Option<StateId> {
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(ctx: &mut FsmContext) {
    ctx.commands = OutputCommands::all_off();
    info!("IDLE: outputs off, waiting for host");
}

fn idle_update(_ctx: &mut FsmContext) -> Option<StateId> {
    // Only START, TEST_* and MANUAL_* leave Idle, all via force_transition.
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  Trial phases
// ═══════════════════════════════════════════════════════════════════════════

fn iti_enter(ctx: &mut FsmContext) {
    ctx.mark(SessionMarker::TrialStart);
    match ctx.current_trial() {
        Some(kind) => info!(
            "ITI: trial {}/{} ({}), {} ms",
            ctx.trial_index + 1,
            ctx.sequence.len(),
            kind.label(),
            ctx.timing.iti_ms
        ),
        None => debug!("ITI: no trial at index {}", ctx.trial_index),
    }
}

fn iti_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.current_trial().is_none() {
        return Some(StateId::Complete);
    }
    ctx.phase_done(ctx.timing.iti_ms)
        .then_some(StateId::TrialInit)
}

fn trial_init_update(ctx: &mut FsmContext) -> Option<StateId> {
    ctx.phase_done(ctx.timing.trial_init_ms)
        .then_some(StateId::OdorPeriod)
}

fn odor_enter(ctx: &mut FsmContext) {
    ctx.commands.odor = true;
}

fn odor_exit(ctx: &mut FsmContext) {
    ctx.commands.odor = false;
}

fn odor_update(ctx: &mut FsmContext) -> Option<StateId> {
    ctx.phase_done(ctx.timing.odor_ms)
        .then_some(StateId::TraceInterval)
}

fn trace_update(ctx: &mut FsmContext) -> Option<StateId> {
    ctx.phase_done(ctx.timing.trace_ms)
        .then_some(StateId::RewardSequence)
}

fn reward_enter(ctx: &mut FsmContext) {
    let rewarded = ctx.current_trial().is_some_and(|t| t.is_rewarded());
    ctx.commands.deliver_reward = rewarded;
    debug!("REWARD: pattern {}", if rewarded { "requested" } else { "withheld" });
}

fn reward_update(ctx: &mut FsmContext) -> Option<StateId> {
    ctx.phase_done(ctx.timing.reward_ms)
        .then_some(StateId::Consummatory)
}

fn consummatory_update(ctx: &mut FsmContext) -> Option<StateId> {
    ctx.phase_done(ctx.timing.consummatory_ms)
        .then_some(StateId::TrialOff)
}

fn trial_off_enter(ctx: &mut FsmContext) {
    ctx.mark(SessionMarker::TrialEnd);
    ctx.trial_index += 1;
}

fn trial_off_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.trial_index < ctx.sequence.len() {
        Some(StateId::InterTrialInterval)
    } else {
        Some(StateId::Complete)
    }
}

fn complete_enter(ctx: &mut FsmContext) {
    ctx.commands = OutputCommands::all_off();
    ctx.mark(SessionMarker::SessionComplete);
    info!("COMPLETE: {} trials run", ctx.trial_index);
}

fn complete_update(_ctx: &mut FsmContext) -> Option<StateId> {
    Some(StateId::Idle)
}

// ═══════════════════════════════════════════════════════════════════════════
//  Hardware tests and manual override
// ═══════════════════════════════════════════════════════════════════════════

fn test_odor_enter(ctx: &mut FsmContext) {
    ctx.commands.odor = true;
}

fn test_odor_update(ctx: &mut FsmContext) -> Option<StateId> {
    ctx.phase_done(TEST_ODOR_DURATION_MS).then_some(StateId::Idle)
}

fn test_reward_enter(ctx: &mut FsmContext) {
    ctx.commands.deliver_reward = true;
}

fn test_reward_update(ctx: &mut FsmContext) -> Option<StateId> {
    ctx.phase_done(REWARD_PATTERN.total_ms())
        .then_some(StateId::Idle)
}

fn manual_odor_enter(ctx: &mut FsmContext) {
    ctx.commands.odor = true;
}

fn manual_reward_enter(ctx: &mut FsmContext) {
    ctx.commands.reward = true;
}

fn side_state_exit(ctx: &mut FsmContext) {
    ctx.commands = OutputCommands::all_off();
}
