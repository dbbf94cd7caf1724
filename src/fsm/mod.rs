//! Function-pointer finite state machine engine.
//!
//! Classic embedded FSM pattern ported to Rust:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  StateTable                                                  │
//! │  ┌──────────────┬───────────┬──────────┬───────────────────┐ │
//! │  │ StateId      │ on_enter  │ on_exit  │ on_update         │ │
//! │  ├──────────────┼───────────┼──────────┼───────────────────┤ │
//! │  │ Idle         │ fn(ctx)   │ -        │ fn(ctx)->Option<> │ │
//! │  │ ITI          │ fn(ctx)   │ -        │ fn(ctx)->Option<> │ │
//! │  │ ...          │           │          │                   │ │
//! │  │ ManualReward │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │ │
//! │  └──────────────┴───────────┴──────────┴───────────────────┘ │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state.
//! If it returns `Some(next_id)`, the engine runs `on_exit` for the
//! current state, stamps the phase entry time, then runs `on_enter` for
//! the next.  At most one transition happens per tick.  All functions
//! receive `&mut FsmContext`, which carries the clock reading, timing,
//! trial sequence and requested outputs.

pub mod context;
pub mod states;

use context::FsmContext;
use log::info;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Every phase the rig can be in.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Idle = 0,
    InterTrialInterval = 1,
    TrialInit = 2,
    OdorPeriod = 3,
    TraceInterval = 4,
    RewardSequence = 5,
    Consummatory = 6,
    TrialOff = 7,
    Complete = 8,
    TestOdor = 9,
    TestReward = 10,
    ManualOdorControl = 11,
    ManualRewardControl = 12,
}

impl StateId {
    /// Total number of states, used to size the table arrays.
    pub const COUNT: usize = 13;

    /// Convert an index back to `StateId`.  Asserts in debug builds;
    /// returns `Idle` in release.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Idle,
            1 => Self::InterTrialInterval,
            2 => Self::TrialInit,
            3 => Self::OdorPeriod,
            4 => Self::TraceInterval,
            5 => Self::RewardSequence,
            6 => Self::Consummatory,
            7 => Self::TrialOff,
            8 => Self::Complete,
            9 => Self::TestOdor,
            10 => Self::TestReward,
            11 => Self::ManualOdorControl,
            12 => Self::ManualRewardControl,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Idle
            }
        }
    }

    /// Name used in `STATE:` and `STATUS:` lines.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::InterTrialInterval => "ITI",
            Self::TrialInit => "TRIAL_INIT",
            Self::OdorPeriod => "ODOR",
            Self::TraceInterval => "TRACE",
            Self::RewardSequence => "REWARD",
            Self::Consummatory => "CONSUMMATORY",
            Self::TrialOff => "TRIAL_OFF",
            Self::Complete => "COMPLETE",
            Self::TestOdor => "TEST_ODOR",
            Self::TestReward => "TEST_REWARD",
            Self::ManualOdorControl => "MANUAL_ODOR",
            Self::ManualRewardControl => "MANUAL_REWARD",
        }
    }

    /// Phases that belong to a running session.
    pub const fn in_session(self) -> bool {
        matches!(
            self,
            Self::InterTrialInterval
                | Self::TrialInit
                | Self::OdorPeriod
                | Self::TraceInterval
                | Self::RewardSequence
                | Self::Consummatory
                | Self::TrialOff
                | Self::Complete
        )
    }

    /// Manual override and hardware test phases.
    pub const fn is_side_state(self) -> bool {
        matches!(
            self,
            Self::TestOdor | Self::TestReward | Self::ManualOdorControl | Self::ManualRewardControl
        )
    }
}

impl core::fmt::Display for StateId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
/// These run exactly once on each state transition.
pub type StateActionFn = fn(&mut FsmContext);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn = fn(&mut FsmContext) -> Option<StateId>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single FSM state.
/// Stored in a fixed-size array: no heap, no `dyn`.
pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
pub struct Fsm {
    /// Fixed-size table indexed by `StateId as usize`.
    table: [StateDescriptor; StateId::COUNT],
    /// Index of the currently active state.
    current: usize,
    /// Number of transitions taken since boot.
    transitions: u64,
}

impl Fsm {
    /// Construct a new FSM with the given state table, starting in `initial`.
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
            transitions: 0,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    /// Call once after construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut FsmContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        ctx.phase_started_ms = ctx.now_ms;
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance the FSM by one tick.  `ctx.now_ms` must already hold this
    /// iteration's clock reading.
    ///
    /// Returns the state that was left, if a transition happened.
    pub fn tick(&mut self, ctx: &mut FsmContext) -> Option<StateId> {
        let next = (self.table[self.current].on_update)(ctx)?;
        if next as usize == self.current {
            return None;
        }
        let from = self.current_state();
        self.transition(next, ctx);
        Some(from)
    }

    /// Force an immediate transition (commands, aborts and the stuck-state
    /// timeout).  Returns `true` if the state actually changed.
    pub fn force_transition(&mut self, next: StateId, ctx: &mut FsmContext) -> bool {
        if next as usize == self.current {
            return false;
        }
        self.transition(next, ctx);
        true
    }

    /// The current state's identity.
    pub fn current_state(&self) -> StateId {
        self.table[self.current].id
    }

    /// Transitions taken since boot.
    pub fn transition_count(&self) -> u64 {
        self.transitions
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: StateId, ctx: &mut FsmContext) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.transitions += 1;
        ctx.phase_started_ms = ctx.now_ms;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
