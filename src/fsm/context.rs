//! Shared mutable context threaded through every FSM handler.
//!
//! `FsmContext` is the blackboard the state handlers read from and write
//! to: the clock reading for this iteration, the active timing, the loaded
//! trial sequence, the requested output levels and a small queue of session
//! markers for the service to turn into events.  Handlers never touch
//! hardware or the event sink directly.

use heapless::Deque;

use crate::config::TimingConfig;
use crate::trial::{TrialSequence, TrialType};

// ---------------------------------------------------------------------------
// Output commands (written by state handlers; applied by the service)
// ---------------------------------------------------------------------------

/// Output levels the current phase wants.  The service diffs these against
/// the output controller and drives only what changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputCommands {
    pub odor: bool,
    pub reward: bool,
    /// One-shot request to run the blocking two-pulse reward pattern.
    /// Cleared by the service once delivered.
    pub deliver_reward: bool,
}

impl OutputCommands {
    /// Everything de-energized, no pending reward.
    pub fn all_off() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Session markers (bookkeeping the handlers cannot emit themselves)
// ---------------------------------------------------------------------------

/// Trial-boundary bookkeeping raised by a handler during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMarker {
    TrialStart,
    TrialEnd,
    SessionComplete,
}

/// A tick raises at most two markers (`TrialEnd` then the `SessionComplete`
/// of the following tick); four leaves room for a forced transition too.
pub const MARKER_QUEUE_LEN: usize = 4;

// ---------------------------------------------------------------------------
// FsmContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct FsmContext {
    // -- Timing --
    /// Clock reading for the current iteration (ms since boot).
    pub now_ms: u64,
    /// Clock reading when the current phase was entered.
    pub phase_started_ms: u64,

    // -- Experiment --
    pub timing: TimingConfig,
    pub sequence: TrialSequence,
    /// Zero-based index of the trial in progress.
    pub trial_index: usize,

    // -- Outputs --
    pub commands: OutputCommands,

    // -- Bookkeeping --
    pub markers: Deque<SessionMarker, MARKER_QUEUE_LEN>,
}

impl FsmContext {
    pub fn new(timing: TimingConfig) -> Self {
        Self {
            now_ms: 0,
            phase_started_ms: 0,
            timing,
            sequence: TrialSequence::new(),
            trial_index: 0,
            commands: OutputCommands::all_off(),
            markers: Deque::new(),
        }
    }

    /// Milliseconds spent in the current phase.
    pub fn elapsed_ms(&self) -> u64 {
        self.now_ms.saturating_sub(self.phase_started_ms)
    }

    /// True once the current phase has lasted `duration_ms`.
    pub fn phase_done(&self, duration_ms: u32) -> bool {
        self.elapsed_ms() >= duration_ms as u64
    }

    /// Type of the trial in progress, or `None` once the sequence is exhausted.
    pub fn current_trial(&self) -> Option<TrialType> {
        self.sequence.get(self.trial_index)
    }

    /// Queue a marker for the service.  The queue is sized so this never
    /// fills between two drains; if it somehow does the oldest is dropped.
    pub fn mark(&mut self, marker: SessionMarker) {
        if self.markers.is_full() {
            let dropped = self.markers.pop_front();
            log::warn!("marker queue full, dropping {dropped:?}");
        }
        let _ = self.markers.push_back(marker);
    }

    /// Take the next pending marker.
    pub fn take_marker(&mut self) -> Option<SessionMarker> {
        self.markers.pop_front()
    }
}
