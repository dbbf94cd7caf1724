//! Application service: the hexagonal core.
//!
//! [`AppService`] owns the FSM, safety supervisor, valve controller, lick
//! detector and event logger.  All I/O flows through port traits injected
//! at call sites, so the whole service runs against mock adapters on the
//! host.
//!
//! ```text
//!  LickSensorPort ──▶ ┌─────────────────────────────┐ ──▶ EventSink
//!           Clock ──▶ │         AppService          │
//!      OutputPort ◀── │ FSM · Safety · Valves · Lick│
//!                     └─────────────────────────────┘
//! ```
//!
//! One control-loop iteration is: drain command lines through
//! [`AppService::handle_line`], then call [`AppService::tick`] once.

use log::{info, warn};

use crate::config::{LICK_MIN_INTERVAL_MS, REWARD_PATTERN, TEST_ODOR_DURATION_MS, TimingConfig};
use crate::diagnostics::{CommandCounters, DebugSnapshot};
use crate::drivers::solenoid::{OutputController, OutputState, Valve};
use crate::drivers::status_led::StatusIndicator;
use crate::error::{CommandError, SafetyFault};
use crate::events::{EventCode, EventLogger};
use crate::fsm::context::{FsmContext, OutputCommands, SessionMarker};
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::protocol::{LineRead, parse_command};
use crate::safety::{SafetyCounters, SafetySupervisor};
use crate::sensors::lick::LickDetector;
use crate::trial::{TrialSequence, TrialType};

use super::commands::AppCommand;
use super::events::{AppEvent, HardwareTest, StatusReport};
use super::ports::{EventSink, RigPorts};

/// Why everything is being shut off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Reset,
    Abort,
    Timeout,
}

impl StopReason {
    fn ack(self) -> AppEvent {
        match self {
            Self::Reset => AppEvent::EmergencyStop,
            Self::Abort => AppEvent::SessionAborted,
            Self::Timeout => AppEvent::Safety(SafetyFault::StuckState),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    fsm: Fsm,
    ctx: FsmContext,
    safety: SafetySupervisor,
    outputs: OutputController,
    lick: LickDetector,
    led: StatusIndicator,
    logger: EventLogger,
    counters: CommandCounters,
}

impl AppService {
    /// Construct the service.  Does **not** start the FSM; call [`start`](Self::start).
    pub fn new(timing: TimingConfig) -> Self {
        Self {
            fsm: Fsm::new(build_state_table(), StateId::Idle),
            ctx: FsmContext::new(timing),
            safety: SafetySupervisor::new(),
            outputs: OutputController::new(),
            lick: LickDetector::new(LICK_MIN_INTERVAL_MS),
            led: StatusIndicator::new(),
            logger: EventLogger::new(0),
            counters: CommandCounters::default(),
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Drive both valves low, enter Idle and announce `READY`.
    /// Timestamps are relative to this instant until the first `START`.
    pub fn start(&mut self, hw: &mut impl RigPorts, sink: &mut impl EventSink) {
        let now = hw.now_ms();
        if let Err(e) = self.outputs.all_off(hw, &self.logger, sink) {
            warn!("boot valve reset: {e}");
        }
        self.logger.rebase(now);
        self.ctx.now_ms = now;
        self.fsm.start(&mut self.ctx);
        self.refresh_led(hw);
        sink.emit(&AppEvent::Ready);
        info!("AppService started at {now} ms");
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control cycle: stuck check → FSM → outputs → safety →
    /// lick poll → LED.
    pub fn tick(&mut self, hw: &mut impl RigPorts, sink: &mut impl EventSink) {
        self.ctx.now_ms = hw.now_ms();

        // 1. Stuck-state ceiling, else normal advance
        let state = self.fsm.current_state();
        if self.safety.check_stuck(state, self.ctx.elapsed_ms()) {
            self.emergency_stop(StopReason::Timeout, hw, sink);
        } else if let Some(from) = self.fsm.tick(&mut self.ctx) {
            self.after_transition(from, hw, sink);
        }

        // 2. Output authorization, after every advance
        self.enforce_output_policy(hw, sink);

        // 3. Licks are recorded in every phase
        self.poll_lick(hw, sink);

        // 4. Status LED
        self.refresh_led(hw);
    }

    // ── Command handling ──────────────────────────────────────

    /// Feed one line-reader result.
    pub fn handle_line_read(
        &mut self,
        read: LineRead,
        hw: &mut impl RigPorts,
        sink: &mut impl EventSink,
    ) {
        match read {
            LineRead::None => {}
            LineRead::Complete(line) => self.handle_line(&line, hw, sink),
            LineRead::Overflow => self.reject(CommandError::LineTooLong, sink),
        }
    }

    /// Parse and execute one complete command line.
    pub fn handle_line(&mut self, line: &[u8], hw: &mut impl RigPorts, sink: &mut impl EventSink) {
        match parse_command(line) {
            Ok(cmd) => self.handle_command(cmd, hw, sink),
            Err(e) => self.reject(e, sink),
        }
    }

    /// Execute a parsed command.  Exactly one response class is emitted:
    /// an acknowledgement, a report, or `ERROR:<token>`.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        hw: &mut impl RigPorts,
        sink: &mut impl EventSink,
    ) {
        let keyword = cmd.keyword();
        self.ctx.now_ms = hw.now_ms();
        match self.dispatch(cmd, hw, sink) {
            Ok(()) => {
                info!("command {keyword} ok");
                self.counters.record_ok();
            }
            Err(e) => {
                warn!("command {keyword} refused: {e}");
                self.reject(e, sink);
            }
        }
    }

    fn dispatch(
        &mut self,
        cmd: AppCommand,
        hw: &mut impl RigPorts,
        sink: &mut impl EventSink,
    ) -> Result<(), CommandError> {
        match cmd {
            AppCommand::Reset => self.emergency_stop(StopReason::Reset, hw, sink),
            AppCommand::Abort => self.emergency_stop(StopReason::Abort, hw, sink),
            AppCommand::SetTiming(update) => {
                self.require_idle()?;
                if update.is_empty() {
                    warn!("SET_TIMING with no values ignored");
                    return Ok(());
                }
                if update.apply_to(&mut self.ctx.timing) {
                    warn!("SET_TIMING value clamped to phase maximum");
                }
                sink.emit(&AppEvent::Timing(self.ctx.timing));
            }
            AppCommand::LoadSequence(parsed) => {
                self.require_idle()?;
                match parsed {
                    Ok(sequence) => {
                        sink.emit(&AppEvent::SequenceLoaded {
                            len: sequence.len(),
                            excitatory: sequence.count(TrialType::Excitatory),
                            neutral: sequence.count(TrialType::Neutral),
                        });
                        self.ctx.sequence = sequence;
                    }
                    Err(e) => {
                        self.ctx.sequence = TrialSequence::new();
                        return Err(e);
                    }
                }
            }
            AppCommand::Start => {
                self.require_idle()?;
                if self.ctx.sequence.is_empty() {
                    return Err(CommandError::NoSequence);
                }
                self.begin_session(hw, sink);
            }
            AppCommand::Status => sink.emit(&AppEvent::Status(self.status())),
            AppCommand::TestOdor => {
                self.require_idle()?;
                self.run_odor_test(hw, sink);
            }
            AppCommand::TestReward => {
                self.require_idle()?;
                self.run_reward_test(hw, sink);
            }
            AppCommand::TestLick => sink.emit(&AppEvent::LickSensor {
                touched: hw.is_touched(),
                count: self.lick.count(),
            }),
            AppCommand::ManualOdor(on) => {
                self.manual(StateId::ManualOdorControl, on, hw, sink)?;
                sink.emit(&AppEvent::ManualOdor(on));
            }
            AppCommand::ManualReward(on) => {
                self.manual(StateId::ManualRewardControl, on, hw, sink)?;
                sink.emit(&AppEvent::ManualReward(on));
            }
            AppCommand::ResetLickCount => {
                self.lick.reset_count();
                sink.emit(&AppEvent::LickCountReset);
            }
            AppCommand::Debug => sink.emit(&AppEvent::Debug(self.debug_snapshot())),
        }
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    /// Current FSM state.
    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    pub fn timing(&self) -> TimingConfig {
        self.ctx.timing
    }

    pub fn sequence(&self) -> &TrialSequence {
        &self.ctx.sequence
    }

    pub fn trial_index(&self) -> usize {
        self.ctx.trial_index
    }

    pub fn outputs(&self) -> OutputState {
        self.outputs.state()
    }

    pub fn lick_count(&self) -> u32 {
        self.lick.count()
    }

    pub fn session_zero_ms(&self) -> u64 {
        self.logger.session_zero_ms()
    }

    pub fn safety_counters(&self) -> SafetyCounters {
        self.safety.counters()
    }

    pub fn status(&self) -> StatusReport {
        let state = self.fsm.current_state();
        let outputs = self.outputs.state();
        StatusReport {
            state,
            trials_done: self.ctx.trial_index,
            trials_total: self.ctx.sequence.len(),
            trial_type: if state.in_session() {
                self.ctx.current_trial()
            } else {
                None
            },
            odor: outputs.odor,
            reward: outputs.reward,
            licks: self.lick.count(),
            timing: self.ctx.timing,
        }
    }

    pub fn debug_snapshot(&self) -> DebugSnapshot {
        let state = self.fsm.current_state();
        DebugSnapshot {
            state: state.name(),
            uptime_ms: self.ctx.now_ms,
            ms_in_state: self.ctx.elapsed_ms(),
            session_zero_ms: self.logger.session_zero_ms(),
            trial_index: self.ctx.trial_index,
            trials_total: self.ctx.sequence.len(),
            trial_type: self.ctx.current_trial(),
            outputs: self.outputs.state(),
            licks: self.lick.count(),
            licks_rejected: self.lick.rejected(),
            last_lick_ms: self
                .lick
                .last_accepted_ms()
                .map(|t| t.saturating_sub(self.logger.session_zero_ms())),
            rewards_delivered: self.outputs.rewards_delivered(),
            transitions: self.fsm.transition_count(),
            timing: self.ctx.timing,
            safety: self.safety.counters(),
            commands: self.counters,
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn require_idle(&self) -> Result<(), CommandError> {
        if self.fsm.current_state() == StateId::Idle {
            Ok(())
        } else {
            Err(CommandError::Busy)
        }
    }

    fn reject(&mut self, e: CommandError, sink: &mut impl EventSink) {
        self.counters.record_err(e);
        sink.emit(&AppEvent::Rejected(e));
    }

    fn begin_session(&mut self, hw: &mut impl RigPorts, sink: &mut impl EventSink) {
        let now = hw.now_ms();
        self.logger.rebase(now);
        self.lick.reset_count();
        self.ctx.trial_index = 0;
        info!(
            "session start: {} trials ({} CS+, {} CS-)",
            self.ctx.sequence.len(),
            self.ctx.sequence.count(TrialType::Excitatory),
            self.ctx.sequence.count(TrialType::Neutral)
        );
        sink.emit(&AppEvent::SessionStarted);
        self.logger.emit_at(EventCode::SessionStart, now, sink);
        self.force(StateId::InterTrialInterval, hw, sink);
    }

    /// Valves off, back to Idle, then the reason line.  Works from any
    /// state; a no-op on the outputs if nothing is open.
    fn emergency_stop(
        &mut self,
        reason: StopReason,
        hw: &mut impl RigPorts,
        sink: &mut impl EventSink,
    ) {
        if reason == StopReason::Timeout {
            warn!("stuck in {}, forcing Idle", self.fsm.current_state());
        }
        if let Err(e) = self.outputs.all_off(hw, &self.logger, sink) {
            warn!("emergency stop: {e}, valve left for the supervisor");
        }
        self.ctx.commands = OutputCommands::all_off();
        self.force(StateId::Idle, hw, sink);
        while self.ctx.take_marker().is_some() {}
        sink.emit(&reason.ack());
    }

    /// Manual override rules: enter only from Idle, repeat allowed in the
    /// same mode, OFF in Idle is a harmless acknowledgement.
    fn manual(
        &mut self,
        mode: StateId,
        on: bool,
        hw: &mut impl RigPorts,
        sink: &mut impl EventSink,
    ) -> Result<(), CommandError> {
        let state = self.fsm.current_state();
        if state == mode {
            if !on {
                self.force(StateId::Idle, hw, sink);
            }
            return Ok(());
        }
        self.require_idle()?;
        if on {
            self.force(mode, hw, sink);
        }
        Ok(())
    }

    fn run_odor_test(&mut self, hw: &mut impl RigPorts, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::TestStarted(HardwareTest::Odor));
        self.force(StateId::TestOdor, hw, sink);
        hw.delay_ms(TEST_ODOR_DURATION_MS);
        self.force(StateId::Idle, hw, sink);
        sink.emit(&AppEvent::TestComplete(HardwareTest::Odor));
    }

    fn run_reward_test(&mut self, hw: &mut impl RigPorts, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::TestStarted(HardwareTest::Reward));
        // Entering TestReward requests the pattern; applying it blocks.
        self.force(StateId::TestReward, hw, sink);
        self.force(StateId::Idle, hw, sink);
        sink.emit(&AppEvent::TestComplete(HardwareTest::Reward));
    }

    /// Forced transition plus the same follow-up as a natural one.
    fn force(&mut self, target: StateId, hw: &mut impl RigPorts, sink: &mut impl EventSink) {
        let from = self.fsm.current_state();
        self.ctx.now_ms = hw.now_ms();
        if self.fsm.force_transition(target, &mut self.ctx) {
            self.after_transition(from, hw, sink);
        }
    }

    fn after_transition(
        &mut self,
        from: StateId,
        hw: &mut impl RigPorts,
        sink: &mut impl EventSink,
    ) {
        sink.emit(&AppEvent::StateChanged {
            from,
            to: self.fsm.current_state(),
        });
        self.apply_outputs(hw, sink);
        self.flush_markers(hw, sink);
    }

    /// Drive the valves toward what the phase asked for.  Only changed
    /// levels are written, so each edge is reported once.
    fn apply_outputs(&mut self, hw: &mut impl RigPorts, sink: &mut impl EventSink) {
        let want = self.ctx.commands;
        let have = self.outputs.state();
        if want.odor != have.odor {
            if let Err(e) = self.outputs.set_odor(want.odor, hw, &self.logger, sink) {
                warn!("{} entry: {e}", self.fsm.current_state());
            }
        }
        if want.reward != have.reward {
            if let Err(e) = self.outputs.set_reward(want.reward, hw, &self.logger, sink) {
                warn!("{} entry: {e}", self.fsm.current_state());
            }
        }
        if want.deliver_reward {
            self.ctx.commands.deliver_reward = false;
            if let Err(e) = self
                .outputs
                .deliver_reward(REWARD_PATTERN, hw, &self.logger, sink)
            {
                warn!("reward pattern cut short: {e}");
            }
        }
    }

    fn flush_markers(&mut self, hw: &mut impl RigPorts, sink: &mut impl EventSink) {
        while let Some(marker) = self.ctx.take_marker() {
            match marker {
                SessionMarker::TrialStart => {
                    self.logger.emit(EventCode::TrialStart, &*hw, sink);
                }
                SessionMarker::TrialEnd => {
                    self.logger.emit(EventCode::TrialEnd, &*hw, sink);
                }
                SessionMarker::SessionComplete => {
                    info!("session complete");
                    sink.emit(&AppEvent::SessionComplete);
                }
            }
        }
    }

    fn enforce_output_policy(&mut self, hw: &mut impl RigPorts, sink: &mut impl EventSink) {
        let faults = self
            .safety
            .check_outputs(self.fsm.current_state(), self.outputs.state());
        for (fault, valve) in [
            (SafetyFault::UnauthorizedOdor, Valve::Odor),
            (SafetyFault::UnauthorizedReward, Valve::Reward),
        ] {
            if faults & fault.mask() == 0 {
                continue;
            }
            match valve {
                Valve::Odor => self.ctx.commands.odor = false,
                Valve::Reward => self.ctx.commands.reward = false,
            }
            // Retried on the next tick while the mirror still shows it open.
            if let Err(e) = self.outputs.fault_shutdown(valve, hw, &self.logger, sink) {
                warn!("{fault}: {e}");
            }
        }
    }

    fn poll_lick(&mut self, hw: &mut impl RigPorts, sink: &mut impl EventSink) {
        let touching = hw.is_touched();
        let now = hw.now_ms();
        if self.lick.poll(touching, now) {
            self.logger.emit_at(EventCode::Lick, now, sink);
        }
    }

    fn refresh_led(&mut self, hw: &mut impl RigPorts) {
        if let Some(level) = self.led.refresh(self.fsm.current_state(), hw.now_ms()) {
            hw.write_status_led(level);
        }
    }
}
