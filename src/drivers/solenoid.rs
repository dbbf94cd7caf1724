//! Odor and reward solenoid valve controller.
//!
//! The only code that drives the two valves.  It mirrors the energized
//! state in software and emits a `DATA:` event for every edge it drives,
//! always *after* the pin write.  A write the port reports as failed
//! leaves the mirror untouched and emits nothing.
//!
//! The controller is a dumb actuator: it does not know which phase is
//! allowed to open which valve.  That policy lives in
//! [`SafetySupervisor`](crate::safety::SafetySupervisor), which calls
//! [`OutputController::fault_shutdown`] when it finds a valve open where
//! it should not be.

use log::{debug, error};

use crate::app::events::AppEvent;
use crate::app::ports::{Clock, EventSink, OutputPort};
use crate::config::RewardPattern;
use crate::error::{OutputError, SafetyFault};
use crate::events::{EventCode, EventLogger};

/// Software mirror of the two valve outputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct OutputState {
    pub odor: bool,
    pub reward: bool,
}

/// One of the two valves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Valve {
    Odor,
    Reward,
}

impl Valve {
    const fn events(self) -> (EventCode, EventCode) {
        match self {
            Self::Odor => (EventCode::OdorOn, EventCode::OdorOff),
            Self::Reward => (EventCode::RewardOn, EventCode::RewardOff),
        }
    }
}

pub struct OutputController {
    state: OutputState,
    rewards_delivered: u32,
}

impl OutputController {
    pub fn new() -> Self {
        Self {
            state: OutputState::default(),
            rewards_delivered: 0,
        }
    }

    pub fn state(&self) -> OutputState {
        self.state
    }

    /// Completed two-pulse reward patterns since boot.
    pub fn rewards_delivered(&self) -> u32 {
        self.rewards_delivered
    }

    /// Drive the odor valve.  Emits the edge event even if the level is
    /// unchanged; callers skip redundant writes.
    pub fn set_odor(
        &mut self,
        on: bool,
        hw: &mut (impl OutputPort + Clock),
        log: &EventLogger,
        sink: &mut impl EventSink,
    ) -> Result<(), OutputError> {
        self.drive(Valve::Odor, on, hw, log, sink)
    }

    /// Drive the reward valve directly (manual control only).
    pub fn set_reward(
        &mut self,
        on: bool,
        hw: &mut (impl OutputPort + Clock),
        log: &EventLogger,
        sink: &mut impl EventSink,
    ) -> Result<(), OutputError> {
        self.drive(Valve::Reward, on, hw, log, sink)
    }

    /// Run the two-pulse reward pattern.  Blocks the caller for
    /// `pattern.total_ms()`.
    ///
    /// A failed write ends the pattern early.  If it was a closing write the
    /// mirror still shows the valve open, so the supervisor closes it as
    /// soon as the phase stops authorizing reward.
    pub fn deliver_reward(
        &mut self,
        pattern: RewardPattern,
        hw: &mut (impl OutputPort + Clock),
        log: &EventLogger,
        sink: &mut impl EventSink,
    ) -> Result<(), OutputError> {
        debug!(
            "reward pattern {}/{}/{} ms",
            pattern.pulse1_ms, pattern.gap_ms, pattern.pulse2_ms
        );
        self.drive(Valve::Reward, true, hw, log, sink)?;
        hw.delay_ms(pattern.pulse1_ms);
        self.drive(Valve::Reward, false, hw, log, sink)?;
        hw.delay_ms(pattern.gap_ms);
        self.drive(Valve::Reward, true, hw, log, sink)?;
        hw.delay_ms(pattern.pulse2_ms);
        self.drive(Valve::Reward, false, hw, log, sink)?;
        self.rewards_delivered = self.rewards_delivered.saturating_add(1);
        Ok(())
    }

    /// Drive both valves low regardless of the mirror.  Only valves the
    /// mirror showed open produce an off event.  Both writes are attempted;
    /// the first failure is returned.
    pub fn all_off(
        &mut self,
        hw: &mut (impl OutputPort + Clock),
        log: &EventLogger,
        sink: &mut impl EventSink,
    ) -> Result<(), OutputError> {
        let odor = self.close(Valve::Odor, hw, log, sink);
        let reward = self.close(Valve::Reward, hw, log, sink);
        odor.and(reward)
    }

    /// Force one valve closed as a safety correction: the off event
    /// first, then the `SAFETY:` diagnostic.  Nothing is reported if the
    /// write fails; the next check retries.
    pub fn fault_shutdown(
        &mut self,
        valve: Valve,
        hw: &mut (impl OutputPort + Clock),
        log: &EventLogger,
        sink: &mut impl EventSink,
    ) -> Result<(), OutputError> {
        self.drive(valve, false, hw, log, sink)?;
        let fault = match valve {
            Valve::Odor => SafetyFault::UnauthorizedOdor,
            Valve::Reward => SafetyFault::UnauthorizedReward,
        };
        error!("valve fault shutdown: {fault}");
        sink.emit(&AppEvent::Safety(fault));
        Ok(())
    }

    fn close(
        &mut self,
        valve: Valve,
        hw: &mut (impl OutputPort + Clock),
        log: &EventLogger,
        sink: &mut impl EventSink,
    ) -> Result<(), OutputError> {
        let was_on = self.is_on(valve);
        write_pin(valve, false, hw)?;
        self.mirror(valve, false);
        if was_on {
            log.emit(valve.events().1, &*hw, sink);
        }
        Ok(())
    }

    fn drive(
        &mut self,
        valve: Valve,
        on: bool,
        hw: &mut (impl OutputPort + Clock),
        log: &EventLogger,
        sink: &mut impl EventSink,
    ) -> Result<(), OutputError> {
        write_pin(valve, on, hw)?;
        self.mirror(valve, on);
        let (on_code, off_code) = valve.events();
        log.emit(if on { on_code } else { off_code }, &*hw, sink);
        Ok(())
    }

    fn is_on(&self, valve: Valve) -> bool {
        match valve {
            Valve::Odor => self.state.odor,
            Valve::Reward => self.state.reward,
        }
    }

    fn mirror(&mut self, valve: Valve, on: bool) {
        match valve {
            Valve::Odor => self.state.odor = on,
            Valve::Reward => self.state.reward = on,
        }
    }
}

fn write_pin(valve: Valve, on: bool, hw: &mut impl OutputPort) -> Result<(), OutputError> {
    let result = match valve {
        Valve::Odor => hw.write_odor(on),
        Valve::Reward => hw.write_reward(on),
    };
    if let Err(e) = result {
        error!("{e} (wanted {})", if on { "on" } else { "off" });
    }
    result
}

impl Default for OutputController {
    fn default() -> Self {
        Self::new()
    }
}
