//! Hardware adapter: bridges rig pins to domain port traits.
//!
//! Generic over `embedded-hal` pin and delay types, so the same adapter
//! runs over `esp-idf-hal` `PinDriver`s on the board and over plain mock
//! pins in host tests.  This is the only module that touches GPIO.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin, PinState};
use log::error;

use crate::adapters::time::MonotonicClock;
use crate::app::ports::{Clock, LickSensorPort, OutputPort};
use crate::error::OutputError;

/// Concrete adapter that combines all rig I/O behind port traits.
pub struct RigHardware<Odor, Reward, Lick, Led, Delay> {
    odor: Odor,
    reward: Reward,
    lick: Lick,
    led: Led,
    delay: Delay,
    clock: MonotonicClock,
    lick_active_high: bool,
}

impl<Odor, Reward, Lick, Led, Delay> RigHardware<Odor, Reward, Lick, Led, Delay>
where
    Odor: OutputPin,
    Reward: OutputPin,
    Lick: InputPin,
    Led: OutputPin,
    Delay: DelayNs,
{
    pub fn new(
        odor: Odor,
        reward: Reward,
        lick: Lick,
        led: Led,
        delay: Delay,
        clock: MonotonicClock,
        lick_active_high: bool,
    ) -> Self {
        Self {
            odor,
            reward,
            lick,
            led,
            delay,
            clock,
            lick_active_high,
        }
    }
}

fn drive<P: OutputPin>(pin: &mut P, on: bool, what: &str) -> Result<(), P::Error> {
    pin.set_state(PinState::from(on))
        .inspect_err(|e| error!("{what} write failed: {e:?}"))
}

// ── Clock implementation ──────────────────────────────────────

impl<Odor, Reward, Lick, Led, Delay> Clock for RigHardware<Odor, Reward, Lick, Led, Delay>
where
    Delay: DelayNs,
{
    fn now_ms(&self) -> u64 {
        self.clock.uptime_ms()
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}

// ── OutputPort implementation ─────────────────────────────────

impl<Odor, Reward, Lick, Led, Delay> OutputPort for RigHardware<Odor, Reward, Lick, Led, Delay>
where
    Odor: OutputPin,
    Reward: OutputPin,
    Led: OutputPin,
{
    fn write_odor(&mut self, on: bool) -> Result<(), OutputError> {
        drive(&mut self.odor, on, "odor valve").map_err(|_| OutputError::OdorValve)
    }

    fn write_reward(&mut self, on: bool) -> Result<(), OutputError> {
        drive(&mut self.reward, on, "reward valve").map_err(|_| OutputError::RewardValve)
    }

    fn write_status_led(&mut self, on: bool) {
        let _ = drive(&mut self.led, on, "status LED");
    }
}

// ── LickSensorPort implementation ─────────────────────────────

impl<Odor, Reward, Lick, Led, Delay> LickSensorPort for RigHardware<Odor, Reward, Lick, Led, Delay>
where
    Lick: InputPin,
{
    fn is_touched(&mut self) -> bool {
        match self.lick.is_high() {
            Ok(high) => high == self.lick_active_high,
            Err(e) => {
                error!("lick sensor read failed: {e:?}");
                false
            }
        }
    }
}
