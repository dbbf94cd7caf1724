//! OHRBETS Firmware: Main Entry Point
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  Adapters (outer ring)                   │
//! │                                                          │
//! │   RigHardware                    SerialLink              │
//! │   (Clock+Output+LickSensor)      (EventSink + lines in)  │
//! │                                                          │
//! │   ────────────── Port Trait Boundary ──────────────      │
//! │                                                          │
//! │   ┌──────────────────────────────────────────────────┐   │
//! │   │             AppService (pure logic)              │   │
//! │   │   FSM · Safety · Valves · Lick · Event logger    │   │
//! │   └──────────────────────────────────────────────────┘   │
//! └──────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_hal::delay::{Ets, FreeRtos};
use esp_idf_hal::gpio::{AnyIOPin, AnyInputPin, AnyOutputPin, Input, Output, PinDriver, Pull};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::uart::{UartDriver, config::Config as UartConfig};
use esp_idf_hal::units::Hertz;
use log::{error, info};

use ohrbets::adapters::hardware::RigHardware;
use ohrbets::adapters::serial::SerialLink;
use ohrbets::adapters::time::MonotonicClock;
use ohrbets::app::events::AppEvent;
use ohrbets::app::ports::EventSink;
use ohrbets::app::service::AppService;
use ohrbets::config::{SERIAL_BAUD, TimingConfig};
use ohrbets::error::{Error, InitError};
use ohrbets::pins;

type Rig<'d> = RigHardware<
    PinDriver<'d, AnyOutputPin, Output>,
    PinDriver<'d, AnyOutputPin, Output>,
    PinDriver<'d, AnyIOPin, Input>,
    PinDriver<'d, AnyOutputPin, Output>,
    Ets,
>;

/// Claim the valve, sensor and LED pins.  Valves are driven low before
/// anything else happens.
fn init_rig() -> ohrbets::error::Result<Rig<'static>> {
    // SAFETY: each GPIO number in `pins` is claimed exactly once, here,
    // and none of them is used by the UART.
    let (odor, reward, lick, led) = unsafe {
        (
            AnyOutputPin::new(pins::ODOR_VALVE_GPIO),
            AnyOutputPin::new(pins::REWARD_VALVE_GPIO),
            AnyIOPin::new(pins::LICK_SENSOR_GPIO),
            AnyOutputPin::new(pins::STATUS_LED_GPIO),
        )
    };

    let mut odor = PinDriver::output(odor).map_err(|_| InitError::OdorValve)?;
    odor.set_low().map_err(|_| InitError::OdorValve)?;
    let mut reward = PinDriver::output(reward).map_err(|_| InitError::RewardValve)?;
    reward.set_low().map_err(|_| InitError::RewardValve)?;

    let mut lick = PinDriver::input(lick).map_err(|_| InitError::LickSensor)?;
    let pull = if pins::LICK_ACTIVE_HIGH {
        Pull::Down
    } else {
        Pull::Up
    };
    lick.set_pull(pull).map_err(|_| InitError::LickSensor)?;

    let led = PinDriver::output(led).map_err(|_| InitError::StatusLed)?;

    Ok(RigHardware::new(
        odor,
        reward,
        lick,
        led,
        Ets,
        MonotonicClock::new(),
        pins::LICK_ACTIVE_HIGH,
    ))
}

/// Announce a fatal init failure and park.  The valves were either never
/// configured or already driven low.
fn halt(e: Error, link: Option<&mut SerialLink<'_>>) -> ! {
    error!("init failed: {e}, halting");
    if let (Error::Init(init), Some(link)) = (e, link) {
        link.emit(&AppEvent::InitFailed(init));
    }
    loop {
        FreeRtos::delay_ms(1_000);
    }
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("OHRBETS rig v{}", env!("CARGO_PKG_VERSION"));

    let peripherals = Peripherals::take()?;

    // ── 2. Host link first, so later failures can be reported ─
    let uart_config = UartConfig::new().baudrate(Hertz(SERIAL_BAUD));
    // SAFETY: the UART pins are not claimed anywhere else.
    let (tx, rx) = unsafe {
        (
            AnyOutputPin::new(pins::UART_TX_GPIO),
            AnyInputPin::new(pins::UART_RX_GPIO),
        )
    };
    let uart = match UartDriver::new(
        peripherals.uart0,
        tx,
        rx,
        Option::<AnyInputPin>::None,
        Option::<AnyOutputPin>::None,
        &uart_config,
    ) {
        Ok(uart) => uart,
        Err(e) => {
            error!("UART: {e}");
            halt(InitError::Serial.into(), None)
        }
    };
    let mut link = SerialLink::new(uart);

    // ── 3. Rig I/O ────────────────────────────────────────────
    let mut hw = match init_rig() {
        Ok(hw) => hw,
        Err(e) => halt(e, Some(&mut link)),
    };

    // ── 4. Application service ────────────────────────────────
    let mut app = AppService::new(TimingConfig::default());
    app.start(&mut hw, &mut link);
    info!("System ready. Entering control loop.");

    // ── 5. Control loop ───────────────────────────────────────
    loop {
        while let Some(read) = link.next_line() {
            app.handle_line_read(read, &mut hw, &mut link);
        }
        app.tick(&mut hw, &mut link);

        // Yield so the idle task can feed the task watchdog.
        FreeRtos::delay_ms(1);
    }
}
