//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements                     | Connects to            |
//! |------------|--------------------------------|------------------------|
//! | `hardware` | Clock, OutputPort, LickSensorPort | GPIO via embedded-hal |
//! | `serial`   | EventSink (+ command input)    | UART0 host link        |
//! | `time`     | monotonic uptime               | ESP32 system timer     |

pub mod hardware;
#[cfg(feature = "espidf")]
pub mod serial;
pub mod time;
