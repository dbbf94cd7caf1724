//! Host serial link over UART.
//!
//! Reads command bytes without blocking and writes every [`AppEvent`] as
//! one CRLF-terminated line.  Implements [`EventSink`], so the service
//! talks to the host without knowing a UART exists.

use esp_idf_hal::delay::NON_BLOCK;
use esp_idf_hal::uart::UartDriver;
use log::{debug, error};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::protocol::{LineRead, LineReader};

pub struct SerialLink<'d> {
    uart: UartDriver<'d>,
    reader: LineReader,
}

impl<'d> SerialLink<'d> {
    pub fn new(uart: UartDriver<'d>) -> Self {
        Self {
            uart,
            reader: LineReader::new(),
        }
    }

    /// Pull buffered bytes until a line completes or overflows.
    /// `None` once the receive FIFO is empty.
    pub fn next_line(&mut self) -> Option<LineRead> {
        let mut byte = [0u8; 1];
        loop {
            match self.uart.read(&mut byte, NON_BLOCK) {
                Ok(1) => match self.reader.push_byte(byte[0]) {
                    LineRead::None => {}
                    read => return Some(read),
                },
                Ok(_) => return None,
                Err(e) => {
                    error!("uart read failed: {e}");
                    return None;
                }
            }
        }
    }

    fn write_line(&mut self, line: &str) {
        for chunk in [line.as_bytes(), b"\r\n"] {
            let mut rest = chunk;
            while !rest.is_empty() {
                match self.uart.write(rest) {
                    Ok(n) => rest = &rest[n..],
                    Err(e) => {
                        error!("uart write failed: {e}");
                        return;
                    }
                }
            }
        }
    }
}

impl EventSink for SerialLink<'_> {
    fn emit(&mut self, event: &AppEvent) {
        let line = event.to_string();
        debug!("tx {line}");
        self.write_line(&line);
    }
}
