use heapless::Vec;

use crate::config::MAX_LINE_LEN;

/// One complete command line, terminator stripped.
pub type Line = Vec<u8, MAX_LINE_LEN>;

#[derive(Debug, PartialEq, Eq)]
pub enum LineRead {
    None,
    Complete(Line),
    /// The line outgrew the buffer.  Reported once; the rest of it up to
    /// the next terminator is discarded.
    Overflow,
}

/// Accumulates serial bytes into CR/LF terminated lines.
pub struct LineReader {
    buf: Line,
    overflowed: bool,
}

impl LineReader {
    pub const fn new() -> Self {
        Self {
            buf: Vec::new(),
            overflowed: false,
        }
    }

    pub fn push_byte(&mut self, byte: u8) -> LineRead {
        if byte == b'\r' || byte == b'\n' {
            if self.overflowed {
                self.overflowed = false;
                return LineRead::None;
            }
            if self.buf.is_empty() {
                return LineRead::None;
            }
            return LineRead::Complete(core::mem::take(&mut self.buf));
        }

        if self.overflowed {
            return LineRead::None;
        }

        if self.buf.push(byte).is_ok() {
            return LineRead::None;
        }

        self.buf.clear();
        self.overflowed = true;
        LineRead::Overflow
    }
}

impl Default for LineReader {
    fn default() -> Self {
        Self::new()
    }
}
