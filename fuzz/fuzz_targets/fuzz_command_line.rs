//! Fuzz target: serial bytes → `LineReader` → `parse_command`
//!
//! Streams arbitrary bytes through the line reader and parses every
//! completed line.  Neither stage may panic, and no completed line may
//! exceed the receive buffer or carry its terminator.
//!
//! cargo fuzz run fuzz_command_line

#![no_main]

use libfuzzer_sys::fuzz_target;
use ohrbets::config::MAX_LINE_LEN;
use ohrbets::protocol::{LineRead, LineReader, parse_command};

fuzz_target!(|data: &[u8]| {
    let mut reader = LineReader::new();

    for &byte in data {
        if let LineRead::Complete(line) = reader.push_byte(byte) {
            assert!(line.len() <= MAX_LINE_LEN, "line exceeds receive buffer");
            assert!(!line.contains(&b'\n') && !line.contains(&b'\r'));
            let _ = parse_command(&line);
        }
    }

    // The whole input as one line, terminator or not.
    let _ = parse_command(data);
});
