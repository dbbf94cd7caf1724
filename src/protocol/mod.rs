//! Host serial protocol: byte stream → lines → [`AppCommand`](crate::app::commands::AppCommand).

pub mod line_reader;
pub mod parser;

pub use line_reader::{Line, LineRead, LineReader};
pub use parser::parse_command;
