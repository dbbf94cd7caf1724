//! Unified error types for the rig firmware.
//!
//! All variants are `Copy` so they can be handed to the event sink and the
//! safety supervisor without allocation.  Each error that reaches the host
//! has a stable wire token (see [`CommandError::token`]).

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A host command could not be honoured.
    Command(CommandError),
    /// Peripheral initialisation failed.
    Init(InitError),
    /// A valve pin write was not acknowledged by the GPIO driver.
    Output(OutputError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command(e) => write!(f, "command: {e}"),
            Self::Init(e) => write!(f, "init: {e}"),
            Self::Output(e) => write!(f, "output: {e}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Command errors
// ---------------------------------------------------------------------------

/// Reasons a host command is refused.  None of these change rig state,
/// except [`CommandError::BadSequence`] which clears the loaded sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// The command conflicts with the current phase.
    Busy,
    /// `START` with no trials loaded.
    NoSequence,
    /// A trial-type token was not `1` or `2`, or the list was empty or too long.
    BadSequence,
    /// Unrecognised keyword.
    UnknownCommand,
    /// The line overflowed the receive buffer and was discarded.
    LineTooLong,
}

impl CommandError {
    /// Token sent after `ERROR:` on the wire.
    pub const fn token(self) -> &'static str {
        match self {
            Self::Busy => "BUSY",
            Self::NoSequence => "NO_SEQUENCE",
            Self::BadSequence => "BAD_SEQUENCE",
            Self::UnknownCommand => "UNKNOWN_COMMAND",
            Self::LineTooLong => "LINE_TOO_LONG",
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "rig busy"),
            Self::NoSequence => write!(f, "no trial sequence loaded"),
            Self::BadSequence => write!(f, "malformed trial sequence"),
            Self::UnknownCommand => write!(f, "unknown command"),
            Self::LineTooLong => write!(f, "command line too long"),
        }
    }
}

impl From<CommandError> for Error {
    fn from(e: CommandError) -> Self {
        Self::Command(e)
    }
}

// ---------------------------------------------------------------------------
// Initialisation errors
// ---------------------------------------------------------------------------

/// A peripheral the rig cannot run without failed to come up.
/// Always fatal: the firmware announces it and halts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    OdorValve,
    RewardValve,
    LickSensor,
    StatusLed,
    Serial,
}

impl InitError {
    pub const fn token(self) -> &'static str {
        match self {
            Self::OdorValve => "ODOR_VALVE",
            Self::RewardValve => "REWARD_VALVE",
            Self::LickSensor => "LICK_SENSOR",
            Self::StatusLed => "STATUS_LED",
            Self::Serial => "SERIAL",
        }
    }
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OdorValve => write!(f, "odor valve GPIO unavailable"),
            Self::RewardValve => write!(f, "reward valve GPIO unavailable"),
            Self::LickSensor => write!(f, "lick sensor GPIO unavailable"),
            Self::StatusLed => write!(f, "status LED GPIO unavailable"),
            Self::Serial => write!(f, "UART driver failed"),
        }
    }
}

impl From<InitError> for Error {
    fn from(e: InitError) -> Self {
        Self::Init(e)
    }
}

// ---------------------------------------------------------------------------
// Output errors
// ---------------------------------------------------------------------------

/// A valve pin write failed.  The pin level is unknown, so the software
/// mirror keeps its previous value and the write is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputError {
    OdorValve,
    RewardValve,
}

impl fmt::Display for OutputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OdorValve => write!(f, "odor valve write failed"),
            Self::RewardValve => write!(f, "reward valve write failed"),
        }
    }
}

impl From<OutputError> for Error {
    fn from(e: OutputError) -> Self {
        Self::Output(e)
    }
}

// ---------------------------------------------------------------------------
// Safety faults
// ---------------------------------------------------------------------------

/// Conditions the safety supervisor corrects.  Accumulated as a bitmask so
/// one iteration can report more than one correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SafetyFault {
    /// Odor valve energized outside an odor-authorized phase.
    UnauthorizedOdor = 0b0000_0001,
    /// Reward valve energized outside a reward-authorized phase.
    UnauthorizedReward = 0b0000_0010,
    /// A supervised phase exceeded the stuck-state ceiling.
    StuckState = 0b0000_0100,
}

impl SafetyFault {
    pub const ALL: [SafetyFault; 3] = [
        SafetyFault::UnauthorizedOdor,
        SafetyFault::UnauthorizedReward,
        SafetyFault::StuckState,
    ];

    /// Return the bitmask for this fault.
    pub const fn mask(self) -> u8 {
        self as u8
    }

    /// Token sent after `SAFETY:` on the wire.
    pub const fn token(self) -> &'static str {
        match self {
            Self::UnauthorizedOdor => "ODOR_OFF",
            Self::UnauthorizedReward => "REWARD_OFF",
            Self::StuckState => "TIMEOUT",
        }
    }
}

impl fmt::Display for SafetyFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnauthorizedOdor => write!(f, "odor valve open outside authorized phase"),
            Self::UnauthorizedReward => write!(f, "reward valve open outside authorized phase"),
            Self::StuckState => write!(f, "phase exceeded stuck-state ceiling"),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
