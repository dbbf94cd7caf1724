//! Host command parser.
//!
//! Grammar: `KEYWORD[:payload]`, keyword case-insensitive, whitespace
//! around the line ignored.  Numbers that do not parse read as `0`.

use crate::app::commands::AppCommand;
use crate::config::TimingUpdate;
use crate::error::CommandError;
use crate::trial::TrialSequence;

/// Bare keywords and their aliases from older host tools.
const KEYWORDS: &[(&str, AppCommand)] = &[
    ("RESET", AppCommand::Reset),
    ("START", AppCommand::Start),
    ("ABORT", AppCommand::Abort),
    ("STATUS", AppCommand::Status),
    ("TEST_ODOR", AppCommand::TestOdor),
    ("TEST_REWARD", AppCommand::TestReward),
    ("TEST_LICK", AppCommand::TestLick),
    ("MANUAL_ODOR_ON", AppCommand::ManualOdor(true)),
    ("MANUAL_ODOR_OFF", AppCommand::ManualOdor(false)),
    ("ODOR_ON", AppCommand::ManualOdor(true)),
    ("ODOR_OFF", AppCommand::ManualOdor(false)),
    ("MANUAL_REWARD_ON", AppCommand::ManualReward(true)),
    ("MANUAL_REWARD_OFF", AppCommand::ManualReward(false)),
    ("REWARD_ON", AppCommand::ManualReward(true)),
    ("REWARD_OFF", AppCommand::ManualReward(false)),
    ("RESET_LICK_COUNT", AppCommand::ResetLickCount),
    ("RESET_LICKS", AppCommand::ResetLickCount),
    ("DEBUG", AppCommand::Debug),
    ("DEBUG_STATE", AppCommand::Debug),
];

/// Parse one command line (terminator already stripped).
pub fn parse_command(line: &[u8]) -> Result<AppCommand, CommandError> {
    let text = core::str::from_utf8(line)
        .map_err(|_| CommandError::UnknownCommand)?
        .trim();

    let (keyword, payload) = match text.split_once(':') {
        Some((k, p)) => (k.trim(), Some(p)),
        None => (text, None),
    };

    if keyword.eq_ignore_ascii_case("SET_TIMING") {
        return Ok(AppCommand::SetTiming(parse_timing(payload.unwrap_or(""))));
    }
    if keyword.eq_ignore_ascii_case("SEQUENCE") {
        return Ok(AppCommand::LoadSequence(TrialSequence::parse_csv(
            payload.unwrap_or(""),
        )));
    }
    if payload.is_some() {
        return Err(CommandError::UnknownCommand);
    }

    KEYWORDS
        .iter()
        .find(|(name, _)| keyword.eq_ignore_ascii_case(name))
        .map(|(_, cmd)| cmd.clone())
        .ok_or(CommandError::UnknownCommand)
}

/// `iti[,odor[,reward[,init[,trace[,consummatory]]]]]`.  Extra fields are
/// ignored.
fn parse_timing(payload: &str) -> TimingUpdate {
    let mut update = TimingUpdate::default();
    if payload.trim().is_empty() {
        return update;
    }
    let slots = [
        &mut update.iti_ms,
        &mut update.odor_ms,
        &mut update.reward_ms,
        &mut update.trial_init_ms,
        &mut update.trace_ms,
        &mut update.consummatory_ms,
    ];
    for (slot, field) in slots.into_iter().zip(payload.split(',')) {
        *slot = Some(field.trim().parse().unwrap_or(0));
    }
    update
}
