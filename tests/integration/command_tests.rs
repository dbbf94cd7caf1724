//! Host command handling: acknowledgements, refusals and side states.

use crate::mock_hw::{MockRig, Pin, RecordingSink, booted, run_until, send};

use ohrbets::app::service::AppService;
use ohrbets::config::TimingConfig;
use ohrbets::fsm::StateId;
use ohrbets::protocol::LineReader;

// ── Refusals ──────────────────────────────────────────────────

#[test]
fn start_without_sequence_is_refused() {
    let (mut app, mut hw, mut sink) = booted(TimingConfig::default());
    send(&mut app, &mut hw, &mut sink, "START");
    assert_eq!(sink.lines, ["ERROR:NO_SEQUENCE"]);
    assert_eq!(app.state(), StateId::Idle);
}

#[test]
fn configuration_is_locked_during_a_session() {
    let (mut app, mut hw, mut sink) = booted(TimingConfig::default());
    send(&mut app, &mut hw, &mut sink, "SEQUENCE:1,2");
    send(&mut app, &mut hw, &mut sink, "START");
    let timing = app.timing();
    sink.clear();

    for cmd in [
        "SET_TIMING:1,1,1",
        "SEQUENCE:2",
        "START",
        "TEST_ODOR",
        "TEST_REWARD",
        "MANUAL_ODOR_ON",
        "MANUAL_REWARD_ON",
    ] {
        send(&mut app, &mut hw, &mut sink, cmd);
        assert_eq!(sink.last(), Some("ERROR:BUSY"), "{cmd} accepted mid-session");
    }
    assert_eq!(sink.lines.len(), 7);
    assert_eq!(app.timing(), timing);
    assert_eq!(app.sequence().len(), 2);
    assert_eq!(app.state(), StateId::InterTrialInterval);
}

#[test]
fn malformed_sequence_clears_the_loaded_one() {
    let (mut app, mut hw, mut sink) = booted(TimingConfig::default());
    send(&mut app, &mut hw, &mut sink, "SEQUENCE:1,2,1");
    send(&mut app, &mut hw, &mut sink, "SEQUENCE:1,3");
    assert_eq!(sink.last(), Some("ERROR:BAD_SEQUENCE"));
    assert!(app.sequence().is_empty());

    send(&mut app, &mut hw, &mut sink, "START");
    assert_eq!(sink.last(), Some("ERROR:NO_SEQUENCE"));
}

#[test]
fn empty_sequence_is_malformed() {
    let (mut app, mut hw, mut sink) = booted(TimingConfig::default());
    send(&mut app, &mut hw, &mut sink, "SEQUENCE:");
    assert_eq!(sink.lines, ["ERROR:BAD_SEQUENCE"]);
}

#[test]
fn unknown_commands_are_reported() {
    let (mut app, mut hw, mut sink) = booted(TimingConfig::default());
    send(&mut app, &mut hw, &mut sink, "FEED_MOUSE");
    send(&mut app, &mut hw, &mut sink, "START:now");
    assert_eq!(sink.lines, ["ERROR:UNKNOWN_COMMAND", "ERROR:UNKNOWN_COMMAND"]);
    assert_eq!(app.debug_snapshot().commands.malformed, 2);
}

#[test]
fn overlong_line_is_dropped_and_reader_recovers() {
    let (mut app, mut hw, mut sink) = booted(TimingConfig::default());
    let mut reader = LineReader::new();

    let long = vec![b'1'; 600];
    feed(&mut reader, &long, &mut app, &mut hw, &mut sink);
    feed(&mut reader, b"\r\nSTATUS\r\n", &mut app, &mut hw, &mut sink);

    assert_eq!(sink.lines.len(), 2);
    assert_eq!(sink.lines[0], "ERROR:LINE_TOO_LONG");
    assert!(sink.lines[1].starts_with("STATUS:STATE=IDLE,"));
}

fn feed(
    reader: &mut LineReader,
    bytes: &[u8],
    app: &mut AppService,
    hw: &mut MockRig,
    sink: &mut RecordingSink,
) {
    for &b in bytes {
        app.handle_line_read(reader.push_byte(b), hw, sink);
    }
}

// ── Stop commands ─────────────────────────────────────────────

#[test]
fn abort_in_idle_is_a_harmless_ack() {
    let (mut app, mut hw, mut sink) = booted(TimingConfig::default());
    send(&mut app, &mut hw, &mut sink, "ABORT");
    send(&mut app, &mut hw, &mut sink, "RESET");
    assert_eq!(sink.lines, ["SESSION_ABORTED", "EMERGENCY_STOP:RESET"]);
    // Both pins are driven low every time, but closed valves report nothing.
    assert_eq!(
        hw.valve_writes(),
        [
            (1_000, Pin::Odor, false),
            (1_000, Pin::Reward, false),
            (1_000, Pin::Odor, false),
            (1_000, Pin::Reward, false),
        ]
    );
}

#[test]
fn abort_closes_valve_energized_behind_the_mirror() {
    let (mut app, mut hw, mut sink) = booted(TimingConfig::default());
    hw.odor = true;
    hw.reward = true;

    send(&mut app, &mut hw, &mut sink, "ABORT");
    assert_eq!(sink.lines, ["SESSION_ABORTED"]);
    assert!(!hw.odor);
    assert!(!hw.reward);
}

#[test]
fn failed_close_keeps_valve_reported_open_until_abort() {
    let (mut app, mut hw, mut sink) = booted(TimingConfig::default());
    send(&mut app, &mut hw, &mut sink, "MANUAL_ODOR_ON");
    sink.clear();

    hw.advance(250);
    hw.drop_next_odor_off = true;
    send(&mut app, &mut hw, &mut sink, "MANUAL_ODOR_OFF");
    assert_eq!(sink.lines, ["STATE:MANUAL_ODOR->IDLE", "MANUAL_ODOR:OFF"]);
    assert!(hw.odor);
    assert!(app.outputs().odor);
    sink.clear();

    send(&mut app, &mut hw, &mut sink, "ABORT");
    assert_eq!(sink.lines, ["DATA:4,250", "SESSION_ABORTED"]);
    assert!(!hw.odor);
    assert!(!app.outputs().odor);
}

#[test]
fn failed_close_is_caught_by_the_next_tick() {
    let (mut app, mut hw, mut sink) = booted(TimingConfig::default());
    send(&mut app, &mut hw, &mut sink, "MANUAL_ODOR_ON");
    hw.drop_next_odor_off = true;
    send(&mut app, &mut hw, &mut sink, "MANUAL_ODOR_OFF");
    sink.clear();

    hw.advance(1);
    app.tick(&mut hw, &mut sink);
    assert_eq!(sink.lines, ["DATA:4,1", "SAFETY:ODOR_OFF"]);
    assert!(!hw.odor);
    assert_eq!(app.safety_counters().odor_shutdowns, 1);
}

#[test]
fn reset_closes_manual_reward_valve() {
    let (mut app, mut hw, mut sink) = booted(TimingConfig::default());
    send(&mut app, &mut hw, &mut sink, "MANUAL_REWARD_ON");
    assert!(hw.reward);
    sink.clear();

    send(&mut app, &mut hw, &mut sink, "RESET");
    assert_eq!(
        sink.lines,
        ["DATA:6,0", "STATE:MANUAL_REWARD->IDLE", "EMERGENCY_STOP:RESET"]
    );
    assert!(!hw.reward);
}

// ── Timing ────────────────────────────────────────────────────

#[test]
fn set_timing_then_status() {
    let (mut app, mut hw, mut sink) = booted(TimingConfig::default());
    send(&mut app, &mut hw, &mut sink, "SET_TIMING:3000,1500,400");
    send(&mut app, &mut hw, &mut sink, "STATUS");
    assert_eq!(
        sink.lines,
        [
            "TIMING:ITI=3000,INIT=1000,ODOR=1500,TRACE=1000,REWARD=400,CONSUME=3000",
            "STATUS:STATE=IDLE,TRIAL=0/0,TYPE=NONE,ODOR=OFF,REWARD=OFF,LICKS=0,\
             ITI=3000,INIT=1000,ODOR_MS=1500,TRACE=1000,REWARD_MS=400,CONSUME=3000",
        ]
    );
}

#[test]
fn set_timing_clamps_and_ignores_empty() {
    let (mut app, mut hw, mut sink) = booted(TimingConfig::default());
    send(&mut app, &mut hw, &mut sink, "SET_TIMING");
    assert!(sink.lines.is_empty());

    send(&mut app, &mut hw, &mut sink, "SET_TIMING:999999,x");
    assert_eq!(app.timing().iti_ms, 60_000);
    assert_eq!(app.timing().odor_ms, 0);
    assert_eq!(
        sink.last(),
        Some("TIMING:ITI=60000,INIT=1000,ODOR=0,TRACE=1000,REWARD=500,CONSUME=3000")
    );
}

#[test]
fn new_timing_drives_the_next_session() {
    let (mut app, mut hw, mut sink) = booted(TimingConfig::default());
    send(&mut app, &mut hw, &mut sink, "SET_TIMING:50,70,300,20,40,60");
    send(&mut app, &mut hw, &mut sink, "SEQUENCE:2");
    send(&mut app, &mut hw, &mut sink, "START");
    run_until(&mut app, &mut hw, &mut sink, StateId::Idle, 1, 5_000);

    // ITI 50 + INIT 20 → odor at 70, open for 70 ms.
    assert!(sink.contains("DATA:3,70"));
    assert!(sink.contains("DATA:4,140"));
}

// ── Manual override ──────────────────────────────────────────

#[test]
fn manual_odor_round_trip() {
    let (mut app, mut hw, mut sink) = booted(TimingConfig::default());
    send(&mut app, &mut hw, &mut sink, "MANUAL_ODOR_ON");
    assert_eq!(sink.lines, ["STATE:IDLE->MANUAL_ODOR", "DATA:3,0", "MANUAL_ODOR:ON"]);
    assert!(hw.odor);
    sink.clear();

    // Repeat in the same mode is only acknowledged.
    send(&mut app, &mut hw, &mut sink, "MANUAL_ODOR_ON");
    assert_eq!(sink.lines, ["MANUAL_ODOR:ON"]);
    sink.clear();

    // The other valve cannot be opened alongside.
    send(&mut app, &mut hw, &mut sink, "MANUAL_REWARD_ON");
    assert_eq!(sink.lines, ["ERROR:BUSY"]);
    assert!(!hw.reward);
    sink.clear();

    hw.advance(250);
    send(&mut app, &mut hw, &mut sink, "MANUAL_ODOR_OFF");
    assert_eq!(
        sink.lines,
        ["STATE:MANUAL_ODOR->IDLE", "DATA:4,250", "MANUAL_ODOR:OFF"]
    );
    assert!(!hw.odor);
}

#[test]
fn manual_off_in_idle_only_acknowledges() {
    let (mut app, mut hw, mut sink) = booted(TimingConfig::default());
    send(&mut app, &mut hw, &mut sink, "MANUAL_REWARD_OFF");
    send(&mut app, &mut hw, &mut sink, "reward_off");
    assert_eq!(sink.lines, ["MANUAL_REWARD:OFF", "MANUAL_REWARD:OFF"]);
    assert_eq!(app.state(), StateId::Idle);
}

#[test]
fn manual_valve_is_not_timed_out() {
    let (mut app, mut hw, mut sink) = booted(TimingConfig::default());
    send(&mut app, &mut hw, &mut sink, "ODOR_ON");
    sink.clear();
    hw.advance(300_000);
    app.tick(&mut hw, &mut sink);
    assert_eq!(app.state(), StateId::ManualOdorControl);
    assert!(hw.odor);
    assert!(sink.lines.is_empty());
}

// ── Hardware tests ────────────────────────────────────────────

#[test]
fn test_odor_opens_for_two_seconds() {
    let (mut app, mut hw, mut sink) = booted(TimingConfig::default());
    send(&mut app, &mut hw, &mut sink, "TEST_ODOR");
    assert_eq!(
        sink.lines,
        [
            "TEST_ODOR:START",
            "STATE:IDLE->TEST_ODOR",
            "DATA:3,0",
            "STATE:TEST_ODOR->IDLE",
            "DATA:4,2000",
            "TEST_ODOR:COMPLETE",
        ]
    );
    assert!(!hw.odor);
    assert_eq!(app.state(), StateId::Idle);
}

#[test]
fn test_reward_runs_pulse_pattern() {
    let (mut app, mut hw, mut sink) = booted(TimingConfig::default());
    send(&mut app, &mut hw, &mut sink, "TEST_REWARD");
    assert_eq!(
        sink.lines,
        [
            "TEST_REWARD:START",
            "STATE:IDLE->TEST_REWARD",
            "DATA:5,0",
            "DATA:6,40",
            "DATA:5,180",
            "DATA:6,220",
            "STATE:TEST_REWARD->IDLE",
            "TEST_REWARD:COMPLETE",
        ]
    );
    assert!(!hw.reward);
    assert_eq!(app.debug_snapshot().rewards_delivered, 1);
}

#[test]
fn test_lick_reports_level_and_count() {
    let (mut app, mut hw, mut sink) = booted(TimingConfig::default());
    hw.advance(10);
    hw.touched = true;
    app.tick(&mut hw, &mut sink);
    sink.clear();

    send(&mut app, &mut hw, &mut sink, "TEST_LICK");
    hw.touched = false;
    send(&mut app, &mut hw, &mut sink, "TEST_LICK");
    assert_eq!(sink.lines, ["LICK_SENSOR:1,COUNT=1", "LICK_SENSOR:0,COUNT=1"]);
}

#[test]
fn reset_lick_count_zeroes_counter() {
    let (mut app, mut hw, mut sink) = booted(TimingConfig::default());
    hw.advance(10);
    hw.touched = true;
    app.tick(&mut hw, &mut sink);
    assert_eq!(app.lick_count(), 1);
    sink.clear();

    send(&mut app, &mut hw, &mut sink, "RESET_LICKS");
    assert_eq!(sink.lines, ["LICK_COUNT_RESET"]);
    assert_eq!(app.lick_count(), 0);
}

// ── Diagnostics ───────────────────────────────────────────────

#[test]
fn debug_emits_single_json_line() {
    let (mut app, mut hw, mut sink) = booted(TimingConfig::default());
    send(&mut app, &mut hw, &mut sink, "SEQUENCE:1,1,2");
    sink.clear();
    send(&mut app, &mut hw, &mut sink, "DEBUG");

    assert_eq!(sink.lines.len(), 1);
    let json = sink.lines[0]
        .strip_prefix("DEBUG:")
        .expect("DEBUG prefix");
    assert!(!json.contains('\n'));
    assert!(json.starts_with('{') && json.ends_with('}'));
    assert!(json.contains("\"state\":\"IDLE\""));
    assert!(json.contains("\"trials_total\":3"));
    assert!(json.contains("\"accepted\":1"));
}
