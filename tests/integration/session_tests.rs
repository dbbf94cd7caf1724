//! End-to-end trial sessions: START → trials → COMPLETE → IDLE.

use crate::mock_hw::{MockRig, RecordingSink, booted, run_until, send};

use ohrbets::app::service::AppService;
use ohrbets::config::TimingConfig;
use ohrbets::fsm::StateId;
use ohrbets::safety::policy_for;

const FAST: TimingConfig = TimingConfig::uniform(100);

fn run_session(app: &mut AppService, hw: &mut MockRig, sink: &mut RecordingSink) {
    run_until(app, hw, sink, StateId::Idle, 10, 10_000);
}

// ── Single trial, exact wire trace ───────────────────────────

#[test]
fn single_rewarded_trial_wire_trace() {
    let (mut app, mut hw, mut sink) = booted(FAST);
    send(&mut app, &mut hw, &mut sink, "SEQUENCE:1");
    assert_eq!(sink.lines, ["SEQUENCE_LOADED:1,1,0"]);
    sink.clear();

    send(&mut app, &mut hw, &mut sink, "START");
    // Let the FSM leave Idle before waiting to come back.
    assert_eq!(app.state(), StateId::InterTrialInterval);
    run_session(&mut app, &mut hw, &mut sink);

    assert_eq!(
        sink.lines,
        [
            "SESSION_STARTED",
            "DATA:8,0",
            "STATE:IDLE->ITI",
            "DATA:1,0",
            "STATE:ITI->TRIAL_INIT",
            "STATE:TRIAL_INIT->ODOR",
            "DATA:3,200",
            "STATE:ODOR->TRACE",
            "DATA:4,300",
            "STATE:TRACE->REWARD",
            "DATA:5,400",
            "DATA:6,440",
            "DATA:5,580",
            "DATA:6,620",
            "STATE:REWARD->CONSUMMATORY",
            "STATE:CONSUMMATORY->TRIAL_OFF",
            "DATA:2,730",
            "STATE:TRIAL_OFF->COMPLETE",
            "SESSION_COMPLETE",
            "STATE:COMPLETE->IDLE",
        ]
    );
    assert!(!hw.odor && !hw.reward);
    assert_eq!(app.trial_index(), 1);
}

#[test]
fn neutral_trial_never_opens_reward_valve() {
    let (mut app, mut hw, mut sink) = booted(FAST);
    send(&mut app, &mut hw, &mut sink, "SEQUENCE:2");
    send(&mut app, &mut hw, &mut sink, "START");
    run_session(&mut app, &mut hw, &mut sink);

    assert_eq!(sink.data_codes(), [8, 1, 3, 4, 2]);
    assert!(sink.contains("STATE:TRACE->REWARD"));
    assert!(sink.contains("SESSION_COMPLETE"));
    assert!(
        hw.valve_writes()
            .iter()
            .all(|(_, pin, on)| !(*pin == crate::mock_hw::Pin::Reward && *on))
    );
}

// ── Multi-trial sessions ─────────────────────────────────────

#[test]
fn mixed_sequence_runs_every_trial_in_order() {
    let (mut app, mut hw, mut sink) = booted(FAST);
    send(&mut app, &mut hw, &mut sink, "SEQUENCE:1,2,1");
    send(&mut app, &mut hw, &mut sink, "START");
    run_session(&mut app, &mut hw, &mut sink);

    assert_eq!(sink.count_prefix("DATA:1,"), 3);
    assert_eq!(sink.count_prefix("DATA:2,"), 3);
    assert_eq!(sink.count_prefix("DATA:3,"), 3);
    assert_eq!(sink.count_prefix("DATA:4,"), 3);
    assert_eq!(sink.count_prefix("DATA:5,"), 4, "two pulses per CS+ trial");
    assert_eq!(sink.count_prefix("SESSION_COMPLETE"), 1);
    assert_eq!(sink.count_prefix("STATE:TRIAL_OFF->ITI"), 2);
    assert_eq!(app.trial_index(), 3);

    // Timestamps never go backwards within a session.
    let stamps: Vec<u64> = sink.data().into_iter().map(|(_, t)| t).collect();
    assert!(stamps.windows(2).all(|w| w[0] <= w[1]));

    // Trial markers alternate start/end with strictly rising stamps.
    let markers: Vec<(u8, u64)> = sink
        .data()
        .into_iter()
        .filter(|(c, _)| *c == 1 || *c == 2)
        .collect();
    let codes: Vec<u8> = markers.iter().map(|(c, _)| *c).collect();
    assert_eq!(codes, [1, 2, 1, 2, 1, 2]);
    assert!(
        markers.windows(2).all(|w| w[0].1 < w[1].1),
        "marker stamps not strictly increasing: {markers:?}"
    );
}

#[test]
fn trial_start_and_end_bracket_each_trial() {
    let (mut app, mut hw, mut sink) = booted(FAST);
    send(&mut app, &mut hw, &mut sink, "SEQUENCE:2,1");
    send(&mut app, &mut hw, &mut sink, "START");
    run_session(&mut app, &mut hw, &mut sink);

    let markers: Vec<u8> = sink
        .data_codes()
        .into_iter()
        .filter(|c| *c == 1 || *c == 2)
        .collect();
    assert_eq!(markers, [1, 2, 1, 2]);
}

#[test]
fn replacing_sequence_discards_old_trials() {
    let (mut app, mut hw, mut sink) = booted(FAST);
    send(&mut app, &mut hw, &mut sink, "SEQUENCE:1,2,1");
    send(&mut app, &mut hw, &mut sink, "SEQUENCE:2,2");
    assert_eq!(sink.last(), Some("SEQUENCE_LOADED:2,0,2"));
    sink.clear();

    send(&mut app, &mut hw, &mut sink, "START");
    run_session(&mut app, &mut hw, &mut sink);
    assert_eq!(sink.count_prefix("DATA:1,"), 2);
    assert_eq!(sink.count_prefix("DATA:5,"), 0);
}

#[test]
fn second_session_restarts_timestamps_and_index() {
    let (mut app, mut hw, mut sink) = booted(FAST);
    send(&mut app, &mut hw, &mut sink, "SEQUENCE:2");
    send(&mut app, &mut hw, &mut sink, "START");
    run_session(&mut app, &mut hw, &mut sink);

    hw.advance(5_000);
    sink.clear();
    send(&mut app, &mut hw, &mut sink, "START");
    assert_eq!(
        sink.lines,
        ["SESSION_STARTED", "DATA:8,0", "STATE:IDLE->ITI", "DATA:1,0"]
    );
    assert_eq!(app.trial_index(), 0);
    run_session(&mut app, &mut hw, &mut sink);
    assert_eq!(app.trial_index(), 1);
}

// ── Abort and stuck-state recovery ───────────────────────────

#[test]
fn abort_mid_odor_closes_valve_first() {
    let (mut app, mut hw, mut sink) = booted(FAST);
    send(&mut app, &mut hw, &mut sink, "SEQUENCE:1,1");
    send(&mut app, &mut hw, &mut sink, "START");
    run_until(&mut app, &mut hw, &mut sink, StateId::OdorPeriod, 10, 1_000);
    assert!(hw.odor);
    hw.advance(30);
    sink.clear();

    send(&mut app, &mut hw, &mut sink, "ABORT");
    assert_eq!(sink.lines, ["DATA:4,230", "STATE:ODOR->IDLE", "SESSION_ABORTED"]);
    assert!(!hw.odor);
    assert_eq!(app.state(), StateId::Idle);

    // Sequence survives the abort.
    assert_eq!(app.sequence().len(), 2);
}

#[test]
fn stuck_phase_times_out_to_idle() {
    let (mut app, mut hw, mut sink) = booted(FAST);
    send(&mut app, &mut hw, &mut sink, "SEQUENCE:1");
    send(&mut app, &mut hw, &mut sink, "START");
    run_until(&mut app, &mut hw, &mut sink, StateId::OdorPeriod, 10, 1_000);
    sink.clear();

    // A wedged loop: no tick for longer than the stuck-state ceiling.
    hw.advance(130_000);
    app.tick(&mut hw, &mut sink);

    assert_eq!(app.state(), StateId::Idle);
    assert!(!hw.odor);
    assert_eq!(sink.lines[0], "DATA:4,130200");
    assert_eq!(sink.lines[1], "STATE:ODOR->IDLE");
    assert_eq!(sink.lines[2], "SAFETY:TIMEOUT");
    assert!(!sink.contains("SESSION_COMPLETE"));
    assert_eq!(app.safety_counters().timeouts, 1);
}

#[test]
fn idle_never_times_out() {
    let (mut app, mut hw, mut sink) = booted(FAST);
    hw.advance(500_000);
    app.tick(&mut hw, &mut sink);
    assert!(sink.lines.is_empty());
    assert_eq!(app.safety_counters().timeouts, 0);
}

// ── Licks and output policy ──────────────────────────────────

#[test]
fn licks_are_logged_in_every_phase() {
    let (mut app, mut hw, mut sink) = booted(FAST);
    send(&mut app, &mut hw, &mut sink, "SEQUENCE:1");
    send(&mut app, &mut hw, &mut sink, "START");

    let mut phases_with_licks = Vec::new();
    for _ in 0..2_000 {
        if app.state() == StateId::Idle {
            break;
        }
        // 60 ms touch / release cycle, above the refractory window.
        hw.advance(30);
        hw.touched = !hw.touched;
        let before = sink.count_prefix("DATA:7,");
        app.tick(&mut hw, &mut sink);
        if sink.count_prefix("DATA:7,") > before {
            phases_with_licks.push(app.state());
        }
    }

    assert!(app.lick_count() > 0);
    assert_eq!(app.lick_count() as usize, sink.count_prefix("DATA:7,"));
    for phase in [StateId::InterTrialInterval, StateId::OdorPeriod, StateId::Consummatory] {
        assert!(phases_with_licks.contains(&phase), "no lick logged in {phase}");
    }
}

#[test]
fn lick_bounce_inside_refractory_window_is_rejected() {
    let (mut app, mut hw, mut sink) = booted(FAST);
    for (dt, level) in [(10, true), (10, false), (10, true), (10, false), (60, true)] {
        hw.advance(dt);
        hw.touched = level;
        app.tick(&mut hw, &mut sink);
    }
    assert_eq!(app.lick_count(), 2);
    assert_eq!(sink.lines, ["DATA:7,10", "DATA:7,100"]);
}

#[test]
fn outputs_always_match_phase_policy() {
    let (mut app, mut hw, mut sink) = booted(FAST);
    send(&mut app, &mut hw, &mut sink, "SEQUENCE:1,2,1,2");
    send(&mut app, &mut hw, &mut sink, "START");
    for _ in 0..10_000 {
        hw.advance(7);
        app.tick(&mut hw, &mut sink);
        let policy = policy_for(app.state());
        assert!(!hw.odor || policy.odor, "odor open in {}", app.state());
        assert!(!hw.reward || policy.reward, "reward open in {}", app.state());
        if app.state() == StateId::Idle {
            break;
        }
    }
    assert_eq!(app.state(), StateId::Idle);
    assert_eq!(sink.count_prefix("SAFETY:"), 0);
}

#[test]
fn status_reports_progress_mid_session() {
    let (mut app, mut hw, mut sink) = booted(FAST);
    send(&mut app, &mut hw, &mut sink, "SEQUENCE:1,2");
    send(&mut app, &mut hw, &mut sink, "START");
    run_until(&mut app, &mut hw, &mut sink, StateId::TrialOff, 10, 1_000);
    run_until(&mut app, &mut hw, &mut sink, StateId::OdorPeriod, 10, 1_000);
    sink.clear();

    send(&mut app, &mut hw, &mut sink, "STATUS");
    assert_eq!(
        sink.lines,
        ["STATUS:STATE=ODOR,TRIAL=1/2,TYPE=CS-,ODOR=ON,REWARD=OFF,LICKS=0,\
          ITI=100,INIT=100,ODOR_MS=100,TRACE=100,REWARD_MS=100,CONSUME=100"]
    );
}
