use dancejudge::core::input::{DancePad, InputSnapshot, KeyboardPad};
use dancejudge::game::gameplay::{JudgeSettings, Outcome, Round, RoundEvent};
use dancejudge::game::note::{Arrow, ArrowKind, Direction, Precision};
use dancejudge::game::scores::DEFAULT_MAX_SCORE;
use dancejudge::game::timeline::{Measure, StepChart, StepTimeline};
use dancejudge::game::timing::TempoMap;
use proptest::prelude::*;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

/// Keyboard pad the test keeps a handle to after the round takes ownership.
#[derive(Clone)]
struct Keys(Rc<RefCell<KeyboardPad<char>>>);

impl Keys {
    fn new() -> Self {
        Self(Rc::new(RefCell::new(KeyboardPad::new(HashMap::from([
            ('a', Direction::Left),
            ('s', Direction::Down),
            ('w', Direction::Up),
            ('d', Direction::Right),
        ])))))
    }

    fn down(&self, key: char) {
        self.0.borrow_mut().key_down(key);
    }

    fn up(&self, key: char) {
        self.0.borrow_mut().key_up(key);
    }
}

impl DancePad for Keys {
    fn poll(&mut self) -> InputSnapshot {
        self.0.borrow_mut().poll()
    }
}

const FRAME: f64 = 0.05;

// 60 BPM with a 0.2 s window gives a 0.2 beat tolerance, and beats read as seconds.
fn one_beat_per_second() -> Arc<TempoMap> {
    Arc::new(TempoMap::from_time_changes(&[(0.0, 60.0)]).unwrap())
}

fn round(arrows: Vec<Arrow>, settings: JudgeSettings) -> (Round, Keys) {
    let keys = Keys::new();
    let timeline = StepTimeline::from_arrows(arrows).unwrap();
    let round = Round::new(
        "P1",
        "Scenario",
        one_beat_per_second(),
        timeline,
        Box::new(keys.clone()),
        settings,
    );
    (round, keys)
}

/// Ticks on a fixed frame grid from `from` up to and including `to`.
fn run(round: &mut Round, from: f64, to: f64) {
    let first = (from / FRAME).round() as i64;
    let last = (to / FRAME).round() as i64;
    for frame in first..=last {
        round.tick(frame as f64 * FRAME);
    }
}

fn tap_at_four() -> Vec<Arrow> {
    vec![Arrow::tap(Direction::Left, 4.0), Arrow::tap(Direction::Right, 10.0)]
}

#[test]
fn scenario_a_press_on_the_beat_is_perfect() {
    let (mut round, keys) = round(tap_at_four(), JudgeSettings::default());
    run(&mut round, 0.0, 3.95);
    keys.down('a');
    round.tick(4.0);
    assert!((round.tolerance() - 0.2).abs() < 1e-9);
    assert_eq!(round.timeline().arrows()[0].precision(), Some(Precision::Perfect));
    assert_eq!(round.performance_meter(), 52.0);
    assert_eq!(round.combo(), 1);
}

#[test]
fn scenario_b_press_just_inside_great_window() {
    let (mut round, keys) = round(tap_at_four(), JudgeSettings::default());
    run(&mut round, 0.0, 4.05);
    keys.down('a');
    round.tick(4.09);
    assert_eq!(round.timeline().arrows()[0].precision(), Some(Precision::Great));
    let weight = DEFAULT_MAX_SCORE / 2.0;
    assert!((round.score() - 0.8 * weight).abs() < 1e-6);
}

#[test]
fn scenario_c_untouched_arrow_is_missed_and_breaks_combo() {
    let mut arrows = vec![Arrow::tap(Direction::Up, 2.0)];
    arrows.extend(tap_at_four());
    let (mut round, keys) = round(arrows, JudgeSettings::default());
    run(&mut round, 0.0, 1.95);
    keys.down('w');
    round.tick(2.0);
    keys.up('w');
    assert_eq!(round.combo(), 1);
    let meter_before = round.performance_meter();

    run(&mut round, 2.05, 4.35);
    assert!(!round.timeline().arrows()[1].is_resolved());
    round.tick(4.45);
    assert_eq!(round.timeline().arrows()[1].precision(), Some(Precision::Missed));
    assert!(round.performance_meter() < meter_before);
    assert_eq!(round.combo(), 0);
    assert_eq!(round.max_combo(), 1);
}

#[test]
fn press_between_two_taps_judges_the_nearer_one() {
    let arrows = vec![Arrow::tap(Direction::Left, 4.0), Arrow::tap(Direction::Left, 4.25)];
    let (mut round, keys) = round(arrows, JudgeSettings::default());
    run(&mut round, 0.0, 4.2);
    keys.down('a');
    round.tick(4.25);
    keys.up('a');
    assert_eq!(round.timeline().arrows()[1].precision(), Some(Precision::Perfect));
    assert_eq!(round.timeline().arrows()[0].precision(), None);

    run(&mut round, 4.3, 4.6);
    assert_eq!(round.timeline().arrows()[0].precision(), Some(Precision::Missed));
    assert_eq!(round.outcome(), Outcome::Finished);
}

#[test]
fn scenario_d_hold_held_through_its_end_is_ok() {
    let arrows = vec![
        Arrow::new(Direction::Down, ArrowKind::Hold, 6.0, Some(8.0)),
        Arrow::tap(Direction::Up, 12.0),
    ];
    let (mut round, keys) = round(arrows, JudgeSettings::default());
    run(&mut round, 0.0, 5.95);
    keys.down('s');
    round.tick(6.0);
    assert!(round.timeline().arrows()[0].is_being_held());

    run(&mut round, 6.05, 8.0);
    assert!(!round.timeline().arrows()[0].is_resolved());
    round.tick(8.05);
    assert_eq!(round.timeline().arrows()[0].precision(), Some(Precision::Ok));
    // Two beats of hold against one tap unit.
    assert!((round.score() - DEFAULT_MAX_SCORE * 2.0 / 3.0).abs() < 1e-6);
    assert_eq!(round.performance_meter(), 52.0);

    let events = round.drain_events();
    assert!(matches!(
        events.first(),
        Some(RoundEvent::HoldStarted {
            precision: Precision::Perfect,
            ..
        })
    ));
    assert!(events.iter().any(|e| matches!(
        e,
        RoundEvent::Judged {
            arrow: 0,
            precision: Precision::Ok,
            ..
        }
    )));
}

#[test]
fn scenario_e_training_mode_never_fails() {
    let arrows: Vec<Arrow> = (1..=20)
        .map(|i| Arrow::tap(Direction::ALL[i % 4], i as f64))
        .collect();
    let settings = JudgeSettings {
        training_mode: true,
        ..JudgeSettings::default()
    };
    let (mut round, _keys) = round(arrows, settings);
    run(&mut round, 0.0, 15.0);
    assert!(round.count(Precision::Missed) >= 10);
    assert_eq!(round.performance_meter(), 100.0);
    assert_eq!(round.outcome(), Outcome::InProgress);

    run(&mut round, 15.05, 21.0);
    assert_eq!(round.count(Precision::Missed), 20);
    assert_eq!(round.outcome(), Outcome::Finished);
}

#[test]
fn terminal_state_is_frozen() {
    let arrows: Vec<Arrow> = (1..=12)
        .map(|i| Arrow::tap(Direction::Left, i as f64))
        .collect();
    let (mut round, keys) = round(arrows, JudgeSettings::default());
    run(&mut round, 0.0, 6.0);
    assert_eq!(round.outcome(), Outcome::Failed);
    round.drain_events();

    let (score, meter, cursor) = (round.score(), round.performance_meter(), round.cursor());
    keys.down('a');
    for t in [7.0, 9.0, 11.0, 20.0] {
        assert_eq!(round.tick(t), Outcome::Failed);
    }
    assert_eq!(round.score(), score);
    assert_eq!(round.performance_meter(), meter);
    assert_eq!(round.cursor(), cursor);
    assert!(round.drain_events().is_empty());
}

#[test]
fn chart_round_trip_through_the_matrix() {
    let chart = StepChart::new(vec![
        Measure::new(vec![vec![1, 0, 0, 0], vec![0, 2, 0, 0], vec![0, 0, 0, 0], vec![0, 3, 0, 0]]),
        Measure::default(),
        Measure::new(vec![vec![0, 0, 0, 1], vec![0, 0, 5, 0]]),
    ]);
    let keys = Keys::new();
    let mut round = Round::from_chart(
        "P1",
        "Matrix",
        one_beat_per_second(),
        &chart,
        Box::new(keys.clone()),
        JudgeSettings::default(),
    )
    .unwrap();
    let beats: Vec<f64> = round.timeline().arrows().iter().map(|a| a.beat_position).collect();
    assert_eq!(beats, vec![0.0, 1.0, 8.0]);

    keys.down('a');
    round.tick(0.0);
    keys.up('a');
    run(&mut round, 0.05, 0.95);
    keys.down('s');
    run(&mut round, 1.0, 3.05);
    keys.up('s');
    run(&mut round, 3.1, 7.95);
    keys.down('d');
    run(&mut round, 8.0, 8.0);
    assert_eq!(round.outcome(), Outcome::Finished);
    assert!((round.score() - DEFAULT_MAX_SCORE).abs() < 1e-6);
}

proptest! {
    #[test]
    fn every_tap_resolves_once_its_window_passes(
        beats in prop::collection::vec(0.0f64..30.0, 1..40),
        presses in prop::collection::vec((0usize..4, 0.0f64..32.0), 0..60),
    ) {
        let mut beats = beats;
        beats.sort_by(f64::total_cmp);
        let arrows: Vec<Arrow> = beats
            .iter()
            .enumerate()
            .map(|(i, &b)| Arrow::tap(Direction::ALL[i % 4], b))
            .collect();
        let settings = JudgeSettings { training_mode: true, ..JudgeSettings::default() };
        let (mut round, keys) = round(arrows, settings);

        let mut presses = presses;
        presses.sort_by(|a, b| a.1.total_cmp(&b.1));
        let keymap = ['a', 's', 'w', 'd'];
        let mut next = 0;
        for frame in 0..=((31.0 / FRAME) as i64) {
            let t = frame as f64 * FRAME;
            while next < presses.len() && presses[next].1 <= t {
                keys.down(keymap[presses[next].0]);
                keys.up(keymap[presses[next].0]);
                next += 1;
            }
            round.tick(t);
            for (i, arrow) in round.timeline().arrows().iter().enumerate() {
                if round.current_beat() > arrow.beat_position + 2.0 * round.tolerance() {
                    prop_assert!(arrow.is_resolved(), "arrow {} still pending", i);
                }
            }
        }
        prop_assert_eq!(round.outcome(), Outcome::Finished);
        let judged: u32 = Precision::ALL.iter().map(|p| round.count(*p)).sum();
        prop_assert_eq!(judged as usize, beats.len());
    }
}
