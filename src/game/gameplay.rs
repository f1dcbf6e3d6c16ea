use crate::core::input::{DancePad, InputSnapshot, PadState};
use crate::error::ChartError;
use crate::game::judgment::{self, ComboPolicy, MAX_MISSED_FRAME_HOLD, TOLERANCE_WINDOW_SECONDS};
use crate::game::life::{MeterChanges, PerformanceMeter};
use crate::game::note::{Arrow, ArrowKind, Direction, Precision};
use crate::game::scores::{self, RoundSummary, ScoreWeights, DEFAULT_HOLD_BEAT_WEIGHT, DEFAULT_MAX_SCORE};
use crate::game::timeline::{StepChart, StepTimeline};
use crate::game::timing::{TempoCursor, TempoMap};
use chrono::Local;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Outcome {
    InProgress,
    Failed,
    Finished,
}

/// Tunables for one round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JudgeSettings {
    pub tolerance_seconds: f64,
    pub max_missed_hold_frames: u32,
    pub max_score: f64,
    pub hold_beat_weight: f64,
    pub meter: MeterChanges,
    pub combo: ComboPolicy,
    pub training_mode: bool,
}

impl Default for JudgeSettings {
    fn default() -> Self {
        Self {
            tolerance_seconds: TOLERANCE_WINDOW_SECONDS,
            max_missed_hold_frames: MAX_MISSED_FRAME_HOLD,
            max_score: DEFAULT_MAX_SCORE,
            hold_beat_weight: DEFAULT_HOLD_BEAT_WEIGHT,
            meter: MeterChanges::default(),
            combo: ComboPolicy::default(),
            training_mode: false,
        }
    }
}

/// Things the presentation layer reacts to. Queued during `tick` and
/// drained by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundEvent {
    Judged {
        arrow: usize,
        direction: Direction,
        precision: Precision,
        /// Positive when late, in beats.
        beat_error: f64,
    },
    HoldStarted {
        arrow: usize,
        direction: Direction,
        precision: Precision,
    },
    InputLost,
    InputRestored,
    Failed,
    Finished,
}

/// One player's round: judges a step timeline against a dance pad, one
/// `tick` per frame, until the chart is cleared or the meter runs out.
pub struct Round {
    player: String,
    chart_name: String,
    tempo: Arc<TempoMap>,
    tempo_cursor: TempoCursor,
    timeline: StepTimeline,
    pad: Box<dyn DancePad>,
    settings: JudgeSettings,
    weights: ScoreWeights,

    meter: PerformanceMeter,
    score: f64,
    cursor: usize,
    outcome: Outcome,
    current_beat: f64,
    tolerance: f64,
    combo: u32,
    max_combo: u32,
    counts: HashMap<Precision, u32>,
    events: Vec<RoundEvent>,
    pad_connected: bool,
    last_snapshot: InputSnapshot,
}

impl Round {
    pub fn new(
        player: impl Into<String>,
        chart_name: impl Into<String>,
        tempo: Arc<TempoMap>,
        mut timeline: StepTimeline,
        pad: Box<dyn DancePad>,
        settings: JudgeSettings,
    ) -> Self {
        for arrow in timeline.arrows_mut() {
            if let Some(hold) = arrow.hold.as_mut() {
                hold.missed_frame_budget = settings.max_missed_hold_frames;
            }
        }
        let weights =
            ScoreWeights::compute(timeline.arrows(), settings.max_score, settings.hold_beat_weight);
        let player = player.into();
        let chart_name = chart_name.into();
        info!(
            "Round ready for '{}' on '{}': {} arrows ({} holds, {} rolls){}.",
            player,
            chart_name,
            timeline.len(),
            timeline.count_kind(ArrowKind::Hold),
            timeline.count_kind(ArrowKind::Roll),
            if settings.training_mode {
                ", training mode"
            } else {
                ""
            }
        );
        let initial_tolerance = judgment::tolerance_beats(
            settings.tolerance_seconds,
            tempo.sections()[0].beats_per_second,
        );

        Self {
            player,
            chart_name,
            tempo,
            tempo_cursor: TempoCursor::default(),
            timeline,
            pad,
            settings,
            weights,
            meter: PerformanceMeter::new(settings.meter.initial, settings.training_mode),
            score: 0.0,
            cursor: 0,
            outcome: Outcome::InProgress,
            current_beat: 0.0,
            tolerance: initial_tolerance,
            combo: 0,
            max_combo: 0,
            counts: scores::empty_counts(),
            events: Vec::new(),
            pad_connected: true,
            last_snapshot: InputSnapshot::IDLE,
        }
    }

    /// Builds the timeline from a step matrix and starts a round on it.
    pub fn from_chart(
        player: impl Into<String>,
        chart_name: impl Into<String>,
        tempo: Arc<TempoMap>,
        chart: &StepChart,
        pad: Box<dyn DancePad>,
        settings: JudgeSettings,
    ) -> Result<Self, ChartError> {
        let timeline = StepTimeline::from_chart(chart)?;
        Ok(Self::new(player, chart_name, tempo, timeline, pad, settings))
    }

    /// Advances the round to `elapsed_seconds` of song time. Times must not
    /// decrease between calls. After the round is over this does nothing.
    pub fn tick(&mut self, elapsed_seconds: f64) -> Outcome {
        if self.outcome != Outcome::InProgress {
            return self.outcome;
        }

        let section = *self.tempo_cursor.section(&self.tempo, elapsed_seconds);
        self.current_beat = section.beat_at(elapsed_seconds);
        self.tolerance =
            judgment::tolerance_beats(self.settings.tolerance_seconds, section.beats_per_second);

        let mut snapshot = self.pad.poll();
        let connected = self.pad.is_connected();
        if connected != self.pad_connected {
            self.pad_connected = connected;
            if connected {
                info!("Input restored for '{}'.", self.player);
                self.events.push(RoundEvent::InputRestored);
            } else {
                warn!("Input lost for '{}'.", self.player);
                self.events.push(RoundEvent::InputLost);
            }
        }
        if !connected {
            snapshot = InputSnapshot::IDLE;
        }
        self.last_snapshot = snapshot;

        self.judge_window(&snapshot);

        let arrows = self.timeline.arrows();
        while self.cursor < arrows.len() && arrows[self.cursor].is_resolved() {
            self.cursor += 1;
        }
        if self.cursor >= arrows.len() {
            self.end(Outcome::Finished);
            return self.outcome;
        }

        if !self.settings.training_mode && self.meter.is_depleted() {
            self.end(Outcome::Failed);
        }
        self.outcome
    }

    fn end(&mut self, outcome: Outcome) {
        self.outcome = outcome;
        self.events.push(match outcome {
            Outcome::Failed => RoundEvent::Failed,
            _ => RoundEvent::Finished,
        });
        info!(
            "'{}' {} at beat {:.3} with score {:.0}.",
            self.player,
            if outcome == Outcome::Failed {
                "failed"
            } else {
                "finished"
            },
            self.current_beat,
            self.score
        );
    }

    /// Walks arrows from the cursor up to `current_beat + tolerance`.
    fn judge_window(&mut self, snapshot: &InputSnapshot) {
        let horizon = self.current_beat + self.tolerance;
        let targets = self.press_targets(snapshot, horizon);
        let mut index = self.cursor;
        while let Some(arrow) = self.timeline.get(index) {
            if arrow.beat_position >= horizon {
                break;
            }
            let (kind, resolved) = (arrow.kind, arrow.is_resolved());
            if !resolved {
                match kind {
                    ArrowKind::Tap | ArrowKind::Roll => self.judge_tap(index, snapshot, &targets),
                    ArrowKind::Hold => self.judge_hold(index, snapshot, &targets),
                }
            }
            index += 1;
        }
    }

    /// For each freshly pressed direction, the pending arrow closest to the
    /// current beat. A press judges at most that one arrow; ties go to the
    /// earlier arrow.
    fn press_targets(&self, snapshot: &InputSnapshot, horizon: f64) -> [Option<usize>; 4] {
        let mut targets: [Option<(usize, f64)>; 4] = [None; 4];
        let mut index = self.cursor;
        while let Some(arrow) = self.timeline.get(index) {
            if arrow.beat_position >= horizon {
                break;
            }
            let d = arrow.direction.index();
            let waiting = !arrow.is_resolved()
                && !arrow.is_being_held()
                && !judgment::is_expired(arrow.beat_position, self.current_beat, self.tolerance);
            if waiting && snapshot.state(arrow.direction) == PadState::JustPressed {
                let distance = (arrow.beat_position - self.current_beat).abs();
                if targets[d].is_none_or(|(_, best)| distance < best) {
                    targets[d] = Some((index, distance));
                }
            }
            index += 1;
        }
        targets.map(|t| t.map(|(index, _)| index))
    }

    fn judge_tap(&mut self, index: usize, snapshot: &InputSnapshot, targets: &[Option<usize>; 4]) {
        let arrow = &self.timeline.arrows()[index];
        let (beat, direction) = (arrow.beat_position, arrow.direction);

        if judgment::is_expired(beat, self.current_beat, self.tolerance) {
            self.resolve(index, Precision::Missed);
            return;
        }

        if snapshot.state(direction) == PadState::JustPressed
            && targets[direction.index()] == Some(index)
        {
            let precision = judgment::grade_press(beat, self.current_beat, self.tolerance);
            self.resolve(index, precision);
        }
    }

    fn judge_hold(&mut self, index: usize, snapshot: &InputSnapshot, targets: &[Option<usize>; 4]) {
        let current_beat = self.current_beat;
        let tolerance = self.tolerance;
        let max_budget = self.settings.max_missed_hold_frames;

        let arrow = &mut self.timeline.arrows_mut()[index];
        let (beat, direction) = (arrow.beat_position, arrow.direction);
        let end = arrow.beat_end.unwrap_or(beat);
        let state = snapshot.state(direction);
        let Some(hold) = arrow.hold.as_mut() else {
            return;
        };

        if !hold.is_being_held {
            if judgment::is_expired(beat, current_beat, tolerance) {
                self.resolve(index, Precision::Missed);
                return;
            }
            let picks_up = match state {
                PadState::JustPressed => targets[direction.index()] == Some(index),
                PadState::Held => true,
                PadState::Idle => false,
            };
            if !picks_up {
                return;
            }
            let precision = judgment::grade_press(beat, current_beat, tolerance);
            hold.is_being_held = true;
            hold.head = Some(precision);
            hold.missed_frame_budget = max_budget;
            debug!(
                "HOLD START: beat {:.3}, {:?}, {:?}, error {:+.3} beats",
                beat,
                direction,
                precision,
                current_beat - beat
            );
            self.events.push(RoundEvent::HoldStarted {
                arrow: index,
                direction,
                precision,
            });
            return;
        }

        // A re-press mid-hold is still contact; only a released panel spends budget.
        if current_beat > end {
            self.resolve(index, Precision::Ok);
        } else if state == PadState::Idle {
            hold.missed_frame_budget = hold.missed_frame_budget.saturating_sub(1);
            if hold.missed_frame_budget == 0 {
                self.resolve(index, Precision::Missed);
            }
        } else if hold.missed_frame_budget < max_budget {
            hold.missed_frame_budget += 1;
        }
    }

    fn resolve(&mut self, index: usize, precision: Precision) {
        let arrow = &mut self.timeline.arrows_mut()[index];
        if !arrow.resolve(precision) {
            return;
        }
        let (beat, direction, length) =
            (arrow.beat_position, arrow.direction, arrow.length_beats());

        let points = self.weights.points_for(index, precision);
        self.score += points;
        self.meter
            .apply(self.settings.meter.delta_for(precision, length));
        *self.counts.entry(precision).or_insert(0) += 1;

        if self.settings.combo.breaks_combo(precision) {
            self.combo = 0;
        } else if self.settings.combo.extends_combo(precision) {
            self.combo += 1;
            self.max_combo = self.max_combo.max(self.combo);
        }

        let beat_error = self.current_beat - beat;
        debug!(
            "JUDGED: beat {:.3}, {:?}, {:?}, error {:+.3} beats, +{:.1} pts, meter {:.1}",
            beat,
            direction,
            precision,
            beat_error,
            points,
            self.meter.value()
        );
        self.events.push(RoundEvent::Judged {
            arrow: index,
            direction,
            precision,
            beat_error,
        });
    }

    /// Takes the events queued since the last drain.
    pub fn drain_events(&mut self) -> Vec<RoundEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn pending_events(&self) -> &[RoundEvent] {
        &self.events
    }

    /// Arrows worth drawing: everything between `beats_behind` before and
    /// `beats_ahead` after the current beat, plus any still-unresolved arrow
    /// (an active hold, a late tap) regardless of how far back it starts.
    pub fn visible_arrows(
        &self,
        beats_behind: f64,
        beats_ahead: f64,
    ) -> impl Iterator<Item = (usize, &Arrow)> + '_ {
        let arrows = self.timeline.arrows();
        let floor = self.current_beat - beats_behind;
        let ceiling = self.current_beat + beats_ahead;
        let start = self
            .cursor
            .min(arrows.partition_point(|a| a.beat_position < floor));
        let end = arrows
            .partition_point(|a| a.beat_position <= ceiling)
            .max(start);
        arrows[start..end]
            .iter()
            .enumerate()
            .map(move |(offset, arrow)| (start + offset, arrow))
            .filter(move |(_, arrow)| !arrow.is_resolved() || arrow.last_beat() >= floor)
    }

    pub fn summary(&self) -> RoundSummary {
        RoundSummary {
            player: self.player.clone(),
            chart: self.chart_name.clone(),
            outcome: self.outcome,
            score: self.score,
            max_score: self.weights.max_score(),
            max_combo: self.max_combo,
            counts: self.counts.clone(),
            training_mode: self.settings.training_mode,
            finished_at: Local::now(),
        }
    }

    pub fn player(&self) -> &str {
        &self.player
    }

    pub fn chart_name(&self) -> &str {
        &self.chart_name
    }

    pub fn tempo(&self) -> &TempoMap {
        &self.tempo
    }

    pub fn timeline(&self) -> &StepTimeline {
        &self.timeline
    }

    pub fn settings(&self) -> &JudgeSettings {
        &self.settings
    }

    pub fn current_beat(&self) -> f64 {
        self.current_beat
    }

    /// Tolerance in beats at the tempo of the last tick.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn performance_meter(&self) -> f64 {
        self.meter.value()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn is_training(&self) -> bool {
        self.settings.training_mode
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn max_combo(&self) -> u32 {
        self.max_combo
    }

    pub fn count(&self, precision: Precision) -> u32 {
        self.counts.get(&precision).copied().unwrap_or(0)
    }

    pub fn is_pad_connected(&self) -> bool {
        self.pad_connected
    }

    pub fn last_snapshot(&self) -> InputSnapshot {
        self.last_snapshot
    }
}
