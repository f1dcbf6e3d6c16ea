use crate::game::gameplay::Outcome;
use crate::game::note::{Arrow, ArrowKind, Precision};
use chrono::{DateTime, Local};
use log::info;
use serde::Serialize;
use std::collections::HashMap;

pub const DEFAULT_MAX_SCORE: f64 = 1_000_000.0;
/// Point units a hold earns per beat of length; a tap is one unit.
pub const DEFAULT_HOLD_BEAT_WEIGHT: f64 = 1.0;

/// Full-credit points for every arrow, fixed at round start. The budget is
/// split so a flawless clear always adds up to `max_score`, whatever the
/// chart density.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreWeights {
    per_arrow: Vec<f64>,
    max_score: f64,
}

impl ScoreWeights {
    pub fn compute(arrows: &[Arrow], max_score: f64, hold_beat_weight: f64) -> Self {
        let units: Vec<f64> = arrows
            .iter()
            .map(|arrow| match arrow.kind {
                ArrowKind::Tap | ArrowKind::Roll => 1.0,
                ArrowKind::Hold => arrow.length_beats() * hold_beat_weight.max(0.0),
            })
            .collect();
        let mut total_units: f64 = units.iter().sum();
        // With nothing weighted (zero hold weight, zero-length holds) every arrow counts once.
        let units = if total_units > 0.0 {
            units
        } else {
            total_units = arrows.len() as f64;
            vec![1.0; arrows.len()]
        };
        let per_unit = if total_units > 0.0 {
            max_score / total_units
        } else {
            0.0
        };
        Self {
            per_arrow: units.into_iter().map(|u| u * per_unit).collect(),
            max_score,
        }
    }

    #[inline(always)]
    pub fn weight(&self, index: usize) -> f64 {
        self.per_arrow.get(index).copied().unwrap_or(0.0)
    }

    pub fn max_score(&self) -> f64 {
        self.max_score
    }

    /// Points earned by resolving arrow `index` with `precision`.
    pub fn points_for(&self, index: usize, precision: Precision) -> f64 {
        self.weight(index) * precision.score_ratio()
    }
}

pub fn empty_counts() -> HashMap<Precision, u32> {
    Precision::ALL.iter().map(|p| (*p, 0)).collect()
}

/// Handed to the statistics sink once a round is over.
#[derive(Debug, Clone, Serialize)]
pub struct RoundSummary {
    pub player: String,
    pub chart: String,
    pub outcome: Outcome,
    pub score: f64,
    pub max_score: f64,
    pub max_combo: u32,
    pub counts: HashMap<Precision, u32>,
    pub training_mode: bool,
    pub finished_at: DateTime<Local>,
}

impl RoundSummary {
    /// Score as a fraction of the maximum, 0.0..=1.0.
    pub fn score_percent(&self) -> f64 {
        if self.max_score <= 0.0 {
            return 0.0;
        }
        (self.score / self.max_score).clamp(0.0, 1.0)
    }

    pub fn count(&self, precision: Precision) -> u32 {
        self.counts.get(&precision).copied().unwrap_or(0)
    }
}

/// External statistics collaborator. Called once per finished round.
pub trait StatsSink {
    fn record_round(&mut self, summary: &RoundSummary);
}

impl StatsSink for Vec<RoundSummary> {
    fn record_round(&mut self, summary: &RoundSummary) {
        self.push(summary.clone());
    }
}

/// Sink that only writes the result to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl StatsSink for LogSink {
    fn record_round(&mut self, summary: &RoundSummary) {
        info!(
            "Round over for '{}' on '{}': {:?}, score {:.0} ({:.2}%), max combo {}, P/G/G/A/M/OK = {}/{}/{}/{}/{}/{}",
            summary.player,
            summary.chart,
            summary.outcome,
            summary.score,
            summary.score_percent() * 100.0,
            summary.max_combo,
            summary.count(Precision::Perfect),
            summary.count(Precision::Great),
            summary.count(Precision::Good),
            summary.count(Precision::Almost),
            summary.count(Precision::Missed),
            summary.count(Precision::Ok),
        );
    }
}
