use crate::game::note::Precision;

pub const METER_MIN: f64 = 0.0;
pub const METER_MAX: f64 = 100.0;

/// Meter deltas per grade. Almost/Missed penalties have varied a lot between
/// game revisions, so all of these come from config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeterChanges {
    pub initial: f64,
    pub perfect: f64,
    pub great: f64,
    pub good: f64,
    pub almost: f64,
    pub missed: f64,
}

impl Default for MeterChanges {
    fn default() -> Self {
        Self {
            initial: 50.0,
            perfect: 2.0,
            great: 1.0,
            good: 1.0,
            almost: -5.0,
            missed: -10.0,
        }
    }
}

impl MeterChanges {
    /// A completed hold gives back its length in beats.
    pub fn delta_for(&self, precision: Precision, hold_length_beats: f64) -> f64 {
        match precision {
            Precision::Perfect => self.perfect,
            Precision::Great => self.great,
            Precision::Good => self.good,
            Precision::Almost => self.almost,
            Precision::Missed => self.missed,
            Precision::Ok => hold_length_beats,
        }
    }
}

/// The 0..=100 health bar. In training mode it is pinned at the ceiling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceMeter {
    value: f64,
    frozen: bool,
}

impl PerformanceMeter {
    pub fn new(initial: f64, training_mode: bool) -> Self {
        let value = if training_mode {
            METER_MAX
        } else {
            initial.clamp(METER_MIN, METER_MAX)
        };
        Self {
            value,
            frozen: training_mode,
        }
    }

    /// Applies `delta` and returns the change that actually landed after clamping.
    pub fn apply(&mut self, delta: f64) -> f64 {
        if self.frozen {
            return 0.0;
        }
        let before = self.value;
        self.value = (self.value + delta).clamp(METER_MIN, METER_MAX);
        self.value - before
    }

    #[inline(always)]
    pub fn value(&self) -> f64 {
        self.value
    }

    #[inline(always)]
    pub fn is_depleted(&self) -> bool {
        self.value <= METER_MIN
    }
}
