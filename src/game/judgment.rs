use crate::game::note::Precision;

/// Acceptance window, in seconds, on either side of an arrow.
pub const TOLERANCE_WINDOW_SECONDS: f64 = 0.2;

/// Frames a hold may go without a `Held` reading before it is dropped.
/// Frame-count based on purpose: polling can miss a single frame of contact.
pub const MAX_MISSED_FRAME_HOLD: u32 = 2;

pub const PERFECT_RATIO: f64 = 0.25;
pub const GREAT_RATIO: f64 = 0.50;
pub const GOOD_RATIO: f64 = 1.00;
/// Past this many tolerances an untouched arrow is missed.
pub const EXPIRY_RATIO: f64 = 2.0;

/// Tolerance in beats at the given tempo. Constant in wall-clock time, so
/// faster songs get a narrower beat window.
#[inline(always)]
pub fn tolerance_beats(tolerance_seconds: f64, beats_per_second: f64) -> f64 {
    tolerance_seconds * beats_per_second
}

#[inline(always)]
pub fn is_expired(beat_position: f64, current_beat: f64, tolerance: f64) -> bool {
    current_beat > beat_position + EXPIRY_RATIO * tolerance
}

/// Grades a press at `current_beat` against an arrow at `beat_position`.
/// Thresholds are checked strictest first, so a press sitting exactly on a
/// boundary gets the better grade.
pub fn grade_press(beat_position: f64, current_beat: f64, tolerance: f64) -> Precision {
    let delta = (beat_position - current_beat).abs();
    if delta <= PERFECT_RATIO * tolerance {
        Precision::Perfect
    } else if delta <= GREAT_RATIO * tolerance {
        Precision::Great
    } else if delta <= GOOD_RATIO * tolerance {
        Precision::Good
    } else {
        Precision::Almost
    }
}

/// Which grades reset the combo counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComboPolicy {
    pub almost_breaks_combo: bool,
}

impl Default for ComboPolicy {
    fn default() -> Self {
        Self {
            almost_breaks_combo: true,
        }
    }
}

impl ComboPolicy {
    pub fn breaks_combo(&self, precision: Precision) -> bool {
        match precision {
            Precision::Missed => true,
            Precision::Almost => self.almost_breaks_combo,
            Precision::Perfect | Precision::Great | Precision::Good | Precision::Ok => false,
        }
    }

    /// Grades that add one to the combo. An Almost that does not break the
    /// combo leaves it where it was.
    pub fn extends_combo(&self, precision: Precision) -> bool {
        matches!(
            precision,
            Precision::Perfect | Precision::Great | Precision::Good | Precision::Ok
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grades_by_distance() {
        let tol = 0.2;
        assert_eq!(grade_press(4.0, 4.0, tol), Precision::Perfect);
        assert_eq!(grade_press(4.0, 3.96, tol), Precision::Perfect);
        assert_eq!(grade_press(4.0, 4.09, tol), Precision::Great);
        assert_eq!(grade_press(4.0, 3.85, tol), Precision::Good);
        assert_eq!(grade_press(4.0, 4.3, tol), Precision::Almost);
    }

    #[test]
    fn boundary_favors_better_grade() {
        // Powers of two keep the boundaries exact.
        let tol = 0.5;
        assert_eq!(grade_press(8.0, 8.125, tol), Precision::Perfect);
        assert_eq!(grade_press(8.0, 8.25, tol), Precision::Great);
        assert_eq!(grade_press(8.0, 7.5, tol), Precision::Good);
    }

    #[test]
    fn expiry_is_two_tolerances_late() {
        assert!(!is_expired(4.0, 4.375, 0.25));
        assert!(!is_expired(4.0, 4.5, 0.25));
        assert!(is_expired(4.0, 4.5001, 0.25));
    }

    #[test]
    fn tolerance_scales_with_tempo() {
        assert_eq!(tolerance_beats(0.2, 1.0), 0.2);
        assert_eq!(tolerance_beats(0.25, 4.0), 1.0);
    }

    #[test]
    fn combo_policy_is_explicit() {
        let strict = ComboPolicy::default();
        let lenient = ComboPolicy {
            almost_breaks_combo: false,
        };
        assert!(strict.breaks_combo(Precision::Almost));
        assert!(!lenient.breaks_combo(Precision::Almost));
        assert!(strict.breaks_combo(Precision::Missed));
        assert!(lenient.breaks_combo(Precision::Missed));
        assert!(!strict.breaks_combo(Precision::Good));
        assert!(!strict.breaks_combo(Precision::Ok));
    }
}
