use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    Left = 0,
    Down = 1,
    Up = 2,
    Right = 3,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Left,
        Direction::Down,
        Direction::Up,
        Direction::Right,
    ];

    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn from_column(column: usize) -> Option<Self> {
        match column {
            0 => Some(Direction::Left),
            1 => Some(Direction::Down),
            2 => Some(Direction::Up),
            3 => Some(Direction::Right),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "left" => Some(Direction::Left),
            "down" => Some(Direction::Down),
            "up" => Some(Direction::Up),
            "right" => Some(Direction::Right),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ArrowKind {
    Tap,
    Hold,
    Roll,
}

impl ArrowKind {
    /// Holds and rolls carry an end beat.
    #[inline(always)]
    pub const fn is_sustained(self) -> bool {
        matches!(self, ArrowKind::Hold | ArrowKind::Roll)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Precision {
    Perfect,
    Great,
    Good,
    Almost,
    Missed,
    /// A hold survived its whole duration.
    Ok,
}

impl Precision {
    pub const ALL: [Precision; 6] = [
        Precision::Perfect,
        Precision::Great,
        Precision::Good,
        Precision::Almost,
        Precision::Missed,
        Precision::Ok,
    ];

    /// Fraction of an arrow's point weight awarded for this grade.
    pub const fn score_ratio(self) -> f64 {
        match self {
            Precision::Perfect | Precision::Ok => 1.0,
            Precision::Great => 0.8,
            Precision::Good => 0.6,
            Precision::Almost => 0.2,
            Precision::Missed => 0.0,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Judgement {
    Pending,
    Resolved(Precision),
}

/// Beat quantization color, used by noteskins only.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArrowColor {
    Orange,
    Blue,
    Yellow,
    Violet,
}

const QUANT_EPSILON: f64 = 1e-6;

impl ArrowColor {
    pub fn for_beat(beat: f64) -> Self {
        let on_grid = |step: f64| {
            let ratio = beat / step;
            (ratio - ratio.round()).abs() < QUANT_EPSILON
        };
        if on_grid(1.0) {
            ArrowColor::Orange
        } else if on_grid(0.5) {
            ArrowColor::Blue
        } else if on_grid(0.25) {
            ArrowColor::Yellow
        } else {
            ArrowColor::Violet
        }
    }
}

/// Sustained-press tracking for holds that have been picked up.
#[derive(Clone, Debug, PartialEq)]
pub struct HoldProgress {
    pub is_being_held: bool,
    pub missed_frame_budget: u32,
    /// Grade of the press that started the hold, if it was started.
    pub head: Option<Precision>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Arrow {
    pub direction: Direction,
    pub kind: ArrowKind,
    pub beat_position: f64,
    pub beat_end: Option<f64>,
    pub color: ArrowColor,
    pub judgement: Judgement,
    pub hold: Option<HoldProgress>,
}

impl Arrow {
    pub fn tap(direction: Direction, beat_position: f64) -> Self {
        Self::new(direction, ArrowKind::Tap, beat_position, None)
    }

    pub fn new(
        direction: Direction,
        kind: ArrowKind,
        beat_position: f64,
        beat_end: Option<f64>,
    ) -> Self {
        let hold = (kind == ArrowKind::Hold).then(|| HoldProgress {
            is_being_held: false,
            missed_frame_budget: crate::game::judgment::MAX_MISSED_FRAME_HOLD,
            head: None,
        });
        Self {
            direction,
            kind,
            beat_position,
            beat_end,
            color: ArrowColor::for_beat(beat_position),
            judgement: Judgement::Pending,
            hold,
        }
    }

    #[inline(always)]
    pub fn is_resolved(&self) -> bool {
        matches!(self.judgement, Judgement::Resolved(_))
    }

    pub fn precision(&self) -> Option<Precision> {
        match self.judgement {
            Judgement::Resolved(p) => Some(p),
            Judgement::Pending => None,
        }
    }

    /// Hold length in beats, zero for taps.
    pub fn length_beats(&self) -> f64 {
        self.beat_end
            .map_or(0.0, |end| (end - self.beat_position).max(0.0))
    }

    /// Last beat at which this arrow still matters on screen.
    pub fn last_beat(&self) -> f64 {
        self.beat_end.unwrap_or(self.beat_position)
    }

    pub fn is_being_held(&self) -> bool {
        self.hold.as_ref().is_some_and(|h| h.is_being_held)
    }

    /// Once resolved the judgement is final.
    pub(crate) fn resolve(&mut self, precision: Precision) -> bool {
        if self.is_resolved() {
            return false;
        }
        self.judgement = Judgement::Resolved(precision);
        if let Some(hold) = self.hold.as_mut() {
            hold.is_being_held = false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_follow_quantization() {
        assert_eq!(ArrowColor::for_beat(4.0), ArrowColor::Orange);
        assert_eq!(ArrowColor::for_beat(4.5), ArrowColor::Blue);
        assert_eq!(ArrowColor::for_beat(4.25), ArrowColor::Yellow);
        assert_eq!(ArrowColor::for_beat(4.75), ArrowColor::Yellow);
        assert_eq!(ArrowColor::for_beat(4.0 + 1.0 / 3.0), ArrowColor::Violet);
    }

    #[test]
    fn resolution_is_final() {
        let mut arrow = Arrow::tap(Direction::Up, 2.0);
        assert!(arrow.resolve(Precision::Great));
        assert!(!arrow.resolve(Precision::Missed));
        assert_eq!(arrow.precision(), Some(Precision::Great));
    }

    #[test]
    fn only_holds_track_sustain() {
        assert!(Arrow::tap(Direction::Left, 0.0).hold.is_none());
        assert!(Arrow::new(Direction::Left, ArrowKind::Roll, 0.0, Some(1.0)).hold.is_none());
        let hold = Arrow::new(Direction::Left, ArrowKind::Hold, 1.0, Some(3.5));
        assert_eq!(hold.length_beats(), 2.5);
        assert_eq!(hold.hold.as_ref().map(|h| h.missed_frame_budget), Some(2));
    }

    #[test]
    fn direction_lookup() {
        assert_eq!(Direction::from_column(2), Some(Direction::Up));
        assert_eq!(Direction::from_column(4), None);
        assert_eq!(Direction::from_name(" Right "), Some(Direction::Right));
    }
}
