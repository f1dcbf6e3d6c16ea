use crate::game::note::Direction;
use thiserror::Error;

/// Problems found while building a tempo map or step timeline. All of these
/// are fatal to the round that was about to start.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ChartError {
    #[error("Tempo change list is empty")]
    EmptyTempoList,

    #[error("Tempo change {index} has invalid BPM {bpm}")]
    InvalidBpm { index: usize, bpm: f64 },

    #[error("Tempo change {index} at {position} does not come after the previous change at {previous}")]
    TempoOutOfOrder {
        index: usize,
        position: f64,
        previous: f64,
    },

    #[error("Tempo change {index} has a non-finite position")]
    InvalidTempoPosition { index: usize },

    #[error("Measure {measure}, row {row} has {width} columns (expected 4)")]
    RowWidth {
        measure: usize,
        row: usize,
        width: usize,
    },

    #[error("Measure {measure}, row {row}, column {column}: unknown step code {code}")]
    UnknownCode {
        measure: usize,
        row: usize,
        column: usize,
        code: u8,
    },

    #[error("Hold end on {direction:?} at beat {beat} without an open hold")]
    UnmatchedHoldEnd { direction: Direction, beat: f64 },

    #[error("Hold on {direction:?} at beat {beat} was never closed")]
    UnclosedHold { direction: Direction, beat: f64 },

    #[error("Hold on {direction:?} at beat {beat} opened while the one at beat {open_beat} is still open")]
    OverlappingHold {
        direction: Direction,
        beat: f64,
        open_beat: f64,
    },

    #[error("Arrow {index} at beat {beat} comes before the previous arrow at beat {previous}")]
    ArrowsOutOfOrder {
        index: usize,
        beat: f64,
        previous: f64,
    },

    #[error("Sustained arrow {index} at beat {beat} has no valid end beat")]
    MissingHoldEnd { index: usize, beat: f64 },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(String),

    #[error("Invalid value for [{section}] {key}: {value}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
    },
}
