use crate::error::ChartError;
use log::info;

/// One constant-tempo stretch of the song.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoSection {
    pub time_start_sec: f64,
    pub beat_start: f64,
    pub beats_per_second: f64,
}

impl TempoSection {
    #[inline(always)]
    pub fn bpm(&self) -> f64 {
        self.beats_per_second * 60.0
    }

    #[inline(always)]
    pub fn beat_at(&self, elapsed_sec: f64) -> f64 {
        self.beat_start + (elapsed_sec - self.time_start_sec) * self.beats_per_second
    }

    #[inline(always)]
    fn time_at(&self, beat: f64) -> f64 {
        self.time_start_sec + (beat - self.beat_start) / self.beats_per_second
    }
}

/// Piecewise-linear mapping between elapsed playback seconds and beats.
/// Immutable once built; share it behind an `Arc` between rounds.
#[derive(Debug, Clone, PartialEq)]
pub struct TempoMap {
    sections: Vec<TempoSection>,
    max_bpm: f64,
}

fn validate_changes(changes: &[(f64, f64)]) -> Result<(), ChartError> {
    if changes.is_empty() {
        return Err(ChartError::EmptyTempoList);
    }
    let mut previous: Option<f64> = None;
    for (index, &(position, bpm)) in changes.iter().enumerate() {
        if !position.is_finite() {
            return Err(ChartError::InvalidTempoPosition { index });
        }
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(ChartError::InvalidBpm { index, bpm });
        }
        if let Some(previous) = previous {
            if position <= previous {
                return Err(ChartError::TempoOutOfOrder {
                    index,
                    position,
                    previous,
                });
            }
        }
        previous = Some(position);
    }
    Ok(())
}

impl TempoMap {
    /// Builds from `(seconds, bpm)` changes. Each section starts at the beat
    /// reached by the end of the previous one, so the mapping is continuous.
    pub fn from_time_changes(changes: &[(f64, f64)]) -> Result<Self, ChartError> {
        validate_changes(changes)?;

        let mut sections = Vec::with_capacity(changes.len());
        let mut beat_start = 0.0;
        let mut last: Option<TempoSection> = None;
        for &(time, bpm) in changes {
            if let Some(prev) = last {
                beat_start = prev.beat_at(time);
            }
            let section = TempoSection {
                time_start_sec: time,
                beat_start,
                beats_per_second: bpm / 60.0,
            };
            sections.push(section);
            last = Some(section);
        }
        Ok(Self::finish(sections))
    }

    /// Builds from `(beat, bpm)` changes as found in simfile `#BPMS` tags.
    /// Beat 0 falls at second 0; section start times are accumulated instead.
    pub fn from_beat_changes(changes: &[(f64, f64)]) -> Result<Self, ChartError> {
        validate_changes(changes)?;

        let mut sections = Vec::with_capacity(changes.len());
        let (first_beat, first_bpm) = changes[0];
        let mut current_time = first_beat / (first_bpm / 60.0);
        let mut last: Option<TempoSection> = None;
        for &(beat, bpm) in changes {
            if let Some(prev) = last {
                current_time = prev.time_at(beat);
            }
            let section = TempoSection {
                time_start_sec: current_time,
                beat_start: beat,
                beats_per_second: bpm / 60.0,
            };
            sections.push(section);
            last = Some(section);
        }
        Ok(Self::finish(sections))
    }

    fn finish(sections: Vec<TempoSection>) -> Self {
        let max_bpm = sections
            .iter()
            .map(TempoSection::bpm)
            .fold(0.0, f64::max);
        info!(
            "TempoMap built with {} section(s), max BPM {:.2}.",
            sections.len(),
            max_bpm
        );
        Self { sections, max_bpm }
    }

    pub fn sections(&self) -> &[TempoSection] {
        &self.sections
    }

    pub fn max_bpm(&self) -> f64 {
        self.max_bpm
    }

    /// Index of the section with the greatest start time not after
    /// `elapsed_sec`. Times before the first section use the first one.
    pub fn section_index_at(&self, elapsed_sec: f64) -> usize {
        self.sections
            .partition_point(|s| s.time_start_sec <= elapsed_sec)
            .saturating_sub(1)
    }

    pub fn section_at(&self, elapsed_sec: f64) -> &TempoSection {
        &self.sections[self.section_index_at(elapsed_sec)]
    }

    pub fn beat_at(&self, elapsed_sec: f64) -> f64 {
        self.section_at(elapsed_sec).beat_at(elapsed_sec)
    }

    pub fn beats_per_second_at(&self, elapsed_sec: f64) -> f64 {
        self.section_at(elapsed_sec).beats_per_second
    }

    pub fn bpm_at(&self, elapsed_sec: f64) -> f64 {
        self.section_at(elapsed_sec).bpm()
    }

    /// Inverse of [`TempoMap::beat_at`].
    pub fn time_at(&self, beat: f64) -> f64 {
        let idx = self
            .sections
            .partition_point(|s| s.beat_start <= beat)
            .saturating_sub(1);
        self.sections[idx].time_at(beat)
    }
}

/// Forward-only section lookup for a caller that feeds non-decreasing times.
#[derive(Debug, Clone, Copy, Default)]
pub struct TempoCursor {
    index: usize,
}

impl TempoCursor {
    pub fn section<'a>(&mut self, map: &'a TempoMap, elapsed_sec: f64) -> &'a TempoSection {
        let sections = map.sections();
        if self.index >= sections.len() || elapsed_sec < sections[self.index].time_start_sec {
            // Time went backwards (seek); fall back to a full lookup.
            self.index = map.section_index_at(elapsed_sec);
        } else {
            while self.index + 1 < sections.len()
                && sections[self.index + 1].time_start_sec <= elapsed_sec
            {
                self.index += 1;
            }
        }
        &sections[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }
}
