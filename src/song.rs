use dancejudge::error::ChartError;
use dancejudge::game::timeline::{Measure, StepChart};
use dancejudge::game::timing::TempoMap;
use log::info;
use serde::Deserialize;
use std::error::Error;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BpmChange {
    pub beat: f64,
    pub bpm: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartEntry {
    pub name: String,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub meter: u32,
    pub measures: Vec<Measure>,
}

impl ChartEntry {
    pub fn step_chart(&self) -> StepChart {
        StepChart::new(self.measures.clone())
    }
}

/// Demo song format: simfile header fields plus already-tokenized measures.
#[derive(Debug, Clone, Deserialize)]
pub struct SongFile {
    pub title: String,
    #[serde(default)]
    pub artist: String,
    /// Seconds added to the music position before mapping to beats.
    #[serde(default)]
    pub offset: f64,
    pub bpms: Vec<BpmChange>,
    pub charts: Vec<ChartEntry>,
}

impl SongFile {
    pub fn load(path: &Path) -> Result<Self, Box<dyn Error>> {
        let text = fs::read_to_string(path)?;
        let song: SongFile = serde_json::from_str(&text)?;
        info!(
            "Loaded '{}' by '{}' with {} chart(s).",
            song.title,
            song.artist,
            song.charts.len()
        );
        Ok(song)
    }

    pub fn tempo_map(&self) -> Result<TempoMap, ChartError> {
        let changes: Vec<(f64, f64)> = self.bpms.iter().map(|c| (c.beat, c.bpm)).collect();
        TempoMap::from_beat_changes(&changes)
    }

    /// Chart by name or difficulty, case-insensitive. `None` picks the first.
    pub fn chart(&self, wanted: Option<&str>) -> Option<&ChartEntry> {
        match wanted {
            None => self.charts.first(),
            Some(wanted) => self.charts.iter().find(|c| {
                c.name.eq_ignore_ascii_case(wanted) || c.difficulty.eq_ignore_ascii_case(wanted)
            }),
        }
    }
}
