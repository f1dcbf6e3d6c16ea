use crate::error::ChartError;
use crate::game::note::{Arrow, ArrowKind, Direction};
use log::info;
use serde::{Deserialize, Serialize};

pub const BEATS_PER_MEASURE: f64 = 4.0;
pub const PANEL_COUNT: usize = 4;

const CODE_NONE: u8 = 0;
const CODE_TAP: u8 = 1;
const CODE_HOLD_HEAD: u8 = 2;
const CODE_TAIL: u8 = 3;
const CODE_ROLL_HEAD: u8 = 4;
// 5 mine, 6 minefield head, 7 fake, 8 hidden: kept by the chart, never judged.
const CODE_MAX_KNOWN: u8 = 8;

/// One measure of the step matrix: rows of per-panel codes, evenly spread
/// over the measure's four beats.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Measure {
    pub rows: Vec<Vec<u8>>,
}

impl Measure {
    pub fn new(rows: Vec<Vec<u8>>) -> Self {
        Self { rows }
    }
}

/// Structured step data for a single difficulty, as handed over by the chart source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepChart {
    pub measures: Vec<Measure>,
}

impl StepChart {
    pub fn new(measures: Vec<Measure>) -> Self {
        Self { measures }
    }
}

/// Arrows in non-decreasing beat order. The sequence is fixed after
/// construction; only the arrows' judgement state changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepTimeline {
    arrows: Vec<Arrow>,
}

impl StepTimeline {
    pub fn from_chart(chart: &StepChart) -> Result<Self, ChartError> {
        let mut arrows: Vec<Arrow> = Vec::new();
        let mut open: [Option<usize>; PANEL_COUNT] = [None; PANEL_COUNT];

        for (measure_index, measure) in chart.measures.iter().enumerate() {
            let row_count = measure.rows.len();
            if row_count == 0 {
                continue;
            }
            let beats_per_row = BEATS_PER_MEASURE / row_count as f64;

            for (row_index, row) in measure.rows.iter().enumerate() {
                if row.len() != PANEL_COUNT {
                    return Err(ChartError::RowWidth {
                        measure: measure_index,
                        row: row_index,
                        width: row.len(),
                    });
                }
                let beat = measure_index as f64 * BEATS_PER_MEASURE
                    + row_index as f64 * beats_per_row;

                for (column, &code) in row.iter().enumerate() {
                    let Some(direction) = Direction::from_column(column) else {
                        continue;
                    };
                    match code {
                        CODE_NONE => {}
                        CODE_TAP => arrows.push(Arrow::tap(direction, beat)),
                        CODE_HOLD_HEAD | CODE_ROLL_HEAD => {
                            if let Some(open_idx) = open[column] {
                                return Err(ChartError::OverlappingHold {
                                    direction,
                                    beat,
                                    open_beat: arrows[open_idx].beat_position,
                                });
                            }
                            let kind = if code == CODE_HOLD_HEAD {
                                ArrowKind::Hold
                            } else {
                                ArrowKind::Roll
                            };
                            open[column] = Some(arrows.len());
                            arrows.push(Arrow::new(direction, kind, beat, None));
                        }
                        CODE_TAIL => match open[column].take() {
                            Some(open_idx) => arrows[open_idx].beat_end = Some(beat),
                            None => {
                                return Err(ChartError::UnmatchedHoldEnd { direction, beat });
                            }
                        },
                        c if c <= CODE_MAX_KNOWN => {}
                        c => {
                            return Err(ChartError::UnknownCode {
                                measure: measure_index,
                                row: row_index,
                                column,
                                code: c,
                            });
                        }
                    }
                }
            }
        }

        if let Some(open_idx) = open.iter().flatten().min() {
            let arrow = &arrows[*open_idx];
            return Err(ChartError::UnclosedHold {
                direction: arrow.direction,
                beat: arrow.beat_position,
            });
        }

        debug_assert!(
            arrows
                .windows(2)
                .all(|w| w[0].beat_position <= w[1].beat_position)
        );
        info!(
            "StepTimeline built: {} arrows over {} measures.",
            arrows.len(),
            chart.measures.len()
        );
        Ok(Self { arrows })
    }

    /// Wraps arrows coming from somewhere other than a step matrix. Checks
    /// ordering and that every sustained arrow has an end after its start.
    pub fn from_arrows(arrows: Vec<Arrow>) -> Result<Self, ChartError> {
        let mut previous: Option<f64> = None;
        for (index, arrow) in arrows.iter().enumerate() {
            let beat = arrow.beat_position;
            if !beat.is_finite() {
                return Err(ChartError::ArrowsOutOfOrder {
                    index,
                    beat,
                    previous: previous.unwrap_or(f64::NEG_INFINITY),
                });
            }
            if let Some(previous) = previous {
                if beat < previous {
                    return Err(ChartError::ArrowsOutOfOrder {
                        index,
                        beat,
                        previous,
                    });
                }
            }
            if arrow.kind.is_sustained() && !arrow.beat_end.is_some_and(|end| end >= beat) {
                return Err(ChartError::MissingHoldEnd { index, beat });
            }
            previous = Some(beat);
        }
        Ok(Self { arrows })
    }

    pub fn arrows(&self) -> &[Arrow] {
        &self.arrows
    }

    pub(crate) fn arrows_mut(&mut self) -> &mut [Arrow] {
        &mut self.arrows
    }

    pub fn get(&self, index: usize) -> Option<&Arrow> {
        self.arrows.get(index)
    }

    pub fn len(&self) -> usize {
        self.arrows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrows.is_empty()
    }

    pub fn count_kind(&self, kind: ArrowKind) -> usize {
        self.arrows.iter().filter(|a| a.kind == kind).count()
    }

    /// Beat at which the last arrow (including hold tails) is over.
    pub fn last_beat(&self) -> f64 {
        self.arrows.iter().map(Arrow::last_beat).fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn measure(rows: &[[u8; 4]]) -> Measure {
        Measure::new(rows.iter().map(|r| r.to_vec()).collect())
    }

    #[test]
    fn rows_are_spread_over_the_measure() {
        let chart = StepChart::new(vec![
            measure(&[[1, 0, 0, 0], [0, 1, 0, 0], [0, 0, 1, 0], [0, 0, 0, 1]]),
            measure(&[
                [1, 0, 0, 1],
                [0, 0, 0, 0],
                [0, 0, 0, 0],
                [0, 0, 0, 0],
                [0, 0, 0, 0],
                [0, 0, 0, 0],
                [0, 0, 0, 0],
                [0, 1, 0, 0],
            ]),
        ]);
        let timeline = StepTimeline::from_chart(&chart).unwrap();
        let beats: Vec<f64> = timeline.arrows().iter().map(|a| a.beat_position).collect();
        assert_eq!(beats, vec![0.0, 1.0, 2.0, 3.0, 4.0, 4.0, 7.5]);
        assert_eq!(timeline.arrows()[4].direction, Direction::Left);
        assert_eq!(timeline.arrows()[5].direction, Direction::Right);
        assert_eq!(timeline.arrows()[6].direction, Direction::Down);
    }

    #[test]
    fn holds_and_rolls_are_closed_by_tails() {
        let chart = StepChart::new(vec![
            measure(&[[2, 0, 0, 4], [0, 0, 0, 0], [3, 0, 0, 0], [0, 0, 0, 0]]),
            measure(&[[0, 0, 0, 3]]),
        ]);
        let timeline = StepTimeline::from_chart(&chart).unwrap();
        let arrows = timeline.arrows();
        assert_eq!(arrows.len(), 2);
        assert_eq!(arrows[0].kind, ArrowKind::Hold);
        assert_eq!(arrows[0].beat_end, Some(2.0));
        assert_eq!(arrows[1].kind, ArrowKind::Roll);
        assert_eq!(arrows[1].beat_end, Some(4.0));
        assert_eq!(timeline.last_beat(), 4.0);
        assert_eq!(timeline.count_kind(ArrowKind::Hold), 1);
    }

    #[test]
    fn non_judged_codes_are_ignored() {
        let chart = StepChart::new(vec![measure(&[[5, 7, 8, 6], [1, 0, 0, 0]])]);
        let timeline = StepTimeline::from_chart(&chart).unwrap();
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline.arrows()[0].beat_position, 2.0);
    }

    #[test]
    fn empty_measure_still_takes_four_beats() {
        let chart = StepChart::new(vec![Measure::default(), measure(&[[0, 0, 1, 0]])]);
        let timeline = StepTimeline::from_chart(&chart).unwrap();
        assert_eq!(timeline.arrows()[0].beat_position, 4.0);
    }

    #[test]
    fn malformed_charts_are_rejected() {
        let unmatched = StepChart::new(vec![measure(&[[0, 3, 0, 0]])]);
        assert!(matches!(
            StepTimeline::from_chart(&unmatched),
            Err(ChartError::UnmatchedHoldEnd {
                direction: Direction::Down,
                ..
            })
        ));

        let unclosed = StepChart::new(vec![measure(&[[0, 0, 2, 0], [0, 0, 0, 0]])]);
        assert!(matches!(
            StepTimeline::from_chart(&unclosed),
            Err(ChartError::UnclosedHold {
                direction: Direction::Up,
                ..
            })
        ));

        let overlapping = StepChart::new(vec![measure(&[[2, 0, 0, 0], [4, 0, 0, 0]])]);
        assert!(matches!(
            StepTimeline::from_chart(&overlapping),
            Err(ChartError::OverlappingHold { .. })
        ));

        let wide = StepChart::new(vec![Measure::new(vec![vec![0, 0, 0, 0, 1]])]);
        assert!(matches!(
            StepTimeline::from_chart(&wide),
            Err(ChartError::RowWidth { width: 5, .. })
        ));

        let unknown = StepChart::new(vec![measure(&[[0, 0, 9, 0]])]);
        assert!(matches!(
            StepTimeline::from_chart(&unknown),
            Err(ChartError::UnknownCode { code: 9, column: 2, .. })
        ));
    }

    #[test]
    fn external_arrows_are_validated() {
        let ok = vec![
            Arrow::tap(Direction::Left, 1.0),
            Arrow::new(Direction::Up, ArrowKind::Hold, 1.0, Some(3.0)),
        ];
        assert!(StepTimeline::from_arrows(ok).is_ok());

        let unordered = vec![Arrow::tap(Direction::Left, 2.0), Arrow::tap(Direction::Left, 1.0)];
        assert!(matches!(
            StepTimeline::from_arrows(unordered),
            Err(ChartError::ArrowsOutOfOrder { index: 1, .. })
        ));

        let endless = vec![Arrow::new(Direction::Up, ArrowKind::Hold, 1.0, None)];
        assert!(matches!(
            StepTimeline::from_arrows(endless),
            Err(ChartError::MissingHoldEnd { index: 0, .. })
        ));
    }

    #[test]
    fn chart_deserializes_from_nested_arrays() {
        let chart: StepChart = serde_json::from_str("[[[1,0,0,0],[0,0,0,1]],[[0,1,1,0]]]").unwrap();
        assert_eq!(chart.measures.len(), 2);
        assert_eq!(chart.measures[0].rows[1], vec![0, 0, 0, 1]);
    }

    /// Rewrites raw codes so each column's hold or roll is closed by a tail
    /// before the next head, then closes anything left open in a final measure.
    fn balanced(mut chart: StepChart) -> StepChart {
        let mut open = [false; 4];
        for row in chart.measures.iter_mut().flat_map(|m| m.rows.iter_mut()) {
            for (column, code) in row.iter_mut().enumerate() {
                *code = match (*code, open[column]) {
                    (CODE_HOLD_HEAD | CODE_ROLL_HEAD, true) => CODE_TAIL,
                    (CODE_TAIL, false) => CODE_TAP,
                    (c, _) => c,
                };
                match *code {
                    CODE_HOLD_HEAD | CODE_ROLL_HEAD => open[column] = true,
                    CODE_TAIL => open[column] = false,
                    _ => {}
                }
            }
        }
        if open.contains(&true) {
            let row = open.iter().map(|&o| if o { CODE_TAIL } else { CODE_NONE }).collect();
            chart.measures.push(Measure::new(vec![row]));
        }
        chart
    }

    fn chart_with_holds() -> impl Strategy<Value = StepChart> {
        let row = prop::collection::vec(0u8..=5, 4);
        let measure = prop::collection::vec(row, 0..17).prop_map(Measure::new);
        prop::collection::vec(measure, 0..8).prop_map(|m| balanced(StepChart::new(m)))
    }

    proptest! {
        #[test]
        fn timeline_is_ordered(chart in chart_with_holds()) {
            let timeline = StepTimeline::from_chart(&chart).unwrap();
            for pair in timeline.arrows().windows(2) {
                prop_assert!(pair[0].beat_position <= pair[1].beat_position);
            }
            for arrow in timeline.arrows() {
                match arrow.beat_end {
                    Some(end) => {
                        prop_assert!(arrow.kind.is_sustained());
                        prop_assert!(end > arrow.beat_position);
                    }
                    None => prop_assert_eq!(arrow.kind, ArrowKind::Tap),
                }
            }
        }
    }
}
