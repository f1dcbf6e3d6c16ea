use dancejudge::core::gamepad::{ButtonReader, ButtonSet};
use dancejudge::game::note::{Arrow, Direction};
use dancejudge::game::timing::TempoMap;
use log::warn;
use rand::Rng;
use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

const TAP_SECONDS: f64 = 0.06;
const HOLD_RELEASE_SECONDS: f64 = 0.03;
/// Minimum gap kept between a release and the next press on the same panel,
/// about one frame at 60 fps.
const REPRESS_GAP_SECONDS: f64 = 0.017;

#[derive(Debug, Clone, Copy)]
struct Press {
    button: usize,
    down: f64,
    up: f64,
}

/// Simulated player that presses each arrow's button around its time with
/// random jitter. Reads the song time from `now`, which the frame loop sets.
pub struct AutoPlayer {
    presses: Vec<Press>,
    now: Rc<Cell<f64>>,
}

impl AutoPlayer {
    pub fn new(
        tempo: &TempoMap,
        arrows: &[Arrow],
        bindings: &HashMap<usize, Direction>,
        jitter_seconds: f64,
        now: Rc<Cell<f64>>,
    ) -> Self {
        let mut buttons: [Option<usize>; 4] = [None; 4];
        for (&button, direction) in bindings {
            let slot = &mut buttons[direction.index()];
            *slot = Some(slot.map_or(button, |b| b.min(button)));
        }

        let mut rng = rand::rng();
        let jitter = jitter_seconds.abs();
        let mut per_panel: [Vec<(f64, f64)>; 4] = Default::default();
        for arrow in arrows {
            let down = tempo.time_at(arrow.beat_position) + rng.random_range(-jitter..=jitter);
            let up = match arrow.beat_end {
                Some(end) if arrow.kind.is_sustained() => tempo.time_at(end) + HOLD_RELEASE_SECONDS,
                _ => down + TAP_SECONDS,
            };
            per_panel[arrow.direction.index()].push((down, up));
        }

        let mut presses = Vec::with_capacity(arrows.len());
        for direction in Direction::ALL {
            let Some(button) = buttons[direction.index()] else {
                if !per_panel[direction.index()].is_empty() {
                    warn!("No button bound to {:?}; autoplay will skip those arrows.", direction);
                }
                continue;
            };
            let panel = &mut per_panel[direction.index()];
            panel.sort_by(|a, b| a.0.total_cmp(&b.0));
            for i in 0..panel.len() {
                let (down, mut up) = panel[i];
                if let Some(&(next_down, _)) = panel.get(i + 1) {
                    up = up.min(next_down - REPRESS_GAP_SECONDS);
                }
                presses.push(Press {
                    button,
                    down,
                    up: up.max(down + 0.001),
                });
            }
        }

        Self { presses, now }
    }
}

impl ButtonReader for AutoPlayer {
    fn read_pressed(&mut self) -> Option<ButtonSet> {
        let now = self.now.get();
        let mut pressed = ButtonSet::default();
        for press in &self.presses {
            if press.down <= now && now < press.up {
                pressed.insert(press.button);
            }
        }
        Some(pressed)
    }
}
