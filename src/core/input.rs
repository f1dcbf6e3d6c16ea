use crate::game::note::Direction;
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use winit::event::{ElementState, KeyEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PadState {
    #[default]
    Idle,
    JustPressed,
    Held,
}

/// Per-direction pad state for one tick, indexed by [`Direction::index`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct InputSnapshot([PadState; 4]);

impl InputSnapshot {
    pub const IDLE: InputSnapshot = InputSnapshot([PadState::Idle; 4]);

    pub const fn new(states: [PadState; 4]) -> Self {
        Self(states)
    }

    #[inline(always)]
    pub fn state(&self, direction: Direction) -> PadState {
        self.0[direction.index()]
    }

    pub fn states(&self) -> [PadState; 4] {
        self.0
    }

    /// True while the panel is down, whether fresh or held.
    #[inline(always)]
    pub fn is_down(&self, direction: Direction) -> bool {
        self.state(direction) != PadState::Idle
    }
}

/// A source of pad input polled once per tick. Implementations keep their
/// own previous-state bookkeeping; callers never see raw buttons or keys.
pub trait DancePad {
    fn poll(&mut self) -> InputSnapshot;

    /// False while the underlying device is gone. A disconnected pad must
    /// report [`InputSnapshot::IDLE`] from `poll`.
    fn is_connected(&self) -> bool {
        true
    }
}

/// Turns successive "down" sets into press/hold edges.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct EdgeDetector {
    previous: [bool; 4],
}

impl EdgeDetector {
    /// `fresh` marks panels that saw a new press since the last poll even if
    /// they were also down at the last poll (released and re-pressed in between).
    pub(crate) fn update(&mut self, now: [bool; 4], fresh: [bool; 4]) -> InputSnapshot {
        let mut states = [PadState::Idle; 4];
        for i in 0..4 {
            states[i] = match (now[i], self.previous[i] && !fresh[i]) {
                (true, false) => PadState::JustPressed,
                (true, true) => PadState::Held,
                (false, _) => PadState::Idle,
            };
        }
        self.previous = now;
        InputSnapshot(states)
    }

    pub(crate) fn reset(&mut self) {
        self.previous = [false; 4];
    }
}

pub static DEFAULT_KEY_BINDINGS: Lazy<HashMap<KeyCode, Direction>> = Lazy::new(|| {
    HashMap::from([
        (KeyCode::ArrowLeft, Direction::Left),
        (KeyCode::ArrowDown, Direction::Down),
        (KeyCode::ArrowUp, Direction::Up),
        (KeyCode::ArrowRight, Direction::Right),
        (KeyCode::KeyD, Direction::Left),
        (KeyCode::KeyF, Direction::Down),
        (KeyCode::KeyJ, Direction::Up),
        (KeyCode::KeyK, Direction::Right),
    ])
});

/// Keyboard-driven pad. Key notifications arrive whenever the windowing
/// layer delivers them; `poll` turns the accumulated state into edges.
#[derive(Debug, Clone)]
pub struct KeyboardPad<K = KeyCode> {
    bindings: HashMap<K, Direction>,
    down: HashSet<K>,
    pressed_since_poll: [bool; 4],
    edges: EdgeDetector,
}

impl<K: Eq + Hash + Copy> KeyboardPad<K> {
    pub fn new(bindings: HashMap<K, Direction>) -> Self {
        Self {
            bindings,
            down: HashSet::new(),
            pressed_since_poll: [false; 4],
            edges: EdgeDetector::default(),
        }
    }

    pub fn key_down(&mut self, key: K) {
        let Some(&direction) = self.bindings.get(&key) else {
            return;
        };
        if self.down.insert(key) {
            self.pressed_since_poll[direction.index()] = true;
        }
    }

    pub fn key_up(&mut self, key: K) {
        self.down.remove(&key);
    }

    /// Applies one windowing-layer key notification. Auto-repeats never
    /// count as presses.
    pub fn apply_key(&mut self, key: K, state: ElementState, repeat: bool) {
        match state {
            ElementState::Pressed if repeat => {}
            ElementState::Pressed => self.key_down(key),
            ElementState::Released => self.key_up(key),
        }
    }

    /// Drops all held keys, e.g. when the window loses focus.
    pub fn release_all(&mut self) {
        self.down.clear();
    }

    fn directions_down(&self) -> [bool; 4] {
        let mut out = [false; 4];
        for key in &self.down {
            if let Some(direction) = self.bindings.get(key) {
                out[direction.index()] = true;
            }
        }
        out
    }
}

impl KeyboardPad<KeyCode> {
    pub fn with_default_bindings() -> Self {
        Self::new(DEFAULT_KEY_BINDINGS.clone())
    }

    pub fn handle_key_event(&mut self, event: &KeyEvent) {
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        self.apply_key(code, event.state, event.repeat);
    }
}

impl<K: Eq + Hash + Copy> DancePad for KeyboardPad<K> {
    fn poll(&mut self) -> InputSnapshot {
        let mut now = self.directions_down();
        let fresh = std::mem::take(&mut self.pressed_since_poll);
        // A tap that went down and up between two polls still counts once.
        for i in 0..4 {
            now[i] |= fresh[i];
        }
        self.edges.update(now, fresh)
    }
}

/// Parses winit key names as written in config files ("ArrowLeft", "KeyD", "Digit4", "Numpad8").
pub fn keycode_from_name(name: &str) -> Option<KeyCode> {
    let code = match name.trim() {
        "ArrowLeft" => KeyCode::ArrowLeft,
        "ArrowDown" => KeyCode::ArrowDown,
        "ArrowUp" => KeyCode::ArrowUp,
        "ArrowRight" => KeyCode::ArrowRight,
        "Space" => KeyCode::Space,
        "Enter" => KeyCode::Enter,
        "KeyA" => KeyCode::KeyA,
        "KeyB" => KeyCode::KeyB,
        "KeyC" => KeyCode::KeyC,
        "KeyD" => KeyCode::KeyD,
        "KeyE" => KeyCode::KeyE,
        "KeyF" => KeyCode::KeyF,
        "KeyG" => KeyCode::KeyG,
        "KeyH" => KeyCode::KeyH,
        "KeyI" => KeyCode::KeyI,
        "KeyJ" => KeyCode::KeyJ,
        "KeyK" => KeyCode::KeyK,
        "KeyL" => KeyCode::KeyL,
        "KeyM" => KeyCode::KeyM,
        "KeyN" => KeyCode::KeyN,
        "KeyO" => KeyCode::KeyO,
        "KeyP" => KeyCode::KeyP,
        "KeyQ" => KeyCode::KeyQ,
        "KeyR" => KeyCode::KeyR,
        "KeyS" => KeyCode::KeyS,
        "KeyT" => KeyCode::KeyT,
        "KeyU" => KeyCode::KeyU,
        "KeyV" => KeyCode::KeyV,
        "KeyW" => KeyCode::KeyW,
        "KeyX" => KeyCode::KeyX,
        "KeyY" => KeyCode::KeyY,
        "KeyZ" => KeyCode::KeyZ,
        "Digit0" => KeyCode::Digit0,
        "Digit1" => KeyCode::Digit1,
        "Digit2" => KeyCode::Digit2,
        "Digit3" => KeyCode::Digit3,
        "Digit4" => KeyCode::Digit4,
        "Digit5" => KeyCode::Digit5,
        "Digit6" => KeyCode::Digit6,
        "Digit7" => KeyCode::Digit7,
        "Digit8" => KeyCode::Digit8,
        "Digit9" => KeyCode::Digit9,
        "Numpad0" => KeyCode::Numpad0,
        "Numpad1" => KeyCode::Numpad1,
        "Numpad2" => KeyCode::Numpad2,
        "Numpad3" => KeyCode::Numpad3,
        "Numpad4" => KeyCode::Numpad4,
        "Numpad5" => KeyCode::Numpad5,
        "Numpad6" => KeyCode::Numpad6,
        "Numpad7" => KeyCode::Numpad7,
        "Numpad8" => KeyCode::Numpad8,
        "Numpad9" => KeyCode::Numpad9,
        _ => return None,
    };
    Some(code)
}
