use crate::core::input::{DancePad, EdgeDetector, InputSnapshot};
use crate::game::note::Direction;
use log::{info, warn};
use std::collections::HashMap;

/// Raw pressed-button set, one bit per standard-mapping button index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ButtonSet(u64);

impl ButtonSet {
    pub const MAX_BUTTONS: usize = 64;

    pub fn from_indices(indices: &[usize]) -> Self {
        let mut set = Self::default();
        for &i in indices {
            set.insert(i);
        }
        set
    }

    /// Indices past [`ButtonSet::MAX_BUTTONS`] are dropped.
    pub fn insert(&mut self, index: usize) {
        if index < Self::MAX_BUTTONS {
            self.0 |= 1 << index;
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        index < Self::MAX_BUTTONS && self.0 & (1 << index) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// Reads the device's raw button state.
pub trait ButtonReader {
    /// Currently pressed buttons, or `None` while the device is unavailable.
    fn read_pressed(&mut self) -> Option<ButtonSet>;
}

/// Buttons 0..=3 map to Left, Down, Up, Right, which is how most USB dance
/// mats enumerate.
pub fn default_button_bindings() -> HashMap<usize, Direction> {
    HashMap::from([
        (0, Direction::Left),
        (1, Direction::Down),
        (2, Direction::Up),
        (3, Direction::Right),
    ])
}

/// Device-button pad: maps button indices to directions and derives edges
/// by diffing successive raw reads.
#[derive(Debug)]
pub struct ButtonPad<R> {
    reader: R,
    bindings: HashMap<usize, Direction>,
    edges: EdgeDetector,
    connected: bool,
}

impl<R: ButtonReader> ButtonPad<R> {
    pub fn new(reader: R, bindings: HashMap<usize, Direction>) -> Self {
        Self {
            reader,
            bindings,
            edges: EdgeDetector::default(),
            connected: true,
        }
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn reader_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    fn directions_down(&self, pressed: ButtonSet) -> [bool; 4] {
        let mut out = [false; 4];
        for (&button, direction) in &self.bindings {
            if pressed.contains(button) {
                out[direction.index()] = true;
            }
        }
        out
    }
}

impl<R: ButtonReader> DancePad for ButtonPad<R> {
    fn poll(&mut self) -> InputSnapshot {
        match self.reader.read_pressed() {
            Some(pressed) => {
                if !self.connected {
                    info!("Dance pad reconnected.");
                    self.connected = true;
                }
                let now = self.directions_down(pressed);
                self.edges.update(now, [false; 4])
            }
            None => {
                if self.connected {
                    warn!("Dance pad disconnected; treating all panels as released.");
                    self.connected = false;
                }
                self.edges.reset();
                InputSnapshot::IDLE
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Chooses which connected device one player's reader follows.
///
/// With a pad index the player is pinned to that position in the device
/// enumeration order; without one the first device to send input is adopted.
/// Once chosen, a device is kept until it disconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PadSelector<Id> {
    pad_index: Option<usize>,
    active: Option<Id>,
}

impl<Id: Copy + PartialEq> PadSelector<Id> {
    pub fn new(pad_index: Option<usize>, connected: &[Id]) -> Self {
        let active = connected.get(pad_index.unwrap_or(0)).copied();
        Self { pad_index, active }
    }

    /// Feeds one device event. `connected` lists devices still present after
    /// the event, in enumeration order.
    pub fn on_event(&mut self, id: Id, disconnected: bool, connected: &[Id]) {
        if disconnected && self.active == Some(id) {
            self.active = None;
        }
        if self.active.is_some() {
            return;
        }
        self.active = match self.pad_index {
            Some(index) => connected.get(index).copied(),
            None if !disconnected => Some(id),
            None => None,
        };
    }

    pub fn active(&self) -> Option<Id> {
        self.active
    }

    pub fn pad_index(&self) -> Option<usize> {
        self.pad_index
    }
}

#[cfg(feature = "gamepad")]
pub use self::gilrs_reader::GilrsButtons;

#[cfg(feature = "gamepad")]
mod gilrs_reader {
    use super::{ButtonReader, ButtonSet, PadSelector};
    use gilrs::{Button, Event, EventType, GamepadId, Gilrs};
    use log::{info, warn};

    /// gilrs buttons in W3C standard-gamepad index order.
    const STANDARD_ORDER: [Button; 17] = [
        Button::South,
        Button::East,
        Button::West,
        Button::North,
        Button::LeftTrigger,
        Button::RightTrigger,
        Button::LeftTrigger2,
        Button::RightTrigger2,
        Button::Select,
        Button::Start,
        Button::LeftThumb,
        Button::RightThumb,
        Button::DPadUp,
        Button::DPadDown,
        Button::DPadLeft,
        Button::DPadRight,
        Button::Mode,
    ];

    /// Reads one player's pad, chosen by [`PadSelector`].
    pub struct GilrsButtons {
        gilrs: Gilrs,
        selector: PadSelector<GamepadId>,
    }

    impl GilrsButtons {
        /// `pad_index` pins the reader to the n-th connected gamepad; `None`
        /// follows whichever pad sends input first.
        pub fn new(pad_index: Option<usize>) -> Result<Self, gilrs::Error> {
            let gilrs = Gilrs::new()?;
            let connected = connected_ids(&gilrs);
            let selector = PadSelector::new(pad_index, &connected);
            match selector.active() {
                Some(id) => info!("Using gamepad {} for input.", gilrs.gamepad(id).name()),
                None => match pad_index {
                    Some(index) => warn!(
                        "Gamepad #{} is not connected ({} found); waiting for it.",
                        index,
                        connected.len()
                    ),
                    None => info!("No gamepad connected yet."),
                },
            }
            Ok(Self { gilrs, selector })
        }

        pub fn active(&self) -> Option<GamepadId> {
            self.selector.active()
        }
    }

    fn connected_ids(gilrs: &Gilrs) -> Vec<GamepadId> {
        gilrs.gamepads().map(|(id, _)| id).collect()
    }

    impl ButtonReader for GilrsButtons {
        fn read_pressed(&mut self) -> Option<ButtonSet> {
            while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
                let before = self.selector.active();
                let disconnected = matches!(event, EventType::Disconnected);
                let connected = connected_ids(&self.gilrs);
                self.selector.on_event(id, disconnected, &connected);
                if let Some(active) = self.selector.active().filter(|a| before != Some(*a)) {
                    info!("Using gamepad {} for input.", self.gilrs.gamepad(active).name());
                }
            }

            let pad = self.gilrs.connected_gamepad(self.selector.active()?)?;
            let mut pressed = ButtonSet::default();
            for (index, button) in STANDARD_ORDER.iter().enumerate() {
                if pad.is_pressed(*button) {
                    pressed.insert(index);
                }
            }
            Some(pressed)
        }
    }
}
