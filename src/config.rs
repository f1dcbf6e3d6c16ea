use crate::core::input::{keycode_from_name, DEFAULT_KEY_BINDINGS};
use crate::core::gamepad::default_button_bindings;
use crate::error::ConfigError;
use crate::game::gameplay::JudgeSettings;
use crate::game::judgment::ComboPolicy;
use crate::game::life::MeterChanges;
use crate::game::note::Direction;
use configparser::ini::Ini;
use log::{info, warn};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;
use winit::keyboard::KeyCode;

pub const DEFAULT_CONFIG_PATH: &str = "dancejudge.ini";

const SECTION_JUDGING: &str = "Judging";
const SECTION_METER: &str = "Meter";
const SECTION_OPTIONS: &str = "Options";

/// Players that can be configured, as `[Player1]` through `[PlayerN]`.
pub const MAX_PLAYERS: usize = 2;

const DEFAULT_KEY_NAMES: [(Direction, &str); 4] = [
    (Direction::Left, "ArrowLeft,KeyD"),
    (Direction::Down, "ArrowDown,KeyF"),
    (Direction::Up, "ArrowUp,KeyJ"),
    (Direction::Right, "ArrowRight,KeyK"),
];

fn direction_key(direction: Direction) -> &'static str {
    match direction {
        Direction::Left => "Left",
        Direction::Down => "Down",
        Direction::Up => "Up",
        Direction::Right => "Right",
    }
}

fn player_section(number: usize) -> String {
    format!("Player{}", number)
}

/// One player's input setup.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerBindings {
    pub name: String,
    pub key_bindings: HashMap<KeyCode, Direction>,
    pub button_bindings: HashMap<usize, Direction>,
    /// Position of the player's gamepad among connected devices. `None`
    /// follows whichever pad sends input first.
    pub pad_index: Option<usize>,
}

impl PlayerBindings {
    /// Defaults for player `number`, counting from 1. Only the first player
    /// gets keyboard keys; each player gets the gamepad at their own position.
    pub fn defaults_for(number: usize) -> Self {
        Self {
            name: format!("P{}", number),
            key_bindings: if number == 1 {
                DEFAULT_KEY_BINDINGS.clone()
            } else {
                HashMap::new()
            },
            button_bindings: default_button_bindings(),
            pad_index: Some(number.saturating_sub(1)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub judge: JudgeSettings,
    /// Always holds player 1; later players appear when their section does.
    pub players: Vec<PlayerBindings>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            judge: JudgeSettings::default(),
            players: vec![PlayerBindings::defaults_for(1)],
        }
    }
}

fn parse_value<T: FromStr>(ini: &Ini, section: &str, key: &str) -> Result<Option<T>, ConfigError> {
    let Some(raw) = ini.get(section, key) else {
        return Ok(None);
    };
    match raw.trim().parse::<T>() {
        Ok(value) => Ok(Some(value)),
        Err(_) => Err(ConfigError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: raw,
        }),
    }
}

/// Reads `[section] key`, keeping `default` when the key is absent or unusable.
fn value_or<T: FromStr + Copy>(ini: &Ini, section: &str, key: &str, default: T) -> T {
    match parse_value(ini, section, key) {
        Ok(Some(v)) => v,
        Ok(None) => default,
        Err(e) => {
            warn!("{}; using default.", e);
            default
        }
    }
}

fn finite_or(ini: &Ini, section: &str, key: &str, default: f64) -> f64 {
    let value = value_or(ini, section, key, default);
    if value.is_finite() {
        value
    } else {
        warn!("Invalid value for [{}] {}: {}; using default.", section, key, value);
        default
    }
}

fn positive_or(ini: &Ini, section: &str, key: &str, default: f64) -> f64 {
    let value = finite_or(ini, section, key, default);
    if value > 0.0 {
        value
    } else {
        warn!("[{}] {} must be positive, got {}; using default.", section, key, value);
        default
    }
}

fn flag_or(ini: &Ini, section: &str, key: &str, default: bool) -> bool {
    value_or::<u8>(ini, section, key, u8::from(default)) != 0
}

fn key_bindings_from(
    ini: &Ini,
    section: &str,
    defaults: &HashMap<KeyCode, Direction>,
) -> HashMap<KeyCode, Direction> {
    let mut bindings = HashMap::new();
    for direction in Direction::ALL {
        let key = format!("Key{}", direction_key(direction));
        let Some(raw) = ini.get(section, &key) else {
            for (code, d) in defaults {
                if *d == direction {
                    bindings.insert(*code, direction);
                }
            }
            continue;
        };
        for key_name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match keycode_from_name(key_name) {
                Some(code) => {
                    bindings.insert(code, direction);
                }
                None => warn!("Unknown key '{}' for [{}] {}; ignored.", key_name, section, key),
            }
        }
    }
    bindings
}

fn button_bindings_from(
    ini: &Ini,
    section: &str,
    defaults: &HashMap<usize, Direction>,
) -> HashMap<usize, Direction> {
    let mut bindings = HashMap::new();
    for direction in Direction::ALL {
        let fallback = defaults
            .iter()
            .find(|(_, d)| **d == direction)
            .map(|(b, _)| *b)
            .unwrap_or(direction.index());
        let key = format!("Button{}", direction_key(direction));
        let button = value_or(ini, section, &key, fallback);
        bindings.insert(button, direction);
    }
    bindings
}

/// `PadIndex` takes a device position, or `Any` to follow the first pad with input.
fn pad_index_from(ini: &Ini, section: &str, default: Option<usize>) -> Option<usize> {
    match ini.get(section, "PadIndex") {
        Some(raw) if raw.trim().eq_ignore_ascii_case("any") => None,
        Some(_) => Some(value_or(ini, section, "PadIndex", default.unwrap_or(0))),
        None => default,
    }
}

fn player_from(ini: &Ini, number: usize) -> PlayerBindings {
    let section = player_section(number);
    let defaults = PlayerBindings::defaults_for(number);
    PlayerBindings {
        name: ini
            .get(&section, "Name")
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or(defaults.name),
        key_bindings: key_bindings_from(ini, &section, &defaults.key_bindings),
        button_bindings: button_bindings_from(ini, &section, &defaults.button_bindings),
        pad_index: pad_index_from(ini, &section, defaults.pad_index),
    }
}

fn has_section(ini: &Ini, section: &str) -> bool {
    ini.sections().iter().any(|s| s.eq_ignore_ascii_case(section))
}

fn players_from(ini: &Ini) -> Vec<PlayerBindings> {
    let mut players = vec![player_from(ini, 1)];
    for number in 2..=MAX_PLAYERS {
        if has_section(ini, &player_section(number)) {
            players.push(player_from(ini, number));
        }
    }

    for (i, player) in players.iter().enumerate() {
        for other in &players[i + 1..] {
            if let Some(index) = player.pad_index.filter(|p| other.pad_index == Some(*p)) {
                warn!("'{}' and '{}' share gamepad #{}.", player.name, other.name, index);
            }
            let shared = player
                .key_bindings
                .keys()
                .find(|k| other.key_bindings.contains_key(*k));
            if let Some(code) = shared {
                warn!("'{}' and '{}' both bind {:?}.", player.name, other.name, code);
            }
        }
    }
    players
}

impl Config {
    /// Builds a config from parsed INI data. Anything missing or invalid falls
    /// back to its default with a warning.
    pub fn from_ini(ini: &Ini) -> Self {
        let defaults = JudgeSettings::default();
        let meter_defaults = MeterChanges::default();

        let judge = JudgeSettings {
            tolerance_seconds: positive_or(
                ini,
                SECTION_JUDGING,
                "ToleranceSeconds",
                defaults.tolerance_seconds,
            ),
            max_missed_hold_frames: value_or::<u32>(
                ini,
                SECTION_JUDGING,
                "MaxMissedHoldFrames",
                defaults.max_missed_hold_frames,
            )
            .max(1),
            max_score: positive_or(ini, SECTION_JUDGING, "MaxScore", defaults.max_score),
            hold_beat_weight: positive_or(
                ini,
                SECTION_JUDGING,
                "HoldBeatWeight",
                defaults.hold_beat_weight,
            ),
            combo: ComboPolicy {
                almost_breaks_combo: flag_or(
                    ini,
                    SECTION_JUDGING,
                    "AlmostBreaksCombo",
                    defaults.combo.almost_breaks_combo,
                ),
            },
            meter: MeterChanges {
                initial: finite_or(ini, SECTION_METER, "Initial", meter_defaults.initial),
                perfect: finite_or(ini, SECTION_METER, "Perfect", meter_defaults.perfect),
                great: finite_or(ini, SECTION_METER, "Great", meter_defaults.great),
                good: finite_or(ini, SECTION_METER, "Good", meter_defaults.good),
                almost: finite_or(ini, SECTION_METER, "Almost", meter_defaults.almost),
                missed: finite_or(ini, SECTION_METER, "Missed", meter_defaults.missed),
            },
            training_mode: flag_or(ini, SECTION_OPTIONS, "TrainingMode", defaults.training_mode),
        };

        Self {
            judge,
            players: players_from(ini),
        }
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut ini = Ini::new();
        ini.read(text.to_string()).map_err(ConfigError::Parse)?;
        Ok(Self::from_ini(&ini))
    }

    /// Loads `path`, writing a file of defaults first if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("Config '{}' not found, writing defaults.", path.display());
            default_ini().write(path)?;
        }
        let mut ini = Ini::new();
        ini.load(path).map_err(ConfigError::Parse)?;
        info!("Loaded config from '{}'.", path.display());
        Ok(Self::from_ini(&ini))
    }
}

fn set<T: Display>(ini: &mut Ini, section: &str, key: &str, value: T) {
    ini.set(section, key, Some(value.to_string()));
}

/// The INI written on first run.
pub fn default_ini() -> Ini {
    let judge = JudgeSettings::default();
    let meter = judge.meter;
    let mut ini = Ini::new();

    set(&mut ini, SECTION_JUDGING, "ToleranceSeconds", judge.tolerance_seconds);
    set(&mut ini, SECTION_JUDGING, "MaxMissedHoldFrames", judge.max_missed_hold_frames);
    set(&mut ini, SECTION_JUDGING, "MaxScore", judge.max_score);
    set(&mut ini, SECTION_JUDGING, "HoldBeatWeight", judge.hold_beat_weight);
    set(
        &mut ini,
        SECTION_JUDGING,
        "AlmostBreaksCombo",
        u8::from(judge.combo.almost_breaks_combo),
    );

    set(&mut ini, SECTION_METER, "Initial", meter.initial);
    set(&mut ini, SECTION_METER, "Perfect", meter.perfect);
    set(&mut ini, SECTION_METER, "Great", meter.great);
    set(&mut ini, SECTION_METER, "Good", meter.good);
    set(&mut ini, SECTION_METER, "Almost", meter.almost);
    set(&mut ini, SECTION_METER, "Missed", meter.missed);

    set(&mut ini, SECTION_OPTIONS, "TrainingMode", u8::from(judge.training_mode));

    let player = PlayerBindings::defaults_for(1);
    let section = player_section(1);
    set(&mut ini, &section, "Name", &player.name);
    for (direction, keys) in DEFAULT_KEY_NAMES {
        set(&mut ini, &section, &format!("Key{}", direction_key(direction)), keys);
    }
    for (button, direction) in &player.button_bindings {
        set(&mut ini, &section, &format!("Button{}", direction_key(*direction)), button);
    }
    if let Some(index) = player.pad_index {
        set(&mut ini, &section, "PadIndex", index);
    }
    ini
}

// Process-wide config for the binary. Library types take explicit settings.
static CONFIG: Lazy<Mutex<Config>> = Lazy::new(|| Mutex::new(Config::default()));

/// Loads `path` into the global config. On failure the defaults stay in place.
pub fn load(path: &Path) {
    match Config::load_from(path) {
        Ok(config) => {
            *CONFIG.lock().unwrap_or_else(|e| e.into_inner()) = config;
        }
        Err(e) => warn!("Failed to load config '{}': {}; using defaults.", path.display(), e),
    }
}

/// Returns a copy of the currently loaded config.
pub fn get() -> Config {
    CONFIG.lock().unwrap_or_else(|e| e.into_inner()).clone()
}
