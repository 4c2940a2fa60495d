// THEORY:
// The `intensity` module is the parameter store for the transform library.
// Every fault reads exactly one tunable per intensity level, and the lookup
// path is designed so that a missing or corrupted configuration can never
// block a generation run.
//
// Key architectural principles:
// 1.  **Ordinal Levels**: `IntensityLevel` selects a parameter row. The three
//     levels are an ordering, not a numeric scale, so "extreme" is free to
//     mean a different thing per fault (a bigger kernel, a higher density, a
//     lower visibility factor).
// 2.  **Three-Tier Fallback**: an explicit row in the loaded config wins,
//     then the built-in row for that fault, and a row missing a level falls
//     through to the built-in value for that level. `lookup` has no error
//     path at all.
// 3.  **Fail-Soft Loading**: `FaultConfig::load` swallows every I/O and parse
//     error, emits a warning, and returns the defaults. Saving is explicit
//     and may fail; loading may not.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use tracing::warn;

use crate::core_modules::registry::FaultKind;

/// The conventional config file name, shared with configuration-editing
/// collaborators that re-save the file between runs.
pub const DEFAULT_CONFIG_FILE: &str = "fault_level_config.json";

const DEFAULT_RESIZE_WIDTH: u32 = 320;
const DEFAULT_RESIZE_HEIGHT: u32 = 240;

/// One of three ordinal intensity settings selecting a parameter row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntensityLevel {
    Low,
    Medium,
    Extreme,
}

impl IntensityLevel {
    pub const ALL: [IntensityLevel; 3] =
        [IntensityLevel::Low, IntensityLevel::Medium, IntensityLevel::Extreme];

    /// The lowercase label used in filenames, metadata, and the config file.
    pub fn label(self) -> &'static str {
        match self {
            IntensityLevel::Low => "low",
            IntensityLevel::Medium => "medium",
            IntensityLevel::Extreme => "extreme",
        }
    }

    pub fn parse(label: &str) -> Option<IntensityLevel> {
        IntensityLevel::ALL
            .iter()
            .copied()
            .find(|level| level.label() == label)
    }
}

/// A per-level tunable: a scalar for most faults, a fixed pair for faults
/// that need two values (the channel shift magnitudes).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FaultParam {
    Scalar(f64),
    Pair(f64, f64),
}

impl FaultParam {
    /// The scalar view. A pair collapses to its first component.
    pub fn scalar(self) -> f64 {
        match self {
            FaultParam::Scalar(value) => value,
            FaultParam::Pair(first, _) => first,
        }
    }

    /// The pair view. A scalar is duplicated into both slots.
    pub fn pair(self) -> (f64, f64) {
        match self {
            FaultParam::Scalar(value) => (value, value),
            FaultParam::Pair(first, second) => (first, second),
        }
    }
}

/// One fault's parameter row. Levels are individually optional so a partial
/// row in a hand-edited file still loads; missing levels fall through to the
/// built-in value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LevelRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<FaultParam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium: Option<FaultParam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extreme: Option<FaultParam>,
}

impl LevelRow {
    fn get(&self, level: IntensityLevel) -> Option<FaultParam> {
        match level {
            IntensityLevel::Low => self.low,
            IntensityLevel::Medium => self.medium,
            IntensityLevel::Extreme => self.extreme,
        }
    }

    fn full(values: [f64; 3]) -> LevelRow {
        LevelRow {
            low: Some(FaultParam::Scalar(values[0])),
            medium: Some(FaultParam::Scalar(values[1])),
            extreme: Some(FaultParam::Scalar(values[2])),
        }
    }
}

// Built-in parameter rows, low / medium / extreme.
const BUILTIN_ROWS: [(FaultKind, [f64; 3]); 20] = [
    (FaultKind::Flicker, [8.0, 20.0, 32.0]),
    (FaultKind::ColorShift, [10.0, 30.0, 60.0]),
    (FaultKind::Desaturation, [0.5, 0.7, 1.0]),
    (FaultKind::RollingShutterSkew, [5.0, 20.0, 50.0]),
    (FaultKind::SaltPepperNoise, [0.002, 0.008, 0.02]),
    (FaultKind::Blur, [3.0, 7.0, 13.0]),
    (FaultKind::Brightness, [1.3, 1.7, 2.2]),
    (FaultKind::Fog, [0.3, 0.5, 0.7]),
    (FaultKind::Glare, [0.2, 0.4, 0.6]),
    (FaultKind::Raindrop, [0.3, 0.5, 0.8]),
    (FaultKind::LensDirt, [0.3, 0.5, 0.8]),
    (FaultKind::Blackout, [0.5, 0.8, 1.0]),
    (FaultKind::FrameDrop, [0.5, 0.25, 0.1]),
    (FaultKind::DeadPixels, [0.0005, 0.001, 0.005]),
    (FaultKind::HotPixels, [0.0005, 0.001, 0.005]),
    (FaultKind::LineDropout, [4.0, 10.0, 25.0]),
    (FaultKind::TemporalLag, [1.0, 2.0, 4.0]),
    (FaultKind::SpatialJitter, [1.0, 3.0, 6.0]),
    (FaultKind::RandomPatchNoise, [2.0, 5.0, 12.0]),
    (FaultKind::Warping, [5.0, 15.0, 40.0]),
];

fn builtin_value(fault: FaultKind, level: IntensityLevel) -> f64 {
    let values = BUILTIN_ROWS
        .iter()
        .find(|(kind, _)| *kind == fault)
        .map(|(_, values)| *values)
        .unwrap_or([0.0; 3]);
    match level {
        IntensityLevel::Low => values[0],
        IntensityLevel::Medium => values[1],
        IntensityLevel::Extreme => values[2],
    }
}

/// The per-run parameter store: fault identifier -> level -> parameter,
/// plus the two resize dimensions shared with the front end. Loaded once at
/// run start and read-only for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultConfig {
    #[serde(default = "default_resize_width")]
    pub resize_width: u32,
    #[serde(default = "default_resize_height")]
    pub resize_height: u32,
    #[serde(flatten)]
    faults: BTreeMap<String, LevelRow>,
}

fn default_resize_width() -> u32 {
    DEFAULT_RESIZE_WIDTH
}

fn default_resize_height() -> u32 {
    DEFAULT_RESIZE_HEIGHT
}

impl Default for FaultConfig {
    fn default() -> Self {
        let faults = BUILTIN_ROWS
            .iter()
            .map(|(fault, values)| (fault.identifier().to_string(), LevelRow::full(*values)))
            .collect();
        FaultConfig {
            resize_width: DEFAULT_RESIZE_WIDTH,
            resize_height: DEFAULT_RESIZE_HEIGHT,
            faults,
        }
    }
}

impl FaultConfig {
    /// Loads a config file, falling back to the built-in defaults on any
    /// I/O or parse failure. This can never fail a run.
    pub fn load(path: &Path) -> FaultConfig {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "config unreadable, using defaults");
                return FaultConfig::default();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "config malformed, using defaults");
                FaultConfig::default()
            }
        }
    }

    /// Writes the config back as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let payload = serde_json::to_string_pretty(self)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        fs::write(path, payload)
    }

    /// Overrides one fault's parameter row.
    pub fn set_row(&mut self, fault: FaultKind, row: LevelRow) {
        self.faults.insert(fault.identifier().to_string(), row);
    }

    /// Rewrites the config file with the built-in defaults.
    pub fn reset_to_defaults(path: &Path) -> io::Result<()> {
        FaultConfig::default().save(path)
    }

    /// Resolves a fault's parameter at a level. Explicit row first, then the
    /// built-in row. Never fails.
    pub fn lookup(&self, fault: FaultKind, level: IntensityLevel) -> FaultParam {
        if let Some(param) = self
            .faults
            .get(fault.identifier())
            .and_then(|row| row.get(level))
        {
            return param;
        }
        FaultParam::Scalar(builtin_value(fault, level))
    }
}
