use std::{fmt, path::Path};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::Result;

/// FFT sizes accepted by analysers, smallest first.
pub const FFT_SIZES: [usize; 11] = [32, 64, 128, 256, 512, 1024, 2048, 4096, 8192, 16384, 32768];

pub const DEFAULT_FFT_SIZE: usize = 1024;
pub const DEFAULT_SENSITIVITY: f32 = 0.8;
pub const DEFAULT_MIN_DECIBELS: f32 = -100.0;
pub const DEFAULT_MAX_DECIBELS: f32 = -30.0;
pub const DEFAULT_COLOR: &str = "#ffffff";
pub const DEFAULT_MAX_FPS: f32 = 60.0;
pub const DEFAULT_MULTIPLIER: f32 = 1.0;
pub const DEFAULT_THICKNESS: f32 = 1.0;

pub const MIN_MAX_FPS: f32 = 1.0;
pub const MIN_MULTIPLIER: f32 = 0.1;
pub const MIN_THICKNESS: f32 = 0.1;

/// Which view the renderer paints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualizationMode {
    /// Frequency spectrum drawn as vertical bars.
    #[default]
    Bars,
    /// Time-domain waveform drawn as a single stroked line.
    Oscilloscope,
}

impl VisualizationMode {
    /// Parses a mode name, falling back to [`VisualizationMode::Bars`] for
    /// anything unrecognised.
    pub fn parse_or_default(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "bars" => Self::Bars,
            "oscilloscope" => Self::Oscilloscope,
            other => {
                warn!(mode = other, "unknown visualisation mode, using bars");
                Self::Bars
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bars => "bars",
            Self::Oscilloscope => "oscilloscope",
        }
    }
}

impl fmt::Display for VisualizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw, unvalidated options as supplied by a host or a JSON preset.
///
/// Every field is optional. Values are only interpreted when converted into a
/// [`VisualizationConfig`], at which point bad input is clamped or replaced by
/// the documented default instead of being rejected. A field holding the wrong
/// JSON type is treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfigOptions {
    #[serde(deserialize_with = "lenient_f64")]
    pub fft_size: Option<f64>,
    #[serde(deserialize_with = "lenient_f32")]
    pub sensitivity: Option<f32>,
    #[serde(deserialize_with = "lenient_f32")]
    pub min_decibels: Option<f32>,
    #[serde(deserialize_with = "lenient_f32")]
    pub max_decibels: Option<f32>,
    #[serde(deserialize_with = "lenient_string")]
    pub color: Option<String>,
    #[serde(rename = "maxFPS", alias = "maxFps", deserialize_with = "lenient_f32")]
    pub max_fps: Option<f32>,
    #[serde(deserialize_with = "lenient_f32")]
    pub multiplier: Option<f32>,
    #[serde(deserialize_with = "lenient_f32")]
    pub thickness: Option<f32>,
    #[serde(deserialize_with = "lenient_f32")]
    pub x_offset: Option<f32>,
    #[serde(deserialize_with = "lenient_f32")]
    pub y_offset: Option<f32>,
    #[serde(alias = "type", deserialize_with = "lenient_string")]
    pub mode: Option<String>,
}

fn lenient_f64<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<f64>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(number) => number.as_f64(),
        Value::Null => None,
        other => {
            warn!(value = %other, "ignoring non-numeric option");
            None
        }
    })
}

fn lenient_f32<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<f32>, D::Error> {
    Ok(lenient_f64(deserializer)?.map(|value| value as f32))
}

fn lenient_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(value) => Some(value),
        Value::Null => None,
        other => {
            warn!(value = %other, "ignoring non-text option");
            None
        }
    })
}

impl ConfigOptions {
    /// Parses options from a JSON preset document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON preset file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}

/// Validated visualisation parameters.
///
/// Fields are only reachable through setters so the invariants below always
/// hold. Setters never fail: out-of-range input is clamped, and non-finite or
/// unrecognised input resolves to the field default. Each setter returns the
/// value that was actually stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualizationConfig {
    fft_size: usize,
    sensitivity: f32,
    min_decibels: f32,
    max_decibels: f32,
    color: String,
    #[serde(rename = "maxFPS")]
    max_fps: f32,
    multiplier: f32,
    thickness: f32,
    x_offset: f32,
    y_offset: f32,
    mode: VisualizationMode,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            fft_size: DEFAULT_FFT_SIZE,
            sensitivity: DEFAULT_SENSITIVITY,
            min_decibels: DEFAULT_MIN_DECIBELS,
            max_decibels: DEFAULT_MAX_DECIBELS,
            color: DEFAULT_COLOR.to_string(),
            max_fps: DEFAULT_MAX_FPS,
            multiplier: DEFAULT_MULTIPLIER,
            thickness: DEFAULT_THICKNESS,
            x_offset: 0.0,
            y_offset: 0.0,
            mode: VisualizationMode::Bars,
        }
    }
}

impl VisualizationConfig {
    /// Builds a configuration from raw options, starting from the defaults.
    pub fn from_options(options: &ConfigOptions) -> Self {
        let mut config = Self::default();

        if let Some(size) = options.fft_size {
            config.set_fft_size(fft_size_from_number(size));
        }
        if let Some(value) = options.sensitivity {
            config.set_sensitivity(value);
        }
        config.set_decibel_range(
            options.min_decibels.unwrap_or(DEFAULT_MIN_DECIBELS),
            options.max_decibels.unwrap_or(DEFAULT_MAX_DECIBELS),
        );
        if let Some(color) = &options.color {
            config.set_color(color);
        }
        if let Some(value) = options.max_fps {
            config.set_max_fps(value);
        }
        if let Some(value) = options.multiplier {
            config.set_multiplier(value);
        }
        if let Some(value) = options.thickness {
            config.set_thickness(value);
        }
        if let Some(value) = options.x_offset {
            config.set_x_offset(value);
        }
        if let Some(value) = options.y_offset {
            config.set_y_offset(value);
        }
        if let Some(mode) = &options.mode {
            config.set_mode(VisualizationMode::parse_or_default(mode));
        }

        config
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of frequency bins produced for the current FFT size.
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    pub fn min_decibels(&self) -> f32 {
        self.min_decibels
    }

    pub fn max_decibels(&self) -> f32 {
        self.max_decibels
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn max_fps(&self) -> f32 {
        self.max_fps
    }

    /// Minimum spacing between painted frames, in milliseconds.
    pub fn target_frame_ms(&self) -> f64 {
        1000.0 / f64::from(self.max_fps)
    }

    pub fn multiplier(&self) -> f32 {
        self.multiplier
    }

    pub fn thickness(&self) -> f32 {
        self.thickness
    }

    pub fn x_offset(&self) -> f32 {
        self.x_offset
    }

    pub fn y_offset(&self) -> f32 {
        self.y_offset
    }

    pub fn mode(&self) -> VisualizationMode {
        self.mode
    }

    /// Accepts only the enumerated power-of-two sizes; anything else becomes
    /// [`DEFAULT_FFT_SIZE`].
    pub fn set_fft_size(&mut self, size: usize) -> usize {
        self.fft_size = if FFT_SIZES.contains(&size) {
            size
        } else {
            warn!(size, "unsupported fft size, using {DEFAULT_FFT_SIZE}");
            DEFAULT_FFT_SIZE
        };
        self.fft_size
    }

    pub fn set_sensitivity(&mut self, value: f32) -> f32 {
        self.sensitivity = clamp_or_default("sensitivity", value, 0.0, 1.0, DEFAULT_SENSITIVITY);
        self.sensitivity
    }

    /// Sets the decibel floor. A floor at or above the ceiling is ignored.
    pub fn set_min_decibels(&mut self, value: f32) -> f32 {
        let candidate = finite_or_default("minDecibels", value, DEFAULT_MIN_DECIBELS);
        if candidate < self.max_decibels {
            self.min_decibels = candidate;
        } else {
            warn!(
                min = candidate,
                max = self.max_decibels,
                "decibel floor must stay below the ceiling, keeping previous floor"
            );
        }
        self.min_decibels
    }

    /// Sets the decibel ceiling. A ceiling at or below the floor is ignored.
    pub fn set_max_decibels(&mut self, value: f32) -> f32 {
        let candidate = finite_or_default("maxDecibels", value, DEFAULT_MAX_DECIBELS);
        if candidate > self.min_decibels {
            self.max_decibels = candidate;
        } else {
            warn!(
                min = self.min_decibels,
                max = candidate,
                "decibel ceiling must stay above the floor, keeping previous ceiling"
            );
        }
        self.max_decibels
    }

    /// Sets floor and ceiling together, falling back to the default range if
    /// the pair is inverted.
    pub fn set_decibel_range(&mut self, min: f32, max: f32) -> (f32, f32) {
        let min = finite_or_default("minDecibels", min, DEFAULT_MIN_DECIBELS);
        let max = finite_or_default("maxDecibels", max, DEFAULT_MAX_DECIBELS);
        if min < max {
            self.min_decibels = min;
            self.max_decibels = max;
        } else {
            warn!(min, max, "inverted decibel range, using defaults");
            self.min_decibels = DEFAULT_MIN_DECIBELS;
            self.max_decibels = DEFAULT_MAX_DECIBELS;
        }
        (self.min_decibels, self.max_decibels)
    }

    /// Any non-blank color string is accepted as-is and handed to the surface.
    pub fn set_color(&mut self, color: &str) -> &str {
        let trimmed = color.trim();
        self.color = if trimmed.is_empty() {
            warn!("empty color, using {DEFAULT_COLOR}");
            DEFAULT_COLOR.to_string()
        } else {
            trimmed.to_string()
        };
        &self.color
    }

    pub fn set_max_fps(&mut self, value: f32) -> f32 {
        self.max_fps = clamp_or_default("maxFPS", value, MIN_MAX_FPS, f32::MAX, DEFAULT_MAX_FPS);
        self.max_fps
    }

    pub fn set_multiplier(&mut self, value: f32) -> f32 {
        self.multiplier =
            clamp_or_default("multiplier", value, MIN_MULTIPLIER, f32::MAX, DEFAULT_MULTIPLIER);
        self.multiplier
    }

    pub fn set_thickness(&mut self, value: f32) -> f32 {
        self.thickness =
            clamp_or_default("thickness", value, MIN_THICKNESS, f32::MAX, DEFAULT_THICKNESS);
        self.thickness
    }

    pub fn set_x_offset(&mut self, value: f32) -> f32 {
        self.x_offset = finite_or_default("xOffset", value, 0.0);
        self.x_offset
    }

    pub fn set_y_offset(&mut self, value: f32) -> f32 {
        self.y_offset = finite_or_default("yOffset", value, 0.0);
        self.y_offset
    }

    pub fn set_mode(&mut self, mode: VisualizationMode) -> VisualizationMode {
        self.mode = mode;
        self.mode
    }
}

fn fft_size_from_number(value: f64) -> usize {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= usize::MAX as f64 {
        value as usize
    } else {
        0
    }
}

fn finite_or_default(field: &'static str, value: f32, default: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        warn!(field, value, "non-finite value replaced with default {default}");
        default
    }
}

fn clamp_or_default(field: &'static str, value: f32, min: f32, max: f32, default: f32) -> f32 {
    if !value.is_finite() {
        return finite_or_default(field, value, default);
    }

    let clamped = value.clamp(min, max);
    if clamped != value {
        warn!(field, value, clamped, "value out of range, clamped");
    }
    clamped
}
