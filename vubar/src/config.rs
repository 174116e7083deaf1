//! Deployable display configuration and its wire document.
//!
//! The pipeline reads a snapshot at the top of each cycle; the network
//! service replaces the whole struct on a successful deploy. Matrix
//! dimensions and the band table are fixed at startup and are therefore
//! not part of [`DisplayConfig`].

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use vubar_viz::color::default_palette;
use vubar_viz::GainMode;

use crate::error::ConfigError;

/// Default band boundaries in Hz, one display column per band.
pub const DEFAULT_BAND_TABLE: [u32; 10] = [100, 250, 500, 750, 1000, 2000, 4000, 6000, 8000, 10000];

#[derive(Clone, Debug)]
pub struct DisplayConfig {
    /// Peak hold time right after a new peak, in ms.
    pub max_peak_wait_ms: u32,
    /// Per-cycle shrink of the peak wait, in ms.
    pub fall_increment_ms: u32,
    /// Per-cycle cap on downward level changes.
    pub speed_filter: f32,
    /// Fixed attenuation divisor for band energies.
    pub attenuation: f32,
    /// Track the rolling signal peak instead of the fixed attenuation.
    pub adaptive_gain: bool,
    /// Smallest divisor the adaptive gain may use.
    pub adaptive_floor: f32,
    pub brightness: u8,
    pub peak_color: Rgb888,
    /// rows × cols palette, column-major.
    pub pixel_colors: Vec<Rgb888>,
}

impl DisplayConfig {
    pub fn with_default_palette(rows: u16, cols: u16) -> Self {
        Self {
            max_peak_wait_ms: 1500,
            fall_increment_ms: 25,
            speed_filter: 0.08,
            attenuation: 100_000.0,
            adaptive_gain: false,
            adaptive_floor: 80_000.0,
            brightness: 20,
            peak_color: Rgb888::WHITE,
            pixel_colors: default_palette(rows, cols),
        }
    }

    pub fn gain_mode(&self) -> GainMode {
        if self.adaptive_gain {
            GainMode::Adaptive {
                floor: self.adaptive_floor,
            }
        } else {
            GainMode::Fixed {
                attenuation: self.attenuation,
            }
        }
    }
}

pub type SharedConfig = Arc<RwLock<DisplayConfig>>;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorDoc {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl From<Rgb888> for ColorDoc {
    fn from(color: Rgb888) -> Self {
        Self {
            r: color.r(),
            g: color.g(),
            b: color.b(),
        }
    }
}

impl From<ColorDoc> for Rgb888 {
    fn from(doc: ColorDoc) -> Self {
        Rgb888::new(doc.r, doc.g, doc.b)
    }
}

/// The JSON document spoken by `GET /config` and `POST /deploy`. Field
/// names follow the web portal's existing keys.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDoc {
    pub no_of_rows: u16,
    pub no_of_cols: u16,
    pub peak_delay: u32,
    pub peak_speed: u32,
    pub speed_filter: f32,
    pub atten: f32,
    #[serde(default)]
    pub adaptive_gain: bool,
    #[serde(default = "default_adaptive_floor")]
    pub adaptive_floor: f32,
    pub brightness: u8,
    pub peak: ColorDoc,
    pub pixels: Vec<ColorDoc>,
}

fn default_adaptive_floor() -> f32 {
    80_000.0
}

/// Snapshot the current configuration as a wire document.
pub fn document_from(config: &DisplayConfig, rows: u16, cols: u16) -> ConfigDoc {
    ConfigDoc {
        no_of_rows: rows,
        no_of_cols: cols,
        peak_delay: config.max_peak_wait_ms,
        peak_speed: config.fall_increment_ms,
        speed_filter: config.speed_filter,
        atten: config.attenuation,
        adaptive_gain: config.adaptive_gain,
        adaptive_floor: config.adaptive_floor,
        brightness: config.brightness,
        peak: config.peak_color.into(),
        pixels: config.pixel_colors.iter().map(|&c| c.into()).collect(),
    }
}

/// Validate a deploy document and apply it atomically. On any error the
/// current configuration is left untouched.
pub fn apply_document(
    shared: &SharedConfig,
    rows: u16,
    cols: u16,
    doc: &ConfigDoc,
) -> Result<(), ConfigError> {
    let want = rows as usize * cols as usize;
    if doc.pixels.len() != want {
        return Err(ConfigError::PaletteSize {
            got: doc.pixels.len(),
            want,
        });
    }
    if doc.peak_speed == 0 || doc.peak_speed > doc.peak_delay {
        return Err(ConfigError::OutOfRange("peakSpeed"));
    }
    if !(doc.speed_filter >= 0.0 && doc.speed_filter.is_finite()) {
        return Err(ConfigError::OutOfRange("speedFilter"));
    }
    if !(doc.atten >= 1.0 && doc.atten.is_finite()) {
        return Err(ConfigError::OutOfRange("atten"));
    }
    if !(doc.adaptive_floor >= 1.0 && doc.adaptive_floor.is_finite()) {
        return Err(ConfigError::OutOfRange("adaptiveFloor"));
    }

    let next = DisplayConfig {
        max_peak_wait_ms: doc.peak_delay,
        fall_increment_ms: doc.peak_speed,
        speed_filter: doc.speed_filter,
        attenuation: doc.atten,
        adaptive_gain: doc.adaptive_gain,
        adaptive_floor: doc.adaptive_floor,
        brightness: doc.brightness,
        peak_color: doc.peak.into(),
        pixel_colors: doc.pixels.iter().map(|&c| c.into()).collect(),
    };

    let mut guard = shared.write().unwrap_or_else(|e| e.into_inner());
    *guard = next;
    Ok(())
}
