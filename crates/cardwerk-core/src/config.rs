// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CardwerkError, Result};
use crate::types::OutputFormat;

/// Name of the JSON settings file inside the config directory.
pub const CONFIG_FILE: &str = "config.json";

/// Persistent application settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardwerkConfig {
    pub decoder: DecoderConfig,
    pub detector: DetectorConfig,
    pub export: ExportDefaults,
    pub worker: WorkerConfig,
}

/// Working-copy derivation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Longest edge of the interactive working image.
    pub working_max_edge: u32,
    /// JPEG quality (0-1) used when re-encoding non-PNG working images.
    pub working_jpeg_quality: f32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            working_max_edge: 2500,
            working_jpeg_quality: 0.92,
        }
    }
}

/// Edge/contour tuning for the card detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Side of the square Gaussian kernel (odd).
    pub blur_kernel: u32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Side of the square closing kernel (odd).
    pub close_kernel: u32,
    /// Absolute lower bound on contour area, in pixels.
    pub min_area_px: f64,
    /// Lower bound on contour area as a fraction of the image area.
    pub min_area_fraction: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            blur_kernel: 7,
            canny_low: 60.0,
            canny_high: 170.0,
            close_kernel: 9,
            min_area_px: 250_000.0,
            min_area_fraction: 0.015,
        }
    }
}

impl DetectorConfig {
    /// Resolution-adaptive minimum contour area for a `width` x `height` image.
    pub fn min_area(&self, width: u32, height: u32) -> f64 {
        self.min_area_px
            .max(self.min_area_fraction * width as f64 * height as f64)
    }

    /// Gaussian sigma matching a `blur_kernel`-sized kernel with automatic
    /// sigma (`0.3 * ((k - 1) / 2 - 1) + 0.8`).
    pub fn blur_sigma(&self) -> f32 {
        let k = self.blur_kernel.max(1) as f32;
        (0.3 * ((k - 1.0) * 0.5 - 1.0) + 0.8).max(0.1)
    }

    /// Chebyshev radius of the closing kernel (9x9 → 4).
    pub fn close_radius(&self) -> u8 {
        (self.close_kernel / 2).min(u8::MAX as u32) as u8
    }
}

/// Defaults applied to export runs when the caller does not override them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    pub format: OutputFormat,
    /// UI-level quality (70-100).
    pub quality: u32,
    pub include_warped: bool,
    pub write_manifest: bool,
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            format: OutputFormat::Jpeg,
            quality: 92,
            include_warped: true,
            write_manifest: true,
        }
    }
}

/// Background worker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Upper bound on a single decode/detect/render request.
    pub request_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 120,
        }
    }
}

impl CardwerkConfig {
    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let d = &self.detector;
        if d.blur_kernel == 0 || d.blur_kernel % 2 == 0 {
            return Err(CardwerkError::InvalidConfig(format!(
                "detector.blur_kernel must be odd and positive, got {}",
                d.blur_kernel
            )));
        }
        if d.close_kernel == 0 || d.close_kernel % 2 == 0 {
            return Err(CardwerkError::InvalidConfig(format!(
                "detector.close_kernel must be odd and positive, got {}",
                d.close_kernel
            )));
        }
        if !(d.canny_low > 0.0 && d.canny_low <= d.canny_high) {
            return Err(CardwerkError::InvalidConfig(format!(
                "detector canny thresholds must satisfy 0 < low <= high, got {} / {}",
                d.canny_low, d.canny_high
            )));
        }
        if d.min_area_px < 0.0 || !(0.0..=1.0).contains(&d.min_area_fraction) {
            return Err(CardwerkError::InvalidConfig(
                "detector minimum area must be non-negative and the fraction within [0, 1]".into(),
            ));
        }
        if self.decoder.working_max_edge == 0 {
            return Err(CardwerkError::InvalidConfig(
                "decoder.working_max_edge must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.decoder.working_jpeg_quality) {
            return Err(CardwerkError::InvalidConfig(format!(
                "decoder.working_jpeg_quality must be within [0, 1], got {}",
                self.decoder.working_jpeg_quality
            )));
        }
        if self.worker.request_timeout_secs == 0 {
            return Err(CardwerkError::InvalidConfig(
                "worker.request_timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Load settings from a JSON file and validate them.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Load from `path` when given, otherwise from the default location.
    /// A missing default file yields the built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match default_config_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => {
                debug!("no configuration file found; using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Write the settings as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// `$XDG_CONFIG_HOME/cardwerk/config.json`, falling back to
/// `~/.config/cardwerk/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg).join("cardwerk").join(CONFIG_FILE));
    }
    std::env::var("HOME").ok().map(|home| {
        PathBuf::from(home)
            .join(".config")
            .join("cardwerk")
            .join(CONFIG_FILE)
    })
}
