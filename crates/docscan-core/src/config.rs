// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanner configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanError};

/// Tunables for detection, dispatch, editing and PDF output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Number of geometry workers. `None` means available parallelism − 1,
    /// with a minimum of 1.
    pub pool_size: Option<usize>,
    /// Target cadence of the live-preview detection loop.
    pub preview_interval_ms: u64,
    /// Per-job timeout for worker dispatch. `None` waits forever.
    pub job_timeout_ms: Option<u64>,
    /// JPEG quality (1-100) used when embedding pages in the PDF.
    pub jpeg_quality: u8,
    /// Fixed output width for extracted pages. `None` uses the quad's
    /// measured width.
    pub output_width: Option<u32>,
    /// Edge-grab radius as a fraction of min(viewport width, height).
    pub grab_threshold_fraction: f64,
    /// Detected quads smaller than this fraction of the frame are rejected.
    pub min_quad_area_fraction: f64,
    /// Frames are downsampled so neither side exceeds this before detection.
    pub detect_max_dimension: u32,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            pool_size: None,
            preview_interval_ms: 250,
            job_timeout_ms: None,
            jpeg_quality: 92,
            output_width: None,
            grab_threshold_fraction: 0.2,
            min_quad_area_fraction: 0.1,
            detect_max_dimension: 720,
        }
    }
}

impl ScannerConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == Some(0) {
            return Err(ScanError::Config("pool_size must be at least 1".into()));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ScanError::Config(format!(
                "jpeg_quality must be 1-100, got {}",
                self.jpeg_quality
            )));
        }
        if self.output_width == Some(0) {
            return Err(ScanError::Config("output_width must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.grab_threshold_fraction) {
            return Err(ScanError::Config(format!(
                "grab_threshold_fraction must be within 0-1, got {}",
                self.grab_threshold_fraction
            )));
        }
        if !(0.0..1.0).contains(&self.min_quad_area_fraction) {
            return Err(ScanError::Config(format!(
                "min_quad_area_fraction must be within 0-1, got {}",
                self.min_quad_area_fraction
            )));
        }
        if self.detect_max_dimension < 64 {
            return Err(ScanError::Config(format!(
                "detect_max_dimension must be at least 64, got {}",
                self.detect_max_dimension
            )));
        }
        Ok(())
    }

    /// Worker count after applying the parallelism default.
    pub fn effective_pool_size(&self) -> usize {
        self.pool_size.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get().saturating_sub(1))
                .unwrap_or(1)
                .max(1)
        })
    }

    pub fn preview_interval(&self) -> Duration {
        Duration::from_millis(self.preview_interval_ms)
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = ScannerConfig::default();
        config.validate().unwrap();
        assert!(config.effective_pool_size() >= 1);
        assert_eq!(config.preview_interval(), Duration::from_millis(250));
        assert!(config.job_timeout().is_none());
    }

    #[test]
    fn load_fills_missing_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"pool_size": 3, "jpeg_quality": 70}}"#).unwrap();

        let config = ScannerConfig::load(file.path()).unwrap();
        assert_eq!(config.pool_size, Some(3));
        assert_eq!(config.jpeg_quality, 70);
        assert_eq!(config.preview_interval_ms, 250);
        assert_eq!(config.effective_pool_size(), 3);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let config = ScannerConfig {
            pool_size: Some(0),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ScanError::Config(_))));

        let config = ScannerConfig {
            jpeg_quality: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ScannerConfig {
            grab_threshold_fraction: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
