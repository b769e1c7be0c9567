//! Analysis configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Channels produced by the standard simulation run.
pub const DEFAULT_CHANNELS: [&str; 6] = [
    "weak_inf",
    "weak_zap",
    "moderate_inf",
    "moderate_zap",
    "strong_inf",
    "strong_zap",
];

/// Settings of a multi-channel analysis run. Every field has a default, so a
/// config file only needs the fields it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Histogram bins per aperture.
    pub eta_bins: usize,
    /// Beam-wander draws per aperture for the total-probability models.
    pub r0_iterations: usize,
    /// Elliptic-beam draws per aperture.
    pub transmittance_iterations: usize,
    /// Beam rows integrated by the numerical elliptical-beam model.
    pub num_elliptical_iterations: usize,
    /// Integration grid side length for the numerical elliptical-beam model.
    pub grid_resolution: usize,
    /// Base seed; each channel mixes in its index.
    pub seed: u64,
    /// Directory holding one sub-directory of simulator output per channel.
    pub data_dir: PathBuf,
    /// Directory the per-channel results are written to.
    pub results_dir: PathBuf,
    pub channels: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            eta_bins: 200,
            r0_iterations: 100_000,
            transmittance_iterations: 100_000,
            num_elliptical_iterations: 2000,
            grid_resolution: 256,
            seed: 2511,
            data_dir: PathBuf::from("data"),
            results_dir: PathBuf::from("results"),
            channels: DEFAULT_CHANNELS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl AnalysisConfig {
    /// Load from a JSON file; missing fields take their defaults.
    pub fn load(path: &Path) -> ModelResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| ModelError::from_io(path, e))?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ModelResult<()> {
        let positive = [
            ("eta_bins", self.eta_bins),
            ("r0_iterations", self.r0_iterations),
            ("transmittance_iterations", self.transmittance_iterations),
            ("num_elliptical_iterations", self.num_elliptical_iterations),
            ("grid_resolution", self.grid_resolution),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ModelError::InvalidParameter(format!("{name} must be positive")));
            }
        }
        Ok(())
    }

    /// Seed for the channel at `index` in [`AnalysisConfig::channels`].
    pub fn channel_seed(&self, index: usize) -> u64 {
        self.seed
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add(index as u64)
    }
}
