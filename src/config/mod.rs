//! Run configuration for a two-view epipolar visualization.
//!
//! A run is described by a single YAML document listing the two images with
//! their annotated pixel points, an optional externally supplied fundamental
//! matrix, and rendering options:
//!
//! ```yaml
//! images:
//!   - path: data/view_00.png
//!     points: [[1052.0, 611.0], [737.0, 516.0]]
//!   - path: data/view_01.png
//!     points: [[904.0, 540.0], [610.0, 481.0]]
//! fundamental:          # optional, bypasses estimation when present
//!   - [0.0, 0.0, 1.0e-3]
//!   - [0.0, 0.0, -2.0e-2]
//!   - [-1.0e-3, 2.0e-2, 1.0]
//! output_dir: output
//! prefix: ""
//! grid: { nx: 4, ny: 4 }
//! ```
//!
//! Point coordinates are plain pixel positions (origin at the top-left
//! corner); the pipeline re-expresses them relative to each image's center
//! before any geometry runs.

use nalgebra::{Matrix3, Point2};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO Error: {0}")]
    IOError(String),
    #[error("Failed to parse YAML: {0}")]
    YamlError(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IOError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::YamlError(err.to_string())
    }
}

/// One image of the pair with its annotated points in pixel coordinates.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageEntry {
    pub path: PathBuf,
    pub points: Vec<[f64; 2]>,
}

impl ImageEntry {
    /// Annotated points as 2D points, still in pixel coordinates.
    pub fn points_2d(&self) -> Vec<Point2<f64>> {
        self.points.iter().map(|p| Point2::new(p[0], p[1])).collect()
    }
}

/// Grid dimensions for the optional whole-image epipolar sweep.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GridSpec {
    #[serde(default = "default_grid_cells")]
    pub nx: usize,
    #[serde(default = "default_grid_cells")]
    pub ny: usize,
}

fn default_grid_cells() -> usize {
    4
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

/// A complete run configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Exactly two entries, first image then second image.
    pub images: Vec<ImageEntry>,
    /// Externally supplied fundamental matrix, row-major. When present it
    /// takes precedence and the estimator is not invoked.
    #[serde(default)]
    pub fundamental: Option<[[f64; 3]; 3]>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub prefix: String,
    /// When set, additionally render epipolar lines for a grid of synthetic
    /// points swept across each image.
    #[serde(default)]
    pub grid: Option<GridSpec>,
}

impl RunConfig {
    /// Load a run configuration from a YAML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the YAML configuration file
    ///
    /// # Errors
    ///
    /// * [`ConfigError::IOError`] if the file cannot be read.
    /// * [`ConfigError::YamlError`] if the content is not valid YAML or
    ///   does not match the expected structure.
    /// * [`ConfigError::InvalidConfig`] if the document parses but violates
    ///   a structural requirement (see [`RunConfig::validate`]).
    pub fn load_from_yaml(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: RunConfig = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Structural validation: exactly two images, each with at least one
    /// annotated point, and a finite matrix override when one is given.
    ///
    /// Equality of the two images' point counts is not checked here; the
    /// estimator rejects mismatched counts itself, and with an external
    /// matrix the counts are allowed to differ.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.images.len() != 2 {
            return Err(ConfigError::InvalidConfig(format!(
                "Expected exactly 2 images, got {}",
                self.images.len()
            )));
        }
        for entry in &self.images {
            if entry.points.is_empty() {
                return Err(ConfigError::InvalidConfig(format!(
                    "Image '{}' has no annotated points",
                    entry.path.display()
                )));
            }
        }
        if let Some(rows) = &self.fundamental {
            let all_finite = rows.iter().flatten().all(|value| value.is_finite());
            if !all_finite {
                return Err(ConfigError::InvalidConfig(
                    "Fundamental matrix override contains non-finite values".to_string(),
                ));
            }
        }
        if let Some(grid) = &self.grid {
            if grid.nx == 0 || grid.ny == 0 {
                return Err(ConfigError::InvalidConfig(
                    "Grid dimensions must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// The externally supplied fundamental matrix, if any.
    pub fn fundamental(&self) -> Option<Matrix3<f64>> {
        self.fundamental.map(|rows| {
            Matrix3::new(
                rows[0][0], rows[0][1], rows[0][2],
                rows[1][0], rows[1][1], rows[1][2],
                rows[2][0], rows[2][1], rows[2][2],
            )
        })
    }
}
