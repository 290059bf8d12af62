// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Renderer configuration, loadable from RON.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// How often a loop ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameRate {
    /// Tick as fast as possible, yielding between ticks.
    Adaptive,
    /// Tick at a fixed frequency in Hz, sleeping off the remaining budget.
    Fixed(u32),
}

impl FrameRate {
    /// The target period, `None` for adaptive loops.
    pub fn period(&self) -> Option<Duration> {
        match *self {
            FrameRate::Adaptive => None,
            FrameRate::Fixed(hz) => Some(Duration::from_nanos(1_000_000_000 / u64::from(hz.max(1)))),
        }
    }
}

/// Dimensions and capacity of the light cluster grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Cells along screen X.
    pub grid_x: u32,
    /// Cells along screen Y.
    pub grid_y: u32,
    /// Depth slices.
    pub grid_z: u32,
    /// Capacity of each cluster's light list.
    pub max_lights_per_cluster: u32,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            grid_x: 16,
            grid_y: 9,
            grid_z: 24,
            max_lights_per_cluster: 1024,
        }
    }
}

impl ClusterConfig {
    /// Number of screen-space cells in one depth slice.
    pub fn cells_per_slice(&self) -> usize {
        self.grid_x as usize * self.grid_y as usize
    }

    /// Total number of clusters.
    pub fn cluster_count(&self) -> usize {
        self.cells_per_slice() * self.grid_z as usize
    }

    /// Flat index of the cluster at `(x, y, z)`.
    #[inline]
    pub fn cluster_index(&self, x: u32, y: u32, z: u32) -> usize {
        x as usize + y as usize * self.grid_x as usize + z as usize * self.cells_per_slice()
    }
}

/// What to do with commands whose precondition keeps failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeferralPolicy {
    /// Consecutive deferred frames after which a warning is logged once.
    pub warn_after_frames: u32,
    /// Consecutive deferred frames after which the target's pending commands
    /// are dropped. `None` retries forever.
    pub drop_after_frames: Option<u32>,
}

impl Default for DeferralPolicy {
    fn default() -> Self {
        Self {
            warn_after_frames: 120,
            drop_after_frames: None,
        }
    }
}

/// Top-level renderer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Frame rate of the render thread.
    pub render_rate: FrameRate,
    /// Tick rate of the simulation loop.
    pub simulation_rate: FrameRate,
    /// Light cluster grid.
    pub clusters: ClusterConfig,
    /// Command deferral policy.
    pub deferral: DeferralPolicy,
    /// Version string written on the `#version` line of every shader stage.
    pub glsl_version: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            render_rate: FrameRate::Fixed(60),
            simulation_rate: FrameRate::Adaptive,
            clusters: ClusterConfig::default(),
            deferral: DeferralPolicy::default(),
            glsl_version: "430 core".to_owned(),
        }
    }
}

/// An error raised while loading or validating a [`RenderConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read.
    Io(std::io::Error),
    /// The text is not valid RON for a [`RenderConfig`].
    Parse(ron::error::SpannedError),
    /// The configuration could not be written.
    Serialize(ron::Error),
    /// A value is out of range.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read render config: {e}"),
            ConfigError::Parse(e) => write!(f, "Failed to parse render config: {e}"),
            ConfigError::Serialize(e) => write!(f, "Failed to write render config: {e}"),
            ConfigError::Invalid(msg) => write!(f, "Invalid render config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Serialize(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<ron::error::SpannedError> for ConfigError {
    fn from(e: ron::error::SpannedError) -> Self {
        ConfigError::Parse(e)
    }
}

impl From<ron::Error> for ConfigError {
    fn from(e: ron::Error) -> Self {
        ConfigError::Serialize(e)
    }
}

impl RenderConfig {
    /// Parses and validates a configuration from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: RenderConfig = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a configuration from a `.ron` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_ron_str(&text)?;
        log::info!("Loaded render config from {}", path.display());
        Ok(config)
    }

    /// Serializes the configuration as pretty RON.
    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        let pretty = ron::ser::PrettyConfig::default().indentor("  ".to_string());
        Ok(ron::ser::to_string_pretty(self, pretty)?)
    }

    /// Checks every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, rate) in [
            ("render_rate", self.render_rate),
            ("simulation_rate", self.simulation_rate),
        ] {
            if rate == FrameRate::Fixed(0) {
                return Err(ConfigError::Invalid(format!("{name} must be above 0 Hz")));
            }
        }
        let c = &self.clusters;
        if c.grid_x == 0 || c.grid_y == 0 || c.grid_z == 0 {
            return Err(ConfigError::Invalid(format!(
                "cluster grid {}x{}x{} has an empty dimension",
                c.grid_x, c.grid_y, c.grid_z
            )));
        }
        if c.max_lights_per_cluster == 0 {
            return Err(ConfigError::Invalid(
                "max_lights_per_cluster must be above 0".to_owned(),
            ));
        }
        if self.glsl_version.trim().is_empty() {
            return Err(ConfigError::Invalid("glsl_version is empty".to_owned()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config = RenderConfig::from_ron_str("(render_rate: Fixed(30))").unwrap();
        assert_eq!(config.render_rate, FrameRate::Fixed(30));
        assert_eq!(config.simulation_rate, FrameRate::Adaptive);
        assert_eq!(config.clusters, ClusterConfig::default());
        assert_eq!(config.deferral.warn_after_frames, 120);
        assert_eq!(config.deferral.drop_after_frames, None);
    }

    #[test]
    fn nested_partial_structs_use_defaults() {
        let config =
            RenderConfig::from_ron_str("(clusters: (grid_z: 16), deferral: (drop_after_frames: Some(600)))")
                .unwrap();
        assert_eq!(config.clusters.grid_x, 16);
        assert_eq!(config.clusters.grid_z, 16);
        assert_eq!(config.deferral.drop_after_frames, Some(600));
    }

    #[test]
    fn pretty_output_parses_back() {
        let config = RenderConfig {
            glsl_version: "450 core".to_owned(),
            ..Default::default()
        };
        let text = config.to_ron_string().unwrap();
        assert_eq!(RenderConfig::from_ron_str(&text).unwrap(), config);
    }

    #[test]
    fn zero_sized_grid_is_rejected() {
        let result = RenderConfig::from_ron_str("(clusters: (grid_x: 0))");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
        assert!(matches!(
            RenderConfig::from_ron_str("(render_rate: Sometimes)"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn cluster_index_is_x_major() {
        let clusters = ClusterConfig::default();
        assert_eq!(clusters.cluster_count(), 3456);
        assert_eq!(clusters.cluster_index(1, 0, 0), 1);
        assert_eq!(clusters.cluster_index(0, 1, 0), 16);
        assert_eq!(clusters.cluster_index(0, 0, 1), 144);
        assert_eq!(clusters.cluster_index(15, 8, 23), 3455);
    }

    #[test]
    fn fixed_rate_period() {
        assert_eq!(FrameRate::Fixed(50).period(), Some(Duration::from_millis(20)));
        assert_eq!(FrameRate::Adaptive.period(), None);
    }
}
