use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::strip::StripGeometry;

/// Viewer settings. Loaded from an optional YAML file, then overridden by
/// command line flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerConfig {
    pub interval_ms: u64,
    pub cell_width: u32,
    pub cell_height: u32,
    pub show_delimiters: bool,
    pub start_paused: bool,
    /// How often a followed live file is re-checked when no change
    /// notification arrives.
    pub poll_interval_ms: u64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 40,
            cell_width: 12,
            cell_height: 200,
            show_delimiters: false,
            start_paused: false,
            poll_interval_ms: 100,
        }
    }
}

impl ViewerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read viewer config {}", path.display()))?;
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(&text)
            .with_context(|| format!("failed to parse viewer config yaml at {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            bail!("interval_ms must be at least 1");
        }
        if self.cell_width == 0 || self.cell_height == 0 {
            bail!(
                "cell size must be positive, got {}x{}",
                self.cell_width,
                self.cell_height
            );
        }
        if self.poll_interval_ms == 0 {
            bail!("poll_interval_ms must be at least 1");
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn geometry(&self) -> StripGeometry {
        StripGeometry {
            cell_width: self.cell_width as f32,
            cell_height: self.cell_height as f32,
            ..StripGeometry::default()
        }
    }
}
