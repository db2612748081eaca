use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use zvid_core::{FrameGeometry, PipelineConfig};
use zvid_media::AudioRenderConfig;

/// Conversion settings. Every field has a default matching the 96x54
/// six-zone display, so a config file only needs the fields it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    pub width: u32,
    pub height: u32,
    pub rows_per_zone: u32,
    pub zone_count: u32,
    pub target_fps: u32,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            width: 96,
            height: 54,
            rows_per_zone: 9,
            zone_count: 6,
            target_fps: 10,
            sample_rate: zvid_media::audio::DEFAULT_SAMPLE_RATE,
            channels: 1,
        }
    }
}

impl ConvertConfig {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn geometry(&self) -> anyhow::Result<FrameGeometry> {
        Ok(FrameGeometry::new(
            self.width,
            self.height,
            self.rows_per_zone,
            self.zone_count,
        )?)
    }

    /// Validates the whole config and builds the frame pipeline settings.
    pub fn pipeline(&self, output_dir: &Path) -> anyhow::Result<PipelineConfig> {
        if self.target_fps == 0 {
            anyhow::bail!("target_fps must be positive");
        }
        if self.sample_rate == 0 {
            anyhow::bail!("sample_rate must be positive");
        }
        if !matches!(self.channels, 1 | 2) {
            anyhow::bail!("channels must be 1 or 2, got {}", self.channels);
        }
        Ok(PipelineConfig {
            geometry: self.geometry()?,
            target_fps: self.target_fps,
            output_dir: PathBuf::from(output_dir),
        })
    }

    pub fn audio(&self) -> AudioRenderConfig {
        AudioRenderConfig {
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }
}
