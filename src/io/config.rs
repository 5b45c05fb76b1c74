use crate::error::{Error, Result};
use crate::pipeline::shadow::DEFAULT_SHADOW_MAP_SIZE;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub shadow: ShadowConfig,
    #[serde(default)]
    pub animation: AnimationConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_title")]
    pub title: String,
    /// Side of the square window in pixels.
    #[serde(default = "default_screen_size")]
    pub size: usize,
    #[serde(default = "default_target_fps")]
    pub target_fps: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            size: default_screen_size(),
            target_fps: default_target_fps(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShadowConfig {
    #[serde(default = "default_shadow_map_size")]
    pub map_size: usize,
    #[serde(default = "default_offset_factor")]
    pub offset_factor: f32,
    #[serde(default = "default_offset_units")]
    pub offset_units: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            map_size: default_shadow_map_size(),
            offset_factor: default_offset_factor(),
            offset_units: default_offset_units(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnimationConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_max_ticks_per_frame")]
    pub max_ticks_per_frame: u32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            max_ticks_per_frame: default_max_ticks_per_frame(),
        }
    }
}

impl AnimationConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Headless rendering.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: String,
    #[serde(default = "default_frames")]
    pub frames: u32,
    /// Simulated time between headless frames.
    #[serde(default = "default_frame_time_ms")]
    pub frame_time_ms: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            frames: default_frames(),
            frame_time_ms: default_frame_time_ms(),
        }
    }
}

impl OutputConfig {
    pub fn frame_time(&self) -> Duration {
        Duration::from_millis(self.frame_time_ms)
    }
}

fn default_title() -> String {
    "Shadow Mapping Without Shaders".to_string()
}
fn default_screen_size() -> usize {
    600
}
fn default_target_fps() -> usize {
    60
}
fn default_shadow_map_size() -> usize {
    DEFAULT_SHADOW_MAP_SIZE
}
fn default_offset_factor() -> f32 {
    1.9
}
fn default_offset_units() -> f32 {
    4.0
}
fn default_tick_interval_ms() -> u64 {
    10
}
fn default_max_ticks_per_frame() -> u32 {
    100
}
fn default_output_path() -> String {
    "shadow_mapping.png".to_string()
}
fn default_frames() -> u32 {
    90
}
fn default_frame_time_ms() -> u64 {
    16
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Rejects values the demo cannot run with. The shadow map against
    /// window size check happens when the shadow mapper is built.
    pub fn validate(&self) -> Result<()> {
        if self.window.size == 0 {
            return Err(Error::InvalidConfig("window.size must be non-zero".into()));
        }
        if self.shadow.map_size == 0 {
            return Err(Error::InvalidConfig(
                "shadow.map_size must be non-zero".into(),
            ));
        }
        if self.animation.tick_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "animation.tick_interval_ms must be positive".into(),
            ));
        }
        if self.animation.max_ticks_per_frame == 0 {
            return Err(Error::InvalidConfig(
                "animation.max_ticks_per_frame must be positive".into(),
            ));
        }
        if self.output.frames == 0 {
            return Err(Error::InvalidConfig("output.frames must be positive".into()));
        }
        if !self.shadow.offset_factor.is_finite() || !self.shadow.offset_units.is_finite() {
            return Err(Error::InvalidConfig(
                "shadow polygon offset must be finite".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.window.size, 600);
        assert_eq!(config.window.title, "Shadow Mapping Without Shaders");
        assert_eq!(config.shadow.map_size, 512);
        assert_eq!(config.shadow.offset_factor, 1.9);
        assert_eq!(config.animation.tick_interval(), Duration::from_millis(10));
        assert_eq!(config.output.frames, 90);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = Config::parse(
            r#"
            [shadow]
            map_size = 256

            [output]
            path = "out.png"
            "#,
        )
        .unwrap();
        assert_eq!(config.shadow.map_size, 256);
        assert_eq!(config.shadow.offset_units, 4.0);
        assert_eq!(config.output.path, "out.png");
        assert_eq!(config.output.frame_time_ms, 16);
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let config = Config::parse("[window]\nsize = 0").unwrap();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = Config::parse("[animation]\ntick_interval_ms = 0").unwrap();
        assert!(config.validate().is_err());

        // The light would never move.
        let config = Config::parse("[animation]\nmax_ticks_per_frame = 0").unwrap();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            Config::parse("[window\nsize = 1"),
            Err(Error::ConfigParse(_))
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        assert!(matches!(
            Config::load("/nonexistent/shadow.toml"),
            Err(Error::ConfigRead { .. })
        ));
    }
}
