//! ABOUTME: Configuration management with validation and environment loading
//! ABOUTME: Layers defaults, an optional TOML file and VIGIL_ environment variables

use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use validator::Validate;
use vg_core::{Error, Result};
use vg_record::{AnnotationStyle, RecordingPolicy};
use vg_vision::{
    BackgroundAlgorithm, BackgroundBackend, BackgroundConfig, MotionConfig, PreprocessConfig,
    Smoothing,
};

/// Config file looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "vigil";

/// Main configuration struct
#[derive(Debug, Clone, Deserialize, Serialize, Validate, Default)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub source: SourceConfig,
    #[validate(nested)]
    pub preprocess: PreprocessSettings,
    #[validate(nested)]
    pub background: BackgroundSettings,
    #[validate(nested)]
    pub motion: MotionSettings,
    #[validate(nested)]
    pub output: OutputConfig,
    #[validate(nested)]
    pub overlay: OverlayConfig,
    #[validate(nested)]
    pub display: DisplayConfig,
    pub status: StatusConfig,
}

/// Frame source configuration
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct SourceConfig {
    /// Directory of image files to replay
    pub input_dir: Option<String>,
    /// Nominal frame rate, used to timestamp replayed frames
    #[validate(range(min = 0.1, max = 1000.0))]
    pub fps: f64,
    /// Frames read ahead on a separate thread (0 = read inline)
    #[validate(range(max = 1024))]
    pub buffer_frames: usize,
    /// Timestamp frames with the wall clock instead of the nominal frame interval
    pub wall_clock: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            input_dir: None,
            fps: 25.0,
            buffer_frames: 0,
            wall_clock: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SmoothingKind {
    None,
    #[default]
    Gaussian,
    NormalizedBox,
    Median,
}

/// Smoothing applied before background subtraction
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct PreprocessSettings {
    /// Scale applied to frames before smoothing
    #[validate(range(min = 0.01, max = 4.0))]
    pub resize_factor: Option<f64>,
    /// Convert frames to gray before smoothing
    pub to_gray: bool,
    pub smoothing: SmoothingKind,
    #[validate(range(min = 1, max = 255))]
    pub kernel_size: u32,
    /// Gaussian sigma; 0 derives it from the kernel size
    #[validate(range(min = 0.0, max = 100.0))]
    pub sigma: f64,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self {
            resize_factor: None,
            to_gray: false,
            smoothing: SmoothingKind::Gaussian,
            kernel_size: 21,
            sigma: 0.0,
        }
    }
}

/// Background model configuration
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct BackgroundSettings {
    pub algorithm: BackgroundAlgorithm,
    pub backend: BackgroundBackend,
    #[validate(range(min = 1, max = 100000))]
    pub history: u32,
    #[validate(range(min = 0.0, max = 10000.0))]
    pub var_threshold: f64,
    #[validate(range(min = 0.0, max = 200000.0))]
    pub dist2_threshold: f64,
}

impl Default for BackgroundSettings {
    fn default() -> Self {
        let defaults = BackgroundConfig::default();
        Self {
            algorithm: defaults.algorithm,
            backend: defaults.backend,
            history: defaults.history,
            var_threshold: defaults.var_threshold,
            dist2_threshold: defaults.dist2_threshold,
        }
    }
}

/// Motion decision configuration
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct MotionSettings {
    /// Mask values strictly above this are foreground
    pub binary_threshold: u8,
    /// Moving pixels needed for a frame to count as motion
    #[validate(range(min = 1))]
    pub min_area: u64,
    /// Quiet time after the last motion before recording stops
    #[validate(range(min = 0.0, max = 86400.0))]
    pub delta_without_motion_secs: f64,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            binary_threshold: 127,
            min_area: 500,
            delta_without_motion_secs: 5.0,
        }
    }
}

/// Recorded frame output configuration
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct OutputConfig {
    #[validate(length(min = 1))]
    pub prefix: String,
    #[validate(length(min = 1))]
    pub extension: String,
    /// Nest each run under `<YYYY-MM-DD>/<HH.MM.SS>`
    pub date_folders: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            prefix: "./captures".to_string(),
            extension: "png".to_string(),
            date_folders: true,
        }
    }
}

/// Overlay geometry
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct OverlayConfig {
    /// Banner text height in pixels
    #[validate(range(min = 6.0, max = 200.0))]
    pub font_size: f32,
    #[validate(range(max = 64))]
    pub banner_padding: u32,
    #[validate(range(min = 1, max = 256))]
    pub indicator_radius: u32,
    #[validate(range(max = 1024))]
    pub indicator_margin: u32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        let style = AnnotationStyle::default();
        Self {
            font_size: style.font_size,
            banner_padding: style.banner_padding,
            indicator_radius: style.indicator_radius,
            indicator_margin: style.indicator_margin,
        }
    }
}

/// Preview configuration
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct DisplayConfig {
    /// Directory receiving preview snapshots; no preview when unset
    pub snapshot_dir: Option<String>,
    #[validate(range(min = 1))]
    pub snapshot_every: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: None,
            snapshot_every: 25,
        }
    }
}

/// HTTP status server; disabled unless an address is given
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StatusConfig {
    /// Listen address such as `127.0.0.1:8090`
    pub bind_addr: Option<String>,
}

impl Config {
    /// Load from `vigil.toml` in the working directory (if present) and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load with an explicit config file; the file must exist when a path is given.
    ///
    /// Missing keys fall back to the `Default` impls. Environment variables use the
    /// `VIGIL_` prefix and `__` between nested keys, e.g. `VIGIL_MOTION__MIN_AREA=800`.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        // Environment variables have the highest priority
        builder = builder.add_source(
            Environment::with_prefix("VIGIL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build config: {}", e)))?;

        let parsed: Config = config
            .try_deserialize()
            .map_err(|e| Error::Config(format!("Failed to deserialize config: {}", e)))?;

        parsed.check()?;
        Ok(parsed)
    }

    /// Range validation plus the cross-field rules ranges cannot express
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| Error::Validation(format!("Config validation failed: {}", e)))?;

        let kernel = self.preprocess.kernel_size;
        match self.preprocess.smoothing {
            SmoothingKind::Gaussian | SmoothingKind::Median if kernel < 3 || kernel % 2 == 0 => {
                return Err(Error::Validation(format!(
                    "preprocess.kernel_size must be odd and at least 3, got {}",
                    kernel
                )));
            }
            _ => {}
        }

        let extension = self.output.extension.trim_start_matches('.');
        if !["png", "jpg", "jpeg"]
            .iter()
            .any(|known| extension.eq_ignore_ascii_case(known))
        {
            return Err(Error::Validation(format!(
                "output.extension must be png, jpg or jpeg, got {}",
                self.output.extension
            )));
        }

        if let Some(addr) = &self.status.bind_addr {
            addr.parse::<SocketAddr>().map_err(|e| {
                Error::Validation(format!("status.bind_addr {} is not host:port: {}", addr, e))
            })?;
        }

        Ok(())
    }

    pub fn motion_config(&self) -> MotionConfig {
        let kernel_size = self.preprocess.kernel_size;
        let smoothing = match self.preprocess.smoothing {
            SmoothingKind::None => Smoothing::None,
            SmoothingKind::Gaussian => Smoothing::Gaussian {
                kernel_size,
                sigma: self.preprocess.sigma,
            },
            SmoothingKind::NormalizedBox => Smoothing::NormalizedBox { kernel_size },
            SmoothingKind::Median => Smoothing::Median { kernel_size },
        };

        MotionConfig {
            preprocess: PreprocessConfig {
                resize_factor: self.preprocess.resize_factor,
                to_gray: self.preprocess.to_gray,
                smoothing,
            },
            background: BackgroundConfig {
                algorithm: self.background.algorithm,
                backend: self.background.backend,
                history: self.background.history,
                var_threshold: self.background.var_threshold,
                dist2_threshold: self.background.dist2_threshold,
            },
            binary_threshold: self.motion.binary_threshold,
        }
    }

    pub fn recording_policy(&self) -> RecordingPolicy {
        RecordingPolicy {
            min_area: self.motion.min_area,
            cooldown: Duration::from_secs_f64(self.motion.delta_without_motion_secs),
        }
    }

    pub fn annotation_style(&self) -> AnnotationStyle {
        AnnotationStyle {
            font_size: self.overlay.font_size,
            banner_padding: self.overlay.banner_padding,
            indicator_radius: self.overlay.indicator_radius,
            indicator_margin: self.overlay.indicator_margin,
        }
    }

    pub fn input_dir(&self) -> Option<PathBuf> {
        self.source.input_dir.as_ref().map(PathBuf::from)
    }

    pub fn output_prefix(&self) -> PathBuf {
        PathBuf::from(&self.output.prefix)
    }
}
