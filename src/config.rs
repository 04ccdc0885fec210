//! Engine configuration.
//!
//! Every field has a default, so a JSON config only needs to name what it overrides.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{MontageError, MontageResult};

/// Output file name used when none is configured.
pub const DEFAULT_OUTPUT_FILE_NAME: &str = "mergedVideo.mp4";

/// Canvas size in whole pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CanvasSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// How the output canvas is chosen for a render call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanvasPolicy {
    /// Use the orientation-corrected size of the tallest video item, falling back to
    /// [`EngineConfig::default_canvas`] when there is none.
    #[default]
    TallestClip,
    /// Always use [`EngineConfig::default_canvas`].
    Fixed,
}

/// Where silence and blank-background filler media come from.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FillerConfig {
    /// Generate fillers inside the encoder (`anullsrc` / `color=black`).
    #[default]
    Synthesized,
    /// Open fillers from bundled media files.
    Bundled {
        /// Audio file holding silence.
        silence: PathBuf,
        /// Video file holding blank frames.
        background: PathBuf,
    },
}

/// Logging settings consumed by [`crate::logging::init_logging`].
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Tunables for one [`crate::Montage`] engine.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Canvas used when no usable video item exists or the policy is `Fixed`.
    pub default_canvas: CanvasSize,
    /// Canvas sizing policy.
    pub canvas_policy: CanvasPolicy,
    /// Output frame rate.
    pub fps: Fps,
    /// Time each still image stays on the timeline, in seconds.
    pub image_duration: f64,
    /// Length of the fade-mode opacity ramp at a cut point.
    pub transition_duration: f64,
    /// Length of image overlay fade-in and fade-out.
    pub image_fade_duration: f64,
    /// Length of text overlay fade-in.
    pub text_fade_in: f64,
    /// Length of text overlay fade-out.
    pub text_fade_out: f64,
    /// Filler media source.
    pub fillers: FillerConfig,
    /// Directory for the output file; the system temp dir when unset.
    pub output_dir: Option<PathBuf>,
    /// Output file name inside `output_dir`.
    pub output_file_name: String,
    /// Font used for text overlays; ffmpeg's fontconfig default when unset.
    pub font_file: Option<PathBuf>,
    /// Logging settings for the CLI.
    pub logging: LoggingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_canvas: CanvasSize {
                width: 1920,
                height: 1080,
            },
            canvas_policy: CanvasPolicy::TallestClip,
            fps: Fps::default(),
            image_duration: 5.0,
            transition_duration: 1.0,
            image_fade_duration: 1.0,
            text_fade_in: 0.5,
            text_fade_out: 1.0,
            fillers: FillerConfig::Synthesized,
            output_dir: None,
            output_file_name: DEFAULT_OUTPUT_FILE_NAME.to_string(),
            font_file: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a config from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> MontageResult<Self> {
        let cfg: Self = serde_json::from_reader(r)
            .map_err(|e| MontageError::serde(format!("parse engine config JSON: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a config from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> MontageResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            MontageError::validation(format!("open engine config '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    /// Check value ranges.
    pub fn validate(&self) -> MontageResult<()> {
        if self.default_canvas.width == 0 || self.default_canvas.height == 0 {
            return Err(MontageError::validation(
                "default_canvas width/height must be non-zero",
            ));
        }
        Fps::new(self.fps.num, self.fps.den)?;
        for (name, v) in [
            ("image_duration", self.image_duration),
            ("transition_duration", self.transition_duration),
            ("image_fade_duration", self.image_fade_duration),
            ("text_fade_in", self.text_fade_in),
            ("text_fade_out", self.text_fade_out),
        ] {
            if !v.is_finite() || v <= 0.0 {
                return Err(MontageError::validation(format!(
                    "{name} must be a positive number of seconds"
                )));
            }
        }
        if self.output_file_name.trim().is_empty() {
            return Err(MontageError::validation("output_file_name must be non-empty"));
        }
        Ok(())
    }

    /// The configured default canvas at the configured frame rate.
    pub fn default_canvas(&self) -> Canvas {
        Canvas {
            width: self.default_canvas.width,
            height: self.default_canvas.height,
            fps: self.fps,
        }
    }

    /// Fixed output location for this engine.
    pub fn output_path(&self) -> PathBuf {
        let dir = self.output_dir.clone().unwrap_or_else(std::env::temp_dir);
        dir.join(&self.output_file_name)
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
