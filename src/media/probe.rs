use std::path::{Path, PathBuf};

use crate::foundation::core::{Affine, Size};
use crate::foundation::error::{MontageError, MontageResult};

/// Facts about a source container that the pipeline needs.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VideoSourceInfo {
    /// Container path used by the encoder.
    pub source_path: PathBuf,
    /// Stored (un-rotated) size of the first video track; zero when there is none.
    pub natural_size: Size,
    /// Display transform stored with the video track.
    pub embedded_transform: Affine,
    /// Container duration in seconds.
    pub duration: f64,
    /// Whether a video stream was found.
    pub has_video: bool,
    /// Whether an audio stream was found.
    pub has_audio: bool,
}

/// Opens sources and reports their track layout.
///
/// The engine never decodes media itself; implementations wrap whatever demuxer the platform
/// has. Tests use in-memory implementations.
pub trait MediaProbe: Send + Sync {
    /// Inspect the container at `path`.
    fn probe(&self, path: &Path) -> MontageResult<VideoSourceInfo>;
}

/// [`MediaProbe`] backed by the system `ffprobe`.
#[derive(Clone, Debug, Default)]
pub struct FfprobeProbe;

impl MediaProbe for FfprobeProbe {
    fn probe(&self, path: &Path) -> MontageResult<VideoSourceInfo> {
        #[derive(serde::Deserialize, Default)]
        struct ProbeTags {
            rotate: Option<String>,
        }
        #[derive(serde::Deserialize)]
        struct ProbeSideData {
            rotation: Option<f64>,
        }
        #[derive(serde::Deserialize)]
        struct ProbeStream {
            codec_type: Option<String>,
            width: Option<u32>,
            height: Option<u32>,
            duration: Option<String>,
            #[serde(default)]
            tags: Option<ProbeTags>,
            #[serde(default)]
            side_data_list: Vec<ProbeSideData>,
        }
        #[derive(serde::Deserialize)]
        struct ProbeFormat {
            duration: Option<String>,
        }
        #[derive(serde::Deserialize)]
        struct ProbeOut {
            #[serde(default)]
            streams: Vec<ProbeStream>,
            format: Option<ProbeFormat>,
        }

        if !path.exists() {
            return Err(MontageError::validation(format!(
                "source '{}' does not exist",
                path.display()
            )));
        }

        let out = std::process::Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_streams",
                "-show_format",
            ])
            .arg(path)
            .output()
            .map_err(|e| anyhow::anyhow!("failed to run ffprobe: {e}"))?;
        if !out.status.success() {
            return Err(MontageError::validation(format!(
                "ffprobe failed for '{}': {}",
                path.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
            .map_err(|e| MontageError::serde(format!("ffprobe json parse failed: {e}")))?;

        let video = parsed
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"));
        let has_audio = parsed
            .streams
            .iter()
            .any(|s| s.codec_type.as_deref() == Some("audio"));

        let (natural_size, rotation) = match video {
            Some(v) => {
                let size = Size::new(
                    f64::from(v.width.unwrap_or(0)),
                    f64::from(v.height.unwrap_or(0)),
                );
                // Display-matrix side data is counter-clockwise; the legacy tag is clockwise.
                let rotation = v
                    .side_data_list
                    .iter()
                    .find_map(|sd| sd.rotation)
                    .map(|r| -r)
                    .or_else(|| {
                        v.tags
                            .as_ref()
                            .and_then(|t| t.rotate.as_deref())
                            .and_then(|r| r.parse::<f64>().ok())
                    })
                    .unwrap_or(0.0);
                (size, rotation)
            }
            None => (Size::ZERO, 0.0),
        };

        let duration = parsed
            .format
            .as_ref()
            .and_then(|f| f.duration.as_deref())
            .or_else(|| video.and_then(|v| v.duration.as_deref()))
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(0.0);

        Ok(VideoSourceInfo {
            source_path: path.to_path_buf(),
            natural_size,
            embedded_transform: transform_for_rotation(rotation, natural_size),
            duration,
            has_video: video.is_some(),
            has_audio,
        })
    }
}

/// Display transform for a clockwise rotation in degrees, with the translation that keeps the
/// rotated frame in the positive quadrant.
///
/// Non-right-angle rotations yield the identity.
pub fn transform_for_rotation(clockwise_deg: f64, natural: Size) -> Affine {
    let deg = (clockwise_deg.round() as i64).rem_euclid(360);
    let (w, h) = (natural.width, natural.height);
    match deg {
        90 => Affine::new([0.0, 1.0, -1.0, 0.0, h, 0.0]),
        180 => Affine::new([-1.0, 0.0, 0.0, -1.0, w, h]),
        270 => Affine::new([0.0, -1.0, 1.0, 0.0, 0.0, w]),
        0 => Affine::IDENTITY,
        other => {
            tracing::warn!(rotation = other, "unsupported display rotation, ignoring");
            Affine::IDENTITY
        }
    }
}

/// Return `true` when `ffprobe` can be invoked from `PATH`.
pub fn is_ffprobe_on_path() -> bool {
    std::process::Command::new("ffprobe")
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "../../tests/unit/media/probe.rs"]
mod tests;
