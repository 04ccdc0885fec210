use std::path::{Path, PathBuf};

use crate::config::FillerConfig;
use crate::foundation::error::{MontageError, MontageResult};
use crate::media::MediaProbe;

/// One placeholder source substituted when an input lacks a track.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FillerSource {
    /// Produced by the encoder's own generator filters; unbounded length.
    Generated,
    /// Read from a media file, looped to any length.
    File {
        /// Media file path.
        path: PathBuf,
    },
}

/// Read-only silence and blank-background sources shared by every render of an engine.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct FillerSources {
    /// Audio used where a clip has no audio track and under images.
    pub silence: FillerSource,
    /// Video frames under image overlays.
    pub background: FillerSource,
}

impl FillerSources {
    /// Encoder-generated fillers. Never fails.
    pub fn synthesized() -> Self {
        Self {
            silence: FillerSource::Generated,
            background: FillerSource::Generated,
        }
    }

    /// Open bundled filler files, checking that each one carries the track it stands in for.
    pub fn bundled(silence: &Path, background: &Path, probe: &dyn MediaProbe) -> MontageResult<Self> {
        for path in [silence, background] {
            if !path.is_file() {
                return Err(MontageError::MissingBundledResource(path.to_path_buf()));
            }
        }

        let silence_info = probe
            .probe(silence)
            .map_err(|_| MontageError::MissingBundledResource(silence.to_path_buf()))?;
        if !silence_info.has_audio {
            return Err(MontageError::MissingBundledResource(silence.to_path_buf()));
        }

        let bg_info = probe
            .probe(background)
            .map_err(|_| MontageError::MissingBundledResource(background.to_path_buf()))?;
        if !bg_info.has_video {
            return Err(MontageError::MissingBundledResource(background.to_path_buf()));
        }

        Ok(Self {
            silence: FillerSource::File {
                path: silence.to_path_buf(),
            },
            background: FillerSource::File {
                path: background.to_path_buf(),
            },
        })
    }

    /// Build fillers as configured.
    pub fn from_config(cfg: &FillerConfig, probe: &dyn MediaProbe) -> MontageResult<Self> {
        match cfg {
            FillerConfig::Synthesized => Ok(Self::synthesized()),
            FillerConfig::Bundled {
                silence,
                background,
            } => Self::bundled(silence, background, probe),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/fillers.rs"]
mod tests;
