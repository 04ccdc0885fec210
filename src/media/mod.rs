//! Media inputs: clips, still images, text captions, and source probing.

/// Picker boundary: turning picked asset handles into ordered media items.
pub mod picker;
/// Source probing through `ffprobe`.
pub mod probe;
/// Still images decoded with the `image` crate.
pub mod still;

use std::path::{Path, PathBuf};

use crate::foundation::core::{Rect, Rgba8};
use crate::foundation::error::{MontageError, MontageResult};

pub use probe::{FfprobeProbe, MediaProbe, VideoSourceInfo};
pub use still::{ImageSource, StillImage};

/// Handle to a video clip on disk.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VideoSource {
    /// Container file path.
    pub path: PathBuf,
}

impl VideoSource {
    /// Wrap a path as a clip handle.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// What a media item carries. Exactly one payload is ever present.
#[derive(Clone, Debug)]
pub enum MediaKind {
    /// A video clip with an optional audio track.
    Video(VideoSource),
    /// A still picture shown for the configured image duration.
    Image(StillImage),
}

/// One caller-supplied input. `index` fixes the final timeline order.
#[derive(Clone, Debug)]
pub struct MediaItem {
    /// Ordinal position on the timeline.
    pub index: usize,
    /// Payload.
    pub kind: MediaKind,
}

impl MediaItem {
    /// Video item at `index`.
    pub fn video(index: usize, path: impl Into<PathBuf>) -> Self {
        Self {
            index,
            kind: MediaKind::Video(VideoSource::new(path)),
        }
    }

    /// Image item at `index`.
    pub fn image(index: usize, image: StillImage) -> Self {
        Self {
            index,
            kind: MediaKind::Image(image),
        }
    }

    /// Return `true` for video items.
    pub fn is_video(&self) -> bool {
        matches!(self.kind, MediaKind::Video(_))
    }
}

/// Caption burned into the output above every other layer.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TextOverlay {
    /// Caption text.
    pub text: String,
    /// Font size in canvas pixels.
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    /// Fill color.
    #[serde(default = "default_text_color")]
    pub color: Rgba8,
    /// Bounding rectangle on the canvas; text is centered horizontally inside it.
    pub frame: Rect,
    /// Absolute time at which the fade-in starts.
    #[serde(default)]
    pub show_time: f64,
    /// Absolute time at which the fade-out starts; `0` keeps the caption to the end.
    #[serde(default)]
    pub hide_time: f64,
}

fn default_font_size() -> f64 {
    40.0
}

fn default_text_color() -> Rgba8 {
    Rgba8::rgb(255, 0, 0)
}

impl TextOverlay {
    /// Caption with default size and color, shown from `show_time` on.
    pub fn new(text: impl Into<String>, frame: Rect, show_time: f64) -> Self {
        Self {
            text: text.into(),
            font_size: default_font_size(),
            color: default_text_color(),
            frame,
            show_time,
            hide_time: 0.0,
        }
    }

    /// Check sizes and times.
    ///
    /// A zero `hide_time` keeps the caption up until the end. A nonzero `hide_time` before
    /// `show_time` is rejected: the fade-out would be scheduled ahead of the fade-in, leaving the
    /// caption's opacity changes out of order.
    pub fn validate(&self) -> MontageResult<()> {
        if !(self.font_size.is_finite() && self.font_size > 0.0) {
            return Err(MontageError::validation("text font_size must be positive"));
        }
        if !(self.show_time.is_finite() && self.show_time >= 0.0) {
            return Err(MontageError::validation("text show_time must be >= 0"));
        }
        if !(self.hide_time.is_finite() && self.hide_time >= 0.0) {
            return Err(MontageError::validation("text hide_time must be >= 0"));
        }
        if self.hide_time > 0.0 && self.hide_time < self.show_time {
            return Err(MontageError::validation(
                "text hide_time must not precede show_time",
            ));
        }
        if self.frame.width() <= 0.0 || self.frame.height() <= 0.0 {
            return Err(MontageError::validation("text frame must have a positive area"));
        }
        Ok(())
    }

    /// Top of the glyph box inside `frame`, vertically centering one line of text.
    pub fn baseline_top(&self) -> f64 {
        let y_diff = (self.frame.height() - self.font_size) / 2.0 - self.font_size / 10.0;
        self.frame.y0 + y_diff
    }
}

/// A media item after its source has been opened.
#[derive(Clone, Debug)]
pub struct OpenedItem {
    /// Ordinal position on the timeline.
    pub index: usize,
    /// Opened payload.
    pub kind: OpenedKind,
}

/// Result of opening one item's source.
#[derive(Clone, Debug)]
pub enum OpenedKind {
    /// Probed clip.
    Video(VideoSourceInfo),
    /// Still image, already decoded enough to know its size.
    Image(StillImage),
    /// The source could not be opened; the reason is kept for the allocation report.
    Unreadable(String),
}

/// Open every item in index order. Probe failures are recorded, not propagated.
#[tracing::instrument(skip_all, fields(items = items.len()))]
pub fn open_items(items: &[MediaItem], probe: &dyn MediaProbe) -> Vec<OpenedItem> {
    let mut ordered: Vec<&MediaItem> = items.iter().collect();
    ordered.sort_by_key(|item| item.index);

    ordered
        .into_iter()
        .map(|item| {
            let kind = match &item.kind {
                MediaKind::Video(src) => match probe.probe(&src.path) {
                    Ok(info) => OpenedKind::Video(info),
                    Err(e) => OpenedKind::Unreadable(e.to_string()),
                },
                MediaKind::Image(img) => OpenedKind::Image(img.clone()),
            };
            OpenedItem {
                index: item.index,
                kind,
            }
        })
        .collect()
}

/// Reject duplicate item indices, which would make the timeline order ambiguous.
pub fn check_unique_indices(items: &[MediaItem]) -> MontageResult<()> {
    let mut seen: Vec<usize> = items.iter().map(|i| i.index).collect();
    seen.sort_unstable();
    if let Some(w) = seen.windows(2).find(|w| w[0] == w[1]) {
        return Err(MontageError::validation(format!(
            "duplicate media item index {}",
            w[0]
        )));
    }
    Ok(())
}

/// Display helper used in log fields.
pub(crate) fn path_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
#[path = "../../tests/unit/media/mod.rs"]
mod tests;
