//! Montage merges video clips, still images and captions into one MP4 timeline.
//!
//! A render call runs five stages:
//!
//! - resolve the output canvas and every clip's placement ([`geometry`])
//! - lay items out on dedicated tracks, substituting filler media ([`timeline`])
//! - attach opacity at cut points and on overlays ([`schedule`])
//! - freeze the result into an immutable [`Composition`] ([`compose`])
//! - encode it on a worker thread and report one [`RenderResult`] ([`export`])
//!
//! [`Montage`] wires the stages to a [`MediaProbe`] and an [`EncodePrimitive`]; the bundled
//! implementations drive the system `ffprobe` and `ffmpeg`.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod foundation;

pub mod compose;
pub mod config;
pub mod export;
pub mod geometry;
pub mod logging;
pub mod media;
pub mod project;
pub mod schedule;
pub mod session;
pub mod timeline;

pub use crate::foundation::core::{
    Affine, Canvas, Fps, Point, Rect, Rgba8, Size, TimeRange, Vec2, time_eq,
};
pub use crate::foundation::error::{MontageError, MontageResult};

pub use crate::compose::{Composition, LayerInstruction, VideoInstruction};
pub use crate::config::{CanvasPolicy, EngineConfig, FillerConfig, LoggingConfig};
pub use crate::export::ffmpeg::{FfmpegEncoder, FfmpegEncoderOpts};
pub use crate::export::{
    Container, EncodePrimitive, ExportHandle, ExportSettings, RenderResult, export,
};
pub use crate::geometry::{Orientation, Transform};
pub use crate::media::picker::{AssetLoader, FsAssetLoader, PickedAsset, gather_items};
pub use crate::media::{
    FfprobeProbe, ImageSource, MediaItem, MediaKind, MediaProbe, StillImage, TextOverlay,
    VideoSource, VideoSourceInfo,
};
pub use crate::project::{ProjectFile, ProjectItem};
pub use crate::schedule::{OpacityChange, OpacitySchedule, OverlayKind, OverlayLayer, TransitionMode};
pub use crate::session::{Montage, RenderRequest};
pub use crate::timeline::{FillerSource, FillerSources};
