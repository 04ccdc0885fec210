//! Composition assembly: freezing an allocation into the value handed to the encoder.

use crate::foundation::core::{Canvas, TimeRange, time_eq};
use crate::foundation::error::{MontageError, MontageResult};
use crate::geometry::Transform;
use crate::schedule::{OpacitySchedule, OverlayLayer};
use crate::timeline::{
    Allocation, CompositionTrack, FillerSources, FillerUsage, Segment, SkippedItem, TrackId,
    TrackMedia,
};

/// Placement and opacity of one video track inside the instruction window.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct LayerInstruction {
    /// Track the instruction applies to.
    pub track: TrackId,
    /// Media item that owns the track.
    pub item_index: usize,
    /// Canvas placement; `None` for the full-canvas background under images.
    pub transform: Option<Transform>,
    /// Track opacity over time.
    pub opacity: OpacitySchedule,
}

/// Per-track instructions covering a span of the timeline.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct VideoInstruction {
    /// Covered span; always the whole timeline.
    pub range: TimeRange,
    /// One entry per segment, in timeline order.
    pub layers: Vec<LayerInstruction>,
}

/// The immutable result of planning a render call.
#[derive(Clone, Debug, serde::Serialize)]
pub struct Composition {
    canvas: Canvas,
    fillers: FillerSources,
    fillers_used: FillerUsage,
    tracks: Vec<CompositionTrack>,
    segments: Vec<Segment>,
    instruction: VideoInstruction,
    overlays: Vec<OverlayLayer>,
    skipped: Vec<SkippedItem>,
    duration: f64,
}

impl Composition {
    /// Output canvas.
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Filler sources referenced by the tracks.
    pub fn fillers(&self) -> &FillerSources {
        &self.fillers
    }

    /// Which fillers the tracks reference.
    pub fn fillers_used(&self) -> FillerUsage {
        self.fillers_used
    }

    /// All tracks, in creation order.
    pub fn tracks(&self) -> &[CompositionTrack] {
        &self.tracks
    }

    /// Tracks carrying `media`, in creation order.
    pub fn tracks_of(&self, media: TrackMedia) -> impl Iterator<Item = &CompositionTrack> {
        self.tracks.iter().filter(move |t| t.media == media)
    }

    /// Look up a track by id.
    pub fn track(&self, id: TrackId) -> Option<&CompositionTrack> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// Segments in timeline order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The single instruction spanning the timeline.
    pub fn instruction(&self) -> &VideoInstruction {
        &self.instruction
    }

    /// Overlay layers above the base video, in ascending `z`.
    pub fn overlays(&self) -> &[OverlayLayer] {
        &self.overlays
    }

    /// Items dropped during allocation.
    pub fn skipped(&self) -> &[SkippedItem] {
        &self.skipped
    }

    /// Total length in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }
}

/// Merge an allocated and scheduled timeline into a [`Composition`].
///
/// Overlays are stacked images first, then captions, above the base video at `z = 0`.
#[tracing::instrument(skip_all, fields(segments = allocation.segments.len()))]
pub fn assemble(
    canvas: Canvas,
    fillers: &FillerSources,
    allocation: Allocation,
) -> MontageResult<Composition> {
    if allocation.segments.is_empty() {
        return Err(MontageError::EmptyComposition);
    }

    let mut expected = 0.0;
    for seg in &allocation.segments {
        if !time_eq(seg.range.start, expected) {
            return Err(MontageError::validation(format!(
                "segment for item {} starts at {} instead of {}",
                seg.item_index, seg.range.start, expected
            )));
        }
        expected = seg.range.end();
    }
    let duration = expected;

    let layers = allocation
        .segments
        .iter()
        .map(|seg| LayerInstruction {
            track: seg.video_track,
            item_index: seg.item_index,
            transform: seg.transform,
            opacity: seg.opacity.clone(),
        })
        .collect();

    let (texts, mut overlays): (Vec<_>, Vec<_>) =
        allocation.overlays.into_iter().partition(OverlayLayer::is_text);
    overlays.extend(texts);
    for (z, layer) in (1u32..).zip(overlays.iter_mut()) {
        layer.z = z;
    }

    tracing::debug!(duration, overlays = overlays.len(), "assembled composition");

    Ok(Composition {
        canvas,
        fillers: fillers.clone(),
        fillers_used: allocation.fillers_used,
        tracks: allocation.tracks,
        segments: allocation.segments,
        instruction: VideoInstruction {
            range: TimeRange::new(0.0, duration)?,
            layers,
        },
        overlays,
        skipped: allocation.skipped,
        duration,
    })
}

#[cfg(test)]
#[path = "../tests/unit/compose.rs"]
mod tests;
