//! Track allocation: placing media items on one linear timeline.
//!
//! Every item gets its own video track and (unless a soundtrack replaces clip audio) its own
//! audio track, so transforms and opacity can be attached per item. Items are placed back to
//! back in index order starting at zero.

mod fillers;

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::EngineConfig;
use crate::foundation::core::{Canvas, TimeRange};
use crate::foundation::error::{MontageError, MontageResult};
use crate::geometry::Transform;
use crate::media::{OpenedItem, OpenedKind, VideoSourceInfo, path_label};
use crate::schedule::{OpacitySchedule, OverlayLayer};

pub use fillers::{FillerSource, FillerSources};

/// Identifier of one composition track, unique within a composition.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct TrackId(pub u32);

/// Media type carried by a track.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackMedia {
    /// Picture track.
    Video,
    /// Sound track.
    Audio,
}

/// What a track segment reads from.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceRef {
    /// A caller-supplied clip, identified by its item index.
    Clip {
        /// Item index of the clip.
        item_index: usize,
        /// Container path.
        path: PathBuf,
    },
    /// The shared silence filler.
    Silence,
    /// The shared blank-background filler.
    Background,
    /// The request's soundtrack.
    Soundtrack {
        /// Container path.
        path: PathBuf,
    },
}

/// A slice of a source placed on a track.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct TrackSegment {
    /// Source read by this slice.
    pub source: SourceRef,
    /// Offset into the source where reading starts.
    pub source_start: f64,
    /// Placement on the timeline.
    pub range: TimeRange,
}

/// One composition track and its placed slices.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct CompositionTrack {
    /// Track identifier.
    pub id: TrackId,
    /// Media type.
    pub media: TrackMedia,
    /// Slices in timeline order, never overlapping.
    pub segments: Vec<TrackSegment>,
}

/// Kind of item a segment came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    /// Video clip.
    Video,
    /// Still image over the background filler.
    Image,
}

/// One media item placed on the timeline.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct Segment {
    /// Index of the originating media item.
    pub item_index: usize,
    /// Item kind.
    pub kind: SegmentKind,
    /// Placement on the timeline.
    pub range: TimeRange,
    /// Dedicated video track.
    pub video_track: TrackId,
    /// Dedicated audio track; `None` when a soundtrack replaces clip audio.
    pub audio_track: Option<TrackId>,
    /// Canvas placement for clips; image segments fill the canvas with the background.
    pub transform: Option<Transform>,
    /// Opacity of the segment's video track, set by the scheduler.
    pub opacity: OpacitySchedule,
}

/// An item that was dropped during allocation.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct SkippedItem {
    /// Index of the dropped item.
    pub index: usize,
    /// Why it was dropped.
    pub reason: String,
}

impl SkippedItem {
    /// The error this skip stands for.
    pub fn to_error(&self) -> MontageError {
        MontageError::unreadable(self.index, self.reason.clone())
    }
}

/// Which shared fillers an allocation referenced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct FillerUsage {
    /// Silence was substituted at least once.
    pub silence: bool,
    /// The blank background was used at least once.
    pub background: bool,
}

/// Output of [`allocate`].
#[derive(Clone, Debug)]
pub struct Allocation {
    /// Tracks in creation order.
    pub tracks: Vec<CompositionTrack>,
    /// Segments in timeline order.
    pub segments: Vec<Segment>,
    /// Image overlays, one per image segment, in timeline order.
    pub overlays: Vec<OverlayLayer>,
    /// Items dropped because their source was unusable.
    pub skipped: Vec<SkippedItem>,
    /// Fillers referenced by the tracks.
    pub fillers_used: FillerUsage,
    /// Timeline end; the sum of all segment durations.
    pub cursor_end: f64,
}

struct TrackAllocator {
    next_id: u32,
    tracks: Vec<CompositionTrack>,
}

impl TrackAllocator {
    fn new() -> Self {
        Self {
            next_id: 1,
            tracks: Vec::new(),
        }
    }

    fn add(&mut self, media: TrackMedia, segments: Vec<TrackSegment>) -> TrackId {
        let id = TrackId(self.next_id);
        self.next_id += 1;
        self.tracks.push(CompositionTrack {
            id,
            media,
            segments,
        });
        id
    }
}

/// Why a probed clip cannot be placed, if it cannot.
pub(crate) fn unusable_clip_reason(info: &VideoSourceInfo) -> Option<&'static str> {
    if !info.has_video {
        Some("no decodable video track")
    } else if !(info.duration.is_finite() && info.duration > 0.0) {
        Some("source has no playable duration")
    } else {
        None
    }
}

/// Lay `items` out back to back, in index order.
///
/// `transforms` holds the resolved placement of every usable clip, keyed by item index; the
/// allocator stamps each one with its segment start. Unusable sources are skipped and reported
/// in [`Allocation::skipped`].
#[tracing::instrument(skip_all, fields(items = items.len()))]
pub fn allocate(
    items: &[OpenedItem],
    canvas: Canvas,
    transforms: &BTreeMap<usize, Transform>,
    config: &EngineConfig,
    soundtrack: Option<&VideoSourceInfo>,
) -> MontageResult<Allocation> {
    let mut alloc = TrackAllocator::new();
    let mut segments = Vec::new();
    let mut overlays = Vec::new();
    let mut skipped = Vec::new();
    let mut usage = FillerUsage::default();
    let mut cursor = 0.0_f64;

    for item in items {
        match &item.kind {
            OpenedKind::Unreadable(reason) => {
                tracing::debug!(index = item.index, %reason, "skipping unreadable source");
                skipped.push(SkippedItem {
                    index: item.index,
                    reason: reason.clone(),
                });
            }
            OpenedKind::Video(info) => {
                if let Some(reason) = unusable_clip_reason(info) {
                    tracing::debug!(
                        index = item.index,
                        source = %path_label(&info.source_path),
                        reason,
                        "skipping clip"
                    );
                    skipped.push(SkippedItem {
                        index: item.index,
                        reason: reason.to_string(),
                    });
                    continue;
                }

                let transform = transforms.get(&item.index).ok_or_else(|| {
                    MontageError::validation(format!(
                        "no transform resolved for item {}",
                        item.index
                    ))
                })?;
                let range = TimeRange::new(cursor, info.duration)?;
                let clip = SourceRef::Clip {
                    item_index: item.index,
                    path: info.source_path.clone(),
                };

                let video_track = alloc.add(
                    TrackMedia::Video,
                    vec![TrackSegment {
                        source: clip.clone(),
                        source_start: 0.0,
                        range,
                    }],
                );
                let audio_track = if soundtrack.is_some() {
                    None
                } else {
                    let source = if info.has_audio {
                        clip
                    } else {
                        usage.silence = true;
                        SourceRef::Silence
                    };
                    Some(alloc.add(
                        TrackMedia::Audio,
                        vec![TrackSegment {
                            source,
                            source_start: 0.0,
                            range,
                        }],
                    ))
                };

                segments.push(Segment {
                    item_index: item.index,
                    kind: SegmentKind::Video,
                    range,
                    video_track,
                    audio_track,
                    transform: Some(Transform {
                        at: cursor,
                        ..*transform
                    }),
                    opacity: OpacitySchedule::constant(1.0),
                });
                cursor = range.end();
            }
            OpenedKind::Image(image) => {
                let range = TimeRange::new(cursor, config.image_duration)?;
                usage.background = true;
                let video_track = alloc.add(
                    TrackMedia::Video,
                    vec![TrackSegment {
                        source: SourceRef::Background,
                        source_start: 0.0,
                        range,
                    }],
                );
                let audio_track = if soundtrack.is_some() {
                    None
                } else {
                    usage.silence = true;
                    Some(alloc.add(
                        TrackMedia::Audio,
                        vec![TrackSegment {
                            source: SourceRef::Silence,
                            source_start: 0.0,
                            range,
                        }],
                    ))
                };

                overlays.push(OverlayLayer::image(item.index, image.clone(), canvas, range));
                segments.push(Segment {
                    item_index: item.index,
                    kind: SegmentKind::Image,
                    range,
                    video_track,
                    audio_track,
                    transform: None,
                    opacity: OpacitySchedule::constant(1.0),
                });
                cursor = range.end();
            }
        }
    }

    if let Some(music) = soundtrack
        && cursor > 0.0
    {
        let covered = music.duration.clamp(0.0, cursor);
        let mut slices = Vec::new();
        if covered > 0.0 {
            slices.push(TrackSegment {
                source: SourceRef::Soundtrack {
                    path: music.source_path.clone(),
                },
                source_start: 0.0,
                range: TimeRange::new(0.0, covered)?,
            });
        }
        if covered < cursor {
            usage.silence = true;
            slices.push(TrackSegment {
                source: SourceRef::Silence,
                source_start: 0.0,
                range: TimeRange::new(covered, cursor - covered)?,
            });
        }
        alloc.add(TrackMedia::Audio, slices);
    }

    tracing::debug!(
        segments = segments.len(),
        skipped = skipped.len(),
        end = cursor,
        "allocated timeline"
    );

    Ok(Allocation {
        tracks: alloc.tracks,
        segments,
        overlays,
        skipped,
        fillers_used: usage,
        cursor_end: cursor,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/mod.rs"]
mod tests;
