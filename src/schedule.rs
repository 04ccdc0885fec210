//! Transition scheduling: opacity at cut points and on overlay layers.
//!
//! Schedules are declarative. Nothing here evaluates frames; the encoder turns every change
//! into its own fade or visibility window, and [`OpacitySchedule::sample`] exists for callers
//! and tests that need the value at one instant.

use crate::config::EngineConfig;
use crate::foundation::core::{Canvas, Rect, Size, TimeRange};
use crate::foundation::error::MontageResult;
use crate::geometry::{Orientation, aspect_fill_scale};
use crate::media::{StillImage, TextOverlay};
use crate::timeline::{Allocation, Segment};

/// Fade-in start used for an image overlay placed at time zero.
pub const IMAGE_FADE_IN_EPSILON: f64 = 0.05;

/// How one segment hands over to the next.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionMode {
    /// Opacity drops to zero at the segment end.
    Cut,
    /// Opacity ramps linearly to zero starting at the segment end.
    #[default]
    Fade,
}

/// One timed change in an opacity schedule.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OpacityChange {
    /// Jump to `value` at `at`.
    Step {
        /// Instant of the jump.
        at: f64,
        /// Opacity from `at` on.
        value: f64,
    },
    /// Move linearly from `from` to `to` across `range`, then hold `to`.
    Ramp {
        /// Ramp window.
        range: TimeRange,
        /// Opacity at `range.start`.
        from: f64,
        /// Opacity at and after `range.end()`.
        to: f64,
    },
}

impl OpacityChange {
    /// Instant at which the change begins.
    pub fn start(&self) -> f64 {
        match self {
            Self::Step { at, .. } => *at,
            Self::Ramp { range, .. } => range.start,
        }
    }
}

/// Opacity of one layer over time: an initial value plus changes ordered by start.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct OpacitySchedule {
    /// Value before the first change.
    pub initial: f64,
    changes: Vec<OpacityChange>,
}

impl OpacitySchedule {
    /// Schedule that holds `value` forever.
    pub fn constant(value: f64) -> Self {
        Self {
            initial: value,
            changes: Vec::new(),
        }
    }

    /// Add a change, keeping changes ordered by start. Equal starts keep insertion order.
    pub fn push(&mut self, change: OpacityChange) {
        let at = self
            .changes
            .partition_point(|c| c.start() <= change.start());
        self.changes.insert(at, change);
    }

    /// Changes in start order.
    pub fn changes(&self) -> &[OpacityChange] {
        &self.changes
    }

    /// Return `true` when the schedule never changes.
    pub fn is_constant(&self) -> bool {
        self.changes.is_empty()
    }

    /// Opacity at `t`. Later changes override earlier ones once they have started.
    pub fn sample(&self, t: f64) -> f64 {
        let mut v = self.initial;
        for change in &self.changes {
            match *change {
                OpacityChange::Step { at, value } => {
                    if t >= at {
                        v = value;
                    }
                }
                OpacityChange::Ramp { range, from, to } => {
                    if t < range.start {
                        continue;
                    }
                    v = if range.duration <= 0.0 || t >= range.end() {
                        to
                    } else {
                        from + (to - from) * (t - range.start) / range.duration
                    };
                }
            }
        }
        v
    }
}

/// What an overlay layer draws.
#[derive(Clone, Debug, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OverlayKind {
    /// Still image aspect-filled to the canvas.
    Image {
        /// Index of the originating media item.
        item_index: usize,
        /// Picture to draw.
        #[serde(skip)]
        image: StillImage,
        /// Stored pixel size of the picture.
        pixel_size: Size,
        /// Rotation applied before filling.
        orientation: Orientation,
        /// Scale that makes the upright picture cover the canvas.
        fill_scale: f64,
        /// Timeline window of the image segment.
        window: TimeRange,
    },
    /// Caption text.
    Text(TextOverlay),
}

/// A layer composited above the base video.
#[derive(Clone, Debug, serde::Serialize)]
pub struct OverlayLayer {
    /// Layer content.
    pub kind: OverlayKind,
    /// Canvas-space frame.
    pub frame: Rect,
    /// Layer opacity over time.
    pub opacity: OpacitySchedule,
    /// Stacking order; higher draws later. Assigned by the assembler.
    pub z: u32,
}

impl OverlayLayer {
    /// Full-canvas image layer for the image segment at `window`.
    pub fn image(item_index: usize, image: StillImage, canvas: Canvas, window: TimeRange) -> Self {
        let pixel_size = Size::new(f64::from(image.width), f64::from(image.height));
        let orientation = image.orientation;
        Self {
            kind: OverlayKind::Image {
                item_index,
                image,
                pixel_size,
                orientation,
                fill_scale: aspect_fill_scale(pixel_size, orientation, canvas),
                window,
            },
            frame: canvas.rect(),
            opacity: OpacitySchedule::constant(1.0),
            z: 0,
        }
    }

    /// Text layer positioned at the caption's frame.
    pub fn text(text: TextOverlay) -> Self {
        Self {
            frame: text.frame,
            kind: OverlayKind::Text(text),
            opacity: OpacitySchedule::constant(1.0),
            z: 0,
        }
    }

    /// Return `true` for text layers.
    pub fn is_text(&self) -> bool {
        matches!(self.kind, OverlayKind::Text(_))
    }
}

/// Attach end-of-segment instructions to every segment but the last.
pub fn schedule_cut_points(
    segments: &mut [Segment],
    mode: TransitionMode,
    transition_duration: f64,
) -> MontageResult<()> {
    let Some((_, leading)) = segments.split_last_mut() else {
        return Ok(());
    };
    for seg in leading {
        let end = seg.range.end();
        let change = match mode {
            TransitionMode::Cut => OpacityChange::Step { at: end, value: 0.0 },
            TransitionMode::Fade => OpacityChange::Ramp {
                range: TimeRange::new(end, transition_duration)?,
                from: 1.0,
                to: 0.0,
            },
        };
        seg.opacity.push(change);
    }
    Ok(())
}

/// Fade an image layer in at the start of its window and out at the end.
pub fn schedule_image_overlay(layer: &mut OverlayLayer, fade: f64) -> MontageResult<()> {
    let OverlayKind::Image { window, .. } = &layer.kind else {
        return Ok(());
    };
    let window = *window;
    let fade_in_at = if window.start <= 0.0 {
        IMAGE_FADE_IN_EPSILON
    } else {
        window.start
    };

    let mut opacity = OpacitySchedule::constant(0.0);
    opacity.push(OpacityChange::Ramp {
        range: TimeRange::new(fade_in_at, fade)?,
        from: 0.0,
        to: 1.0,
    });
    opacity.push(OpacityChange::Ramp {
        range: TimeRange::new(window.end(), fade)?,
        from: 1.0,
        to: 0.0,
    });
    layer.opacity = opacity;
    Ok(())
}

/// Text layer with its fade-in at `show_time` and, when `hide_time > 0`, its fade-out.
pub fn schedule_text_overlay(text: &TextOverlay, config: &EngineConfig) -> MontageResult<OverlayLayer> {
    let mut opacity = OpacitySchedule::constant(0.0);
    opacity.push(OpacityChange::Ramp {
        range: TimeRange::new(text.show_time, config.text_fade_in)?,
        from: 0.0,
        to: 1.0,
    });
    if text.hide_time > 0.0 {
        opacity.push(OpacityChange::Ramp {
            range: TimeRange::new(text.hide_time, config.text_fade_out)?,
            from: 1.0,
            to: 0.0,
        });
    }

    let mut layer = OverlayLayer::text(text.clone());
    layer.opacity = opacity;
    Ok(layer)
}

/// Schedule every segment and image overlay of `alloc`, then append one layer per caption.
#[tracing::instrument(skip_all, fields(segments = alloc.segments.len(), texts = texts.len(), ?mode))]
pub fn schedule(
    alloc: &mut Allocation,
    texts: &[TextOverlay],
    mode: TransitionMode,
    config: &EngineConfig,
) -> MontageResult<()> {
    schedule_cut_points(&mut alloc.segments, mode, config.transition_duration)?;
    for layer in &mut alloc.overlays {
        schedule_image_overlay(layer, config.image_fade_duration)?;
    }
    for text in texts {
        alloc.overlays.push(schedule_text_overlay(text, config)?);
    }
    Ok(())
}

#[cfg(test)]
#[path = "../tests/unit/schedule.rs"]
mod tests;
