//! Geometry resolution: orientation classification, canvas sizing, and fit-to-width placement.
//!
//! Transforms map a clip's natural (stored, un-rotated) pixel grid onto canvas pixels with y
//! pointing down. Composition order is embedded display transform, then uniform scale, then
//! translation.

use std::collections::BTreeMap;

use crate::config::{CanvasPolicy, EngineConfig};
use crate::foundation::core::{Affine, Canvas, Point, Rect, Size, Vec2};
use crate::foundation::error::{MontageError, MontageResult};
use crate::media::{OpenedItem, OpenedKind, path_label};

/// Rotation a source needs before it appears upright.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Already upright.
    Up,
    /// Rotate 90 degrees clockwise (typical portrait phone recording).
    Right,
    /// Rotate 180 degrees.
    Down,
    /// Rotate 90 degrees counter-clockwise.
    Left,
    /// Not one of the canonical rotations; handled as [`Orientation::Up`].
    Unknown,
}

impl Orientation {
    /// Orientation used for layout, with `Unknown` resolved to `Up`.
    pub fn effective(self) -> Self {
        match self {
            Self::Unknown => Self::Up,
            other => other,
        }
    }

    /// Return `true` when the visual width and height are the natural height and width.
    pub fn is_portrait(self) -> bool {
        matches!(self.effective(), Self::Right | Self::Left)
    }

    /// Map EXIF orientation. Mirrored variants have no rotation-only equivalent.
    pub fn from_exif(o: image::metadata::Orientation) -> Self {
        use image::metadata::Orientation as Exif;
        match o {
            Exif::NoTransforms => Self::Up,
            Exif::Rotate90 => Self::Right,
            Exif::Rotate180 => Self::Down,
            Exif::Rotate270 => Self::Left,
            _ => Self::Unknown,
        }
    }
}

/// Classify an embedded display transform by exact match of its 2x2 part.
pub fn classify_orientation(t: Affine) -> Orientation {
    let [a, b, c, d, _, _] = t.as_coeffs();
    if a == 0.0 && b == 1.0 && c == -1.0 && d == 0.0 {
        Orientation::Right
    } else if a == 0.0 && b == -1.0 && c == 1.0 && d == 0.0 {
        Orientation::Left
    } else if a == 1.0 && b == 0.0 && c == 0.0 && d == 1.0 {
        Orientation::Up
    } else if a == -1.0 && b == 0.0 && c == 0.0 && d == -1.0 {
        Orientation::Down
    } else {
        Orientation::Unknown
    }
}

/// Orientation-corrected size.
pub fn visual_size(natural: Size, orientation: Orientation) -> Size {
    if orientation.is_portrait() {
        Size::new(natural.height, natural.width)
    } else {
        natural
    }
}

/// Placement of one clip on the canvas.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Transform {
    /// Orientation classified from the embedded transform.
    pub orientation: Orientation,
    /// Stored pixel size.
    pub natural_size: Size,
    /// Orientation-corrected size before scaling.
    pub visual_size: Size,
    /// Uniform scale factor, `canvas.width / visual_size.width`.
    pub scale: f64,
    /// Offset applied after scaling; `x` is always zero.
    pub translation: Vec2,
    /// Full natural-to-canvas mapping.
    pub affine: Affine,
    /// Timeline instant at which the transform takes effect.
    pub at: f64,
}

impl Transform {
    /// Canvas-space bounds of the placed clip (may exceed the canvas vertically).
    pub fn placed_bounds(&self) -> Rect {
        self.affine
            .transform_rect_bbox(Rect::from_origin_size(Point::ORIGIN, self.natural_size))
    }
}

/// Pick the output canvas for a render call.
///
/// The tallest clip's dimensions are rounded to the nearest even pixel count, since the
/// yuv420p output cannot encode odd sizes. `clips` yields the natural size and embedded transform of every opened video item.
pub fn resolve_canvas<I>(clips: I, config: &EngineConfig) -> Canvas
where
    I: IntoIterator<Item = (Size, Affine)>,
{
    let fallback = config.default_canvas();
    if config.canvas_policy == CanvasPolicy::Fixed {
        return fallback;
    }

    let mut best = Size::ZERO;
    for (natural, embedded) in clips {
        let visual = visual_size(natural, classify_orientation(embedded));
        if visual.height > best.height {
            best = visual;
        }
    }

    if !(best.width >= 1.0 && best.height >= 1.0) {
        return fallback;
    }
    Canvas {
        width: even_pixels(best.width),
        height: even_pixels(best.height),
        fps: config.fps,
    }
}

fn even_pixels(v: f64) -> u32 {
    ((v / 2.0).round().max(1.0) as u32) * 2
}

/// Compute the fit-to-width placement of a clip on `canvas`, effective at time `at`.
pub fn resolve_transform(
    natural: Size,
    embedded: Affine,
    canvas: Canvas,
    at: f64,
) -> MontageResult<Transform> {
    if !(natural.width.is_finite() && natural.height.is_finite())
        || natural.width <= 0.0
        || natural.height <= 0.0
    {
        return Err(MontageError::invalid_geometry(format!(
            "source has zero-area natural size {}x{}",
            natural.width, natural.height
        )));
    }

    let orientation = classify_orientation(embedded);
    let visual = visual_size(natural, orientation);
    let upright = normalize_translation(embedded, natural);

    let scale = f64::from(canvas.width) / visual.width;
    let translation = Vec2::new(
        0.0,
        (f64::from(canvas.height) - visual.height * scale) / 2.0,
    );
    let affine = Affine::translate(translation) * Affine::scale(scale) * upright;

    Ok(Transform {
        orientation,
        natural_size: natural,
        visual_size: visual,
        scale,
        translation,
        affine,
        at,
    })
}

/// Natural size and embedded transform of every opened clip with a video track, for
/// [`resolve_canvas`].
pub fn canvas_inputs(opened: &[OpenedItem]) -> impl Iterator<Item = (Size, Affine)> + '_ {
    opened.iter().filter_map(|item| match &item.kind {
        OpenedKind::Video(info) if info.has_video => {
            Some((info.natural_size, info.embedded_transform))
        }
        _ => None,
    })
}

/// Resolve the placement of every opened clip, keyed by item index, with `at = 0`.
///
/// Fails on the first zero-area clip or image so that no render starts with bad geometry.
/// Clips without a video track are left out; the allocator skips them.
#[tracing::instrument(skip_all, fields(items = opened.len()))]
pub fn resolve_item_transforms(
    opened: &[OpenedItem],
    canvas: Canvas,
) -> MontageResult<BTreeMap<usize, Transform>> {
    let mut out = BTreeMap::new();
    for item in opened {
        match &item.kind {
            OpenedKind::Video(info) if info.has_video => {
                let t = resolve_transform(info.natural_size, info.embedded_transform, canvas, 0.0)
                    .map_err(|e| match e {
                        MontageError::InvalidMediaGeometry(msg) => {
                            MontageError::invalid_geometry(format!(
                                "item {} ('{}'): {msg}",
                                item.index,
                                path_label(&info.source_path)
                            ))
                        }
                        other => other,
                    })?;
                out.insert(item.index, t);
            }
            OpenedKind::Image(img) if img.is_degenerate() => {
                return Err(MontageError::invalid_geometry(format!(
                    "item {}: image has zero-area size {}x{}",
                    item.index, img.width, img.height
                )));
            }
            _ => {}
        }
    }
    Ok(out)
}

/// Replace the translation of `embedded` so the transformed natural frame starts at the origin.
///
/// Containers often store a rotation without the offset that brings the frame back into view.
pub fn normalize_translation(embedded: Affine, natural: Size) -> Affine {
    let [a, b, c, d, _, _] = embedded.as_coeffs();
    let linear = Affine::new([a, b, c, d, 0.0, 0.0]);
    let bbox = linear.transform_rect_bbox(Rect::from_origin_size(Point::ORIGIN, natural));
    Affine::translate(-bbox.origin().to_vec2()) * linear
}

/// Scale that makes an image of `size`, rotated upright, cover the whole canvas.
pub fn aspect_fill_scale(size: Size, orientation: Orientation, canvas: Canvas) -> f64 {
    let visual = visual_size(size, orientation);
    if visual.width <= 0.0 || visual.height <= 0.0 {
        return 1.0;
    }
    (f64::from(canvas.width) / visual.width).max(f64::from(canvas.height) / visual.height)
}

#[cfg(test)]
#[path = "../tests/unit/geometry.rs"]
mod tests;
