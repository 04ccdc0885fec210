use crate::foundation::error::{MontageError, MontageResult};

pub use kurbo::{Affine, Point, Rect, Size, Vec2};

/// Half-open time range `[start, start + duration)` on the absolute timeline clock, in seconds.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimeRange {
    /// Inclusive range start.
    pub start: f64,
    /// Range length, never negative.
    pub duration: f64,
}

impl TimeRange {
    /// Create a validated range with a finite, non-negative start and duration.
    pub fn new(start: f64, duration: f64) -> MontageResult<Self> {
        if !start.is_finite() || !duration.is_finite() {
            return Err(MontageError::validation("TimeRange bounds must be finite"));
        }
        if start < 0.0 || duration < 0.0 {
            return Err(MontageError::validation(
                "TimeRange start and duration must be >= 0",
            ));
        }
        Ok(Self { start, duration })
    }

    /// Exclusive end of the range.
    pub fn end(self) -> f64 {
        self.start + self.duration
    }

    /// Return `true` when the range covers no time.
    pub fn is_empty(self) -> bool {
        self.duration <= 0.0
    }

}

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32,
}

impl Fps {
    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> MontageResult<Self> {
        if den == 0 {
            return Err(MontageError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(MontageError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Convert to floating-point FPS.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }
}

impl Default for Fps {
    fn default() -> Self {
        Self { num: 30, den: 1 }
    }
}

/// Output frame geometry, fixed for a whole render.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Output frame rate.
    pub fps: Fps,
}

impl Canvas {
    /// Canvas size as a kurbo [`Size`].
    pub fn size(self) -> Size {
        Size::new(f64::from(self.width), f64::from(self.height))
    }

    /// Full-canvas rectangle anchored at the origin.
    pub fn rect(self) -> Rect {
        Rect::from_origin_size(Point::ORIGIN, self.size())
    }
}

/// Straight-alpha RGBA8 color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8 {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Rgba8 {
    /// Opaque color from RGB components.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Hex form `0xRRGGBB` understood by ffmpeg color options.
    pub fn to_ffmpeg_hex(self) -> String {
        format!("0x{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Alpha as a fraction in `[0, 1]`.
    pub fn alpha_f64(self) -> f64 {
        f64::from(self.a) / 255.0
    }
}

/// Return `true` when `a` and `b` differ by less than a microsecond.
pub fn time_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
