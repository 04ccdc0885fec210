use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use image::ImageDecoder as _;

use crate::foundation::error::{MontageError, MontageResult};
use crate::geometry::Orientation;

/// Where a still picture's pixels live.
#[derive(Clone, Debug)]
pub enum ImageSource {
    /// Encoded image file on disk.
    File(PathBuf),
    /// Decoded RGBA8 pixels held in memory.
    Pixels(Arc<image::RgbaImage>),
}

/// A still picture plus the facts the pipeline needs about it.
#[derive(Clone, Debug)]
pub struct StillImage {
    /// Pixel source.
    pub source: ImageSource,
    /// Stored width in pixels.
    pub width: u32,
    /// Stored height in pixels.
    pub height: u32,
    /// Rotation needed to show the picture upright.
    pub orientation: Orientation,
}

impl StillImage {
    /// Read size and EXIF orientation from an encoded file without decoding pixels.
    pub fn open(path: impl AsRef<Path>) -> MontageResult<Self> {
        let path = path.as_ref();
        let mut decoder = image::ImageReader::open(path)
            .with_context(|| format!("open image '{}'", path.display()))?
            .with_guessed_format()
            .with_context(|| format!("detect image format of '{}'", path.display()))?
            .into_decoder()
            .with_context(|| format!("create decoder for '{}'", path.display()))?;
        let (width, height) = decoder.dimensions();
        let orientation = decoder
            .orientation()
            .map(Orientation::from_exif)
            .unwrap_or(Orientation::Up);

        Ok(Self {
            source: ImageSource::File(path.to_path_buf()),
            width,
            height,
            orientation,
        })
    }

    /// Wrap already-decoded pixels.
    pub fn from_pixels(pixels: image::RgbaImage, orientation: Orientation) -> Self {
        let (width, height) = pixels.dimensions();
        Self {
            source: ImageSource::Pixels(Arc::new(pixels)),
            width,
            height,
            orientation,
        }
    }

    /// Return `true` when either side is zero pixels.
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Path of the encoded file, writing in-memory pixels to `scratch_dir/<stem>.png` when needed.
    pub fn materialize(&self, scratch_dir: &Path, stem: &str) -> MontageResult<PathBuf> {
        match &self.source {
            ImageSource::File(path) => Ok(path.clone()),
            ImageSource::Pixels(pixels) => {
                if self.is_degenerate() {
                    return Err(MontageError::invalid_geometry(
                        "cannot write a zero-area image",
                    ));
                }
                std::fs::create_dir_all(scratch_dir).with_context(|| {
                    format!("create scratch directory '{}'", scratch_dir.display())
                })?;
                let path = scratch_dir.join(format!("{stem}.png"));
                image::save_buffer_with_format(
                    &path,
                    pixels.as_raw(),
                    self.width,
                    self.height,
                    image::ColorType::Rgba8,
                    image::ImageFormat::Png,
                )
                .with_context(|| format!("write png '{}'", path.display()))?;
                Ok(path)
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/still.rs"]
mod tests;
