use std::path::PathBuf;

use crate::foundation::error::{MontageError, MontageResult};
use crate::media::{MediaItem, MediaKind, StillImage, VideoSource};

/// One entry returned by a media picker: what kind it is and an opaque handle to fetch it.
#[derive(Clone, Debug)]
pub struct PickedAsset<H> {
    /// `true` for video, `false` for still images.
    pub is_video: bool,
    /// Picker-specific handle.
    pub handle: H,
}

/// Resolves picker handles into media payloads. Fetches may be slow and run concurrently.
pub trait AssetLoader<H>: Sync {
    /// Resolve a video handle.
    fn fetch_video(&self, handle: &H) -> MontageResult<VideoSource>;
    /// Resolve an image handle.
    fn fetch_image(&self, handle: &H) -> MontageResult<StillImage>;
}

/// Loader for handles that are plain file paths.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsAssetLoader;

impl AssetLoader<PathBuf> for FsAssetLoader {
    fn fetch_video(&self, handle: &PathBuf) -> MontageResult<VideoSource> {
        if !handle.is_file() {
            return Err(MontageError::validation(format!(
                "video '{}' is not a file",
                handle.display()
            )));
        }
        Ok(VideoSource::new(handle.clone()))
    }

    fn fetch_image(&self, handle: &PathBuf) -> MontageResult<StillImage> {
        StillImage::open(handle)
    }
}

/// Fetch every picked asset concurrently and return items in pick order.
///
/// Each fetch writes into its own slot, so completion order never affects the result. Failed
/// fetches are logged and leave a gap; surviving items keep their original pick index.
#[tracing::instrument(skip_all, fields(picks = picks.len()))]
pub fn gather_items<H, L>(picks: &[PickedAsset<H>], loader: &L) -> Vec<MediaItem>
where
    H: Sync,
    L: AssetLoader<H>,
{
    let mut slots: Vec<Option<MediaKind>> = vec![None; picks.len()];

    std::thread::scope(|scope| {
        let handles: Vec<_> = picks
            .iter()
            .map(|pick| {
                scope.spawn(move || {
                    if pick.is_video {
                        loader.fetch_video(&pick.handle).map(MediaKind::Video)
                    } else {
                        loader.fetch_image(&pick.handle).map(MediaKind::Image)
                    }
                })
            })
            .collect();

        for ((index, handle), slot) in handles.into_iter().enumerate().zip(slots.iter_mut()) {
            match handle.join() {
                Ok(Ok(kind)) => *slot = Some(kind),
                Ok(Err(e)) => tracing::warn!(index, error = %e, "dropping picked asset"),
                Err(_) => tracing::warn!(index, "asset fetch panicked, dropping picked asset"),
            }
        }
    });

    slots
        .into_iter()
        .enumerate()
        .filter_map(|(index, kind)| kind.map(|kind| MediaItem { index, kind }))
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/media/picker.rs"]
mod tests;
