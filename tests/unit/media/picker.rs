use std::time::Duration;

use super::*;
use crate::geometry::Orientation;

/// Handles are (delay in ms, succeed).
struct SlowLoader;

impl AssetLoader<(u64, bool)> for SlowLoader {
    fn fetch_video(&self, handle: &(u64, bool)) -> MontageResult<VideoSource> {
        std::thread::sleep(Duration::from_millis(handle.0));
        if handle.1 {
            Ok(VideoSource::new(format!("clip-{}.mp4", handle.0)))
        } else {
            Err(MontageError::validation("asset was deleted"))
        }
    }

    fn fetch_image(&self, handle: &(u64, bool)) -> MontageResult<StillImage> {
        std::thread::sleep(Duration::from_millis(handle.0));
        Ok(StillImage::from_pixels(
            image::RgbaImage::new(1, 1),
            Orientation::Up,
        ))
    }
}

fn pick(is_video: bool, delay: u64, ok: bool) -> PickedAsset<(u64, bool)> {
    PickedAsset {
        is_video,
        handle: (delay, ok),
    }
}

#[test]
fn results_follow_pick_order_not_completion_order() {
    let picks = vec![pick(true, 60, true), pick(false, 30, true), pick(true, 1, true)];
    let items = gather_items(&picks, &SlowLoader);
    assert_eq!(
        items.iter().map(|i| i.index).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    match &items[0].kind {
        MediaKind::Video(v) => assert_eq!(v.path, PathBuf::from("clip-60.mp4")),
        other => panic!("unexpected: {other:?}"),
    }
    assert!(!items[1].is_video());
}

#[test]
fn failed_fetches_leave_gaps() {
    let picks = vec![pick(true, 1, true), pick(true, 1, false), pick(true, 1, true)];
    let items = gather_items(&picks, &SlowLoader);
    assert_eq!(
        items.iter().map(|i| i.index).collect::<Vec<_>>(),
        vec![0, 2]
    );
}

#[test]
fn fs_loader_rejects_missing_video() {
    let err = FsAssetLoader
        .fetch_video(&PathBuf::from("/definitely/not/here.mov"))
        .unwrap_err();
    assert!(matches!(err, MontageError::Validation(_)));
}

#[test]
fn nothing_picked_gives_nothing() {
    let picks: Vec<PickedAsset<(u64, bool)>> = Vec::new();
    assert!(gather_items(&picks, &SlowLoader).is_empty());
}
