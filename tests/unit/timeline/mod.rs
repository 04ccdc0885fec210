use super::*;
use crate::foundation::core::{Affine, Fps, Size};
use crate::geometry::resolve_item_transforms;
use crate::geometry::Orientation;
use crate::media::StillImage;

fn tracks_of(alloc: &Allocation, media: TrackMedia) -> impl Iterator<Item = &CompositionTrack> {
    alloc.tracks.iter().filter(move |t| t.media == media)
}

fn track(alloc: &Allocation, id: TrackId) -> Option<&CompositionTrack> {
    alloc.tracks.iter().find(|t| t.id == id)
}

fn canvas() -> Canvas {
    Canvas {
        width: 1920,
        height: 1080,
        fps: Fps::default(),
    }
}

fn clip(index: usize, duration: f64, has_audio: bool) -> OpenedItem {
    OpenedItem {
        index,
        kind: OpenedKind::Video(VideoSourceInfo {
            source_path: PathBuf::from(format!("/media/clip{index}.mov")),
            natural_size: Size::new(1920.0, 1080.0),
            embedded_transform: Affine::IDENTITY,
            duration,
            has_video: true,
            has_audio,
        }),
    }
}

fn picture(index: usize) -> OpenedItem {
    OpenedItem {
        index,
        kind: OpenedKind::Image(StillImage::from_pixels(
            image::RgbaImage::new(8, 6),
            Orientation::Up,
        )),
    }
}

fn run(items: &[OpenedItem], soundtrack: Option<&VideoSourceInfo>) -> Allocation {
    let transforms = resolve_item_transforms(items, canvas()).unwrap();
    allocate(items, canvas(), &transforms, &EngineConfig::default(), soundtrack).unwrap()
}

#[test]
fn clips_are_placed_back_to_back() {
    let alloc = run(&[clip(0, 4.0, true), clip(1, 6.0, true)], None);
    let ranges: Vec<_> = alloc.segments.iter().map(|s| s.range).collect();
    assert_eq!(ranges[0], TimeRange::new(0.0, 4.0).unwrap());
    assert_eq!(ranges[1], TimeRange::new(4.0, 6.0).unwrap());
    assert_eq!(alloc.cursor_end, 10.0);
    assert_eq!(alloc.segments[1].transform.unwrap().at, 4.0);
}

#[test]
fn every_item_gets_its_own_track_pair() {
    let alloc = run(&[clip(0, 1.0, true), clip(1, 2.0, true), picture(2)], None);
    assert_eq!(tracks_of(&alloc, TrackMedia::Video).count(), 3);
    assert_eq!(tracks_of(&alloc, TrackMedia::Audio).count(), 3);

    let mut ids: Vec<_> = alloc.tracks.iter().map(|t| t.id).collect();
    ids.dedup();
    assert_eq!(ids.len(), 6);
    assert_eq!(ids[0], TrackId(1));
}

#[test]
fn silent_clips_get_silence_matching_video_duration() {
    let items: Vec<_> = (0..3).map(|i| clip(i, 1.5 + i as f64, false)).collect();
    let alloc = run(&items, None);
    assert_eq!(tracks_of(&alloc, TrackMedia::Audio).count(), 3);
    for seg in &alloc.segments {
        let audio = track(&alloc, seg.audio_track.unwrap()).unwrap();
        assert_eq!(audio.segments.len(), 1);
        assert_eq!(audio.segments[0].source, SourceRef::Silence);
        assert_eq!(audio.segments[0].range, seg.range);
    }
    assert!(alloc.fillers_used.silence);
    assert!(!alloc.fillers_used.background);
}

#[test]
fn image_item_uses_background_and_one_overlay() {
    let alloc = run(&[picture(0)], None);
    assert_eq!(alloc.segments.len(), 1);
    let seg = &alloc.segments[0];
    assert_eq!(seg.kind, SegmentKind::Image);
    assert_eq!(seg.range.duration, 5.0);
    assert!(seg.transform.is_none());
    let video = track(&alloc, seg.video_track).unwrap();
    assert_eq!(video.segments[0].source, SourceRef::Background);
    assert_eq!(alloc.overlays.len(), 1);
    assert_eq!(alloc.overlays[0].frame, canvas().rect());
    assert_eq!(
        alloc.fillers_used,
        FillerUsage {
            silence: true,
            background: true
        }
    );
}

#[test]
fn unreadable_and_videoless_sources_are_skipped() {
    let mut no_video = clip(1, 3.0, true);
    if let OpenedKind::Video(info) = &mut no_video.kind {
        info.has_video = false;
        info.natural_size = Size::ZERO;
    }
    let items = vec![
        clip(0, 2.0, true),
        no_video,
        OpenedItem {
            index: 2,
            kind: OpenedKind::Unreadable("moov atom not found".into()),
        },
        clip(3, 1.0, true),
    ];
    let alloc = run(&items, None);

    assert_eq!(
        alloc.segments.iter().map(|s| s.item_index).collect::<Vec<_>>(),
        vec![0, 3]
    );
    assert_eq!(alloc.segments[1].range.start, 2.0);
    assert_eq!(
        alloc.skipped.iter().map(|s| s.index).collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert!(matches!(
        alloc.skipped[1].to_error(),
        MontageError::UnreadableSource { index: 2, .. }
    ));
}

#[test]
fn zero_duration_clip_is_skipped() {
    let alloc = run(&[clip(0, 0.0, true), clip(1, 2.0, true)], None);
    assert_eq!(alloc.segments.len(), 1);
    assert_eq!(alloc.skipped[0].index, 0);
}

#[test]
fn missing_transform_is_an_error() {
    let items = [clip(0, 1.0, true)];
    let err = allocate(
        &items,
        canvas(),
        &BTreeMap::new(),
        &EngineConfig::default(),
        None,
    )
    .unwrap_err();
    assert!(matches!(err, MontageError::Validation(_)));
}

#[test]
fn soundtrack_replaces_clip_audio_and_is_padded_with_silence() {
    let music = VideoSourceInfo {
        source_path: PathBuf::from("/media/song.m4a"),
        natural_size: Size::ZERO,
        embedded_transform: Affine::IDENTITY,
        duration: 7.0,
        has_video: false,
        has_audio: true,
    };
    let alloc = run(&[clip(0, 4.0, true), clip(1, 6.0, true)], Some(&music));

    assert!(alloc.segments.iter().all(|s| s.audio_track.is_none()));
    let audio: Vec<_> = tracks_of(&alloc, TrackMedia::Audio).collect();
    assert_eq!(audio.len(), 1);
    let slices = &audio[0].segments;
    assert_eq!(slices.len(), 2);
    assert!(matches!(slices[0].source, SourceRef::Soundtrack { .. }));
    assert_eq!(slices[0].range, TimeRange::new(0.0, 7.0).unwrap());
    assert_eq!(slices[1].source, SourceRef::Silence);
    assert_eq!(slices[1].range, TimeRange::new(7.0, 3.0).unwrap());
}

#[test]
fn long_soundtrack_is_trimmed_to_timeline() {
    let music = VideoSourceInfo {
        source_path: PathBuf::from("/media/song.m4a"),
        natural_size: Size::ZERO,
        embedded_transform: Affine::IDENTITY,
        duration: 60.0,
        has_video: false,
        has_audio: true,
    };
    let alloc = run(&[clip(0, 4.0, false)], Some(&music));
    let audio: Vec<_> = tracks_of(&alloc, TrackMedia::Audio).collect();
    assert_eq!(audio[0].segments.len(), 1);
    assert_eq!(audio[0].segments[0].range.duration, 4.0);
    assert!(!alloc.fillers_used.silence);
}

#[test]
fn empty_input_allocates_nothing() {
    let alloc = run(&[], None);
    assert!(alloc.segments.is_empty());
    assert!(alloc.tracks.is_empty());
    assert_eq!(alloc.cursor_end, 0.0);
}
