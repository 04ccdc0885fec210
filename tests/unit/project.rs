use super::*;
use crate::media::MediaKind;

const PROJECT: &str = r#"{
    "config": { "image_duration": 3.0, "fps": { "num": 25, "den": 1 } },
    "items": [
        { "kind": "video", "path": "clips/a.mov" },
        { "kind": "image", "path": "/abs/photo.jpg" }
    ],
    "texts": [
        { "text": "Day one", "frame": { "x0": 0.0, "y0": 0.0, "x1": 640.0, "y1": 80.0 }, "show_time": 1.0 }
    ],
    "transition": "cut",
    "soundtrack": "music/song.m4a"
}"#;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("montage-project-{name}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn parses_and_resolves_relative_paths() {
    let mut p = ProjectFile::from_reader(PROJECT.as_bytes()).unwrap();
    assert_eq!(p.config.image_duration, 3.0);
    assert_eq!(p.config.fps.num, 25);
    assert_eq!(p.transition, TransitionMode::Cut);
    assert_eq!(p.texts[0].font_size, 40.0);

    p.resolve_paths(Path::new("/projects/trip"));
    assert_eq!(
        p.items[0],
        ProjectItem::Video {
            path: PathBuf::from("/projects/trip/clips/a.mov")
        }
    );
    assert_eq!(
        p.items[1],
        ProjectItem::Image {
            path: PathBuf::from("/abs/photo.jpg")
        }
    );
    assert_eq!(
        p.soundtrack.as_deref(),
        Some(Path::new("/projects/trip/music/song.m4a"))
    );
}

#[test]
fn unknown_fields_are_rejected() {
    let err = ProjectFile::from_reader(r#"{ "items": [], "tracks": [] }"#.as_bytes()).unwrap_err();
    assert!(matches!(err, MontageError::Serde(_)));
}

#[test]
fn invalid_config_is_rejected() {
    let err = ProjectFile::from_reader(r#"{ "items": [], "config": { "image_duration": 0 } }"#.as_bytes())
        .unwrap_err();
    assert!(matches!(err, MontageError::Validation(_)));
}

#[test]
fn request_keeps_pick_order_and_drops_missing_files() {
    let dir = scratch_dir("request");
    std::fs::write(dir.join("a.mov"), b"not really a movie").unwrap();
    image::RgbaImage::new(6, 4).save(dir.join("b.png")).unwrap();

    let json = r#"{
        "items": [
            { "kind": "video", "path": "a.mov" },
            { "kind": "video", "path": "missing.mov" },
            { "kind": "image", "path": "b.png" }
        ]
    }"#;
    let path = dir.join("project.json");
    std::fs::write(&path, json).unwrap();

    let request = ProjectFile::from_path(&path).unwrap().to_request();
    assert_eq!(
        request.items.iter().map(|i| i.index).collect::<Vec<_>>(),
        vec![0, 2]
    );
    assert!(request.items[0].is_video());
    match &request.items[1].kind {
        MediaKind::Image(img) => assert_eq!((img.width, img.height), (6, 4)),
        other => panic!("unexpected item: {other:?}"),
    }
    assert_eq!(request.transition, TransitionMode::Fade);
    assert!(request.soundtrack.is_none());
}
