use super::*;
use crate::foundation::core::{Affine, Size};
use crate::media::VideoSourceInfo;

/// Reports audio for `*.m4a` files and video for everything else.
struct ExtProbe;

impl MediaProbe for ExtProbe {
    fn probe(&self, path: &Path) -> MontageResult<VideoSourceInfo> {
        let audio = path.extension().is_some_and(|e| e == "m4a");
        Ok(VideoSourceInfo {
            source_path: path.to_path_buf(),
            natural_size: if audio {
                Size::ZERO
            } else {
                Size::new(16.0, 16.0)
            },
            embedded_transform: Affine::IDENTITY,
            duration: 1.0,
            has_video: !audio,
            has_audio: audio,
        })
    }
}

fn scratch_file(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("montage-fillers-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, b"stub").unwrap();
    path
}

#[test]
fn synthesized_is_the_default() {
    let f = FillerSources::from_config(&FillerConfig::default(), &ExtProbe).unwrap();
    assert_eq!(f, FillerSources::synthesized());
    assert_eq!(f.silence, FillerSource::Generated);
}

#[test]
fn bundled_files_are_checked_for_their_track() {
    let silence = scratch_file("silence.m4a");
    let background = scratch_file("blank.mov");

    let ok = FillerSources::bundled(&silence, &background, &ExtProbe).unwrap();
    assert_eq!(
        ok.background,
        FillerSource::File {
            path: background.clone()
        }
    );

    // Swapped: the "silence" file has no audio.
    let err = FillerSources::bundled(&background, &silence, &ExtProbe).unwrap_err();
    assert!(matches!(err, MontageError::MissingBundledResource(p) if p == background));
}

#[test]
fn absent_bundled_file_is_missing_resource() {
    let background = scratch_file("blank2.mov");
    let cfg = FillerConfig::Bundled {
        silence: PathBuf::from("/definitely/not/here/silence.m4a"),
        background,
    };
    let err = FillerSources::from_config(&cfg, &ExtProbe).unwrap_err();
    assert!(matches!(err, MontageError::MissingBundledResource(_)));
}
