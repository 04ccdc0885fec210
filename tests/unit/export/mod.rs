use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::*;
use crate::compose::assemble;
use crate::config::EngineConfig;
use crate::foundation::core::{Affine, Canvas, Size};
use crate::media::{OpenedItem, OpenedKind, VideoSourceInfo};
use crate::timeline::{FillerSources, allocate};

fn composition() -> Arc<Composition> {
    let canvas = Canvas {
        width: 640,
        height: 360,
        fps: Fps::default(),
    };
    let items = vec![OpenedItem {
        index: 0,
        kind: OpenedKind::Video(VideoSourceInfo {
            source_path: PathBuf::from("a.mp4"),
            natural_size: Size::new(640.0, 360.0),
            embedded_transform: Affine::IDENTITY,
            duration: 2.0,
            has_video: true,
            has_audio: false,
        }),
    }];
    let transforms = crate::geometry::resolve_item_transforms(&items, canvas).unwrap();
    let alloc = allocate(&items, canvas, &transforms, &EngineConfig::default(), None).unwrap();
    Arc::new(assemble(canvas, &FillerSources::synthesized(), alloc).unwrap())
}

fn out_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("montage-export-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir.join(name)
}

#[derive(Default)]
struct Recording {
    calls: AtomicUsize,
    saw_existing_file: AtomicBool,
}

impl EncodePrimitive for Recording {
    fn encode(&self, composition: &Composition, settings: &ExportSettings) -> MontageResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.saw_existing_file
            .store(settings.output_path.exists(), Ordering::SeqCst);
        std::fs::write(&settings.output_path, format!("{}", composition.duration())).unwrap();
        Ok(())
    }
}

struct Failing;

impl EncodePrimitive for Failing {
    fn encode(&self, _: &Composition, _: &ExportSettings) -> MontageResult<()> {
        Err(MontageError::validation("codec not available"))
    }
}

struct Panicking;

impl EncodePrimitive for Panicking {
    fn encode(&self, _: &Composition, _: &ExportSettings) -> MontageResult<()> {
        panic!("encoder crashed");
    }
}

/// Blocks until the test releases it.
struct Gated {
    gate: Mutex<Option<mpsc::Receiver<()>>>,
}

impl EncodePrimitive for Gated {
    fn encode(&self, _: &Composition, _: &ExportSettings) -> MontageResult<()> {
        let rx = self.gate.lock().unwrap().take().unwrap();
        rx.recv().unwrap();
        Ok(())
    }
}

#[test]
fn completed_export_reports_output_path() {
    let out = out_path("done.mp4");
    let enc = Arc::new(Recording::default());
    let handle = export(
        enc.clone(),
        composition(),
        ExportSettings::new(&out, Fps::default()),
    );
    assert_eq!(handle.output_path(), Some(out.as_path()));
    match handle.wait() {
        RenderResult::Completed { output } => assert_eq!(output, out),
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(enc.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn existing_output_is_removed_before_encoding() {
    let out = out_path("stale.mp4");
    std::fs::write(&out, b"old").unwrap();
    let enc = Arc::new(Recording::default());
    let result = export(
        enc.clone(),
        composition(),
        ExportSettings::new(&out, Fps::default()),
    )
    .wait();
    assert!(result.is_completed());
    assert!(!enc.saw_existing_file.load(Ordering::SeqCst));
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "2");
}

#[test]
fn encoder_error_becomes_export_failed() {
    let out = out_path("fail.mp4");
    let result = export(
        Arc::new(Failing),
        composition(),
        ExportSettings::new(&out, Fps::default()),
    )
    .wait();
    match result {
        RenderResult::Failed {
            reason: MontageError::ExportFailed { output, reason },
            output: Some(reported),
        } => {
            assert_eq!(output, out);
            assert_eq!(reported, out);
            assert!(reason.contains("codec not available"));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn crashed_worker_still_reports_once() {
    let out = out_path("crash.mp4");
    let handle = export(
        Arc::new(Panicking),
        composition(),
        ExportSettings::new(&out, Fps::default()),
    );
    match handle.wait() {
        RenderResult::Failed {
            reason: MontageError::ExportFailed { output, reason },
            ..
        } => {
            assert_eq!(output, out);
            assert!(reason.contains("without reporting"));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

fn poll_until_done(mut handle: ExportHandle) -> RenderResult {
    loop {
        match handle.try_result() {
            Ok(result) => return result,
            Err(pending) => handle = pending,
        }
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
}

#[test]
fn try_result_hands_back_pending_handle() {
    let (release, gate) = mpsc::channel();
    let out = out_path("gated.mp4");
    let handle = export(
        Arc::new(Gated {
            gate: Mutex::new(Some(gate)),
        }),
        composition(),
        ExportSettings::new(&out, Fps::default()),
    );
    let handle = handle.try_result().unwrap_err();
    assert_eq!(handle.output_path(), Some(out.as_path()));
    release.send(()).unwrap();

    assert!(poll_until_done(handle).is_completed());
}

#[test]
fn pending_handle_can_still_be_waited_on() {
    let (release, gate) = mpsc::channel();
    let handle = export(
        Arc::new(Gated {
            gate: Mutex::new(Some(gate)),
        }),
        composition(),
        ExportSettings::new(out_path("gated-wait.mp4"), Fps::default()),
    );
    let handle = handle.try_result().unwrap_err();
    release.send(()).unwrap();
    match handle.wait() {
        RenderResult::Completed { output } => assert!(output.ends_with("gated-wait.mp4")),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn crashed_worker_is_reported_by_polling() {
    let result = poll_until_done(export(
        Arc::new(Panicking),
        composition(),
        ExportSettings::new(out_path("crash-poll.mp4"), Fps::default()),
    ));
    assert!(matches!(
        result,
        RenderResult::Failed {
            reason: MontageError::ExportFailed { .. },
            ..
        }
    ));
}

#[test]
fn on_complete_runs_callback_once() {
    let (tx, rx) = mpsc::channel();
    let handle = export(
        Arc::new(Recording::default()),
        composition(),
        ExportSettings::new(out_path("callback.mp4"), Fps::default()),
    );
    handle
        .on_complete(move |r| tx.send(r.is_completed()).unwrap())
        .join()
        .unwrap();
    assert_eq!(rx.recv().unwrap(), true);
    assert!(rx.try_recv().is_err());
}

#[test]
fn resolved_handle_returns_immediately() {
    let handle = ExportHandle::resolved(RenderResult::Failed {
        reason: MontageError::EmptyComposition,
        output: None,
    });
    assert!(handle.output_path().is_none());
    assert!(matches!(
        handle.wait().into_result(),
        Err(MontageError::EmptyComposition)
    ));

    let polled = ExportHandle::resolved(RenderResult::Completed {
        output: PathBuf::from("done.mp4"),
    })
    .try_result();
    assert!(matches!(polled, Ok(RenderResult::Completed { .. })));
}

#[test]
fn settings_default_to_network_optimized_mp4() {
    let s = ExportSettings::new("x.mp4", Fps::default());
    assert!(s.optimize_for_network);
    assert_eq!(s.container, Container::Mp4);
    assert_eq!(s.container.muxer(), "mp4");
}
