//! Render/export driver: hands a composition to an encode primitive on a worker thread and
//! reports exactly one [`RenderResult`].
//!
//! There is no cancellation. Once [`export`] has spawned its worker the encode runs to
//! completion or failure.

/// Encode primitive backed by the system `ffmpeg` binary.
pub mod ffmpeg;

use std::path::{Path, PathBuf};
use std::sync::{Arc, mpsc};
use std::thread::JoinHandle;

use crate::compose::Composition;
use crate::foundation::core::Fps;
use crate::foundation::error::{MontageError, MontageResult};

/// Output container.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Container {
    /// MPEG-4 part 14.
    #[default]
    Mp4,
}

impl Container {
    /// Muxer name understood by ffmpeg's `-f`.
    pub fn muxer(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
        }
    }
}

/// Parameters of one export.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ExportSettings {
    /// File written by the encoder. Any existing file is removed first.
    pub output_path: PathBuf,
    /// Output frame rate.
    pub fps: Fps,
    /// Put the index at the front of the file for progressive playback.
    pub optimize_for_network: bool,
    /// Output container.
    pub container: Container,
}

impl ExportSettings {
    /// Highest-quality MP4 settings for `output_path`.
    pub fn new(output_path: impl Into<PathBuf>, fps: Fps) -> Self {
        Self {
            output_path: output_path.into(),
            fps,
            optimize_for_network: true,
            container: Container::Mp4,
        }
    }
}

/// External encode/mux primitive. Implementations block until the file is written.
pub trait EncodePrimitive: Send + Sync {
    /// Encode `composition` into `settings.output_path`.
    fn encode(&self, composition: &Composition, settings: &ExportSettings) -> MontageResult<()>;
}

/// Outcome of one render call.
#[derive(Debug)]
pub enum RenderResult {
    /// The output file is complete.
    Completed {
        /// Written file.
        output: PathBuf,
    },
    /// Planning or encoding failed.
    Failed {
        /// What went wrong.
        reason: MontageError,
        /// Output location when the failure happened during export; `None` when nothing was
        /// submitted.
        output: Option<PathBuf>,
    },
}

impl RenderResult {
    /// Return `true` for [`RenderResult::Completed`].
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Convert into a plain result carrying the output path.
    pub fn into_result(self) -> MontageResult<PathBuf> {
        match self {
            Self::Completed { output } => Ok(output),
            Self::Failed { reason, .. } => Err(reason),
        }
    }
}

/// Receiving end of an export. Yields its [`RenderResult`] exactly once.
///
/// Every way of reading the result consumes the handle.
#[derive(Debug)]
pub struct ExportHandle {
    output: Option<PathBuf>,
    state: HandleState,
}

#[derive(Debug)]
enum HandleState {
    Ready(RenderResult),
    Running {
        rx: mpsc::Receiver<RenderResult>,
        worker: JoinHandle<()>,
    },
}

impl ExportHandle {
    /// Handle that already holds its result; used when a render fails before export.
    pub fn resolved(result: RenderResult) -> Self {
        let output = match &result {
            RenderResult::Completed { output } => Some(output.clone()),
            RenderResult::Failed { output, .. } => output.clone(),
        };
        Self {
            output,
            state: HandleState::Ready(result),
        }
    }

    /// Output location, when an export was submitted.
    pub fn output_path(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    /// Block until the export finishes.
    pub fn wait(self) -> RenderResult {
        let Self { output, state } = self;
        match state {
            HandleState::Ready(result) => result,
            HandleState::Running { rx, worker } => {
                let result = rx.recv().unwrap_or_else(|_| lost_worker(output));
                join_worker(worker);
                result
            }
        }
    }

    /// Poll for the result without blocking.
    ///
    /// While the export is still running the handle comes back in `Err`, ready to be polled
    /// again or waited on.
    pub fn try_result(self) -> Result<RenderResult, Self> {
        let Self { output, state } = self;
        match state {
            HandleState::Ready(result) => Ok(result),
            HandleState::Running { rx, worker } => match rx.try_recv() {
                Ok(result) => {
                    join_worker(worker);
                    Ok(result)
                }
                Err(mpsc::TryRecvError::Empty) => Err(Self {
                    output,
                    state: HandleState::Running { rx, worker },
                }),
                Err(mpsc::TryRecvError::Disconnected) => {
                    join_worker(worker);
                    Ok(lost_worker(output))
                }
            },
        }
    }

    /// Run `f` with the result on a separate thread once the export finishes.
    pub fn on_complete<F>(self, f: F) -> JoinHandle<()>
    where
        F: FnOnce(RenderResult) + Send + 'static,
    {
        std::thread::spawn(move || f(self.wait()))
    }
}

fn join_worker(worker: JoinHandle<()>) {
    if worker.join().is_err() {
        tracing::warn!("export worker panicked");
    }
}

fn lost_worker(output: Option<PathBuf>) -> RenderResult {
    let output = output.unwrap_or_default();
    RenderResult::Failed {
        reason: MontageError::export_failed(
            output.clone(),
            "export worker exited without reporting a result",
        ),
        output: Some(output),
    }
}

/// Start exporting `composition` with `encoder`.
///
/// Removes any file already at the output path, then runs the encoder on one worker thread.
/// Encoder errors are reported as [`MontageError::ExportFailed`] and never retried.
#[tracing::instrument(skip_all, fields(output = %settings.output_path.display()))]
pub fn export(
    encoder: Arc<dyn EncodePrimitive>,
    composition: Arc<Composition>,
    settings: ExportSettings,
) -> ExportHandle {
    let output = settings.output_path.clone();
    if let Err(e) = remove_existing(&output) {
        return ExportHandle::resolved(RenderResult::Failed {
            reason: MontageError::export_failed(output.clone(), e.to_string()),
            output: Some(output),
        });
    }

    let (tx, rx) = mpsc::sync_channel(1);
    let worker = std::thread::Builder::new()
        .name("montage-export".to_string())
        .spawn(move || {
            let started = std::time::Instant::now();
            let path = settings.output_path.clone();
            let result = match encoder.encode(&composition, &settings) {
                Ok(()) => {
                    tracing::info!(
                        output = %path.display(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "export completed"
                    );
                    RenderResult::Completed { output: path }
                }
                Err(e) => {
                    tracing::error!(output = %path.display(), error = %e, "export failed");
                    let reason = match e {
                        e @ MontageError::ExportFailed { .. } => e,
                        other => MontageError::export_failed(path.clone(), other.to_string()),
                    };
                    RenderResult::Failed {
                        reason,
                        output: Some(path),
                    }
                }
            };
            let _ = tx.send(result);
        });

    match worker {
        Ok(worker) => ExportHandle {
            output: Some(output),
            state: HandleState::Running { rx, worker },
        },
        Err(e) => ExportHandle::resolved(RenderResult::Failed {
            reason: MontageError::export_failed(
                output.clone(),
                format!("failed to spawn export worker: {e}"),
            ),
            output: Some(output),
        }),
    }
}

fn remove_existing(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "removed previous output");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/export/mod.rs"]
mod tests;
