//! The engine: wires probing, fillers, planning and export together.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use crate::compose::{Composition, assemble};
use crate::config::EngineConfig;
use crate::export::ffmpeg::{FfmpegEncoder, FfmpegEncoderOpts};
use crate::export::{EncodePrimitive, ExportHandle, ExportSettings, RenderResult, export};
use crate::foundation::error::{MontageError, MontageResult};
use crate::geometry::{canvas_inputs, resolve_canvas, resolve_item_transforms};
use crate::media::{
    FfprobeProbe, MediaItem, MediaProbe, TextOverlay, VideoSource, check_unique_indices,
    open_items,
};
use crate::media::probe::is_ffprobe_on_path;
use crate::schedule::{TransitionMode, schedule};
use crate::timeline::{FillerSources, allocate};

/// Inputs of one render call.
#[derive(Clone, Debug, Default)]
pub struct RenderRequest {
    /// Media items; timeline order follows their indices.
    pub items: Vec<MediaItem>,
    /// Captions burned into the output.
    pub texts: Vec<TextOverlay>,
    /// Hand-over between consecutive segments.
    pub transition: TransitionMode,
    /// Audio that replaces every clip's own audio.
    pub soundtrack: Option<VideoSource>,
}

impl RenderRequest {
    /// Request for `items` with no captions, fade transitions and clip audio.
    pub fn new(items: Vec<MediaItem>) -> Self {
        Self {
            items,
            ..Default::default()
        }
    }

    /// Set the captions.
    pub fn with_texts(mut self, texts: Vec<TextOverlay>) -> Self {
        self.texts = texts;
        self
    }

    /// Set the transition mode.
    pub fn with_transition(mut self, transition: TransitionMode) -> Self {
        self.transition = transition;
        self
    }

    /// Replace clip audio with `soundtrack`.
    pub fn with_soundtrack(mut self, soundtrack: VideoSource) -> Self {
        self.soundtrack = Some(soundtrack);
        self
    }
}

/// A video-composition engine.
///
/// Planning runs synchronously on the caller's thread; export runs on a worker thread. Every
/// render writes the same configured output path, so callers keep at most one render in
/// flight.
pub struct Montage {
    config: EngineConfig,
    probe: Arc<dyn MediaProbe>,
    encoder: Arc<dyn EncodePrimitive>,
    fillers: OnceLock<Arc<FillerSources>>,
}

impl std::fmt::Debug for Montage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Montage")
            .field("config", &self.config)
            .field("fillers", &self.fillers.get())
            .finish_non_exhaustive()
    }
}

impl Montage {
    /// Create an engine from its collaborators.
    pub fn new(
        config: EngineConfig,
        probe: Arc<dyn MediaProbe>,
        encoder: Arc<dyn EncodePrimitive>,
    ) -> MontageResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            probe,
            encoder,
            fillers: OnceLock::new(),
        })
    }

    /// Engine backed by the system `ffprobe` and `ffmpeg`.
    ///
    /// A missing `ffprobe` is logged here; every video item then fails to open and is skipped.
    pub fn with_ffmpeg(config: EngineConfig) -> MontageResult<Self> {
        if !is_ffprobe_on_path() {
            tracing::warn!("ffprobe not found on PATH; video items cannot be probed");
        }
        let encoder = FfmpegEncoder::new(FfmpegEncoderOpts {
            font_file: config.font_file.clone(),
            ..Default::default()
        });
        Self::new(config, Arc::new(FfprobeProbe), Arc::new(encoder))
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Location every render writes to.
    pub fn output_path(&self) -> PathBuf {
        self.config.output_path()
    }

    /// Shared filler sources, opened on first use.
    pub fn fillers(&self) -> MontageResult<Arc<FillerSources>> {
        if let Some(f) = self.fillers.get() {
            return Ok(Arc::clone(f));
        }
        let opened = Arc::new(FillerSources::from_config(
            &self.config.fillers,
            self.probe.as_ref(),
        )?);
        tracing::debug!(fillers = ?opened, "filler sources ready");
        Ok(Arc::clone(self.fillers.get_or_init(|| opened)))
    }

    /// Build the composition for `request` without exporting it.
    #[tracing::instrument(skip_all, fields(items = request.items.len(), texts = request.texts.len()))]
    pub fn plan(&self, request: &RenderRequest) -> MontageResult<Composition> {
        check_unique_indices(&request.items)?;
        for text in &request.texts {
            text.validate()?;
        }

        let opened = open_items(&request.items, self.probe.as_ref());
        let canvas = resolve_canvas(canvas_inputs(&opened), &self.config);
        let transforms = resolve_item_transforms(&opened, canvas)?;
        let fillers = self.fillers()?;

        let soundtrack = match &request.soundtrack {
            Some(src) => {
                let info = self.probe.probe(&src.path)?;
                if !info.has_audio {
                    return Err(MontageError::validation(format!(
                        "soundtrack '{}' has no audio track",
                        src.path.display()
                    )));
                }
                Some(info)
            }
            None => None,
        };

        let mut allocation = allocate(
            &opened,
            canvas,
            &transforms,
            &self.config,
            soundtrack.as_ref(),
        )?;
        schedule(
            &mut allocation,
            &request.texts,
            request.transition,
            &self.config,
        )?;
        let composition = assemble(canvas, &fillers, allocation)?;
        for item in composition.skipped() {
            tracing::warn!(error = %item.to_error(), "item left out of the composition");
        }

        tracing::info!(
            width = canvas.width,
            height = canvas.height,
            fps = canvas.fps.as_f64(),
            duration = composition.duration(),
            segments = composition.segments().len(),
            skipped = composition.skipped().len(),
            "planned composition"
        );
        Ok(composition)
    }

    /// Plan `request` and export it to [`Montage::output_path`].
    ///
    /// Failures before export resolve the handle immediately, without touching the output.
    pub fn render(&self, request: &RenderRequest) -> ExportHandle {
        match self.plan(request) {
            Ok(composition) => {
                let settings = ExportSettings::new(self.output_path(), composition.canvas().fps);
                export(Arc::clone(&self.encoder), Arc::new(composition), settings)
            }
            Err(reason) => {
                tracing::error!(error = %reason, "render aborted before export");
                ExportHandle::resolved(RenderResult::Failed {
                    reason,
                    output: None,
                })
            }
        }
    }

    /// Render `video` alone with `music` as its only audio.
    pub fn add_soundtrack(&self, video: VideoSource, music: VideoSource) -> ExportHandle {
        let request = RenderRequest::new(vec![MediaItem {
            index: 0,
            kind: crate::media::MediaKind::Video(video),
        }])
        .with_transition(TransitionMode::Cut)
        .with_soundtrack(music);
        self.render(&request)
    }
}
