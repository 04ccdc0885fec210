use std::collections::BTreeMap;
use std::io::Read as _;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::compose::Composition;
use crate::export::{EncodePrimitive, ExportSettings};
use crate::foundation::core::{Fps, Rect, TimeRange};
use crate::foundation::error::{MontageError, MontageResult};
use crate::geometry::Orientation;
use crate::media::{ImageSource, StillImage, TextOverlay};
use crate::schedule::{OpacityChange, OpacitySchedule, OverlayKind};
use crate::timeline::{FillerSource, SegmentKind, SourceRef, TrackMedia};

const AUDIO_SAMPLE_RATE: u32 = 48_000;

/// Options for [`FfmpegEncoder`].
#[derive(Clone, Debug)]
pub struct FfmpegEncoderOpts {
    /// Directory under which per-export scratch directories are created.
    pub scratch_root: PathBuf,
    /// Font for captions; ffmpeg's fontconfig default when `None`.
    pub font_file: Option<PathBuf>,
}

impl Default for FfmpegEncoderOpts {
    fn default() -> Self {
        Self {
            scratch_root: std::env::temp_dir(),
            font_file: None,
        }
    }
}

/// [`EncodePrimitive`] that renders a composition with one `ffmpeg` invocation.
#[derive(Clone, Debug, Default)]
pub struct FfmpegEncoder {
    opts: FfmpegEncoderOpts,
}

impl FfmpegEncoder {
    /// Create an encoder.
    pub fn new(opts: FfmpegEncoderOpts) -> Self {
        Self { opts }
    }
}

/// A file the ffmpeg command reads that must exist before it runs.
#[derive(Clone, Debug)]
pub enum ScratchFile {
    /// Caption text read by `drawtext=textfile=`.
    Text {
        /// Destination path.
        path: PathBuf,
        /// File contents.
        text: String,
    },
    /// In-memory image written as PNG.
    Png {
        /// File stem inside the scratch directory.
        stem: String,
        /// Image to write.
        image: StillImage,
    },
}

/// Everything needed to run ffmpeg for one composition.
#[derive(Clone, Debug)]
pub struct FfmpegPlan {
    /// Arguments after the program name.
    pub args: Vec<String>,
    /// Files to write into the scratch directory first.
    pub scratch: Vec<ScratchFile>,
}

/// Translate `comp` into an ffmpeg command line. Pure; nothing is written.
///
/// Inputs are opened with `-noautorotate` so that rotation comes only from the resolved
/// transforms. Every segment is overlaid on a black canvas inside its own time window; audio
/// slices are trimmed, padded to their slot and concatenated in timeline order.
pub fn build_ffmpeg_plan(
    comp: &Composition,
    settings: &ExportSettings,
    scratch_dir: &Path,
    font_file: Option<&Path>,
) -> MontageResult<FfmpegPlan> {
    let canvas = comp.canvas();
    if !canvas.width.is_multiple_of(2) || !canvas.height.is_multiple_of(2) {
        return Err(MontageError::validation(format!(
            "canvas {}x{} must be even (required for yuv420p mp4 output)",
            canvas.width, canvas.height
        )));
    }
    if comp.duration() <= 0.0 {
        return Err(MontageError::EmptyComposition);
    }

    let mut g = GraphBuilder::default();
    let fps = fps_arg(settings.fps);
    let total = num(comp.duration());

    g.chains.push(format!(
        "color=c=black:s={}x{}:r={fps}:d={total}[base0]",
        canvas.width, canvas.height
    ));
    let mut base = "base0".to_string();

    // Clip inputs, one per video segment, shared by its audio slice.
    let mut clip_inputs = BTreeMap::new();
    for seg in comp.segments() {
        if seg.kind != SegmentKind::Video {
            continue;
        }
        let track = track_slice(comp, seg.video_track)?;
        let SourceRef::Clip { path, .. } = &track.source else {
            return Err(MontageError::validation(format!(
                "video segment for item {} does not read a clip",
                seg.item_index
            )));
        };
        let input = g.input(&["-noautorotate"], path);
        clip_inputs.insert(seg.item_index, input);
    }

    for (n, seg) in comp.segments().iter().enumerate() {
        let slice = track_slice(comp, seg.video_track)?;
        let label = format!("v{n}");
        let (stream, mut filters, x, y) = match seg.kind {
            SegmentKind::Video => {
                let t = seg.transform.ok_or_else(|| {
                    MontageError::validation(format!(
                        "video segment for item {} has no transform",
                        seg.item_index
                    ))
                })?;
                let input = clip_inputs.get(&seg.item_index).copied().ok_or_else(|| {
                    MontageError::validation(format!("no input for item {}", seg.item_index))
                })?;
                let bounds = t.placed_bounds();
                let mut filters = vec![
                    format!(
                        "trim=start={}:duration={}",
                        num(slice.source_start),
                        num(seg.range.duration)
                    ),
                    "setpts=PTS-STARTPTS".to_string(),
                ];
                filters.extend(rotation_filters(t.orientation));
                filters.push(format!(
                    "scale={}:{}",
                    even_px(bounds.width()),
                    even_px(bounds.height())
                ));
                (
                    format!("{input}:v"),
                    filters,
                    bounds.x0.round() as i64,
                    bounds.y0.round() as i64,
                )
            }
            SegmentKind::Image => match &comp.fillers().background {
                // The black base canvas already is the generated background.
                FillerSource::Generated => continue,
                FillerSource::File { path } => {
                    let input = g.input(&["-stream_loop", "-1"], path);
                    let filters = vec![
                        format!("trim=duration={}", num(seg.range.duration)),
                        "setpts=PTS-STARTPTS".to_string(),
                        format!("scale={}:{}", canvas.width, canvas.height),
                    ];
                    (format!("{input}:v"), filters, 0, 0)
                }
            },
        };

        let Some(alpha) = alpha_plan(&seg.opacity, seg.range)? else {
            continue;
        };
        filters.push("setsar=1".to_string());
        filters.push("format=yuva420p".to_string());
        filters.push(format!("setpts=PTS+{}/TB", num(seg.range.start)));
        filters.extend(alpha.filters);
        g.chains
            .push(format!("[{stream}]{}[{label}]", filters.join(",")));
        base = g.overlay(&base, &label, x, y, alpha.from, alpha.until);
    }

    let mut layers: Vec<_> = comp.overlays().iter().collect();
    layers.sort_by_key(|l| l.z);
    for (n, layer) in layers.into_iter().enumerate() {
        match &layer.kind {
            OverlayKind::Image {
                item_index,
                image,
                orientation,
                window,
                ..
            } => {
                let span = layer_span(&layer.opacity, *window);
                let Some(alpha) = alpha_plan(&layer.opacity, span)? else {
                    continue;
                };
                let path = match &image.source {
                    ImageSource::File(path) => path.clone(),
                    ImageSource::Pixels(_) => {
                        let stem = format!("image-{item_index}");
                        let path = scratch_dir.join(format!("{stem}.png"));
                        g.scratch.push(ScratchFile::Png {
                            stem,
                            image: image.clone(),
                        });
                        path
                    }
                };
                let input = g.input(
                    &[
                        "-loop",
                        "1",
                        "-framerate",
                        fps.as_str(),
                        "-t",
                        num(span.duration).as_str(),
                        "-noautorotate",
                    ],
                    &path,
                );
                let (w, h) = (even_px(layer.frame.width()), even_px(layer.frame.height()));
                let mut filters = rotation_filters(*orientation);
                filters.push(format!(
                    "scale={w}:{h}:force_original_aspect_ratio=increase"
                ));
                filters.push(format!("crop={w}:{h}"));
                filters.push("setsar=1".to_string());
                filters.push("format=yuva420p".to_string());
                filters.push(format!("setpts=PTS-STARTPTS+{}/TB", num(span.start)));
                filters.extend(alpha.filters);
                let label = format!("ov{n}");
                g.chains
                    .push(format!("[{input}:v]{}[{label}]", filters.join(",")));
                base = g.overlay(
                    &base,
                    &label,
                    layer.frame.x0.round() as i64,
                    layer.frame.y0.round() as i64,
                    alpha.from,
                    alpha.until,
                );
            }
            OverlayKind::Text(text) => {
                let path = scratch_dir.join(format!("text-{n}.txt"));
                g.scratch.push(ScratchFile::Text {
                    path: path.clone(),
                    text: text.text.clone(),
                });
                let next = format!("base{}", g.next_base());
                g.chains.push(format!(
                    "[{base}]{}[{next}]",
                    drawtext_filter(text, layer.frame, &layer.opacity, &path, font_file)
                ));
                base = next;
            }
        }
    }
    g.chains.push(format!("[{base}]format=yuv420p[vout]"));

    // Audio: every slice of every audio track, in timeline order.
    let mut slices: Vec<_> = comp
        .tracks_of(TrackMedia::Audio)
        .flat_map(|t| t.segments.iter())
        .collect();
    slices.sort_by(|a, b| a.range.start.total_cmp(&b.range.start));

    let mut audio_labels = Vec::with_capacity(slices.len());
    for (n, slice) in slices.iter().enumerate() {
        let d = num(slice.range.duration);
        let input = match &slice.source {
            SourceRef::Clip { item_index, path } => match clip_inputs.get(item_index) {
                Some(input) => *input,
                None => g.input(&[], path),
            },
            SourceRef::Silence => match &comp.fillers().silence {
                FillerSource::Generated => g.lavfi(
                    &d,
                    &format!("anullsrc=r={AUDIO_SAMPLE_RATE}:cl=stereo"),
                ),
                FillerSource::File { path } => g.input(&["-stream_loop", "-1"], path),
            },
            SourceRef::Soundtrack { path } => g.input(&[], path),
            SourceRef::Background => {
                return Err(MontageError::validation(
                    "background filler placed on an audio track",
                ));
            }
        };
        let label = format!("a{n}");
        g.chains.push(format!(
            "[{input}:a]atrim=start={}:duration={d},asetpts=PTS-STARTPTS,\
             aformat=sample_rates={AUDIO_SAMPLE_RATE}:sample_fmts=fltp:channel_layouts=stereo,\
             apad=whole_dur={d}[{label}]",
            num(slice.source_start)
        ));
        audio_labels.push(label);
    }
    if !audio_labels.is_empty() {
        let ins: String = audio_labels.iter().map(|l| format!("[{l}]")).collect();
        g.chains.push(format!(
            "{ins}concat=n={}:v=0:a=1[aout]",
            audio_labels.len()
        ));
    }

    let mut args = vec![
        "-y".to_string(),
        "-nostdin".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
    ];
    args.append(&mut g.args);
    args.push("-filter_complex".to_string());
    args.push(g.chains.join(";"));
    args.extend(["-map", "[vout]"].map(String::from));
    if audio_labels.is_empty() {
        args.push("-an".to_string());
    } else {
        args.extend(["-map", "[aout]"].map(String::from));
    }
    args.extend(
        [
            "-c:v", "libx264", "-preset", "slow", "-crf", "17", "-pix_fmt", "yuv420p", "-r",
        ]
        .map(String::from),
    );
    args.push(fps);
    if !audio_labels.is_empty() {
        args.extend(["-c:a", "aac", "-b:a", "192k"].map(String::from));
    }
    args.push("-t".to_string());
    args.push(total);
    if settings.optimize_for_network {
        args.extend(["-movflags", "+faststart"].map(String::from));
    }
    args.push("-f".to_string());
    args.push(settings.container.muxer().to_string());
    args.push(settings.output_path.display().to_string());

    tracing::debug!(
        inputs = g.inputs,
        scratch = g.scratch.len(),
        "ffmpeg plan built"
    );

    Ok(FfmpegPlan {
        args,
        scratch: g.scratch,
    })
}

#[derive(Default)]
struct GraphBuilder {
    args: Vec<String>,
    inputs: usize,
    bases: usize,
    chains: Vec<String>,
    scratch: Vec<ScratchFile>,
}

impl GraphBuilder {
    fn input(&mut self, pre: &[&str], path: &Path) -> usize {
        self.args.extend(pre.iter().map(|s| s.to_string()));
        self.args.push("-i".to_string());
        self.args.push(path.display().to_string());
        self.inputs += 1;
        self.inputs - 1
    }

    fn lavfi(&mut self, duration: &str, source: &str) -> usize {
        self.args
            .extend(["-f", "lavfi", "-t", duration, "-i", source].map(String::from));
        self.inputs += 1;
        self.inputs - 1
    }

    fn next_base(&mut self) -> usize {
        self.bases += 1;
        self.bases
    }

    fn overlay(&mut self, base: &str, layer: &str, x: i64, y: i64, from: f64, until: f64) -> String {
        let next = format!("base{}", self.next_base());
        self.chains.push(format!(
            "[{base}][{layer}]overlay=x={x}:y={y}:eof_action=pass:enable='between(t,{},{})'[{next}]",
            num(from),
            num(until)
        ));
        next
    }
}

fn track_slice(
    comp: &Composition,
    id: crate::timeline::TrackId,
) -> MontageResult<&crate::timeline::TrackSegment> {
    comp.track(id)
        .and_then(|t| t.segments.first())
        .ok_or_else(|| MontageError::validation(format!("track {} is empty or missing", id.0)))
}

/// Alpha filters and visibility window derived from an opacity schedule.
struct AlphaPlan {
    filters: Vec<String>,
    from: f64,
    until: f64,
}

/// Express `opacity` over `span` as `fade` filters plus a visibility window.
///
/// Only full-range changes are supported: ramps between 0 and 1, and steps to 0 or 1.
/// Returns `None` when the layer is never visible.
fn alpha_plan(opacity: &OpacitySchedule, span: TimeRange) -> MontageResult<Option<AlphaPlan>> {
    let unsupported = || {
        MontageError::validation(
            "ffmpeg export supports opacity changes between 0 and 1 only",
        )
    };
    let mut visible = match opacity.initial {
        v if v == 1.0 => true,
        v if v == 0.0 => false,
        _ => return Err(unsupported()),
    };
    if opacity.is_constant() {
        return Ok((visible && !span.is_empty()).then(|| AlphaPlan {
            filters: Vec::new(),
            from: span.start,
            until: span.end(),
        }));
    }
    let (mut from, mut until) = (span.start, span.end());
    let mut filters = Vec::new();

    for change in opacity.changes() {
        match *change {
            OpacityChange::Step { at, value } if value == 0.0 => until = until.min(at),
            OpacityChange::Step { at, value } if value == 1.0 => {
                if !visible {
                    from = from.max(at);
                    visible = true;
                }
            }
            OpacityChange::Ramp { range, from: a, to: b } if a == 0.0 && b == 1.0 => {
                filters.push(format!(
                    "fade=t=in:st={}:d={}:alpha=1",
                    num(range.start),
                    num(range.duration)
                ));
                visible = true;
            }
            OpacityChange::Ramp { range, from: a, to: b } if a == 1.0 && b == 0.0 => {
                filters.push(format!(
                    "fade=t=out:st={}:d={}:alpha=1",
                    num(range.start),
                    num(range.duration)
                ));
            }
            _ => return Err(unsupported()),
        }
    }

    if !visible || until <= from {
        return Ok(None);
    }
    Ok(Some(AlphaPlan {
        filters,
        from,
        until,
    }))
}

/// Window from `window.start` until the last opacity change has completed.
fn layer_span(opacity: &OpacitySchedule, window: TimeRange) -> TimeRange {
    let end = opacity
        .changes()
        .iter()
        .map(|c| match *c {
            OpacityChange::Step { at, .. } => at,
            OpacityChange::Ramp { range, .. } => range.end(),
        })
        .fold(window.end(), f64::max);
    TimeRange {
        start: window.start,
        duration: end - window.start,
    }
}

/// ffmpeg expression of `opacity` in terms of `t`, matching [`OpacitySchedule::sample`].
pub fn opacity_expr(opacity: &OpacitySchedule) -> String {
    let mut expr = num(opacity.initial);
    for change in opacity.changes() {
        expr = match *change {
            OpacityChange::Step { at, value } => {
                format!("if(lt(t,{}),{expr},{})", num(at), num(value))
            }
            OpacityChange::Ramp { range, to, .. } if range.duration <= 0.0 => {
                format!("if(lt(t,{}),{expr},{})", num(range.start), num(to))
            }
            OpacityChange::Ramp { range, from, to } => {
                let (s, e) = (num(range.start), num(range.end()));
                format!(
                    "if(lt(t,{s}),{expr},if(lt(t,{e}),{}+({})*(t-{s})/{},{}))",
                    num(from),
                    num(to - from),
                    num(range.duration),
                    num(to)
                )
            }
        };
    }
    expr
}

fn drawtext_filter(
    text: &TextOverlay,
    frame: Rect,
    opacity: &OpacitySchedule,
    textfile: &Path,
    font_file: Option<&Path>,
) -> String {
    let mut alpha = opacity_expr(opacity);
    if text.color.a != 255 {
        alpha = format!("({alpha})*{}", num(text.color.alpha_f64()));
    }
    let mut f = format!(
        "drawtext=expansion=none:textfile={}:fontsize={}:fontcolor={}",
        quote(&textfile.display().to_string()),
        num(text.font_size),
        text.color.to_ffmpeg_hex()
    );
    if let Some(font) = font_file {
        f.push_str(&format!(":fontfile={}", quote(&font.display().to_string())));
    }
    f.push_str(&format!(
        ":x='{}+({}-text_w)/2':y={}:alpha='{alpha}'",
        num(frame.x0),
        num(frame.width()),
        num(text.baseline_top())
    ));
    f
}

fn rotation_filters(orientation: Orientation) -> Vec<String> {
    match orientation.effective() {
        Orientation::Right => vec!["transpose=clock".to_string()],
        Orientation::Left => vec!["transpose=cclock".to_string()],
        Orientation::Down => vec!["hflip".to_string(), "vflip".to_string()],
        _ => Vec::new(),
    }
}

fn fps_arg(fps: Fps) -> String {
    format!("{}/{}", fps.num, fps.den)
}

/// Round to an even pixel count of at least 2, as yuv420p requires.
fn even_px(v: f64) -> u32 {
    let half = (v / 2.0).round().max(1.0);
    half as u32 * 2
}

/// Shortest decimal form with at most six fractional digits.
pub(crate) fn num(v: f64) -> String {
    let s = format!("{v:.6}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''").replace(':', r"\:"))
}

struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    fn create(path: PathBuf, files: &[ScratchFile]) -> MontageResult<Self> {
        use anyhow::Context as _;
        std::fs::create_dir_all(&path)
            .with_context(|| format!("create scratch directory '{}'", path.display()))?;
        let dir = Self { path };
        for file in files {
            match file {
                ScratchFile::Text { path, text } => std::fs::write(path, text)
                    .with_context(|| format!("write caption file '{}'", path.display()))?,
                ScratchFile::Png { stem, image } => {
                    let path = image.materialize(&dir.path, stem)?;
                    tracing::debug!(path = %path.display(), "wrote image overlay");
                }
            }
        }
        Ok(dir)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove scratch directory");
        }
    }
}

static SCRATCH_SEQ: AtomicU64 = AtomicU64::new(0);

impl EncodePrimitive for FfmpegEncoder {
    #[tracing::instrument(skip_all, fields(output = %settings.output_path.display()))]
    fn encode(&self, composition: &Composition, settings: &ExportSettings) -> MontageResult<()> {
        ensure_parent_dir(&settings.output_path)?;
        let scratch_path = self.opts.scratch_root.join(format!(
            "montage-{}-{}",
            std::process::id(),
            SCRATCH_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        let plan = build_ffmpeg_plan(
            composition,
            settings,
            &scratch_path,
            self.opts.font_file.as_deref(),
        )?;

        if !is_ffmpeg_on_path() {
            return Err(MontageError::export_failed(
                &settings.output_path,
                "ffmpeg is required for export, but was not found on PATH",
            ));
        }

        let _scratch = ScratchDir::create(scratch_path, &plan.scratch)?;
        run_ffmpeg(&plan.args, &settings.output_path)
    }
}

fn run_ffmpeg(args: &[String], output: &Path) -> MontageResult<()> {
    tracing::debug!(?args, "running ffmpeg");
    let mut child = Command::new("ffmpeg")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            MontageError::export_failed(
                output,
                format!("failed to spawn ffmpeg (is it installed and on PATH?): {e}"),
            )
        })?;

    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| MontageError::export_failed(output, "failed to open ffmpeg stderr"))?;
    let stderr_drain = std::thread::spawn(move || {
        let mut bytes = Vec::new();
        stderr.read_to_end(&mut bytes)?;
        Ok::<_, std::io::Error>(bytes)
    });

    let status = child.wait().map_err(|e| {
        MontageError::export_failed(output, format!("failed to wait for ffmpeg to finish: {e}"))
    })?;
    let stderr_bytes = stderr_drain
        .join()
        .map_err(|_| MontageError::export_failed(output, "ffmpeg stderr drain thread panicked"))?
        .map_err(|e| MontageError::export_failed(output, format!("ffmpeg stderr read failed: {e}")))?;

    if !status.success() {
        return Err(MontageError::export_failed(
            output,
            format!(
                "ffmpeg exited with status {status}: {}",
                String::from_utf8_lossy(&stderr_bytes).trim()
            ),
        ));
    }
    Ok(())
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> MontageResult<()> {
    if let Some(parent) = path.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "../../tests/unit/export/ffmpeg.rs"]
mod tests;
