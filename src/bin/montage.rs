use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use montage::{EngineConfig, Montage, ProjectFile, RenderResult, VideoSource};

#[derive(Parser, Debug)]
#[command(name = "montage", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the planned composition as JSON without encoding.
    Plan(PlanArgs),
    /// Render a project to MP4 (requires `ffmpeg` and `ffprobe` on PATH).
    Render(RenderArgs),
    /// Replace a video's audio with a music track.
    Soundtrack(SoundtrackArgs),
}

#[derive(Parser, Debug)]
struct PlanArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Write the plan here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output MP4 path; defaults to the project's configured output location.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct SoundtrackArgs {
    /// Video clip.
    #[arg(long)]
    video: PathBuf,

    /// Audio to use instead of the clip's own.
    #[arg(long)]
    music: PathBuf,

    /// Engine config JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output MP4 path.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Plan(args) => cmd_plan(args),
        Command::Render(args) => cmd_render(args),
        Command::Soundtrack(args) => cmd_soundtrack(args),
    }
}

fn load_project(path: &Path) -> anyhow::Result<ProjectFile> {
    let project = ProjectFile::from_path(path)
        .with_context(|| format!("load project '{}'", path.display()))?;
    montage::logging::init_logging(&project.config.logging);
    Ok(project)
}

fn apply_out(config: &mut EngineConfig, out: Option<PathBuf>) -> anyhow::Result<()> {
    let Some(out) = out else {
        return Ok(());
    };
    let name = out
        .file_name()
        .with_context(|| format!("output path '{}' has no file name", out.display()))?;
    config.output_file_name = name.to_string_lossy().into_owned();
    config.output_dir = Some(match out.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    });
    Ok(())
}

fn finish(result: RenderResult) -> anyhow::Result<()> {
    let output = result.into_result()?;
    eprintln!("wrote {}", output.display());
    Ok(())
}

fn cmd_plan(args: PlanArgs) -> anyhow::Result<()> {
    let project = load_project(&args.in_path)?;
    let engine = Montage::with_ffmpeg(project.config.clone())?;
    let composition = engine.plan(&project.to_request())?;
    let json = serde_json::to_string_pretty(&composition).context("serialize composition")?;

    match args.out {
        Some(out) => {
            std::fs::write(&out, json)
                .with_context(|| format!("write plan '{}'", out.display()))?;
            eprintln!("wrote {}", out.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let mut project = load_project(&args.in_path)?;
    apply_out(&mut project.config, args.out)?;
    let engine = Montage::with_ffmpeg(project.config.clone())?;
    finish(engine.render(&project.to_request()).wait())
}

fn cmd_soundtrack(args: SoundtrackArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_path(path)
            .with_context(|| format!("load config '{}'", path.display()))?,
        None => EngineConfig::default(),
    };
    montage::logging::init_logging(&config.logging);
    apply_out(&mut config, args.out)?;

    let engine = Montage::with_ffmpeg(config)?;
    let handle = engine.add_soundtrack(VideoSource::new(args.video), VideoSource::new(args.music));
    finish(handle.wait())
}
