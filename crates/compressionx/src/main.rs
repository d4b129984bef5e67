//! compressionx: compress an image, then restore it with super-resolution.
//!
//! Each upload is re-encoded with a lossy codec at low quality (twice by
//! default), then resized to a bounded working width and enlarged by a
//! super-resolution model. The original, compressed and upscaled images
//! are written side by side in a temp directory.
//!
//! # Usage
//!
//! ```text
//! compressionx demo photo.jpg
//! compressionx compress in.png out.jpg --quality 40
//! compressionx upscale out.jpg big.jpg --architecture edsr --scale 4
//! compressionx bench photo.jpg --classical --runs 5
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod pages;
mod progress;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand, ValueEnum};
use compressionx_io::{Engine, IoError, UpscaleFileOutcome, Workspace};
use compressionx_model::{Architecture, ModelSpec};
use compressionx_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use compressionx_pipeline::{NoProgress, PipelineConfig, ResampleUpscaler, WorkingFilter};

use crate::progress::{ProgressSink, StderrProgress};

/// Compress an image with a lossy codec, then restore detail with a
/// super-resolution model.
#[derive(Parser)]
#[command(name = "compressionx", version)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug). `RUST_LOG` takes
    /// precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Landing page.
    Home,
    /// Treat an image as an upload: save, compress, upscale.
    Demo(DemoArgs),
    /// Re-encode one image file into another.
    Compress(CompressArgs),
    /// Run super-resolution on one image file.
    Upscale(UpscaleArgs),
    /// Run the in-memory pipeline and print per-stage diagnostics.
    Bench(BenchArgs),
    /// What CompressionX is.
    About,
    /// How to get in touch.
    Contact,
}

/// Working resize filter selection.
#[derive(Clone, Copy, ValueEnum)]
enum Filter {
    /// Nearest-neighbor (fastest, blocky).
    Nearest,
    /// Bilinear interpolation (fast, decent quality).
    Triangle,
    /// Bicubic Catmull-Rom (moderate, good quality).
    CatmullRom,
    /// Gaussian (moderate, smooth).
    Gaussian,
    /// Lanczos with 3 lobes (slowest, sharpest).
    Lanczos3,
    /// Area averaging (moiré-free when shrinking).
    Area,
}

/// Maps a [`WorkingFilter`] to the local CLI [`Filter`] enum.
const fn filter_from_pipeline(f: WorkingFilter) -> Filter {
    match f {
        WorkingFilter::Nearest => Filter::Nearest,
        WorkingFilter::Triangle => Filter::Triangle,
        WorkingFilter::CatmullRom => Filter::CatmullRom,
        WorkingFilter::Gaussian => Filter::Gaussian,
        WorkingFilter::Lanczos3 => Filter::Lanczos3,
        WorkingFilter::Area => Filter::Area,
    }
}

const fn filter_to_pipeline(f: Filter) -> WorkingFilter {
    match f {
        Filter::Nearest => WorkingFilter::Nearest,
        Filter::Triangle => WorkingFilter::Triangle,
        Filter::CatmullRom => WorkingFilter::CatmullRom,
        Filter::Gaussian => WorkingFilter::Gaussian,
        Filter::Lanczos3 => WorkingFilter::Lanczos3,
        Filter::Area => WorkingFilter::Area,
    }
}

/// The CLI default filter, derived from
/// [`PipelineConfig::DEFAULT_WORKING_FILTER`] so the two cannot silently
/// diverge.
const CLI_DEFAULT_FILTER: Filter = filter_from_pipeline(PipelineConfig::DEFAULT_WORKING_FILTER);

/// Pipeline parameters shared by every processing command.
#[derive(Args)]
struct PipelineArgs {
    /// Lossy encoder quality (1-100).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_QUALITY, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Number of re-encode passes.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_PASSES, value_parser = clap::value_parser!(u8).range(1..=i64::from(PipelineConfig::MAX_PASSES)))]
    passes: u8,

    /// Longer axis of the working image fed to the model, in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MAX_WIDTH, value_parser = clap::value_parser!(u32).range(1..=i64::from(PipelineConfig::MAX_WORKING_WIDTH)))]
    max_width: u32,

    /// Working resize filter.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_FILTER)]
    filter: Filter,

    /// Skip the progress indicator and its delays.
    #[arg(long)]
    no_progress: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, the other pipeline flags are ignored. Missing
    /// fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

impl PipelineArgs {
    /// Build a [`PipelineConfig`] from CLI arguments.
    fn config(&self) -> Result<PipelineConfig, String> {
        let mut config = if let Some(ref json) = self.config_json {
            serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
        } else {
            PipelineConfig {
                quality: self.quality,
                passes: self.passes,
                max_width: self.max_width,
                working_filter: filter_to_pipeline(self.filter),
                ..PipelineConfig::default()
            }
        };
        if self.no_progress {
            config.progress_delay = Duration::ZERO;
        }
        config.validate().map_err(|e| e.to_string())?;
        Ok(config)
    }

    fn progress(&self) -> Box<dyn ProgressSink> {
        if self.no_progress {
            Box::new(NoProgress)
        } else {
            Box::new(StderrProgress::default())
        }
    }
}

/// Super-resolution engine selection.
#[derive(Args)]
struct EngineArgs {
    /// Directory holding model files.
    #[arg(long, default_value = ModelSpec::DEFAULT_DIR)]
    model_dir: PathBuf,

    /// Model file name. Defaults to `<Family>_x<scale>.onnx`.
    #[arg(long)]
    model_name: Option<String>,

    /// Network family (edsr, espcn, fsrcnn, lapsrn, realesrgan).
    #[arg(long, default_value_t = ModelSpec::DEFAULT_ARCHITECTURE)]
    architecture: Architecture,

    /// Upscale factor.
    #[arg(long, default_value_t = ModelSpec::DEFAULT_SCALE, value_parser = clap::value_parser!(u32).range(1..=i64::from(ResampleUpscaler::MAX_SCALE)))]
    scale: u32,

    /// Use Lanczos resampling instead of a neural network.
    #[arg(long)]
    classical: bool,
}

impl EngineArgs {
    fn engine(&self) -> Engine {
        if self.classical {
            return Engine::Classical { scale: self.scale };
        }
        let mut spec =
            ModelSpec::for_architecture(self.architecture, self.scale).in_dir(&self.model_dir);
        if let Some(ref name) = self.model_name {
            spec.name.clone_from(name);
        }
        Engine::Onnx(spec)
    }
}

#[derive(Args)]
struct DemoArgs {
    /// Image to upload (PNG or JPEG).
    image: PathBuf,

    /// Directory the three images are written to.
    #[arg(long, default_value = Workspace::DEFAULT_ROOT)]
    temp_dir: PathBuf,

    #[command(flatten)]
    pipeline: PipelineArgs,

    #[command(flatten)]
    engine: EngineArgs,

    /// Print the result as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct CompressArgs {
    /// Image to read.
    input: PathBuf,

    /// Where to write; the extension picks the codec (jpg, jpeg, png).
    output: PathBuf,

    /// Lossy encoder quality (1-100).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_QUALITY, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Number of re-encode passes.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_PASSES, value_parser = clap::value_parser!(u8).range(1..=i64::from(PipelineConfig::MAX_PASSES)))]
    passes: u8,
}

#[derive(Args)]
struct UpscaleArgs {
    /// Image to read.
    input: PathBuf,

    /// Where to write; the extension picks the codec (jpg, jpeg, png).
    output: PathBuf,

    #[command(flatten)]
    pipeline: PipelineArgs,

    #[command(flatten)]
    engine: EngineArgs,

    /// Print the outcome as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct BenchArgs {
    /// Image to process.
    image: PathBuf,

    #[command(flatten)]
    pipeline: PipelineArgs,

    #[command(flatten)]
    engine: EngineArgs,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Home => print_page(pages::HOME),
        Command::About => print_page(pages::ABOUT),
        Command::Contact => print_page(pages::CONTACT),
        Command::Demo(args) => run_demo(&args),
        Command::Compress(args) => run_compress(&args),
        Command::Upscale(args) => run_upscale(&args),
        Command::Bench(args) => run_bench(&args),
    }
}

/// Log to stderr at `warn`, raised by `-v`; `RUST_LOG` overrides.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_page(page: &str) -> ExitCode {
    println!("{}", pages::render(page));
    ExitCode::SUCCESS
}

fn print_json<T: serde::Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error serializing output: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Message for a failure the user can act on.
fn describe(err: &IoError) -> String {
    match err {
        IoError::NotFound(_) => "File not found. Please upload a valid image.".to_string(),
        other => format!("Error: {other}"),
    }
}

fn warn_fallback(outcome: &UpscaleFileOutcome) {
    if let UpscaleFileOutcome::Fallback { reason, path } = outcome {
        eprintln!("Upscaling failed: {reason}");
        eprintln!("Showing {} instead.", path.display());
    }
}

fn run_demo(args: &DemoArgs) -> ExitCode {
    let config = match args.pipeline.config() {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    let Some(file_name) = args.image.file_name().and_then(|n| n.to_str()) else {
        eprintln!("Not a file name: {}", args.image.display());
        return ExitCode::FAILURE;
    };
    let bytes = match std::fs::read(&args.image) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", args.image.display());
            return ExitCode::FAILURE;
        }
    };

    let workspace = Workspace::new(&args.temp_dir);
    let mut progress = args.pipeline.progress();
    let result = compressionx_io::handle_upload(
        &workspace,
        file_name,
        &bytes,
        &config,
        &args.engine.engine(),
        progress.as_mut(),
    );
    progress.end_line();

    let result = match result {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{}", describe(&e));
            return ExitCode::FAILURE;
        }
    };
    warn_fallback(&result.upscaled);

    if args.json {
        return print_json(&result);
    }
    println!("Original Image:    {}", result.original.display());
    println!("Compressed Image:  {}", result.compressed.display());
    println!("AI Upscaled Image: {}", result.upscaled.path().display());
    ExitCode::SUCCESS
}

fn run_compress(args: &CompressArgs) -> ExitCode {
    match compressionx_io::compress_file(&args.input, &args.output, args.quality, args.passes) {
        Ok(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", describe(&e));
            ExitCode::FAILURE
        }
    }
}

fn run_upscale(args: &UpscaleArgs) -> ExitCode {
    let config = match args.pipeline.config() {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    let mut progress = args.pipeline.progress();
    let outcome = compressionx_io::upscale_file(
        &args.input,
        &args.output,
        &args.engine.engine(),
        &config,
        progress.as_mut(),
    );
    progress.end_line();
    warn_fallback(&outcome);

    if args.json {
        return print_json(&outcome);
    }
    println!("{}", outcome.path().display());
    ExitCode::SUCCESS
}

fn run_bench(args: &BenchArgs) -> ExitCode {
    let config = match args.pipeline.config() {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    let image_bytes = match std::fs::read(&args.image) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", args.image.display());
            return ExitCode::FAILURE;
        }
    };
    let mut model = match args.engine.engine().load() {
        Ok(model) => model,
        Err(e) => {
            eprintln!("{e}");
            eprintln!("Pass --classical to benchmark without a model file.");
            return ExitCode::FAILURE;
        }
    };

    eprintln!("Image: {} ({} bytes)", args.image.display(), image_bytes.len());
    eprintln!("Engine: {} x{}", model.name(), model.scale());
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", args.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(args.runs);
    for run in 0..args.runs {
        if args.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, args.runs);
        }

        let mut progress = args.pipeline.progress();
        let outcome = compressionx_pipeline::diagnostics::process_with_diagnostics(
            &image_bytes,
            &config,
            model.as_mut(),
            progress.as_mut(),
            &StdClock,
        );
        progress.end_line();

        match outcome {
            Ok((result, diagnostics)) => {
                if let Some(reason) = result.upscaled.reason() {
                    eprintln!("Upscaling failed: {reason}");
                }
                if args.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }
                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if args.runs > 1 {
            eprintln!();
        }
    }

    if args.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&PipelineDiagnostics) -> Duration;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Decode", |d| d.decode.duration),
        ("Compress", |d| d.compress.duration),
        ("Upscale", |d| d.upscale.duration),
    ];

    for (name, extractor) in stage_extractors {
        let stage_mean = all_diagnostics
            .iter()
            .map(|d| extractor(d).as_secs_f64() * 1000.0)
            .sum::<f64>()
            / all_diagnostics.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}
