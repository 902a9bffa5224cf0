use std::{
    error::Error,
    path::{Path, PathBuf},
    sync::Arc,
};

use bifgen::{
    BifError, BifReader, ExtractOptions, ExtractionPath, ExtractionPipeline, FfmpegBackend,
    FfmpegLogLevel, FfmpegTool, HardwareAccelerationMode, OperationType, Preset,
    ProgressCallback, ProgressInfo, Resolution, SampleSelection, ValidateOptions, Validator,
};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  bifgen generate movie.mkv\n  bifgen generate movie.mkv --sd --interval 5 --preset quality -o movie.bif\n  bifgen validate movie-HD.bif movie.mkv --samples 10\n  bifgen preview movie-HD.bif\n  bifgen info movie-HD.bif --json\n  bifgen completions zsh > _bifgen";

/// Exit status for a BIF file that failed validation.
const VALIDATION_FAILED: i32 = 5;

#[derive(Debug, Parser)]
#[command(
    name = "bifgen",
    version,
    about = "Generate, preview, and validate BIF trick-play thumbnail files",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only print errors; no progress bar.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    silent: bool,

    /// FFmpeg's own log level (quiet, fatal, error, warning, info, debug).
    #[arg(long, global = true, default_value = "error")]
    log_level: FfmpegLogLevel,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create a BIF file from a video.
    #[command(
        about = "Generate a BIF file",
        after_help = "Examples:\n  bifgen generate movie.mkv\n  bifgen generate movie.mkv --sd -i 5 -O 30 -j 4 -o thumbs.bif"
    )]
    Generate {
        /// Source video.
        video: PathBuf,
        /// Seconds between thumbnails.
        #[arg(short, long, default_value_t = 10)]
        interval: u32,
        /// Seconds to skip before the first thumbnail.
        #[arg(short = 'O', long, default_value_t = 0)]
        offset: u32,
        /// Output file (default: <video stem>-<SD|HD>.bif).
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Standard-definition thumbnails (240x136) instead of HD (320x180).
        #[arg(long)]
        sd: bool,
        /// Hardware decode mode (auto, none, cuda, vaapi, dxva2, d3d11va, videotoolbox, qsv).
        #[arg(long, default_value = "auto")]
        hardware: HardwareAccelerationMode,
        /// Worker threads (default: available cores).
        #[arg(short, long)]
        jobs: Option<usize>,
        /// Speed/quality preset (fast, medium, quality).
        #[arg(long, default_value = "medium")]
        preset: Preset,
    },

    /// Export every image of a BIF file as a JPEG.
    #[command(
        about = "Export BIF images",
        after_help = "Examples:\n  bifgen preview movie-HD.bif\n  bifgen preview movie-HD.bif -o frames"
    )]
    Preview {
        /// BIF file to read.
        bif: PathBuf,
        /// Output directory (default: <bif stem>_preview).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Compare BIF images against the source video.
    #[command(
        about = "Validate a BIF file",
        after_help = "Examples:\n  bifgen validate movie-HD.bif movie.mkv\n  bifgen validate movie-HD.bif movie.mkv --all --mse-threshold 250"
    )]
    Validate {
        /// BIF file to check.
        bif: PathBuf,
        /// Video the BIF file was generated from.
        video: PathBuf,
        /// Number of random entries to check.
        #[arg(short = 'n', long, default_value_t = 5)]
        samples: usize,
        /// Check every entry; overrides --samples.
        #[arg(long)]
        all: bool,
        /// Mean squared error at or above which an entry mismatches.
        #[arg(long, default_value_t = 400.0)]
        mse_threshold: f64,
        /// Seed for reproducible sample selection.
        #[arg(long)]
        seed: Option<u64>,
        /// Hardware decode mode for re-reading the video.
        #[arg(long, default_value = "auto")]
        hardware: HardwareAccelerationMode,
    },

    /// Print header and index details.
    #[command(about = "Show BIF file details")]
    Info {
        /// BIF file to read.
        bif: PathBuf,
        /// Machine-readable JSON output.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Drives an `indicatif` bar from library progress callbacks.
struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Result<Self, Box<dyn Error>> {
        let bar = ProgressBar::new(0);
        let style =
            ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}")?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Some(total) = info.total {
            self.bar.set_length(total);
        }
        self.bar.set_position(info.current);
        let message = match info.operation {
            OperationType::FrameExtraction => "decoding",
            OperationType::FallbackExtraction => "reading fallback frames",
            OperationType::Validation => "validating",
            _ => "",
        };
        self.bar.set_message(message);
    }
}

fn init_logging(global: &GlobalOptions) {
    let level = if global.verbose {
        "debug"
    } else if global.silent {
        "error"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
    bifgen::set_ffmpeg_log_level(global.log_level);
}

fn warn(message: impl AsRef<str>) {
    eprintln!("{} {}", "warning:".yellow().bold(), message.as_ref().yellow());
}

fn success(message: impl AsRef<str>) {
    println!("{} {}", "success:".green().bold(), message.as_ref().green());
}

fn progress(global: &GlobalOptions) -> Result<Option<Arc<TerminalProgress>>, Box<dyn Error>> {
    if global.silent {
        return Ok(None);
    }
    Ok(Some(Arc::new(TerminalProgress::new()?)))
}

#[cfg(feature = "hardware")]
fn log_hardware_devices(mode: HardwareAccelerationMode) {
    let devices = bifgen::available_hardware_devices();
    log::debug!("Hardware mode {mode}, devices in this FFmpeg build: {devices:?}");
}

#[cfg(not(feature = "hardware"))]
fn log_hardware_devices(mode: HardwareAccelerationMode) {
    log::debug!("Hardware mode {mode} requested, built without the hardware feature");
}

#[allow(clippy::too_many_arguments)]
fn generate(
    global: &GlobalOptions,
    video: &Path,
    interval: u32,
    offset: u32,
    out: Option<PathBuf>,
    sd: bool,
    hardware: HardwareAccelerationMode,
    jobs: Option<usize>,
    preset: Preset,
) -> Result<i32, Box<dyn Error>> {
    if !video.is_file() {
        return Err(BifError::InvalidSource {
            path: video.to_path_buf(),
            reason: "no such file".to_string(),
        }
        .into());
    }

    let resolution = if sd { Resolution::Sd } else { Resolution::Hd };
    let output = out.unwrap_or_else(|| bifgen::default_output_path(video, resolution));

    let mut options = ExtractOptions::new()
        .with_interval(interval)
        .with_offset(offset)
        .with_resolution(resolution)
        .with_hardware_acceleration(hardware)
        .with_preset(preset);
    if let Some(jobs) = jobs {
        options = options.with_jobs(jobs);
    }
    let bar = progress(global)?;
    if let Some(bar) = &bar {
        options = options.with_progress(bar.clone());
    }

    log_hardware_devices(hardware);
    let pipeline = ExtractionPipeline::new(FfmpegBackend, FfmpegTool::default());
    let result = bifgen::generate_bif(&pipeline, video, &output, &options);
    if let Some(bar) = &bar {
        bar.finish();
    }
    let summary = result?;

    if !global.silent {
        if summary.path == ExtractionPath::Fallback {
            warn("decoder could not read the source; used ffmpeg fallback");
        }
        if summary.dropped > 0 {
            warn(format!(
                "{} of {} samples could not be extracted",
                summary.dropped, summary.sampled
            ));
        }
        success(format!(
            "Wrote {} thumbnails ({}x{}) to {}",
            summary.frames,
            summary.frame_size.width,
            summary.frame_size.height,
            summary.output.display()
        ));
    }
    Ok(0)
}

fn preview(global: &GlobalOptions, bif: &Path, out: Option<PathBuf>) -> Result<i32, Box<dyn Error>> {
    let out = out.unwrap_or_else(|| bifgen::default_preview_dir(bif));
    let written = bifgen::export_frames(bif, &out)?;
    if !global.silent {
        success(format!("Exported {} frames to {}", written.len(), out.display()));
    }
    Ok(0)
}

fn validate(
    global: &GlobalOptions,
    bif: &Path,
    video: &Path,
    options: ValidateOptions,
) -> Result<i32, Box<dyn Error>> {
    let bar = progress(global)?;
    let options = match &bar {
        Some(bar) => options.with_progress(bar.clone()),
        None => options,
    };

    let result = Validator::new(FfmpegBackend).validate(bif, video, &options);
    if let Some(bar) = &bar {
        bar.finish();
    }
    let report = result?;

    if !global.silent {
        print!("{report}");
    }
    if report.passed() {
        if !global.silent {
            success(format!("{} matches {}", bif.display(), video.display()));
        }
        Ok(0)
    } else {
        eprintln!(
            "{} {}",
            "failed:".red().bold(),
            format!(
                "{} of {} sampled frames differ from the source",
                report.mismatches(),
                report.checked()
            )
            .red()
        );
        Ok(VALIDATION_FAILED)
    }
}

fn info(bif: &Path, json: bool) -> Result<i32, Box<dyn Error>> {
    let reader = BifReader::open(bif)?;
    let header = reader.header();
    let sizes: Vec<usize> = (0..reader.len())
        .filter_map(|index| reader.image_len(index))
        .collect();

    if json {
        let payload = json!({
            "path": reader.path().display().to_string(),
            "version": header.version,
            "image_count": header.image_count,
            "interval_ms": header.interval_ms,
            "file_size": reader.index().end_offset(),
            "images": sizes
                .iter()
                .enumerate()
                .map(|(index, size)| json!({
                    "index": index,
                    "timestamp_ms": reader.timestamp_ms(index),
                    "size": size,
                }))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("File: {}", reader.path().display());
        println!("Version: {}", header.version);
        println!("Images: {}", header.image_count);
        println!("Interval: {} ms", header.interval_ms);
        println!("File size: {} bytes", reader.index().end_offset());
        for (index, size) in sizes.iter().enumerate() {
            let seconds = reader.timestamp_ms(index) as f64 / 1000.0;
            println!("  [{index:4}] {seconds:>9.1}s  {size} bytes");
        }
    }
    Ok(0)
}

fn run() -> Result<i32, Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(&cli.global);

    match cli.command {
        Commands::Generate {
            video,
            interval,
            offset,
            out,
            sd,
            hardware,
            jobs,
            preset,
        } => generate(
            &cli.global,
            &video,
            interval,
            offset,
            out,
            sd,
            hardware,
            jobs,
            preset,
        ),
        Commands::Preview { bif, out } => preview(&cli.global, &bif, out),
        Commands::Validate {
            bif,
            video,
            samples,
            all,
            mse_threshold,
            seed,
            hardware,
        } => {
            let selection = if all {
                SampleSelection::All
            } else {
                SampleSelection::Random(samples)
            };
            let mut options = ValidateOptions::new()
                .with_selection(selection)
                .with_mse_threshold(mse_threshold)
                .with_hardware_acceleration(hardware);
            if let Some(seed) = seed {
                options = options.with_seed(seed);
            }
            validate(&cli.global, &bif, &video, options)
        }
        Commands::Info { bif, json } => info(&bif, json),
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "bifgen", &mut std::io::stdout());
            Ok(0)
        }
    }
}

fn main() {
    match run() {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(error) => {
            eprintln!("{} {error}", "error:".red().bold());
            let code = error
                .downcast_ref::<BifError>()
                .map_or(1, BifError::exit_code);
            std::process::exit(code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands};
    use bifgen::{HardwareAccelerationMode, Preset};
    use clap::Parser;

    #[test]
    fn generate_defaults_match_the_classic_tool() {
        let cli = Cli::parse_from(["bifgen", "generate", "movie.mkv"]);
        match cli.command {
            Commands::Generate {
                interval,
                offset,
                out,
                sd,
                hardware,
                jobs,
                preset,
                ..
            } => {
                assert_eq!(interval, 10);
                assert_eq!(offset, 0);
                assert!(out.is_none());
                assert!(!sd);
                assert_eq!(hardware, HardwareAccelerationMode::Auto);
                assert!(jobs.is_none());
                assert_eq!(preset, Preset::Medium);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn generate_short_flags() {
        let cli = Cli::parse_from([
            "bifgen", "generate", "movie.mkv", "-i", "5", "-O", "30", "-j", "2", "--sd",
            "--preset", "quality", "--hardware", "none", "-o", "out.bif",
        ]);
        match cli.command {
            Commands::Generate {
                interval,
                offset,
                jobs,
                sd,
                preset,
                hardware,
                out,
                ..
            } => {
                assert_eq!(interval, 5);
                assert_eq!(offset, 30);
                assert_eq!(jobs, Some(2));
                assert!(sd);
                assert_eq!(preset, Preset::Quality);
                assert_eq!(hardware, HardwareAccelerationMode::Software);
                assert_eq!(out.unwrap().to_str(), Some("out.bif"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn validate_defaults() {
        let cli = Cli::parse_from(["bifgen", "validate", "a.bif", "a.mkv"]);
        match cli.command {
            Commands::Validate {
                samples,
                all,
                mse_threshold,
                seed,
                ..
            } => {
                assert_eq!(samples, 5);
                assert!(!all);
                assert_eq!(mse_threshold, 400.0);
                assert!(seed.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn all_overrides_sample_count() {
        let cli = Cli::parse_from(["bifgen", "validate", "a.bif", "a.mkv", "-n", "3", "--all"]);
        match cli.command {
            Commands::Validate { samples, all, .. } => {
                assert_eq!(samples, 3);
                assert!(all);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn silent_is_global() {
        let cli = Cli::parse_from(["bifgen", "info", "a.bif", "--silent"]);
        assert!(cli.global.silent);
    }

    #[test]
    fn unknown_preset_is_rejected() {
        assert!(Cli::try_parse_from(["bifgen", "generate", "a.mkv", "--preset", "turbo"]).is_err());
    }
}
