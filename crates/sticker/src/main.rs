//! sticker: turn a photo into a die-cut sticker from the command line.
//!
//! Loads an image, removes the background under a seed pixel, optionally
//! bridges nearby fragments, paints a white outline, and writes the PNG.
//! The run goes through the same session and background worker an
//! interactive front end would use. Per-stage diagnostics can be printed
//! for parameter tuning.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin sticker -- [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod export;
mod logger;
mod usage;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use clap::Parser;
use serde_json::json;
use sticker_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use sticker_pipeline::{
    Color, Parameters, PipelineError, Publication, RgbaImage, RunRequest, Seed, Selection, Session,
    StickerRequest,
};
use sticker_worker::{StickerWorker, WorkerError};

/// Turn a photo into a sticker.
///
/// Removes the flat background connected to `--seed`, optionally joins
/// fragments closer than `--merge-gap`, and adds a white outline
/// `--thickness` pixels wide.
#[derive(Parser)]
#[command(name = "sticker", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, WebP).
    image_path: PathBuf,

    /// Background tolerance, percent of the maximum color distance.
    #[arg(long, default_value_t = Parameters::DEFAULT_TOLERANCE, value_parser = clap::value_parser!(u8).range(0..=i64::from(Parameters::MAX_TOLERANCE)))]
    tolerance: u8,

    /// Outline thickness in pixels.
    #[arg(long, default_value_t = Parameters::DEFAULT_THICKNESS_PX, value_parser = clap::value_parser!(u32).range(0..=i64::from(Parameters::MAX_THICKNESS_PX)))]
    thickness: u32,

    /// Largest gap between fragments to bridge, in pixels (0 disables).
    #[arg(long, default_value_t = Parameters::DEFAULT_MERGE_GAP_PX, value_parser = clap::value_parser!(u32).range(0..=i64::from(Parameters::MAX_MERGE_GAP_PX)))]
    merge_gap: u32,

    /// Background pixel as `X,Y` in source coordinates.
    ///
    /// Without a seed the background is kept and the whole image is
    /// outlined.
    #[arg(long, value_parser = parse_seed)]
    seed: Option<Seed>,

    /// Color to remove as `RRGGBB`, instead of the color under the seed.
    #[arg(long, value_parser = parse_color, requires = "seed")]
    color: Option<Color>,

    /// Full request (selection and parameters) as a JSON string.
    ///
    /// When provided, all other processing flags are ignored. The JSON
    /// must be a valid `StickerRequest` serialization.
    #[arg(long)]
    request_json: Option<String>,

    /// Where to write the sticker [default: sticker_<unix millis>.png].
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Print per-stage diagnostics after saving.
    #[arg(long)]
    diagnostics: bool,

    /// Output diagnostics as JSON instead of a human-readable report.
    #[arg(long, requires = "diagnostics")]
    json: bool,

    /// Number of diagnostic runs for averaging.
    #[arg(long, default_value_t = 1, requires = "diagnostics", value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Append a line to this usage log after a successful export.
    #[arg(long)]
    usage_log: Option<PathBuf>,

    /// More log output (repeat for more).
    #[arg(long, short, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Only log errors.
    #[arg(long, short)]
    quiet: bool,
}

/// How the background selection is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SelectionArg {
    /// Keep the background.
    Keep,
    /// Sample the color under the seed.
    Pick(Seed),
    /// Use this selection as given.
    Fixed(Selection),
}

/// Everything that can stop the CLI.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Config(String),

    #[error("error reading {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("pipeline error: {0}")]
    Run(String),

    #[error(transparent)]
    Export(#[from] export::ExportError),

    #[error("error serializing diagnostics: {0}")]
    Json(#[from] serde_json::Error),
}

fn parse_seed(value: &str) -> Result<Seed, String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got {value:?}"))?;
    let coord = |s: &str| {
        s.trim()
            .parse::<u32>()
            .map_err(|e| format!("invalid coordinate {s:?}: {e}"))
    };
    Ok(Seed::new(coord(x)?, coord(y)?))
}

fn parse_color(value: &str) -> Result<Color, String> {
    Color::from_hex(value).ok_or_else(|| format!("expected RRGGBB but got {value:?}"))
}

/// Build the parameters and selection from CLI arguments.
///
/// If `--request-json` is provided, the JSON is parsed directly and all
/// individual processing flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<(Parameters, SelectionArg), String> {
    if let Some(ref json) = cli.request_json {
        let request: StickerRequest = serde_json::from_str(json)
            .map_err(|e| format!("Error parsing --request-json: {e}"))?;
        let choice = request.selection.map_or(SelectionArg::Keep, SelectionArg::Fixed);
        return Ok((request.parameters, choice));
    }

    let parameters = Parameters {
        tolerance: cli.tolerance,
        thickness_px: cli.thickness,
        merge_gap_px: cli.merge_gap,
    };
    let choice = match (cli.seed, cli.color) {
        (Some(seed), Some(color)) => SelectionArg::Fixed(Selection { seed, color }),
        (Some(seed), None) => SelectionArg::Pick(seed),
        (None, Some(_)) => return Err("--color requires --seed".into()),
        (None, None) => SelectionArg::Keep,
    };
    Ok((parameters, choice))
}

/// Load `image_bytes` into `session` and apply the requested settings.
///
/// Returns the run for the final state; intermediate generations are
/// never submitted.
fn prepare(
    session: &mut Session,
    image_bytes: &[u8],
    parameters: Parameters,
    selection: SelectionArg,
) -> Result<RunRequest, CliError> {
    let mut run = session.upload(image_bytes)?;
    let mut apply = |next: Option<RunRequest>| {
        if let Some(next) = next {
            run = next;
        }
    };
    apply(session.set_tolerance(parameters.tolerance));
    apply(session.set_thickness(parameters.thickness_px));
    apply(session.set_merge_gap(parameters.merge_gap_px));

    let outside = |seed: Seed| {
        CliError::Config(format!("seed {},{} is outside the image", seed.x, seed.y))
    };
    match selection {
        SelectionArg::Keep => {}
        SelectionArg::Pick(seed) => match session.pick(seed.x, seed.y) {
            Some(next) => run = next,
            None if within(&run.source, seed) => {
                log::warn!(
                    "seed {},{} is transparent; keeping the background",
                    seed.x,
                    seed.y
                );
            }
            None => return Err(outside(seed)),
        },
        SelectionArg::Fixed(selection) => {
            run = session
                .select(selection)
                .ok_or_else(|| outside(selection.seed))?;
        }
    }
    Ok(run)
}

fn within(image: &RgbaImage, seed: Seed) -> bool {
    seed.x < image.width() && seed.y < image.height()
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let env_level = std::env::var(logger::ENV_VAR).ok();
    if let Err(e) = logger::init(logger::level_from(cli.verbose, cli.quiet, env_level.as_deref())) {
        eprintln!("Warning: logging unavailable: {e}");
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let (parameters, selection) = config_from_cli(cli).map_err(CliError::Config)?;

    let image_bytes = std::fs::read(&cli.image_path).map_err(|source| CliError::Read {
        path: cli.image_path.clone(),
        source,
    })?;
    log::info!(
        "image: {} ({} bytes)",
        cli.image_path.display(),
        image_bytes.len()
    );

    let mut session = Session::new();
    let request = prepare(&mut session, &image_bytes, parameters, selection)?;
    let effective = request.request;
    log::info!("request: {effective:?}");

    let worker = StickerWorker::spawn()?;
    worker.submit(request)?;
    let completion = worker.recv()?;
    match completion.publish_to(&mut session) {
        Publication::Applied => {}
        Publication::Failed(message) => return Err(CliError::Run(message)),
        Publication::Stale => {
            return Err(CliError::Run("run was superseded before it finished".into()));
        }
    }
    let result = session
        .state()
        .result
        .clone()
        .ok_or_else(|| CliError::Run("no sticker was produced".into()))?;

    let now = Utc::now();
    let path = export::destination(cli.output.as_deref(), now);
    export::save(&path, &result.png)?;
    let output = result.output_dimensions();
    eprintln!(
        "Sticker written to {} ({}x{}, {} bytes)",
        path.display(),
        output.width,
        output.height,
        result.png.len(),
    );

    if let Some(ref log_path) = cli.usage_log {
        record_usage(log_path, &effective, &path, output, now);
    }

    if cli.diagnostics {
        print_diagnostics(cli, &image_bytes, &effective)?;
    }
    Ok(())
}

/// Append a `download` entry to the usage log and report the receipt.
fn record_usage(
    log_path: &Path,
    request: &StickerRequest,
    file: &Path,
    output: sticker_pipeline::Dimensions,
    now: DateTime<Utc>,
) {
    let details = json!({
        "file": file.display().to_string(),
        "tolerance": request.parameters.tolerance,
        "thickness": request.parameters.thickness_px,
        "mergeGap": request.parameters.merge_gap_px,
        "width": output.width,
        "height": output.height,
    });
    let receipt = usage::UsageLog::new(log_path).record("download", Some(&details), now);
    match receipt {
        usage::Receipt::Success { message, .. } => eprintln!("{message}"),
        usage::Receipt::Error { message } => eprintln!("Warning: {message}"),
    }
}

fn print_diagnostics(
    cli: &Cli,
    image_bytes: &[u8],
    request: &StickerRequest,
) -> Result<(), CliError> {
    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        let (_, diagnostics) =
            sticker_pipeline::process_with_diagnostics(image_bytes, request, &StdClock)?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&diagnostics)?);
        } else {
            println!("{}", diagnostics.report());
        }
        all_diagnostics.push(diagnostics);
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }
    Ok(())
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
type StageExtractor = fn(&PipelineDiagnostics) -> Option<Duration>;

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
        ("Decode", |d| Some(d.decode.duration)),
        ("Remove Background", |d| Some(d.background_removal.duration)),
        ("Bridge", |d| d.bridging.as_ref().map(|s| s.duration)),
        ("Outline", |d| Some(d.outline.duration)),
        ("Encode", |d| Some(d.encode.duration)),
    ];

    for (name, extractor) in stage_extractors {
        let stage_durations: Vec<f64> = all_diagnostics
            .iter()
            .filter_map(extractor)
            .map(|dur| dur.as_secs_f64() * 1000.0)
            .collect();

        if stage_durations.is_empty() {
            continue;
        }

        let stage_mean = stage_durations.iter().sum::<f64>() / stage_durations.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgba;
    use sticker_pipeline::codec;

    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["sticker", "in.png"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    fn white_png() -> Vec<u8> {
        let img = RgbaImage::from_fn(10, 10, |x, y| {
            if (3..7).contains(&x) && (3..7).contains(&y) {
                Rgba([10, 120, 200, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        codec::encode_png(&img).unwrap()
    }

    #[test]
    fn defaults_match_pipeline_defaults() {
        let (parameters, choice) = config_from_cli(&cli(&[])).unwrap();
        assert_eq!(parameters, Parameters::default());
        assert_eq!(choice, SelectionArg::Keep);
    }

    #[test]
    fn seed_and_color_flags() {
        let (_, choice) = config_from_cli(&cli(&["--seed", "3, 4"])).unwrap();
        assert_eq!(choice, SelectionArg::Pick(Seed::new(3, 4)));

        let (_, choice) = config_from_cli(&cli(&["--seed", "0,0", "--color", "#ff0000"])).unwrap();
        assert_eq!(
            choice,
            SelectionArg::Fixed(Selection {
                seed: Seed::new(0, 0),
                color: Color::new(255, 0, 0),
            })
        );
    }

    #[test]
    fn color_without_seed_is_rejected_by_parser() {
        assert!(Cli::try_parse_from(["sticker", "in.png", "--color", "ffffff"]).is_err());
    }

    #[test]
    fn out_of_range_flags_are_rejected() {
        assert!(Cli::try_parse_from(["sticker", "in.png", "--tolerance", "101"]).is_err());
        assert!(Cli::try_parse_from(["sticker", "in.png", "--thickness", "51"]).is_err());
        assert!(Cli::try_parse_from(["sticker", "in.png", "--merge-gap", "151"]).is_err());
        assert!(Cli::try_parse_from(["sticker", "in.png", "--seed", "1"]).is_err());
    }

    #[test]
    fn request_json_overrides_flags() {
        let json = r#"{"selection":{"seed":{"x":1,"y":2},"color":{"r":0,"g":0,"b":0}},"parameters":{"thickness_px":4}}"#;
        let (parameters, choice) =
            config_from_cli(&cli(&["--thickness", "9", "--request-json", json])).unwrap();
        assert_eq!(parameters.thickness_px, 4);
        assert_eq!(parameters.tolerance, Parameters::DEFAULT_TOLERANCE);
        assert_eq!(
            choice,
            SelectionArg::Fixed(Selection {
                seed: Seed::new(1, 2),
                color: Color::BLACK,
            })
        );
    }

    #[test]
    fn invalid_request_json_is_reported() {
        let err = config_from_cli(&cli(&["--request-json", "{"])).unwrap_err();
        assert!(err.starts_with("Error parsing --request-json"));
    }

    #[test]
    fn prepare_applies_settings_in_one_latest_run() {
        let mut session = Session::new();
        let parameters = Parameters {
            tolerance: 20,
            thickness_px: 3,
            merge_gap_px: 2,
        };
        let run = prepare(
            &mut session,
            &white_png(),
            parameters,
            SelectionArg::Pick(Seed::new(0, 0)),
        )
        .unwrap();
        assert_eq!(run.generation, session.generation());
        assert_eq!(run.request.parameters, parameters);
        assert_eq!(run.request.selection.unwrap().color, Color::WHITE);
    }

    #[test]
    fn prepare_rejects_seed_outside_image() {
        let mut session = Session::new();
        let result = prepare(
            &mut session,
            &white_png(),
            Parameters::default(),
            SelectionArg::Pick(Seed::new(50, 0)),
        );
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn prepare_ignores_transparent_seed() {
        let mut img = RgbaImage::from_pixel(6, 6, Rgba([255, 255, 255, 255]));
        img.put_pixel(2, 2, Rgba([0, 0, 0, 0]));
        let png = codec::encode_png(&img).unwrap();

        let mut session = Session::new();
        let run = prepare(
            &mut session,
            &png,
            Parameters::default(),
            SelectionArg::Pick(Seed::new(2, 2)),
        )
        .unwrap();
        assert_eq!(run.generation, session.generation());
        assert!(run.request.selection.is_none());
        assert!(session.state().selection.is_none());
    }
}
