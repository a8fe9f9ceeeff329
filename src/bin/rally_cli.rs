use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rally_detector::engine::{DetectionStage, RallyDetectionResult};
use rally_detector::evaluation::AccuracyReport;
use rally_detector::media::{
    AudioSampleProvider, MediaSource, PoseTrack, SyntheticMatch, WavAudioProvider,
};
use rally_detector::{
    AccuracyEvaluator, CancellationToken, DetectionOutcome, GroundTruthParser, MediaError,
    RallyDetectionEngine, ThresholdConfig,
};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

const EXIT_THRESHOLD_NOT_MET: u8 = 2;
const EXIT_CANCELLED: u8 = 3;

#[derive(Parser, Debug)]
#[command(
    name = "rally_cli",
    about = "Tennis rally detection, simulation and accuracy evaluation"
)]
struct Cli {
    /// Threshold configuration JSON (defaults when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log pipeline progress at debug level on stderr
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Detect rallies from an extracted audio track and a pose track
    Detect {
        /// Pose track JSON produced by an external pose estimator
        #[arg(long)]
        poses: PathBuf,
        /// Audio track as WAV; omit for movement-only detection
        #[arg(long)]
        audio: Option<PathBuf>,
        /// Identifier recorded in the result (defaults to the pose file stem)
        #[arg(long)]
        video_id: Option<String>,
        #[arg(long)]
        output: Option<PathBuf>,
        /// Print the diagnostic report and score breakdowns to stderr
        #[arg(long)]
        report: bool,
        /// Cancel the run after this many seconds
        #[arg(long)]
        max_seconds: Option<f64>,
    },
    /// Render a synthetic match and run detection on it
    Simulate {
        #[arg(long, default_value_t = 7)]
        seed: u64,
        #[arg(long, default_value_t = 6)]
        rallies: usize,
        /// Drop the audio track
        #[arg(long)]
        no_audio: bool,
        /// Write audio.wav, poses.json and ground_truth.json here
        #[arg(long)]
        export_dir: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        report: bool,
    },
    /// Compare a detection result against annotated ground truth
    Evaluate {
        /// Result JSON written by `detect` or `simulate`
        #[arg(long)]
        detections: PathBuf,
        #[arg(long)]
        ground_truth: PathBuf,
        #[arg(long, default_value_t = 1.0)]
        tolerance: f64,
        /// Exit with status 2 when accuracy (recall) falls below this
        #[arg(long)]
        min_accuracy: Option<f64>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Check an annotation file and list every problem found
    ValidateAnnotations { file: PathBuf },
    /// Inspect threshold configurations
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print (or write) the default configuration
    Defaults {
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Load and validate a configuration file
    Validate { file: PathBuf },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Detect {
            poses,
            audio,
            video_id,
            output,
            report,
            max_seconds,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let source = load_media(&poses, audio.as_deref(), video_id)?;
            run_detection(config, source, output, report, max_seconds)
        }
        Commands::Simulate {
            seed,
            rallies,
            no_audio,
            export_dir,
            output,
            report,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let session = SyntheticMatch::generate(seed, rallies);
            if let Some(dir) = export_dir {
                export_session(&session, &dir, config.video_analysis_fps)?;
            }
            run_detection(config, session.media_source(!no_audio), output, report, None)
        }
        Commands::Evaluate {
            detections,
            ground_truth,
            tolerance,
            min_accuracy,
            output,
        } => run_evaluate(&detections, &ground_truth, tolerance, min_accuracy, output),
        Commands::ValidateAnnotations { file } => run_validate_annotations(&file),
        Commands::Config { action } => run_config(action),
    }
}

fn load_config(path: Option<&Path>) -> Result<ThresholdConfig> {
    match path {
        Some(path) => ThresholdConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(ThresholdConfig::default()),
    }
}

fn load_media(poses: &Path, audio: Option<&Path>, video_id: Option<String>) -> Result<MediaSource> {
    let track = Arc::new(
        PoseTrack::load(poses).with_context(|| format!("loading poses {}", poses.display()))?,
    );
    let audio = match audio.map(|path| (path, WavAudioProvider::open(path))) {
        Some((_, Ok(provider))) => Some(Arc::new(provider) as Arc<dyn AudioSampleProvider>),
        Some((path, Err(MediaError::AudioTrackMissing))) => {
            tracing::warn!(
                "[rally_cli] {} carries no audio, detecting from movement only",
                path.display()
            );
            None
        }
        Some((path, Err(err))) => {
            return Err(err).with_context(|| format!("loading audio {}", path.display()))
        }
        None => None,
    };
    let video_id = video_id.unwrap_or_else(|| {
        poses
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string())
    });

    Ok(MediaSource {
        video_id,
        audio,
        video: track.clone(),
        pose: track,
    })
}

fn run_detection(
    config: ThresholdConfig,
    source: MediaSource,
    output: Option<PathBuf>,
    report: bool,
    max_seconds: Option<f64>,
) -> Result<ExitCode> {
    let engine = RallyDetectionEngine::new(config, source).context("building engine")?;
    let cancel = CancellationToken::new();

    if let Some(limit) = max_seconds {
        let deadline = cancel.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_secs_f64(limit.max(0.0)));
            deadline.cancel();
        });
    }

    let mut progress = engine.subscribe_progress();
    std::thread::spawn(move || loop {
        match progress.blocking_recv() {
            Ok(update) => {
                tracing::debug!(
                    "[rally_cli] {:?} {:.0}%",
                    update.stage,
                    update.fraction() * 100.0
                );
                if matches!(
                    update.stage,
                    DetectionStage::Completed | DetectionStage::Cancelled
                ) {
                    break;
                }
            }
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        }
    });

    let result = match engine.detect(&cancel).context("running detection")? {
        DetectionOutcome::Completed(result) => result,
        DetectionOutcome::Cancelled => {
            eprintln!("Detection cancelled");
            return Ok(ExitCode::from(EXIT_CANCELLED));
        }
    };

    if report {
        eprintln!("{}", engine.diagnostic_report(&result).render());
        for breakdown in engine.score_breakdowns(&result) {
            eprintln!("{}", breakdown.render());
        }
    }
    emit_json(&result, output)?;
    Ok(ExitCode::from(0))
}

fn export_session(session: &SyntheticMatch, dir: &Path, fps: f64) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let audio_path = dir.join("audio.wav");
    session
        .audio_provider()
        .write_wav(&audio_path)
        .with_context(|| format!("writing {}", audio_path.display()))?;

    let poses_path = dir.join("poses.json");
    let poses = serde_json::to_string(&session.pose_track(fps))?;
    fs::write(&poses_path, poses).with_context(|| format!("writing {}", poses_path.display()))?;

    let truth_path = dir.join("ground_truth.json");
    let mut truth = session.ground_truth();
    truth.video = "audio.wav".to_string();
    fs::write(&truth_path, serde_json::to_string_pretty(&truth)?)
        .with_context(|| format!("writing {}", truth_path.display()))?;

    tracing::info!("[rally_cli] Exported synthetic session to {}", dir.display());
    Ok(())
}

fn run_evaluate(
    detections: &Path,
    ground_truth: &Path,
    tolerance: f64,
    min_accuracy: Option<f64>,
    output: Option<PathBuf>,
) -> Result<ExitCode> {
    let contents = fs::read_to_string(detections)
        .with_context(|| format!("reading {}", detections.display()))?;
    let result: RallyDetectionResult = serde_json::from_str(&contents)
        .with_context(|| format!("parsing {}", detections.display()))?;
    let truth = GroundTruthParser::parse_file(ground_truth)?;

    let issues = truth.validate();
    for issue in &issues {
        tracing::warn!("[rally_cli] {}: {}", ground_truth.display(), issue);
    }

    let report = AccuracyEvaluator::new(tolerance).evaluate(&result.rallies, &truth.rallies);
    eprintln!("{}", report.render());
    emit_json(&EvaluationPayload::new(&report), output)?;

    match min_accuracy {
        Some(threshold) if report.metrics.accuracy() < threshold => {
            eprintln!(
                "Accuracy {:.3} is below the required {:.3}",
                report.metrics.accuracy(),
                threshold
            );
            Ok(ExitCode::from(EXIT_THRESHOLD_NOT_MET))
        }
        _ => Ok(ExitCode::from(0)),
    }
}

fn run_validate_annotations(file: &Path) -> Result<ExitCode> {
    let truth = GroundTruthParser::parse_file(file)?;
    let issues = truth.validate();
    if issues.is_empty() {
        println!(
            "{}: {} rallies, no problems found",
            file.display(),
            truth.rallies.len()
        );
        return Ok(ExitCode::from(0));
    }

    println!("{}: {} problem(s)", file.display(), issues.len());
    for issue in &issues {
        println!("  {issue}");
    }
    Ok(ExitCode::from(EXIT_THRESHOLD_NOT_MET))
}

fn run_config(action: ConfigAction) -> Result<ExitCode> {
    match action {
        ConfigAction::Defaults { output } => {
            let config = ThresholdConfig::default();
            match output {
                Some(path) => config
                    .save_to_file(&path)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => println!("{}", config.to_json()?),
            }
            Ok(ExitCode::from(0))
        }
        ConfigAction::Validate { file } => {
            let config = ThresholdConfig::load_from_file(&file)
                .with_context(|| format!("validating {}", file.display()))?;
            println!(
                "{}: valid (fusion weights {:.3}, scoring weights {:.3})",
                file.display(),
                config.fusion_weight_sum(),
                config.scoring_weight_sum()
            );
            Ok(ExitCode::from(0))
        }
    }
}

fn emit_json<T: Serialize>(value: &T, output: Option<PathBuf>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?
        }
        None => println!("{json}"),
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EvaluationPayload<'a> {
    precision: f64,
    recall: f64,
    f1_score: f64,
    accuracy: f64,
    #[serde(flatten)]
    report: &'a AccuracyReport,
}

impl<'a> EvaluationPayload<'a> {
    fn new(report: &'a AccuracyReport) -> Self {
        Self {
            precision: report.metrics.precision(),
            recall: report.metrics.recall(),
            f1_score: report.metrics.f1_score(),
            accuracy: report.metrics.accuracy(),
            report,
        }
    }
}
