use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use gripmap_core::{SensorLayout, REFERENCE_SCALE_G_PER_COUNT};
use gripmap_touch::{
    records, session, CalibrationOptions, CalibrationResult, FrameSource, PipelineConfig,
    ReplaySource, ScaleCalibrator, SessionWriter, Smoothing, SyntheticSource, TouchFrame,
    TouchPipeline, DEFAULT_FORCE_COLUMN,
};

#[derive(Parser)]
#[command(
    name = "gripmap",
    about = "Tactile force calibration and monitoring for dexterous grippers"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fit the gram-per-count scale factor from recorded data
    Calibrate(CalibrateArgs),
    /// Stream frames and print per-region load tables
    Monitor(MonitorArgs),
    /// Record a frame stream into a session directory
    Record(RecordArgs),
}

#[derive(Args)]
struct CalibrateArgs {
    /// CSV of reference-force samples, one row per frame
    #[arg(long)]
    force: Option<PathBuf>,

    /// CSV of flattened touch counts, row-aligned with --force
    #[arg(long)]
    touch: Option<PathBuf>,

    /// Recorded session directory carrying a force log
    #[arg(long)]
    session: Option<PathBuf>,

    /// Column of the force CSV holding the reference grams
    #[arg(long, default_value_t = DEFAULT_FORCE_COLUMN)]
    force_column: usize,

    /// Fraction of the lowest-force frames used as the zero-load window
    #[arg(long, default_value_t = 0.2)]
    baseline_fraction: f64,

    /// Counts a delta must exceed to enter the fit
    #[arg(long, default_value_t = 0.0)]
    dead_zone: f64,

    /// Also save the result as JSON
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args)]
struct MonitorArgs {
    /// Replay a recorded session directory
    #[arg(long)]
    session: Option<PathBuf>,

    /// Generate synthetic frames instead of replaying
    #[arg(long)]
    synthetic: bool,

    /// Stop after this many frames
    #[arg(long)]
    frames: Option<u64>,

    /// Calibration JSON written by `gripmap calibrate --out`
    #[arg(long)]
    calibration: Option<PathBuf>,

    /// Gram-per-count scale, overriding the bench reference value
    #[arg(long)]
    scale: Option<f64>,

    /// Exponential smoothing factor; omit to disable smoothing
    #[arg(long)]
    alpha: Option<f64>,

    /// Delay between frames, milliseconds
    #[arg(long, default_value_t = 50)]
    interval_ms: u64,

    /// Print every Nth region table
    #[arg(long, default_value_t = 1)]
    every: u64,

    /// Mirror the raw stream into a session directory under this path
    #[arg(long)]
    log: Option<PathBuf>,
}

#[derive(Args)]
struct RecordArgs {
    /// Generate synthetic frames (live capture arrives over a frame channel)
    #[arg(long)]
    synthetic: bool,

    /// Stop after this many frames
    #[arg(long, default_value_t = 600)]
    frames: u64,

    /// Base directory for the session folder
    #[arg(long, default_value = "data")]
    out: PathBuf,

    /// Delay between frames, milliseconds
    #[arg(long, default_value_t = 50)]
    interval_ms: u64,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Calibrate(args) => run_calibrate(args),
        Command::Monitor(args) => run_monitor(args),
        Command::Record(args) => run_record(args),
    }
}

fn run_calibrate(args: CalibrateArgs) -> Result<()> {
    let options = CalibrationOptions::new()
        .with_baseline_fraction(args.baseline_fraction)
        .with_dead_zone(args.dead_zone);
    let calibrator = ScaleCalibrator::new(options);

    let result = match (&args.session, &args.force, &args.touch) {
        (Some(dir), None, None) => calibrate_session(&calibrator, dir)?,
        (None, Some(force), Some(touch)) => {
            calibrate_tables(&calibrator, force, touch, args.force_column)?
        }
        _ => bail!("pass either --session <DIR>, or both --force <CSV> and --touch <CSV>"),
    };

    println!("{result}");
    if let Some(out) = &args.out {
        result
            .save(out)
            .with_context(|| format!("writing {}", out.display()))?;
        info!("calibration saved to {}", out.display());
    }
    Ok(())
}

fn calibrate_tables(
    calibrator: &ScaleCalibrator,
    force: &Path,
    touch: &Path,
    force_column: usize,
) -> Result<CalibrationResult> {
    let force_table = records::load_numeric_table(force)
        .with_context(|| format!("loading {}", force.display()))?;
    let reference = records::force_column(&force_table, force_column)?;
    let touch_table = records::load_numeric_table(touch)
        .with_context(|| format!("loading {}", touch.display()))?;
    Ok(calibrator.fit_table(&reference, &touch_table)?)
}

fn calibrate_session(calibrator: &ScaleCalibrator, dir: &Path) -> Result<CalibrationResult> {
    let mut frames = Vec::new();
    let mut reference = Vec::new();
    for frame in session::read_session(dir)? {
        if let Some(force_g) = frame.force_g {
            reference.push(force_g);
            frames.push(frame);
        }
    }
    if frames.is_empty() {
        bail!("session {} has no force log to calibrate against", dir.display());
    }

    let layout = SensorLayout::standard();
    let baseline = calibrator
        .options
        .estimator()
        .estimate(&frames, Some(&reference), &layout)?;
    Ok(calibrator.fit(&reference, &frames, &baseline)?)
}

fn run_monitor(args: MonitorArgs) -> Result<()> {
    let layout = SensorLayout::standard();
    let interval = Duration::from_millis(args.interval_ms);

    let mut source: Box<dyn FrameSource> = match (&args.session, args.synthetic) {
        (Some(dir), false) => Box::new(
            ReplaySource::from_dir(dir)
                .with_context(|| format!("replaying {}", dir.display()))?
                .with_interval(interval),
        ),
        (None, true) => Box::new(SyntheticSource::new(layout.clone()).with_interval(interval)),
        _ => bail!("pass exactly one of --session <DIR> or --synthetic"),
    };

    let scale = match (&args.calibration, args.scale) {
        (Some(path), _) => {
            let calibration = CalibrationResult::load(path)
                .with_context(|| format!("loading {}", path.display()))?;
            info!(
                "calibrated scale {:.8} g/count ({} samples)",
                calibration.scale_g_per_count, calibration.samples
            );
            calibration.scale_g_per_count
        }
        (None, Some(scale)) => scale,
        (None, None) => REFERENCE_SCALE_G_PER_COUNT,
    };
    let smoothing = match args.alpha {
        Some(alpha) => Smoothing::exponential(alpha),
        None => Smoothing::Disabled,
    };
    let mut pipeline = TouchPipeline::new(
        layout.clone(),
        PipelineConfig {
            scale_g_per_count: scale,
            smoothing,
        },
    );

    let mut writer = match &args.log {
        Some(base) => Some(SessionWriter::create(base, &layout)?),
        None => None,
    };
    if let Some(writer) = &writer {
        info!("mirroring frames to {}", writer.dir().display());
    }

    let running = interrupt_flag()?;
    let every = args.every.max(1);

    let processed = pump_frames(&running, source.as_mut(), |n, frame| {
        if let Some(writer) = &mut writer {
            writer.write(&frame)?;
        }
        let report = pipeline.process(&frame);
        if n % every == 0 {
            println!("{}", report.summary.render_table(scale));
        }
        Ok(args.frames.map_or(true, |limit| n < limit))
    })?;

    if let Some(writer) = writer {
        let dir = writer.finish()?;
        info!("session written to {}", dir.display());
    }
    info!("processed {} frames", processed);
    Ok(())
}

fn run_record(args: RecordArgs) -> Result<()> {
    if !args.synthetic {
        bail!("only --synthetic recording is built in; live frames arrive over a frame channel");
    }

    let layout = SensorLayout::standard();
    let mut source = SyntheticSource::new(layout.clone())
        .with_limit(args.frames)
        .with_interval(Duration::from_millis(args.interval_ms));

    let mut writer = SessionWriter::create(&args.out, &layout)?;
    info!("recording to {}", writer.dir().display());

    let running = interrupt_flag()?;
    pump_frames(&running, &mut source, |_, frame| {
        writer.write(&frame)?;
        Ok(true)
    })?;

    let frames = writer.frames_written();
    let dir = writer.finish()?;
    println!("recorded {frames} frames to {}", dir.display());
    Ok(())
}

/// Pull frames until the stream ends, `running` clears, or `step` asks
/// to stop. Returns how many frames reached `step`.
///
/// The flag is checked before each read, so a tripped interrupt exits
/// at the next frame boundary with every accepted frame fully handled;
/// callers finish their writers afterwards.
fn pump_frames(
    running: &AtomicBool,
    source: &mut dyn FrameSource,
    mut step: impl FnMut(u64, TouchFrame) -> Result<bool>,
) -> Result<u64> {
    let mut processed = 0;
    while running.load(Ordering::Relaxed) {
        let Some(frame) = source.read()? else { break };
        processed += 1;
        if !step(processed, frame)? {
            break;
        }
    }
    Ok(processed)
}

fn interrupt_flag() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || flag.store(false, Ordering::Relaxed))
        .context("installing interrupt handler")?;
    Ok(running)
}
