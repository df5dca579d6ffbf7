use anyhow::{anyhow, Context, Result};
use clap::Parser;
use proxalert::audio::DefaultBackend;
use proxalert::capture::{self, CaptureLoop};
use proxalert::{
    Accelerator, AlertMode, AlertPlayer, AlertSink, AlertWorker, AppConfig, BlockingAlerts,
    ClassNames, DetectionPipeline,
};
use proxalert::{inference, AlertEvaluator};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the YOLO ONNX model
    #[arg(long)]
    model: Option<PathBuf>,

    /// Newline-delimited class list
    #[arg(long)]
    classes: Option<PathBuf>,

    /// Alert sound (raw S16LE or WAV)
    #[arg(long)]
    alert_asset: Option<PathBuf>,

    /// Camera index, video file or image directory
    #[arg(short, long)]
    source: Option<String>,

    /// Use the CUDA execution provider
    #[arg(long)]
    cuda: bool,

    /// Do not open a display window
    #[arg(long)]
    no_display: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::from_toml_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => AppConfig::default(),
    };

    if let Some(model) = &args.model {
        config.model.model_path = model.clone();
    }
    if let Some(classes) = &args.classes {
        config.model.class_names_path = classes.clone();
    }
    if let Some(asset) = &args.alert_asset {
        config.alert.asset_path = asset.clone();
    }
    if let Some(source) = &args.source {
        config.capture.source = source.clone();
    }
    if args.cuda {
        config.model.accelerator = Accelerator::Cuda;
    }
    if args.no_display {
        config.capture.display_enabled = false;
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn build_alert_sink(config: &AppConfig) -> Result<Box<dyn AlertSink>> {
    if !config.alert.asset_path.exists() {
        warn!(
            "Alert asset {} does not exist; alerts will fail until it does",
            config.alert.asset_path.display()
        );
    }

    let player = AlertPlayer::from_config(DefaultBackend::default(), &config.alert);
    let sink: Box<dyn AlertSink> = match config.alert.mode {
        AlertMode::Blocking => Box::new(BlockingAlerts::new(player)),
        AlertMode::Queued => Box::new(
            AlertWorker::spawn(player, config.alert.queue_capacity)
                .context("starting alert worker")?,
        ),
    };
    Ok(sink)
}

fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;

    let class_names = ClassNames::from_file(&config.model.class_names_path)
        .context("loading class names")?;
    info!(
        "Loaded {} class names from {}",
        class_names.len(),
        config.model.class_names_path.display()
    );

    let detector = inference::load_detector(&config.model).context("loading detector")?;
    info!(
        "Detector ready: {} ({})",
        config.model.model_path.display(),
        detector.name()
    );

    let alerts = build_alert_sink(&config)?;
    let pipeline = DetectionPipeline::new(
        detector,
        class_names,
        &config.detection,
        AlertEvaluator::from_config(&config.alert),
        alerts,
    )
    .context("building detection pipeline")?;

    let source = capture::open_source(&config.capture.source)
        .with_context(|| format!("opening video source {}", config.capture.source))?;
    let display = capture::open_display(&config.capture).context("opening display")?;

    let handle = CaptureLoop::new(
        source,
        display,
        pipeline,
        config.capture.fps_report_interval,
    )
    .spawn()
    .context("starting capture thread")?;

    let stats = handle
        .join()
        .map_err(|_| anyhow!("capture thread panicked"))?
        .context("capture loop failed")?;

    info!("Processed {} frames", stats.frames);
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);
    run(args)
}
