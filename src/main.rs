use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use action_primitives::{
    decode, describe_tree, InputSurface, RecordingInputSurface, DEFAULT_VISIT_BUDGET,
};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use frame_source::DirectoryReplaySurface;
use inference_engine::{ArtifactStatus, DenseRuntime, ModelRuntime, StatusKind};
use screenpilot_cli::{load_config, model_provider, Agent, AgentConfig};
use screenpilot_event_bus::to_mpsc;
use serde::Serialize;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// ScreenPilot - on-device perceive, decide, act automation loop
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable debug mode
    #[arg(short, long)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Output format
    #[arg(short, long, default_value = "human")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum OutputFormat {
    Human,
    Json,
    Yaml,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the control loop against a directory of screen images
    Run(RunArgs),

    /// Decode a score vector into an action
    Decode(DecodeArgs),

    /// Inspect or remove the model artifact
    Model(ModelArgs),

    /// Render a node tree snapshot and find its focused editable node
    Tree(TreeArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Show build and configuration information
    Info,
}

#[derive(Args)]
struct RunArgs {
    /// Directory of images replayed as the screen
    #[arg(long, value_name = "DIR")]
    frames: Option<PathBuf>,

    /// JSON node tree for the recording input surface
    #[arg(long, value_name = "FILE")]
    tree: Option<PathBuf>,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    duration: Option<u64>,

    /// Override the tick period
    #[arg(long)]
    period_ms: Option<u64>,

    /// Override the model directory
    #[arg(long, value_name = "DIR")]
    model_dir: Option<PathBuf>,

    /// Save debug PNG copies of captured frames here
    #[arg(long, value_name = "DIR")]
    debug_dir: Option<PathBuf>,
}

#[derive(Args)]
struct DecodeArgs {
    /// Scores, in class order
    #[arg(allow_negative_numbers = true, num_args = 0..)]
    scores: Vec<f32>,

    /// Scores as a JSON array instead
    #[arg(long, conflicts_with = "scores")]
    json: Option<String>,
}

#[derive(Args)]
struct ModelArgs {
    #[command(subcommand)]
    action: ModelAction,
}

#[derive(Subcommand)]
enum ModelAction {
    /// Check the artifact exists, is large enough and matches its checksum
    Verify,

    /// Show artifact location, size and shape
    Info,

    /// Delete the artifact
    Delete {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args)]
struct TreeArgs {
    /// JSON node tree snapshot
    file: PathBuf,
}

#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,

    /// Print the default configuration file location
    Path,
}

#[derive(Serialize)]
struct RunSummary {
    ticks_started: u64,
    ticks_completed: u64,
    skipped_in_flight: u64,
    skipped_no_frame: u64,
    transform_failures: u64,
    inference_failures: u64,
    actions_ok: u64,
    actions_failed: u64,
    frames_published: u64,
    frames_overwritten: u64,
    strokes: usize,
    text_edits: usize,
}

#[derive(Serialize)]
struct ModelReport {
    path: PathBuf,
    size_bytes: Option<u64>,
    min_size_bytes: u64,
    expected_sha256: Option<String>,
    ready: bool,
    detail: String,
    input_side: Option<u32>,
    input_channels: Option<usize>,
    outputs: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    init_logging(&cli.log_level, cli.debug, cli.log_json)?;

    info!("Starting ScreenPilot v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(cli.config.as_deref())
        .await
        .context("Failed to load configuration")?;

    let result = match cli.command {
        Commands::Run(args) => cmd_run(args, config, cli.output).await,
        Commands::Decode(args) => cmd_decode(args, &config, cli.output),
        Commands::Model(args) => cmd_model(args, &config, cli.output).await,
        Commands::Tree(args) => cmd_tree(args).await,
        Commands::Config(args) => cmd_config(args, &config, cli.output),
        Commands::Info => cmd_info(&config),
    };

    match result {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn init_logging(level: &str, debug: bool, json: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string()));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    Ok(())
}

fn emit<T: Serialize>(format: OutputFormat, value: &T, human: impl FnOnce(&T)) -> Result<()> {
    match format {
        OutputFormat::Human => human(value),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

async fn cmd_run(args: RunArgs, mut config: AgentConfig, output: OutputFormat) -> Result<()> {
    if let Some(period_ms) = args.period_ms {
        config.period_ms = period_ms;
    }
    if let Some(dir) = args.model_dir {
        config.model.dir = dir;
    }
    if let Some(dir) = args.debug_dir {
        config.capture.debug_dir = Some(dir);
    }
    if let Some(dir) = args.frames {
        config.capture.replay_dir = Some(dir);
    }
    config.validate()?;

    let frames = config
        .capture
        .replay_dir
        .clone()
        .context("No frame source: pass --frames or set capture.replay_dir")?;
    let capture = Arc::new(
        DirectoryReplaySurface::open(
            &frames,
            Duration::from_millis(config.capture.frame_interval_ms),
            config.capture.looping,
        )
        .context("Failed to open frame directory")?,
    );

    let input = Arc::new(match &args.tree {
        Some(path) => {
            let json = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            RecordingInputSurface::from_json(&json).context("Failed to parse node tree")?
        }
        None => RecordingInputSurface::new(),
    });

    let agent = Agent::new(config, capture, input.clone())?;
    let mut status = to_mpsc(agent.engine().status_bus(), agent.config().status_capacity);
    let status_log = tokio::spawn(async move {
        while let Some(event) = status.recv().await {
            match event.kind {
                StatusKind::Error => warn!(kind = %event.kind, "{}", event.message),
                _ => info!(kind = %event.kind, "{}", event.message),
            }
        }
    });

    if let Err(err) = agent.start().await {
        status_log.abort();
        return Err(err).context("Failed to start agent");
    }

    match args.duration {
        Some(secs) => {
            tokio::select! {
                _ = signal::ctrl_c() => info!("Interrupted"),
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
            }
        }
        None => {
            signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
            info!("Interrupted");
        }
    }

    agent.shutdown().await;
    status_log.abort();

    let metrics = agent.engine().metrics();
    let slot = agent.slot().stats();
    let summary = RunSummary {
        ticks_started: metrics.ticks_started,
        ticks_completed: metrics.ticks_completed,
        skipped_in_flight: metrics.skipped_in_flight,
        skipped_no_frame: metrics.skipped_no_frame,
        transform_failures: metrics.transform_failures,
        inference_failures: metrics.inference_failures,
        actions_ok: metrics.actions_ok,
        actions_failed: metrics.actions_failed,
        frames_published: slot.published,
        frames_overwritten: slot.overwritten,
        strokes: input.strokes().len(),
        text_edits: input.text_edits().len(),
    };
    emit(output, &summary, |s| {
        println!("Run summary");
        println!("===========");
        println!(
            "Ticks: {} completed / {} started",
            s.ticks_completed, s.ticks_started
        );
        println!(
            "Skipped: {} in flight, {} without frame",
            s.skipped_in_flight, s.skipped_no_frame
        );
        println!(
            "Failures: {} transform, {} inference",
            s.transform_failures, s.inference_failures
        );
        println!("Actions: {} ok, {} failed", s.actions_ok, s.actions_failed);
        println!(
            "Frames: {} published, {} overwritten",
            s.frames_published, s.frames_overwritten
        );
        println!("Dispatched: {} strokes, {} text edits", s.strokes, s.text_edits);
    })
}

fn cmd_decode(args: DecodeArgs, config: &AgentConfig, output: OutputFormat) -> Result<()> {
    let scores: Vec<f32> = match args.json {
        Some(json) => serde_json::from_str(&json).context("Scores must be a JSON array of numbers")?,
        None => args.scores,
    };
    let action = decode(&scores, &config.decoder);
    emit(output, &action, |action| {
        println!("{} (confidence {})", action.kind(), action.confidence());
        println!("{:?}", action);
    })
}

async fn cmd_model(args: ModelArgs, config: &AgentConfig, output: OutputFormat) -> Result<()> {
    let provider = model_provider(config);
    let path = provider.artifact_path();

    match args.action {
        ModelAction::Verify => {
            let status = tokio::task::spawn_blocking(move || provider.check())
                .await?
                .with_context(|| format!("Failed to inspect {}", path.display()))?;
            match status {
                ArtifactStatus::Ready { size, sha256 } => {
                    println!("Model ready: {} ({} bytes)", path.display(), size);
                    match sha256 {
                        Some(digest) => println!("SHA-256 verified: {}", digest),
                        None => println!("SHA-256 not configured; integrity not verified"),
                    }
                    Ok(())
                }
                ArtifactStatus::Missing => bail!("Model artifact missing: {}", path.display()),
                ArtifactStatus::TooSmall { size, required } => bail!(
                    "Model artifact too small: {} bytes, need at least {}",
                    size,
                    required
                ),
                ArtifactStatus::ChecksumMismatch { expected, actual } => bail!(
                    "Model checksum mismatch: expected {}, found {}",
                    expected,
                    actual
                ),
            }
        }
        ModelAction::Info => {
            let runtime = DenseRuntime::new(config.tensor.mean, config.tensor.std);
            let report = tokio::task::spawn_blocking({
                let config = config.clone();
                move || model_report(&provider, &runtime, &config)
            })
            .await?;
            emit(output, &report, |r| {
                println!("Model artifact: {}", r.path.display());
                match r.size_bytes {
                    Some(size) => println!("- Size: {} bytes", size),
                    None => println!("- Size: (missing)"),
                }
                println!("- Minimum size: {} bytes", r.min_size_bytes);
                println!(
                    "- Expected SHA-256: {}",
                    r.expected_sha256.as_deref().unwrap_or("(not configured)")
                );
                println!("- Ready: {} ({})", r.ready, r.detail);
                if let (Some(side), Some(channels), Some(outputs)) =
                    (r.input_side, r.input_channels, r.outputs)
                {
                    println!("- Input: {side}x{side}x{channels}, outputs: {outputs}");
                }
            })
        }
        ModelAction::Delete { yes } => {
            if !yes {
                bail!("Refusing to delete {} without --yes", path.display());
            }
            if provider
                .delete_artifact()
                .with_context(|| format!("Failed to delete {}", path.display()))?
            {
                println!("Deleted {}", path.display());
            } else {
                println!("Nothing to delete at {}", path.display());
            }
            Ok(())
        }
    }
}

fn model_report(
    provider: &inference_engine::FileModelProvider,
    runtime: &DenseRuntime,
    config: &AgentConfig,
) -> ModelReport {
    let path = provider.artifact_path();
    let (ready, detail) = match provider.check() {
        Ok(status) => (status.is_ready(), format!("{:?}", status)),
        Err(err) => (false, err.to_string()),
    };
    let shape = if ready {
        match runtime.load(&path) {
            Ok(model) => {
                let spec = model.input_spec();
                Some((spec.side, spec.channels, model.output_len()))
            }
            Err(err) => {
                warn!(error = %err, "Model present but not loadable");
                None
            }
        }
    } else {
        None
    };

    ModelReport {
        size_bytes: provider.artifact_size(),
        path,
        min_size_bytes: config.model.min_size_bytes,
        expected_sha256: config.model.sha256.clone(),
        ready,
        detail,
        input_side: shape.map(|s| s.0),
        input_channels: shape.map(|s| s.1),
        outputs: shape.map(|s| s.2),
    }
}

async fn cmd_tree(args: TreeArgs) -> Result<()> {
    let json = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let surface = RecordingInputSurface::from_json(&json).context("Failed to parse node tree")?;

    let outline = describe_tree(&surface, DEFAULT_VISIT_BUDGET)
        .await
        .unwrap_or_default();
    print!("{}", outline);

    match surface.query_focused_editable_node().await {
        Some(node) => {
            let info = surface.node_info(node).await.unwrap_or_default();
            println!(
                "Focused editable node: #{} {} {:?}",
                node.0,
                info.class_name,
                info.text.unwrap_or_default()
            );
        }
        None => println!("No focused editable node"),
    }
    Ok(())
}

fn cmd_config(args: ConfigArgs, config: &AgentConfig, output: OutputFormat) -> Result<()> {
    match args.action {
        ConfigAction::Show => match output {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
            _ => {
                println!("Current Configuration:");
                println!("{}", serde_yaml::to_string(config)?);
            }
        },
        ConfigAction::Path => match AgentConfig::default_path() {
            Some(path) => println!("{}", path.display()),
            None => bail!("No configuration directory on this platform"),
        },
    }
    Ok(())
}

fn cmd_info(config: &AgentConfig) -> Result<()> {
    let provider = model_provider(config);

    println!("ScreenPilot System Information");
    println!("==============================");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!("Build Date: {}", env!("BUILD_DATE"));
    println!("Git Commit: {}", env!("GIT_HASH"));
    println!("Git Branch: {}", env!("GIT_BRANCH"));
    println!();

    println!("Configuration:");
    println!("- Tick period: {} ms", config.period_ms);
    println!(
        "- Input tensor: {}x{}x{} (mean {}, std {})",
        config.tensor.side,
        config.tensor.side,
        config.tensor.channels,
        config.tensor.mean,
        config.tensor.std
    );
    println!("- Screen: {}", config.screen.size());
    println!("- Model: {}", provider.artifact_path().display());
    println!(
        "- Frames: {}",
        config
            .capture
            .replay_dir
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(not configured)".to_string())
    );
    if let Some(dir) = &config.capture.debug_dir {
        println!("- Debug images: {}", dir.display());
    }
    Ok(())
}
