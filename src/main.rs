use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use camview::config::{AppConfig, ConfigStore};
use camview::events::{EventBus, ViewerEvent};
use camview::registry::RegistryClient;
use camview::render::{DisplaySurface, StatsSurface};
use camview::viewer::{ViewerContext, ViewerGrid};
use camview::webrtc::{SignalingMode, StreamTarget};

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Verbose,
    Debug,
    Trace,
}

/// Signaling path selectable from the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
enum SignalingArg {
    Whep,
    BackendOffer,
}

impl From<SignalingArg> for SignalingMode {
    fn from(arg: SignalingArg) -> Self {
        match arg {
            SignalingArg::Whep => SignalingMode::Whep,
            SignalingArg::BackendOffer => SignalingMode::BackendOffer,
        }
    }
}

/// camview command line arguments
#[derive(Parser, Debug)]
#[command(name = "camview")]
#[command(version, about = "Live WebRTC viewers for a camera dashboard", long_about = None)]
struct CliArgs {
    /// Configuration file (created with defaults when missing)
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Media gateway base URL (overrides config)
    #[arg(short = 'g', long, value_name = "URL")]
    gateway: Option<String>,

    /// Camera to view: `ID` (gateway base + ID) or `ID=URL`; repeatable
    #[arg(long = "camera", value_name = "CAMERA")]
    cameras: Vec<String>,

    /// Load cameras from the registry, optionally at URL (overrides config)
    #[arg(long, value_name = "URL", num_args = 0..=1, default_missing_value = "")]
    registry: Option<String>,

    /// Signaling path (overrides config)
    #[arg(short = 's', long, value_name = "MODE")]
    signaling: Option<SignalingArg>,

    /// Log level (error, warn, info, verbose, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Increase verbosity (-v for verbose, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_level, args.verbose, args.log_json);

    tracing::info!("Starting camview v{}", env!("CARGO_PKG_VERSION"));

    let config_path = args.config.clone().unwrap_or_else(get_config_path);
    tracing::info!("Configuration: {}", config_path.display());
    let config_store = ConfigStore::new(&config_path).await?;

    // CLI overrides apply to this run only
    let mut config = (*config_store.get()).clone();
    apply_overrides(&mut config, &args);

    let events = Arc::new(EventBus::new());
    let surfaces: Arc<Mutex<HashMap<String, Arc<StatsSurface>>>> = Arc::new(Mutex::new(HashMap::new()));
    let surface_registry = surfaces.clone();
    let ctx = ViewerContext::new(&config, events.clone())?.with_surfaces(Arc::new(
        move |target: &StreamTarget| {
            let surface = Arc::new(StatsSurface::new());
            surface_registry
                .lock()
                .insert(target.camera_id.clone(), surface.clone());
            surface as Arc<dyn DisplaySurface>
        },
    ));

    let targets = resolve_targets(&args, &config).await?;
    if targets.is_empty() {
        anyhow::bail!("No cameras to view (use --camera or --registry)");
    }

    tracing::info!(
        "Viewing {} camera(s) via {} signaling",
        targets.len(),
        config.signaling.mode
    );

    let mut grid = ViewerGrid::new(ctx, config.signaling.gateway_base_url.clone());
    grid.sync_targets(targets);

    let cancel = CancellationToken::new();
    let logger = tokio::spawn(log_events(events.subscribe(), cancel.clone()));

    let stats_interval = config.viewer.stats_interval_secs;
    let mut ticker = tokio::time::interval(Duration::from_secs(stats_interval.max(1)));
    ticker.tick().await;

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
    };
    tokio::pin!(shutdown_signal);

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                tracing::info!("Shutdown signal received");
                break;
            }
            _ = ticker.tick(), if stats_interval > 0 => {
                log_stats(&grid, &surfaces);
            }
        }
    }

    grid.unmount_all();
    // Let transports close and the last events drain
    tokio::time::sleep(Duration::from_millis(200)).await;
    cancel.cancel();
    let _ = logger.await;

    tracing::info!("camview stopped");
    Ok(())
}

fn apply_overrides(config: &mut AppConfig, args: &CliArgs) {
    if let Some(ref gateway) = args.gateway {
        config.signaling.gateway_base_url = gateway.clone();
    }
    if let Some(mode) = args.signaling {
        config.signaling.mode = mode.into();
    }
    if let Some(ref url) = args.registry {
        if !url.is_empty() {
            config.registry.base_url = url.clone();
        }
    }
}

/// Targets from `--camera` arguments, then from the registry when requested
async fn resolve_targets(args: &CliArgs, config: &AppConfig) -> anyhow::Result<Vec<StreamTarget>> {
    let gateway_base = &config.signaling.gateway_base_url;
    let mut targets: Vec<StreamTarget> = args
        .cameras
        .iter()
        .map(|arg| match arg.split_once('=') {
            Some((id, url)) => StreamTarget::new(id.trim(), url.trim()),
            None => StreamTarget::for_camera(arg.trim(), gateway_base),
        })
        .collect();

    if args.registry.is_some() {
        let http = camview::webrtc::signaling::http_client(&config.signaling)?;
        let registry = RegistryClient::new(http, config.registry.base_url.clone());
        let cameras = registry.list_cameras().await?;
        tracing::info!(
            "Registry {} returned {} camera(s)",
            config.registry.base_url,
            cameras.len()
        );
        targets.extend(cameras.iter().map(|c| c.stream_target(gateway_base)));
    }

    Ok(targets)
}

async fn log_events(
    mut events: tokio::sync::broadcast::Receiver<ViewerEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => event,
        };

        match event {
            Ok(ViewerEvent::StreamStateChanged { camera_id, from, to, .. }) => {
                tracing::info!("[{}] {} -> {}", camera_id, from, to);
            }
            Ok(ViewerEvent::StreamTrackBound { camera_id, track }) => {
                tracing::info!("[{}] receiving {} ({})", camera_id, track.kind, track.codec);
            }
            Ok(event) => {
                tracing::debug!("[{}] {}", event.camera_id(), event.event_name());
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                tracing::debug!("Event logger lagged by {} events", n);
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn log_stats(grid: &ViewerGrid, surfaces: &Mutex<HashMap<String, Arc<StatsSurface>>>) {
    let surfaces = surfaces.lock();
    for status in grid.statuses() {
        match surfaces.get(&status.camera_id).map(|s| s.stats()) {
            Some(stats) => tracing::info!(
                "[{}] {} | video {} frames / {} KiB, audio {} KiB",
                status.camera_id,
                status.status_text,
                stats.video_frames,
                stats.video_bytes / 1024,
                stats.audio_bytes / 1024
            ),
            None => tracing::info!("[{}] {}", status.camera_id, status.status_text),
        }
    }
}

fn init_logging(level: LogLevel, verbose_count: u8, json: bool) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Verbose,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "camview=error,webrtc=error",
        LogLevel::Warn => "camview=warn,webrtc=warn",
        LogLevel::Info => "camview=info,webrtc=warn",
        LogLevel::Verbose => "camview=debug,webrtc=warn",
        LogLevel::Debug => "camview=debug,webrtc=info",
        LogLevel::Trace => "camview=trace,webrtc=debug",
    };

    // RUST_LOG takes priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    if let Err(err) = result {
        eprintln!("failed to initialize tracing: {}", err);
    }
}

/// Default configuration file path
fn get_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("CAMVIEW_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("camview.json")
}
