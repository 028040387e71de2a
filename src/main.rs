use anyhow::{bail, Context};
use clap::Parser;
use posture_monitor::core::BalanceState;
use posture_monitor::hardware::{
    LoggingIndicators, MockPeripheral, MockTransport, ScriptedFrameSource, SyntheticPoseModel,
};
use posture_monitor::{shutdown_channel, LinkConfig, MonitorConfig, Orchestrator};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Posture monitor running against a simulated camera and weight sensor
#[derive(Debug, Parser)]
#[command(name = "posture-monitor", version, about)]
struct Args {
    /// JSON configuration file; defaults apply to missing fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Stop after this many camera frames
    #[arg(long)]
    frames: Option<u64>,

    /// Simulated camera frame rate
    #[arg(long, default_value_t = 15.0)]
    frame_rate: f64,

    /// Simulated camera frame width in pixels
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// Simulated camera frame height in pixels
    #[arg(long, default_value_t = 480)]
    height: u32,
}

/// Interval between simulated weight sensor notifications
const FEED_INTERVAL: Duration = Duration::from_secs(4);

/// Time between frames for `frame_rate` frames per second
fn frame_interval(frame_rate: f64) -> anyhow::Result<Duration> {
    match Duration::try_from_secs_f64(1.0 / frame_rate) {
        Ok(interval) if !interval.is_zero() => Ok(interval),
        _ => bail!("unusable frame rate {frame_rate}"),
    }
}

/// Weight sensor stand-in answering on the configured address and channel
fn simulated_sensor(link: &LinkConfig) -> MockPeripheral {
    MockPeripheral::new(link.target_address.clone(), link.notification_channel.clone())
}

fn init_logging(level: &str) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).with_context(|| format!("invalid log level {level:?}"))?,
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => MonitorConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => MonitorConfig::default(),
    };

    if args.print_config {
        println!("{}", config.to_json()?);
        return Ok(());
    }

    init_logging(&args.log_level)?;

    let frame_interval = frame_interval(args.frame_rate)?;

    // Simulated weight sensor shifting its weight around, with one garbled payload
    let sensor = simulated_sensor(&config.link);
    let payloads = vec![
        BalanceState::Left.as_str().as_bytes().to_vec(),
        BalanceState::Balanced.as_str().as_bytes().to_vec(),
        BalanceState::Right.as_str().as_bytes().to_vec(),
        b"TILT?".to_vec(),
    ];
    let feed = tokio::spawn(sensor.clone().run_feed(payloads, FEED_INTERVAL));

    let mut frames = ScriptedFrameSource::repeating(frame_interval).with_resolution(args.width, args.height);
    if let Some(limit) = args.frames {
        frames = frames.with_limit(limit);
    }
    let extractor = SyntheticPoseModel::new(90).with_gaps(45);

    let (trigger, signal) = shutdown_channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received, shutting down");
                trigger.trigger();
            }
            Err(error) => warn!(%error, "cannot listen for interrupts"),
        }
    });

    let report = Orchestrator::new(config)
        .run(
            MockTransport::new(sensor),
            frames,
            extractor,
            LoggingIndicators::new(),
            signal,
        )
        .await?;
    feed.abort();

    report.log_summary();
    if report.source_failed() {
        bail!("camera stopped delivering frames");
    }
    Ok(())
}
