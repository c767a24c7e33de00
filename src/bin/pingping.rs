use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use pingping::{
    actors::scheduler::{SchedulerHandle, SchedulerSettings},
    bus::{LogBus, MessageBus, MqttBus, Publisher},
    config::{Config, parse_targets, read_config_file},
    probe::PingCommand,
};
use tracing::{error, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(version, about)]
struct Args {
    /// JSON config file (replaces the environment variables)
    #[arg(short)]
    file: Option<String>,

    /// Seconds between cycles
    #[arg(long)]
    interval: Option<u64>,

    /// Echo requests per target
    #[arg(long)]
    count: Option<u32>,

    /// Comma separated targets
    #[arg(long)]
    targets: Option<String>,

    /// Log messages instead of sending them to the broker
    #[arg(long)]
    dry_run: bool,

    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,
}

fn init(level: LevelFilter) {
    let filter = filter::Targets::new().with_targets(vec![
        ("pingping", level),
        ("rumqttc", LevelFilter::WARN),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.file {
        Some(file) => read_config_file(file)?,
        None => Config::from_env()?,
    };

    if let Some(interval) = args.interval {
        config.interval = interval;
    }
    if let Some(count) = args.count {
        config.count = count;
    }
    if let Some(targets) = &args.targets {
        config.targets = parse_targets(targets);
    }

    config.validate()
}

/// Resolves on Ctrl-C, or SIGTERM on unix
async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate =
            signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.context("failed to listen for Ctrl-C")?,
            _ = terminate.recv() => {}
        }
        Ok(())
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init(args.log_level);
    trace!("started with args: {args:?}");

    let config = load_config(&args)?;

    if config.targets.is_empty() {
        warn!("no targets configured, nothing will be probed");
    }

    let bus: Box<dyn MessageBus> = if args.dry_run {
        Box::new(LogBus::new())
    } else {
        let bus = MqttBus::new(&config.broker);
        info!("publishing to {} as {}", bus.broker(), bus.client_id());
        Box::new(bus)
    };

    let publisher = Publisher::new(bus, &config.topic_prefix);
    publisher
        .connect()
        .await
        .context("failed to connect to message bus")?;

    let scheduler = SchedulerHandle::spawn(
        SchedulerSettings::from(&config),
        Arc::new(PingCommand::new()),
        publisher.clone(),
    );

    shutdown_signal().await?;
    info!("Exit, interrupt received…");

    match scheduler.shutdown().await {
        Ok(cycles) => info!("completed {cycles} cycle(s)"),
        Err(e) => error!("{e:#}"),
    }

    if let Err(e) = publisher.disconnect().await {
        error!("{e}");
    }

    info!("done.");

    Ok(())
}
