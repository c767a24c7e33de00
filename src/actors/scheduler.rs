//! ProbeSchedulerActor - Runs probe cycles on a fixed cadence
//!
//! ## Cycle
//!
//! ```text
//! spawn one task per target ─▶ drain in completion order ─▶ report ─▶ sleep(interval - elapsed)
//!      probe → parse → publish                                           ↑
//!                                                 Commands (RunNow, Shutdown)
//! ```
//!
//! Every task of a cycle is awaited before the cycle counts as finished, so
//! no task ever overlaps with the next cycle. A cycle that takes longer than
//! the interval is followed by the next one immediately; cycles are never
//! skipped.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::bus::{BusResult, Publisher};
use crate::config::Config;
use crate::probe::{Prober, measure};

use super::messages::{CycleReport, SchedulerCommand};

/// What to probe and how often
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub targets: Vec<String>,

    /// Echo requests per target and cycle
    pub count: u32,

    /// Time between the starts of two cycles
    pub interval: Duration,
}

impl From<&Config> for SchedulerSettings {
    fn from(config: &Config) -> Self {
        Self {
            targets: config.targets.clone(),
            count: config.count,
            interval: config.interval(),
        }
    }
}

/// Time left to wait after a cycle that took `elapsed`.
///
/// Zero once the cycle overran the interval.
pub fn remaining_sleep(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

/// Actor probing all configured targets once per interval
pub struct ProbeSchedulerActor {
    targets: Arc<[String]>,
    count: u32,
    interval: Duration,

    /// Shared by every probe task
    prober: Arc<dyn Prober>,

    publisher: Publisher,

    command_rx: mpsc::Receiver<SchedulerCommand>,

    /// Completed cycles
    cycles: u64,
}

impl ProbeSchedulerActor {
    pub fn new(
        settings: SchedulerSettings,
        prober: Arc<dyn Prober>,
        publisher: Publisher,
        command_rx: mpsc::Receiver<SchedulerCommand>,
    ) -> Self {
        Self {
            targets: settings.targets.into(),
            count: settings.count,
            interval: settings.interval,
            prober,
            publisher,
            command_rx,
            cycles: 0,
        }
    }

    /// Run the actor's main loop
    ///
    /// The first cycle starts immediately. Runs until:
    /// - A Shutdown command is received
    /// - The command channel is closed
    #[instrument(skip(self), fields(targets = self.targets.len()))]
    pub async fn run(mut self) {
        info!(
            "probing {} target(s) with {} packet(s) every {}s",
            self.targets.len(),
            self.count,
            self.interval.as_secs_f64()
        );

        let mut next_cycle = Instant::now();

        let acknowledge = loop {
            tokio::select! {
                // commands first, so a pending shutdown wins over a due cycle
                biased;

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(SchedulerCommand::RunNow { respond_to }) => {
                            debug!("received RunNow command");
                            let report = self.run_cycle().await;
                            let _ = respond_to.send(report);
                        }

                        Some(SchedulerCommand::Shutdown { respond_to }) => {
                            debug!("received shutdown command");
                            break Some(respond_to);
                        }

                        None => {
                            warn!("command channel closed, shutting down");
                            break None;
                        }
                    }
                }

                _ = sleep_until(next_cycle) => {
                    let report = self.run_cycle().await;
                    next_cycle = Instant::now() + remaining_sleep(self.interval, report.elapsed);
                }
            }
        };

        info!("scheduler stopped after {} cycle(s)", self.cycles);

        if let Some(respond_to) = acknowledge {
            let _ = respond_to.send(self.cycles);
        }
    }

    /// Probe every target once and publish the results as they come in.
    ///
    /// Failures are logged per target and counted in the report; they never
    /// abort the cycle.
    #[instrument(skip(self), fields(cycle = self.cycles + 1))]
    async fn run_cycle(&mut self) -> CycleReport {
        let started_at = Utc::now();
        let start = Instant::now();

        let mut tasks = JoinSet::new();
        for target in self.targets.iter().cloned() {
            let prober = Arc::clone(&self.prober);
            let publisher = self.publisher.clone();
            let count = self.count;

            tasks.spawn(async move {
                let outcome =
                    AssertUnwindSafe(probe_and_publish(prober.as_ref(), &publisher, &target, count))
                        .catch_unwind()
                        .await;
                (target, outcome)
            });
        }

        let mut report = CycleReport {
            cycle: self.cycles + 1,
            started_at,
            targets: self.targets.len(),
            published: 0,
            failed: 0,
            elapsed: Duration::ZERO,
        };

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(Ok(())))) => report.published += 1,
                Ok((target, Ok(Err(e)))) => {
                    error!("{target}: failed to publish results: {e}");
                    report.failed += 1;
                }
                Ok((target, Err(panic))) => {
                    error!("{target}: probe task panicked: {}", panic_message(&*panic));
                    report.failed += 1;
                }
                Err(e) => {
                    error!("probe task failed: {e}");
                    report.failed += 1;
                }
            }
        }

        report.elapsed = start.elapsed();
        self.cycles += 1;

        info!(
            "[{}] Finished in {:.2} seconds",
            report.cycle,
            report.elapsed.as_secs_f64()
        );

        report
    }
}

async fn probe_and_publish(
    prober: &dyn Prober,
    publisher: &Publisher,
    target: &str,
    count: u32,
) -> BusResult<()> {
    let record = measure(prober, target, count).await;

    info!(
        "{target}: latency={:?}, packet_loss={}",
        record.average_latency_ms, record.packet_loss_pct
    );
    match record.to_json() {
        Ok(json) => trace!("{target}: {json}"),
        Err(e) => debug!("{target}: cannot render record: {e}"),
    }

    publisher.publish_record(&record).await
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Handle for controlling a ProbeSchedulerActor
///
/// This handle provides a typed API for sending commands to the actor.
/// It can be cloned and shared across tasks.
#[derive(Clone)]
pub struct SchedulerHandle {
    sender: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    /// Spawn a new scheduler actor
    ///
    /// The first cycle starts right away.
    pub fn spawn(
        settings: SchedulerSettings,
        prober: Arc<dyn Prober>,
        publisher: Publisher,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);

        let actor = ProbeSchedulerActor::new(settings, prober, publisher, cmd_rx);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Run an extra cycle now and wait for its report
    pub async fn run_now(&self) -> Result<CycleReport> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::RunNow { respond_to: tx })
            .await
            .context("failed to send RunNow command")?;

        rx.await.context("failed to receive cycle report")
    }

    /// Stop the scheduler and wait until it has stopped.
    ///
    /// A cycle in flight finishes first. Returns the number of completed
    /// cycles.
    pub async fn shutdown(&self) -> Result<u64> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::Shutdown { respond_to: tx })
            .await
            .context("failed to send Shutdown command")?;

        rx.await.context("failed to receive shutdown acknowledgement")
    }
}
