//! Periodic driver that runs a tick on a fixed cadence.

use prbuild_config::{DaemonConfig, OverlapPolicy};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::pipeline::Pipeline;

/// Cadence and overlap behaviour of the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    pub interval: Duration,
    pub overlap: OverlapPolicy,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            overlap: OverlapPolicy::Skip,
        }
    }
}

impl From<&DaemonConfig> for DriverConfig {
    fn from(config: &DaemonConfig) -> Self {
        Self {
            interval: config.poll_interval,
            overlap: config.overlap,
        }
    }
}

/// Tick counters, returned when the driver stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    pub started: u64,
    pub skipped: u64,
    pub completed: u64,
    /// Ticks that ended early because the fetch step failed.
    pub abandoned: u64,
}

/// Runs [`Pipeline::run_tick`] forever at a fixed interval.
pub struct PeriodicDriver;

impl PeriodicDriver {
    /// Start the driver. The first tick fires immediately.
    pub fn start(pipeline: Arc<Pipeline>, config: DriverConfig) -> DriverHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(Self::run(pipeline, config, shutdown_rx));
        DriverHandle {
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn run(
        pipeline: Arc<Pipeline>,
        config: DriverConfig,
        mut shutdown: watch::Receiver<bool>,
    ) -> DriverStats {
        info!(repo = %pipeline.repository(), interval = ?config.interval, overlap = ?config.overlap, "Starting driver");

        let mut interval = tokio::time::interval(config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut ticks: JoinSet<bool> = JoinSet::new();
        let mut stats = DriverStats::default();

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                Some(joined) = ticks.join_next(), if !ticks.is_empty() => {
                    stats.record(joined);
                }
                _ = interval.tick() => {
                    while let Some(joined) = ticks.try_join_next() {
                        stats.record(joined);
                    }

                    if config.overlap == OverlapPolicy::Skip && !ticks.is_empty() {
                        info!("Previous tick still running, skipping");
                        stats.skipped += 1;
                        continue;
                    }

                    let pipeline = Arc::clone(&pipeline);
                    ticks.spawn(async move {
                        match pipeline.run_tick().await {
                            Ok(_) => true,
                            Err(e) => {
                                error!(error = %e, "Tick abandoned");
                                false
                            }
                        }
                    });
                    stats.started += 1;
                }
            }
        }

        info!(in_flight = ticks.len(), "Driver stopping, waiting for running ticks");
        while let Some(joined) = ticks.join_next().await {
            stats.record(joined);
        }

        info!(?stats, "Driver stopped");
        stats
    }
}

impl DriverStats {
    fn record(&mut self, joined: Result<bool, tokio::task::JoinError>) {
        match joined {
            Ok(true) => self.completed += 1,
            Ok(false) => self.abandoned += 1,
            Err(e) => {
                warn!(error = %e, "Tick task failed");
                self.abandoned += 1;
            }
        }
    }
}

/// Handle to a running driver. Dropping it also stops the driver.
pub struct DriverHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<DriverStats>,
}

impl DriverHandle {
    /// Stop scheduling ticks and wait for the running ones to finish.
    pub async fn shutdown(self) -> DriverStats {
        let _ = self.shutdown.send(true);
        match self.task.await {
            Ok(stats) => stats,
            Err(e) => {
                error!(error = %e, "Driver task failed");
                DriverStats::default()
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
