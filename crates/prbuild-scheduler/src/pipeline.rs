//! One polling tick: fetch, fan out builds, fan in outcomes.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use prbuild_config::DaemonConfig;
use prbuild_config::daemon::DEFAULT_FETCH_TIMEOUT;
use prbuild_core::outcome::BuildFailure;
use prbuild_core::{
    BuildExecutor, BuildOutcome, BuildParams, ChangeRequest, ChangeRequestSource, Error,
    ExecutorError, RepositoryRef, Result, SourceError, StatusReporter, TickId,
};
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore, mpsc};
use tokio::task::JoinHandle;
use tracing::{Instrument, info, info_span, warn};

use crate::barrier::CompletionBarrier;

/// Limits applied to every tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// `None` launches every build of a tick at once.
    pub max_concurrent_builds: Option<NonZeroUsize>,
    /// `None` lets a build run until the executor returns.
    pub build_timeout: Option<Duration>,
    /// Bounds validate and fetch each. An expired fetch abandons the tick.
    pub fetch_timeout: Option<Duration>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_concurrent_builds: None,
            build_timeout: None,
            fetch_timeout: Some(DEFAULT_FETCH_TIMEOUT),
        }
    }
}

impl From<&DaemonConfig> for PipelineSettings {
    fn from(config: &DaemonConfig) -> Self {
        Self {
            max_concurrent_builds: config.max_concurrent_builds,
            build_timeout: config.build_timeout,
            fetch_timeout: config.fetch_timeout,
        }
    }
}

/// Summary of a completed tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub tick: TickId,
    /// Builds launched, one per fetched change request.
    pub launched: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct FanIn {
    succeeded: usize,
    failed: usize,
}

/// Drives ticks for one repository.
///
/// The source is created once at startup and shared by every tick. It sits
/// behind a mutex so overlapping ticks never touch its cache concurrently.
pub struct Pipeline {
    repository: RepositoryRef,
    source: Mutex<Box<dyn ChangeRequestSource>>,
    executor: Arc<dyn BuildExecutor>,
    reporter: Arc<dyn StatusReporter>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        repository: RepositoryRef,
        source: Box<dyn ChangeRequestSource>,
        executor: Arc<dyn BuildExecutor>,
        reporter: Arc<dyn StatusReporter>,
    ) -> Self {
        Self {
            repository,
            source: Mutex::new(source),
            executor,
            reporter,
            settings: PipelineSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn repository(&self) -> &RepositoryRef {
        &self.repository
    }

    /// Run one tick to completion.
    ///
    /// Returns once every launched build has published its outcome and the
    /// outcome has been reported. A failed fetch abandons the tick before any
    /// status is posted and is returned as [`Error::Source`].
    pub async fn run_tick(&self) -> Result<TickReport> {
        let tick = TickId::new();
        self.run_tick_inner(tick)
            .instrument(info_span!("tick", %tick, repo = %self.repository))
            .await
    }

    async fn run_tick_inner(&self, tick: TickId) -> Result<TickReport> {
        let started_at = Utc::now();
        let requests = self.fetch().await?;

        if requests.is_empty() {
            info!("No change requests to build");
            return Ok(TickReport {
                tick,
                launched: 0,
                succeeded: 0,
                failed: 0,
                started_at,
                finished_at: Utc::now(),
            });
        }

        let launched = requests.len();
        info!(count = launched, "Launching builds");

        // Capacity covers every producer, so no build ever waits on a send.
        let (tx, rx) = mpsc::channel(launched);
        let fan_in = self.spawn_fan_in(rx);
        let barrier = CompletionBarrier::new();

        let semaphore = self
            .settings
            .max_concurrent_builds
            .map(|max| Arc::new(Semaphore::new(max.get())));

        for request in requests {
            self.spawn_build(request, tx.clone(), &barrier, semaphore.clone());
        }
        // Build tasks now hold the only senders; the channel closes after the last one publishes.
        drop(tx);

        barrier.wait().await;
        let summary = fan_in
            .await
            .map_err(|e| Error::Internal(format!("fan-in task failed: {}", e)))?;

        info!(
            launched,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Tick complete"
        );

        Ok(TickReport {
            tick,
            launched,
            succeeded: summary.succeeded,
            failed: summary.failed,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn fetch(&self) -> Result<Vec<ChangeRequest>> {
        let mut source = self.source.lock().await;
        let limit = self.settings.fetch_timeout;

        match with_deadline(limit, source.validate()).await {
            Some(Ok(())) => {}
            Some(Err(e)) => warn!(error = %e, "Repository validation failed, fetching anyway"),
            None => warn!(?limit, "Repository validation timed out, fetching anyway"),
        }

        match with_deadline(limit, source.fetch()).await {
            Some(result) => Ok(result?),
            None => Err(SourceError::Fetch("fetch timed out".to_string()).into()),
        }
    }

    fn spawn_build(
        &self,
        request: ChangeRequest,
        tx: mpsc::Sender<BuildOutcome>,
        barrier: &CompletionBarrier,
        semaphore: Option<Arc<Semaphore>>,
    ) {
        let guard = barrier.enter();
        let executor = Arc::clone(&self.executor);
        let reporter = Arc::clone(&self.reporter);
        let params = BuildParams::for_request(&self.repository, &request);
        let timeout = self.settings.build_timeout;
        let span = info_span!("build", pr = request.number);

        tokio::spawn(
            async move {
                let _guard = guard;

                info!(title = %request.title, head = %request.head.label, base = %request.base.label, "Building");
                reporter.report_pending(&request).await;

                let _permit = match semaphore {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };

                let outcome = run_build(executor.as_ref(), &params, request, timeout).await;
                match &outcome.failure {
                    None => info!(code = outcome.code, "Build finished"),
                    Some(BuildFailure::Launch(reason)) => {
                        warn!(code = outcome.code, %reason, "Build could not be started")
                    }
                    Some(BuildFailure::Signal(signal)) => {
                        warn!(code = outcome.code, signal, "Build was killed by a signal")
                    }
                    Some(BuildFailure::TimedOut(after)) => {
                        warn!(code = outcome.code, ?after, "Build timed out")
                    }
                }

                // The receiver outlives every sender, so this cannot fail.
                let _ = tx.send(outcome).await;
            }
            .instrument(span),
        );
    }

    fn spawn_fan_in(&self, mut rx: mpsc::Receiver<BuildOutcome>) -> JoinHandle<FanIn> {
        let reporter = Arc::clone(&self.reporter);

        tokio::spawn(
            async move {
                let mut summary = FanIn::default();
                while let Some(outcome) = rx.recv().await {
                    if outcome.is_success() {
                        info!(pr = outcome.request.number, "Reporting success");
                        reporter.report_success(&outcome.request).await;
                        summary.succeeded += 1;
                    } else {
                        info!(pr = outcome.request.number, code = outcome.code, "Reporting failure");
                        reporter.report_failure(&outcome.request).await;
                        summary.failed += 1;
                    }
                }
                summary
            }
            .in_current_span(),
        )
    }
}

/// `None` when the deadline expired first.
async fn with_deadline<F: std::future::Future>(
    limit: Option<Duration>,
    future: F,
) -> Option<F::Output> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, future).await.ok(),
        None => Some(future.await),
    }
}

/// Run the executor under the optional deadline. Panics inside the executor
/// become launch failures so the request still gets a final status.
async fn run_build(
    executor: &dyn BuildExecutor,
    params: &BuildParams,
    request: ChangeRequest,
    timeout: Option<Duration>,
) -> BuildOutcome {
    let run = AssertUnwindSafe(executor.run(params))
        .catch_unwind()
        .map(|result| {
            result.unwrap_or_else(|_| {
                Err(ExecutorError::Launch(format!(
                    "{} executor panicked",
                    executor.name()
                )))
            })
        });

    match timeout {
        Some(limit) => match tokio::time::timeout(limit, run).await {
            Ok(result) => BuildOutcome::from_result(request, result),
            Err(_) => BuildOutcome::timed_out(request, limit),
        },
        None => BuildOutcome::from_result(request, run.await),
    }
}
