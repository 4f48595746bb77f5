//! Scripted collaborators shared by the scheduler integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use prbuild_core::{
    BranchRef, BuildExecutor, BuildParams, ChangeRequest, ChangeRequestSource, ExecutorError,
    RepositoryRef, SourceError, StatusReporter,
};
use prbuild_scheduler::{Pipeline, PipelineSettings};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const REPO: &str = "https://github.com/acme/widgets";

pub fn request(number: u64, head: &str, base: &str) -> ChangeRequest {
    ChangeRequest::new(
        number,
        format!("PR {number}"),
        BranchRef::new(head),
        BranchRef::new(base),
        format!("sha-{number}"),
    )
}

/// Tracks how many callers are inside a section at once.
#[derive(Debug, Default)]
pub struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    pub fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    pub fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct ScriptedSource {
    pub requests: Vec<ChangeRequest>,
    pub validate_error: Option<SourceError>,
    pub fetch_error: Option<SourceError>,
    pub fetch_delay: Option<Duration>,
    pub fetches: Arc<AtomicUsize>,
    pub fetch_gauge: Arc<Gauge>,
}

impl ScriptedSource {
    pub fn returning(requests: Vec<ChangeRequest>) -> Self {
        Self {
            requests,
            ..Default::default()
        }
    }
}

#[async_trait]
impl ChangeRequestSource for ScriptedSource {
    async fn validate(&self) -> Result<(), SourceError> {
        match &self.validate_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    async fn fetch(&mut self) -> Result<Vec<ChangeRequest>, SourceError> {
        self.fetch_gauge.enter();
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        self.fetch_gauge.exit();

        match &self.fetch_error {
            Some(e) => Err(e.clone()),
            None => Ok(self.requests.clone()),
        }
    }
}

/// Result and duration of the build of one source branch.
#[derive(Debug, Clone)]
pub struct Script {
    pub result: Result<i32, ExecutorError>,
    pub duration: Option<Duration>,
}

/// Reports and executor invocations in the order they happened.
pub type Journal = Arc<Mutex<Vec<Report>>>;

#[derive(Default)]
pub struct ScriptedExecutor {
    /// Keyed by source branch. Unscripted branches exit 0 immediately.
    pub scripts: HashMap<String, Script>,
    pub default_duration: Option<Duration>,
    pub invocations: Mutex<Vec<BuildParams>>,
    pub gauge: Gauge,
    /// Request number by source branch, for journal entries.
    pub numbers: HashMap<String, u64>,
    pub journal: Journal,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, branch: &str, result: Result<i32, ExecutorError>) -> Self {
        self.scripts.insert(
            branch.to_string(),
            Script {
                result,
                duration: None,
            },
        );
        self
    }

    pub fn hang(mut self, branch: &str) -> Self {
        self.scripts.insert(
            branch.to_string(),
            Script {
                result: Ok(0),
                duration: Some(Duration::MAX),
            },
        );
        self
    }

    pub fn taking(mut self, duration: Duration) -> Self {
        self.default_duration = Some(duration);
        self
    }

    pub fn invocations(&self) -> Vec<BuildParams> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl BuildExecutor for ScriptedExecutor {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn run(&self, params: &BuildParams) -> Result<i32, ExecutorError> {
        self.invocations.lock().unwrap().push(params.clone());
        if let Some(number) = self.numbers.get(&params.source_branch) {
            self.journal.lock().unwrap().push(Report::Invoked(*number));
        }
        let script = self.scripts.get(&params.source_branch).cloned();
        let duration = script
            .as_ref()
            .and_then(|s| s.duration)
            .or(self.default_duration);

        self.gauge.enter();
        if let Some(duration) = duration {
            if duration == Duration::MAX {
                futures::future::pending::<()>().await;
            }
            tokio::time::sleep(duration).await;
        }
        self.gauge.exit();

        script.map(|s| s.result).unwrap_or(Ok(0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Report {
    Pending(u64),
    Success(u64),
    Failure(u64),
    /// The executor was called for the request. Journal only.
    Invoked(u64),
}

impl Report {
    pub fn number(&self) -> u64 {
        match self {
            Report::Pending(n) | Report::Success(n) | Report::Failure(n) | Report::Invoked(n) => {
                *n
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Report::Success(_) | Report::Failure(_))
    }
}

#[derive(Default)]
pub struct RecordingReporter {
    events: Journal,
}

impl RecordingReporter {
    pub fn with_journal(journal: Journal) -> Self {
        Self { events: journal }
    }

    /// Status reports only, in order.
    pub fn events(&self) -> Vec<Report> {
        self.journal()
            .into_iter()
            .filter(|r| !matches!(r, Report::Invoked(_)))
            .collect()
    }

    /// Status reports and executor invocations, in order.
    pub fn journal(&self) -> Vec<Report> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    /// Every executor invocation comes after a pending report for the same request.
    pub fn pending_precedes_invocation(&self) -> bool {
        let journal = self.journal();
        journal.iter().enumerate().all(|(idx, entry)| {
            !matches!(entry, Report::Invoked(_))
                || journal[..idx].contains(&Report::Pending(entry.number()))
        })
    }

    pub fn terminal_reports(&self, number: u64) -> Vec<Report> {
        self.events()
            .into_iter()
            .filter(|r| r.number() == number && r.is_terminal())
            .collect()
    }

    /// Every terminal report comes after a pending report for the same request.
    pub fn pending_precedes_terminal(&self) -> bool {
        let events = self.events();
        events.iter().enumerate().all(|(idx, report)| {
            !report.is_terminal()
                || events[..idx].contains(&Report::Pending(report.number()))
        })
    }

    fn push(&self, report: Report) {
        self.events.lock().unwrap().push(report);
    }
}

#[async_trait]
impl StatusReporter for RecordingReporter {
    async fn report_pending(&self, request: &ChangeRequest) {
        self.push(Report::Pending(request.number));
    }

    async fn report_success(&self, request: &ChangeRequest) {
        self.push(Report::Success(request.number));
    }

    async fn report_failure(&self, request: &ChangeRequest) {
        self.push(Report::Failure(request.number));
    }
}

pub struct Harness {
    pub pipeline: Arc<Pipeline>,
    pub executor: Arc<ScriptedExecutor>,
    pub reporter: Arc<RecordingReporter>,
    pub fetches: Arc<AtomicUsize>,
    pub fetch_gauge: Arc<Gauge>,
}

pub fn harness(
    source: ScriptedSource,
    mut executor: ScriptedExecutor,
    settings: PipelineSettings,
) -> Harness {
    let fetches = Arc::clone(&source.fetches);
    let fetch_gauge = Arc::clone(&source.fetch_gauge);

    let journal = Journal::default();
    executor.numbers = source
        .requests
        .iter()
        .map(|r| (r.head.name.clone(), r.number))
        .collect();
    executor.journal = Arc::clone(&journal);
    let executor = Arc::new(executor);
    let reporter = Arc::new(RecordingReporter::with_journal(journal));

    let pipeline = Pipeline::new(
        RepositoryRef::new(REPO),
        Box::new(source),
        executor.clone(),
        reporter.clone(),
    )
    .with_settings(settings);

    Harness {
        pipeline: Arc::new(pipeline),
        executor,
        reporter,
        fetches,
        fetch_gauge,
    }
}
