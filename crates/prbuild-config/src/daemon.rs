//! Daemon configuration parsing.

use crate::{ConfigError, ConfigResult};
use kdl::{KdlDocument, KdlNode};
use prbuild_core::RepositoryRef;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_STATUS_CONTEXT: &str = "prbuild";
pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_IMAGE: &str = "mvn";

/// What the driver does when a tick fires while the previous one is still running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlapPolicy {
    /// Drop the new tick.
    #[default]
    Skip,
    /// Start the new tick alongside the running one.
    Allow,
}

impl std::str::FromStr for OverlapPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s {
            "skip" => Ok(OverlapPolicy::Skip),
            "allow" => Ok(OverlapPolicy::Allow),
            other => Err(ConfigError::invalid(
                "overlap",
                format!("expected \"skip\" or \"allow\", got {other:?}"),
            )),
        }
    }
}

/// How builds are executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutorConfig {
    /// Run each build as a container through the Docker API.
    Docker { image: String },
    /// Run each build as a local process. Empty `command` means the default
    /// `docker run` invocation.
    Process { command: Vec<String> },
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfig::Docker {
            image: DEFAULT_IMAGE.to_string(),
        }
    }
}

/// Settings for one running daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    pub repository: RepositoryRef,
    pub poll_interval: Duration,
    /// `None` launches every pending build at once.
    pub max_concurrent_builds: Option<NonZeroUsize>,
    /// `None` lets builds run forever.
    pub build_timeout: Option<Duration>,
    /// Deadline for validating and fetching at the start of a tick.
    pub fetch_timeout: Option<Duration>,
    /// Deadline for each request to the hosting service.
    pub request_timeout: Duration,
    pub overlap: OverlapPolicy,
    pub status_context: String,
    pub api_url: String,
    pub executor: ExecutorConfig,
}

impl DaemonConfig {
    /// Default settings for a repository.
    pub fn new(repository: RepositoryRef) -> Self {
        Self {
            repository,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_concurrent_builds: None,
            build_timeout: Some(DEFAULT_BUILD_TIMEOUT),
            fetch_timeout: Some(DEFAULT_FETCH_TIMEOUT),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            overlap: OverlapPolicy::default(),
            status_context: DEFAULT_STATUS_CONTEXT.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            executor: ExecutorConfig::default(),
        }
    }
}

/// Read and parse a daemon configuration file.
pub fn load_daemon_config(path: impl AsRef<Path>) -> ConfigResult<DaemonConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_daemon_config(&content)
}

/// Parse daemon configuration from KDL text.
pub fn parse_daemon_config(kdl: &str) -> ConfigResult<DaemonConfig> {
    let doc: KdlDocument = kdl.parse()?;

    let repository = doc
        .nodes()
        .iter()
        .find(|n| n.name().value() == "repository")
        .and_then(get_first_string_arg)
        .ok_or_else(|| ConfigError::MissingField("repository".to_string()))?;

    let mut config = DaemonConfig::new(RepositoryRef::new(repository));

    for node in doc.nodes() {
        match node.name().value() {
            "repository" => {}
            "poll-interval-secs" => {
                let secs = get_positive_int_arg(node, "poll-interval-secs")?;
                config.poll_interval = Duration::from_secs(secs);
            }
            "max-concurrent-builds" => {
                let max = get_positive_int_arg(node, "max-concurrent-builds")?;
                let max = usize::try_from(max)
                    .ok()
                    .and_then(NonZeroUsize::new)
                    .ok_or_else(|| ConfigError::invalid("max-concurrent-builds", "out of range"))?;
                config.max_concurrent_builds = Some(max);
            }
            "build-timeout-secs" => {
                config.build_timeout = get_optional_duration_arg(node, "build-timeout-secs")?;
            }
            "fetch-timeout-secs" => {
                config.fetch_timeout = get_optional_duration_arg(node, "fetch-timeout-secs")?;
            }
            "request-timeout-secs" => {
                let secs = get_positive_int_arg(node, "request-timeout-secs")?;
                config.request_timeout = Duration::from_secs(secs);
            }
            "overlap" => {
                config.overlap = get_first_string_arg(node)
                    .ok_or_else(|| ConfigError::invalid("overlap", "expected a string"))?
                    .parse()?;
            }
            "status-context" => {
                config.status_context = get_first_string_arg(node)
                    .ok_or_else(|| ConfigError::invalid("status-context", "expected a string"))?;
            }
            "api-url" => {
                config.api_url = get_first_string_arg(node)
                    .ok_or_else(|| ConfigError::invalid("api-url", "expected a string"))?;
            }
            "executor" => {
                config.executor = parse_executor(node)?;
            }
            _ => {} // Ignore unknown nodes
        }
    }

    Ok(config)
}

fn parse_executor(node: &KdlNode) -> ConfigResult<ExecutorConfig> {
    let kind = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField("executor kind".to_string()))?;

    match kind.as_str() {
        "docker" => {
            let image = find_child(node, "image")
                .and_then(get_first_string_arg)
                .unwrap_or_else(|| DEFAULT_IMAGE.to_string());
            Ok(ExecutorConfig::Docker { image })
        }
        "process" => {
            let command = find_child(node, "command")
                .map(get_all_string_args)
                .unwrap_or_default();
            Ok(ExecutorConfig::Process { command })
        }
        other => Err(ConfigError::invalid(
            "executor",
            format!("unknown executor kind {other:?}"),
        )),
    }
}

fn find_child<'a>(node: &'a KdlNode, name: &str) -> Option<&'a KdlNode> {
    node.children()?
        .nodes()
        .iter()
        .find(|child| child.name().value() == name)
}

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_all_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

fn get_int_arg(node: &KdlNode, field: &str) -> ConfigResult<u64> {
    let value = node
        .entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_integer())
        .ok_or_else(|| ConfigError::invalid(field, "expected an integer"))?;

    u64::try_from(value).map_err(|_| ConfigError::invalid(field, "must not be negative"))
}

fn get_positive_int_arg(node: &KdlNode, field: &str) -> ConfigResult<u64> {
    match get_int_arg(node, field)? {
        0 => Err(ConfigError::invalid(field, "must be greater than zero")),
        n => Ok(n),
    }
}

/// Zero disables the deadline.
fn get_optional_duration_arg(node: &KdlNode, field: &str) -> ConfigResult<Option<Duration>> {
    let secs = get_int_arg(node, field)?;
    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}
