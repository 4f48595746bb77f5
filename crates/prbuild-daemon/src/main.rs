//! prbuild daemon: polls a GitHub repository for open pull requests, builds
//! each one and reports the result as a commit status.

use anyhow::{Context, Result};
use clap::Parser;
use prbuild_config::{Credentials, DaemonConfig, ExecutorConfig, load_daemon_config};
use prbuild_core::{BuildExecutor, RepositoryRef};
use prbuild_executor::{DockerExecutor, ProcessExecutor};
use prbuild_github::{GitHubClient, GitHubReporter, GitHubSource, RepoSlug};
use prbuild_scheduler::{DriverConfig, PeriodicDriver, Pipeline, PipelineSettings};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "prbuild")]
#[command(about = "Build open pull requests and report their status", long_about = None)]
struct Args {
    /// Path to the daemon configuration file
    #[arg(long, env = "PRBUILD_CONFIG", default_value = "prbuild.kdl")]
    config: String,

    /// Repository to watch; overrides the configuration file
    #[arg(long, env = "PRBUILD_REPOSITORY")]
    repository: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = resolve_config(&args)?;
    info!(repo = %config.repository, executor = ?config.executor, "Loaded configuration");

    let credentials = Credentials::from_env();
    if credentials.is_anonymous() {
        warn!("No GitHub credentials found, statuses cannot be posted");
    }

    let slug: RepoSlug = config
        .repository
        .as_str()
        .parse()
        .context("Repository is not a GitHub repository")?;
    let client =
        GitHubClient::new(&config.api_url, credentials).with_timeout(config.request_timeout);
    let source = GitHubSource::new(client.clone(), slug.clone());
    let reporter = GitHubReporter::new(client, slug, &config.status_context);

    let pipeline = Pipeline::new(
        config.repository.clone(),
        Box::new(source),
        build_executor(&config.executor)?,
        Arc::new(reporter),
    )
    .with_settings(PipelineSettings::from(&config));

    let driver = PeriodicDriver::start(Arc::new(pipeline), DriverConfig::from(&config));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown requested");

    let stats = driver.shutdown().await;
    info!(
        started = stats.started,
        skipped = stats.skipped,
        completed = stats.completed,
        abandoned = stats.abandoned,
        "Exiting"
    );

    Ok(())
}

fn resolve_config(args: &Args) -> Result<DaemonConfig> {
    let mut config = if Path::new(&args.config).exists() {
        load_daemon_config(&args.config)
            .with_context(|| format!("Failed to load config file: {}", args.config))?
    } else {
        let repository = args.repository.as_deref().with_context(|| {
            format!(
                "Config file {} not found and no --repository given",
                args.config
            )
        })?;
        DaemonConfig::new(RepositoryRef::new(repository))
    };

    if let Some(repository) = &args.repository {
        config.repository = RepositoryRef::new(repository.as_str());
    }

    Ok(config)
}

fn build_executor(config: &ExecutorConfig) -> Result<Arc<dyn BuildExecutor>> {
    let executor: Arc<dyn BuildExecutor> = match config {
        ExecutorConfig::Docker { image } => Arc::new(
            DockerExecutor::new(image.as_str()).context("Failed to set up Docker executor")?,
        ),
        ExecutorConfig::Process { command } if command.is_empty() => {
            Arc::new(ProcessExecutor::default())
        }
        ExecutorConfig::Process { command } => Arc::new(
            ProcessExecutor::new(command.clone()).context("Invalid build command")?,
        ),
    };
    Ok(executor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from([
            "prbuild",
            "--config",
            "/etc/prbuild.kdl",
            "--repository",
            "https://github.com/acme/widgets",
            "--json",
        ]);
        assert_eq!(args.config, "/etc/prbuild.kdl");
        assert_eq!(
            args.repository.as_deref(),
            Some("https://github.com/acme/widgets")
        );
        assert!(args.json);
    }

    #[test]
    fn test_repository_flag_without_config_file() {
        let args = Args::parse_from([
            "prbuild",
            "--config",
            "/nonexistent/prbuild.kdl",
            "--repository",
            "acme/widgets",
        ]);
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.repository.as_str(), "acme/widgets");
    }

    #[test]
    fn test_missing_config_and_repository_fails() {
        let args = Args::parse_from(["prbuild", "--config", "/nonexistent/prbuild.kdl"]);
        assert!(resolve_config(&args).is_err());
    }

    #[test]
    fn test_process_executor_from_config() {
        let executor = build_executor(&ExecutorConfig::Process {
            command: vec!["make".to_string(), "ci".to_string()],
        })
        .unwrap();
        assert_eq!(executor.name(), "process");
    }
}
