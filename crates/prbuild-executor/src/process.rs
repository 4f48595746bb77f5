//! Local process executor.

use async_trait::async_trait;
use prbuild_core::executor::{
    BuildExecutor, BuildParams, ENV_GIT_REPO, ENV_SOURCE_BRANCH, ENV_TARGET_BRANCH, ExecutorError,
};
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;
use tracing::{info, warn};
use uuid::Uuid;

/// Runs each build as a child process.
///
/// The build parameters are set in the child's environment. The default
/// command forwards them into a `docker run` of the `mvn` image.
///
/// Killing a `docker run` client leaves its container running, so for those
/// commands each build gets a named container that is force-removed when the
/// build is abandoned.
pub struct ProcessExecutor {
    program: String,
    args: Vec<String>,
    named_containers: bool,
}

impl ProcessExecutor {
    /// Create from an argv. Fails on an empty command.
    pub fn new(command: Vec<String>) -> Result<Self, ExecutorError> {
        let mut parts = command.into_iter();
        let program = parts
            .next()
            .ok_or_else(|| ExecutorError::Launch("empty build command".to_string()))?;
        let args: Vec<String> = parts.collect();
        let named_containers = program == "docker"
            && args.first().map(String::as_str) == Some("run")
            && !args.iter().any(|arg| arg == "--name" || arg.starts_with("--name="));
        Ok(Self {
            program,
            args,
            named_containers,
        })
    }

    pub fn docker_run(image: &str) -> Self {
        let mut args = vec!["run".to_string(), "--rm".to_string()];
        for var in [ENV_GIT_REPO, ENV_SOURCE_BRANCH, ENV_TARGET_BRANCH] {
            args.push("-e".to_string());
            args.push(var.to_string());
        }
        args.push(image.to_string());
        Self {
            program: "docker".to_string(),
            args,
            named_containers: true,
        }
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Arguments for one build, naming its container if there is one.
    fn build_args(&self, container: Option<&str>) -> Vec<String> {
        let mut args = self.args.clone();
        if let Some(name) = container {
            args.splice(1..1, ["--name".to_string(), name.to_string()]);
        }
        args
    }
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::docker_run("mvn")
    }
}

#[async_trait]
impl BuildExecutor for ProcessExecutor {
    fn name(&self) -> &'static str {
        "process"
    }

    async fn run(&self, params: &BuildParams) -> Result<i32, ExecutorError> {
        info!(command = %self.command_line(), source = %params.source_branch, target = %params.target_branch, "Spawning build process");

        let container = self
            .named_containers
            .then(|| format!("prbuild-{}", Uuid::new_v4()));
        let guard = container.clone().map(ContainerGuard::new);

        let status = Command::new(&self.program)
            .args(self.build_args(container.as_deref()))
            .envs(params.env())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| {
                warn!(program = %self.program, error = %e, "Failed to spawn build process");
                ExecutorError::Launch(format!("{}: {}", self.program, e))
            });

        // The client ran to completion, so `--rm` has already cleaned up.
        if let Some(guard) = guard {
            guard.disarm();
        }

        exit_code(status?)
    }
}

/// Force-removes a `docker run` container whose client was killed.
struct ContainerGuard {
    name: String,
    armed: bool,
}

impl ContainerGuard {
    fn new(name: String) -> Self {
        Self { name, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(container = %self.name, "No runtime to remove abandoned container");
            return;
        };
        let name = std::mem::take(&mut self.name);
        info!(container = %name, "Removing abandoned container");
        runtime.spawn(async move {
            let result = Command::new("docker")
                .args(["rm", "-f", &name])
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;
            match result {
                Ok(status) if status.success() => {}
                Ok(status) => warn!(container = %name, %status, "Failed to remove container"),
                Err(e) => warn!(container = %name, error = %e, "Failed to remove container"),
            }
        });
    }
}

fn exit_code(status: ExitStatus) -> Result<i32, ExecutorError> {
    if let Some(code) = status.code() {
        return Ok(code);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Err(ExecutorError::Signal(signal));
        }
    }

    Err(ExecutorError::Launch(format!(
        "process ended without an exit code: {}",
        status
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use prbuild_core::RepositoryRef;

    fn params() -> BuildParams {
        BuildParams {
            repository: RepositoryRef::new("https://github.com/acme/widgets"),
            source_branch: "feature/x".to_string(),
            target_branch: "main".to_string(),
        }
    }

    fn sh(script: &str) -> ProcessExecutor {
        ProcessExecutor::new(vec!["sh".to_string(), "-c".to_string(), script.to_string()]).unwrap()
    }

    #[test]
    fn test_default_command_forwards_params() {
        let executor = ProcessExecutor::default();
        assert_eq!(
            executor.command_line(),
            "docker run --rm -e GIT_REPO -e SOURCE_BRANCH -e TARGET_BRANCH mvn"
        );
    }

    #[test]
    fn test_docker_run_builds_get_named_containers() {
        let executor = ProcessExecutor::default();
        assert!(executor.named_containers);
        assert_eq!(
            executor.build_args(Some("prbuild-1")).join(" "),
            "run --name prbuild-1 --rm -e GIT_REPO -e SOURCE_BRANCH -e TARGET_BRANCH mvn"
        );

        let configured = ProcessExecutor::new(
            ["docker", "run", "--rm", "maven:3"].map(String::from).to_vec(),
        )
        .unwrap();
        assert!(configured.named_containers);
    }

    #[test]
    fn test_other_commands_are_not_named() {
        assert!(!sh("exit 0").named_containers);

        let named = ProcessExecutor::new(
            ["docker", "run", "--name", "ci", "mvn"].map(String::from).to_vec(),
        )
        .unwrap();
        assert!(!named.named_containers);
        assert_eq!(named.build_args(None), vec!["run", "--name", "ci", "mvn"]);
    }

    // Requires Docker
    #[tokio::test]
    #[ignore]
    async fn test_abandoned_docker_run_removes_container() {
        let executor = ProcessExecutor::new(
            ["docker", "run", "--rm", "alpine:latest", "sleep", "300"]
                .map(String::from)
                .to_vec(),
        )
        .unwrap();

        let p = params();
        let run = executor.run(&p);
        assert!(
            tokio::time::timeout(std::time::Duration::from_secs(5), run)
                .await
                .is_err()
        );
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;

        let output = Command::new("docker")
            .args(["ps", "-aq", "--filter", "name=prbuild-"])
            .output()
            .await
            .unwrap();
        assert!(output.stdout.is_empty());
    }

    #[test]
    fn test_empty_command_rejected() {
        assert!(matches!(
            ProcessExecutor::new(vec![]),
            Err(ExecutorError::Launch(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_code_is_returned() {
        assert_eq!(sh("exit 0").run(&params()).await, Ok(0));
        assert_eq!(sh("exit 42").run(&params()).await, Ok(42));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_params_reach_environment() {
        let script = r#"[ "$GIT_REPO" = "https://github.com/acme/widgets" ] && [ "$SOURCE_BRANCH" = "feature/x" ] && [ "$TARGET_BRANCH" = "main" ]"#;
        assert_eq!(sh(script).run(&params()).await, Ok(0));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_signal_is_reported() {
        let result = sh("kill -9 $$").run(&params()).await;
        assert_eq!(result, Err(ExecutorError::Signal(9)));
    }

    #[tokio::test]
    async fn test_missing_program_is_launch_failure() {
        let executor =
            ProcessExecutor::new(vec!["prbuild-definitely-not-a-program".to_string()]).unwrap();
        assert!(matches!(
            executor.run(&params()).await,
            Err(ExecutorError::Launch(_))
        ));
    }
}
