//! Docker executor implementation.

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, RemoveContainerOptions, StartContainerOptions,
    WaitContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::image::CreateImageOptions;
use futures::StreamExt;
use prbuild_core::executor::{BuildExecutor, BuildParams, ExecutorError};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Runs each build as a fresh container of a fixed image.
///
/// The build parameters are passed as the `GIT_REPO`, `SOURCE_BRANCH` and
/// `TARGET_BRANCH` environment variables; the image is expected to clone and
/// build on its own.
pub struct DockerExecutor {
    docker: Docker,
    image: String,
}

impl DockerExecutor {
    /// Create a new DockerExecutor connecting to the local Docker daemon.
    pub fn new(image: impl Into<String>) -> Result<Self, ExecutorError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| ExecutorError::Launch(format!("Failed to connect to Docker: {}", e)))?;
        Ok(Self::with_client(docker, image))
    }

    /// Create with a custom Docker client.
    pub fn with_client(docker: Docker, image: impl Into<String>) -> Self {
        Self {
            docker,
            image: image.into(),
        }
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    fn container_name(build_id: &Uuid) -> String {
        format!("prbuild-{}", build_id)
    }

    fn container_env(params: &BuildParams) -> Vec<String> {
        let mut env: Vec<String> = params
            .env()
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        env.sort();
        env
    }

    async fn pull_image(&self) {
        info!(image = %self.image, "Pulling image");
        let options = CreateImageOptions {
            from_image: self.image.clone(),
            ..Default::default()
        };

        let mut pull_stream = self.docker.create_image(Some(options), None, None);
        while let Some(result) = pull_stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(status) = info.status {
                        debug!(status = %status, "Pull progress");
                    }
                }
                Err(e) => {
                    // A locally built image cannot be pulled; container creation decides.
                    warn!(image = %self.image, error = %e, "Pull warning");
                }
            }
        }
    }
}

#[async_trait]
impl BuildExecutor for DockerExecutor {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn run(&self, params: &BuildParams) -> Result<i32, ExecutorError> {
        let container_name = Self::container_name(&Uuid::new_v4());

        self.pull_image().await;

        let config = Config {
            image: Some(self.image.clone()),
            env: Some(Self::container_env(params)),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(false),
            ..Default::default()
        };

        let create_options = CreateContainerOptions {
            name: container_name.clone(),
            platform: None,
        };

        info!(container = %container_name, source = %params.source_branch, target = %params.target_branch, "Creating container");
        self.docker
            .create_container(Some(create_options), config)
            .await
            .map_err(|e| ExecutorError::Launch(format!("Failed to create container: {}", e)))?;

        // Removes the container even if this future is dropped mid-build.
        let guard = ContainerGuard::new(self.docker.clone(), container_name.clone());

        self.docker
            .start_container(&container_name, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| ExecutorError::Launch(format!("Failed to start container: {}", e)))?;

        let options = WaitContainerOptions {
            condition: "not-running",
        };
        let mut stream = self.docker.wait_container(&container_name, Some(options));

        let result = match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code as i32),
            // bollard reports a non-zero exit as an error carrying the code.
            Some(Err(DockerError::DockerContainerWaitError { code, .. })) => Ok(code as i32),
            Some(Err(e)) => Err(ExecutorError::Launch(format!(
                "Failed to wait for container: {}",
                e
            ))),
            None => Err(ExecutorError::Launch(
                "Container wait stream ended without a status".to_string(),
            )),
        };

        guard.remove().await;
        result
    }
}

/// Force-removes a build container when dropped, unless already removed.
struct ContainerGuard {
    docker: Docker,
    name: String,
    armed: bool,
}

impl ContainerGuard {
    fn new(docker: Docker, name: String) -> Self {
        Self {
            docker,
            name,
            armed: true,
        }
    }

    async fn remove(mut self) {
        self.armed = false;
        remove_container(&self.docker, &self.name).await;
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
        let docker = self.docker.clone();
        let name = std::mem::take(&mut self.name);
        info!(container = %name, "Removing abandoned container");
        runtime.spawn(async move { remove_container(&docker, &name).await });
    }
}

async fn remove_container(docker: &Docker, name: &str) {
    let options = RemoveContainerOptions {
        force: true,
        ..Default::default()
    };

    if let Err(e) = docker.remove_container(name, Some(options)).await {
        warn!(container = %name, error = %e, "Failed to remove container");
    }
}
