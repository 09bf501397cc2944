//! Container provisioning — starting new worker processes.
//!
//! The autoscaler only knows the `ContainerProvisioner` trait. The shipped
//! implementation shells out to the Docker CLI and starts a detached
//! container from the worker image; the container registers itself with
//! the control plane once its server is up.

use std::future::Future;

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

pub type ProvisionResult<T> = Result<T, ProvisionError>;

/// Why a worker could not be started.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("failed to launch container runtime `{runtime}`: {source}")]
    Launch {
        runtime: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{runtime} run` exited with {status}: {stderr}")]
    Rejected {
        runtime: String,
        status: String,
        stderr: String,
    },
}

/// Starts new worker processes from an image.
pub trait ContainerProvisioner: Send + Sync {
    /// Request one new worker running `image`.
    ///
    /// Returning `Ok` means the runtime accepted the request, not that the
    /// worker is serving yet.
    fn spawn_worker(&self, image: &str) -> impl Future<Output = ProvisionResult<()>> + Send;
}

/// Provisioner backed by the `docker` CLI (`docker run -d ...`).
#[derive(Debug, Clone)]
pub struct DockerProvisioner {
    /// Runtime binary, `docker` unless overridden (e.g. `podman`).
    binary: String,
    /// Docker network to attach workers to.
    network: Option<String>,
    /// Environment passed to every worker container.
    env: Vec<(String, String)>,
}

impl DockerProvisioner {
    pub fn new() -> Self {
        Self {
            binary: "docker".to_string(),
            network: None,
            env: Vec::new(),
        }
    }

    /// Use a different docker-compatible binary.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    /// Add an environment variable to spawned containers.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Arguments passed to the runtime binary for one spawn.
    fn run_args(&self, image: &str) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--label".to_string(),
            "dio.role=worker".to_string(),
        ];
        if let Some(network) = &self.network {
            args.push("--network".to_string());
            args.push(network.clone());
        }
        for (key, value) in &self.env {
            args.push("-e".to_string());
            args.push(format!("{key}={value}"));
        }
        args.push(image.to_string());
        args
    }
}

impl Default for DockerProvisioner {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerProvisioner for DockerProvisioner {
    async fn spawn_worker(&self, image: &str) -> ProvisionResult<()> {
        let args = self.run_args(image);
        debug!(runtime = %self.binary, ?args, "starting worker container");

        let output = Command::new(&self.binary)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ProvisionError::Launch {
                runtime: self.binary.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ProvisionError::Rejected {
                runtime: self.binary.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let container_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(%image, %container_id, "worker container started");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_args_for_plain_image() {
        let args = DockerProvisioner::new().run_args("dio-python-worker:latest");
        assert_eq!(
            args,
            vec!["run", "-d", "--label", "dio.role=worker", "dio-python-worker:latest"]
        );
    }

    #[test]
    fn run_args_include_network_and_env() {
        let args = DockerProvisioner::new()
            .with_network("dio-net")
            .with_env("DIO_MANAGER_ADDR", "manager:50051")
            .run_args("img");

        assert_eq!(
            args,
            vec![
                "run",
                "-d",
                "--label",
                "dio.role=worker",
                "--network",
                "dio-net",
                "-e",
                "DIO_MANAGER_ADDR=manager:50051",
                "img",
            ]
        );
    }

    #[tokio::test]
    async fn missing_runtime_is_launch_error() {
        let provisioner = DockerProvisioner::new().with_binary("dio-no-such-runtime-binary");
        let err = provisioner.spawn_worker("img").await.unwrap_err();
        assert!(matches!(err, ProvisionError::Launch { .. }), "got {err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_runtime_is_rejected() {
        let provisioner = DockerProvisioner::new().with_binary("false");
        let err = provisioner.spawn_worker("img").await.unwrap_err();
        assert!(matches!(err, ProvisionError::Rejected { .. }), "got {err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn succeeding_runtime_is_ok() {
        let provisioner = DockerProvisioner::new().with_binary("true");
        provisioner.spawn_worker("img").await.unwrap();
    }
}
