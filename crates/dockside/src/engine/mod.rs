//! Container engine gateway.
//!
//! Every interaction with the engine goes through [`EngineGateway`]. The
//! production implementation, [`EngineRuntime`], shells out to the Docker or
//! Podman CLI; tests substitute a fake. Calls are awaited one at a time and
//! are never retried here.

mod container;
mod error;
pub mod listing;
mod options;

pub use container::{ContainerHandle, ListFilter};
pub use error::{EngineError, EngineResult};
pub use options::{
    LaunchOptions, VolumeMount, validate_container_id, validate_image_name, validate_volume_path,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Container runtime type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeType {
    #[default]
    Docker,
    Podman,
}

impl RuntimeType {
    /// Get the default binary name for this runtime.
    pub fn default_binary(&self) -> &'static str {
        match self {
            RuntimeType::Docker => "docker",
            RuntimeType::Podman => "podman",
        }
    }

    /// Whether this runtime requires SELinux volume labels (:Z suffix).
    pub fn needs_selinux_labels(&self) -> bool {
        match self {
            RuntimeType::Docker => false,
            RuntimeType::Podman => true,
        }
    }
}

impl std::fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.default_binary())
    }
}

/// The operations a session needs from the container engine.
#[async_trait]
pub trait EngineGateway: Send + Sync {
    /// Pull `image` from its registry.
    async fn pull_image(&self, image: &str) -> EngineResult<()>;

    /// List containers matching `filter`, in the engine's own order.
    async fn list_containers(&self, filter: &ListFilter) -> EngineResult<Vec<ContainerHandle>>;

    /// Create and start a container.
    async fn run_container(&self, options: &LaunchOptions) -> EngineResult<ContainerHandle>;

    /// Human-readable published port mapping.
    async fn ports_of(&self, container: &ContainerHandle) -> EngineResult<String>;

    /// Run `shell` inside the container attached to the calling terminal.
    /// Returns once the shell exits.
    async fn exec_interactive_shell(
        &self,
        container: &ContainerHandle,
        shell: &[String],
    ) -> EngineResult<()>;

    /// Stop the container, killing it after `timeout_seconds`.
    async fn stop_container(
        &self,
        container: &ContainerHandle,
        timeout_seconds: u32,
    ) -> EngineResult<()>;
}

/// CLI-backed engine gateway for Docker or Podman.
#[derive(Debug, Clone)]
pub struct EngineRuntime {
    /// The runtime type (docker or podman)
    runtime_type: RuntimeType,
    /// Path to the container binary
    binary: String,
}

impl Default for EngineRuntime {
    fn default() -> Self {
        Self::detect()
    }
}

impl EngineRuntime {
    /// Pick Docker when installed, else Podman.
    pub fn detect() -> Self {
        if Self::is_binary_available("docker") {
            Self::with_type(RuntimeType::Docker)
        } else if Self::is_binary_available("podman") {
            Self::with_type(RuntimeType::Podman)
        } else {
            // Fall back to docker, will fail at runtime
            Self::with_type(RuntimeType::Docker)
        }
    }

    /// Create a runtime with a specific type.
    pub fn with_type(runtime_type: RuntimeType) -> Self {
        Self {
            binary: runtime_type.default_binary().to_string(),
            runtime_type,
        }
    }

    /// Create a runtime with a custom binary path.
    pub fn with_binary(runtime_type: RuntimeType, binary: impl Into<String>) -> Self {
        Self {
            runtime_type,
            binary: binary.into(),
        }
    }

    pub fn runtime_type(&self) -> RuntimeType {
        self.runtime_type
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Whether the configured binary can be found.
    pub fn is_installed(&self) -> bool {
        Self::is_binary_available(&self.binary)
    }

    /// Check if a binary is available in PATH.
    fn is_binary_available(name: &str) -> bool {
        std::process::Command::new("which")
            .arg(name)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn describe(&self, verb: &str) -> String {
        format!("{} {}", self.binary, verb)
    }

    /// Run an engine command and capture its stdout.
    async fn capture(&self, args: &[String]) -> EngineResult<String> {
        let command = self.describe(&args[0]);
        debug!("{} {:?}", self.binary, args);

        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| EngineError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::CommandFailed {
                command,
                exit_code: output.status.code(),
                message: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run an engine command wired to the calling terminal.
    async fn inherit(&self, args: &[String]) -> EngineResult<()> {
        let command = self.describe(&args[0]);
        debug!("{} {:?}", self.binary, args);

        let status = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|source| EngineError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !status.success() {
            return Err(EngineError::CommandFailed {
                command,
                exit_code: status.code(),
                message: "see output above".to_string(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl EngineGateway for EngineRuntime {
    async fn pull_image(&self, image: &str) -> EngineResult<()> {
        validate_image_name(image)?;
        self.inherit(&["pull".to_string(), image.to_string()]).await
    }

    async fn list_containers(&self, filter: &ListFilter) -> EngineResult<Vec<ContainerHandle>> {
        if let Some(ref volume) = filter.volume {
            validate_volume_path(volume, "host")?;
        }

        let mut args = vec!["ps".to_string()];
        args.extend(filter.to_args());
        args.push("--format".to_string());
        args.push(listing::LISTING_FORMAT.to_string());

        let stdout = self.capture(&args).await?;
        Ok(listing::decode_listing(&stdout))
    }

    async fn run_container(&self, options: &LaunchOptions) -> EngineResult<ContainerHandle> {
        options.validate()?;

        let mut args = vec!["run".to_string()];
        args.extend(options.to_args(self.runtime_type));

        let stdout = self.capture(&args).await?;
        let id = stdout.trim();
        validate_container_id(id).map_err(|_| EngineError::CommandFailed {
            command: self.describe("run"),
            exit_code: Some(0),
            message: format!("unexpected container ID {:?}", id),
        })?;

        Ok(ContainerHandle::created(id, options.image.clone()))
    }

    async fn ports_of(&self, container: &ContainerHandle) -> EngineResult<String> {
        validate_container_id(&container.id)?;
        let stdout = self
            .capture(&["port".to_string(), container.id.clone()])
            .await?;
        Ok(stdout.trim().to_string())
    }

    async fn exec_interactive_shell(
        &self,
        container: &ContainerHandle,
        shell: &[String],
    ) -> EngineResult<()> {
        validate_container_id(&container.id)?;
        if shell.is_empty() {
            return Err(EngineError::InvalidInput(
                "shell command cannot be empty".to_string(),
            ));
        }

        let mut args = vec![
            "exec".to_string(),
            "--interactive".to_string(),
            "--tty".to_string(),
            container.id.clone(),
        ];
        args.extend(shell.iter().cloned());

        self.inherit(&args).await
    }

    async fn stop_container(
        &self,
        container: &ContainerHandle,
        timeout_seconds: u32,
    ) -> EngineResult<()> {
        validate_container_id(&container.id)?;
        self.capture(&[
            "stop".to_string(),
            "--time".to_string(),
            timeout_seconds.to_string(),
            container.id.clone(),
        ])
        .await
        .map(|_| ())
    }
}
