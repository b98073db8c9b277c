//! Launch options for new containers, and the input checks applied before
//! anything reaches an engine argv.

use super::RuntimeType;
use super::error::{EngineError, EngineResult};

/// A bind mount passed to `run --volume`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    /// Absolute path on the host.
    pub host: String,
    /// Absolute path inside the container.
    pub target: String,
    /// Mount read-only.
    pub read_only: bool,
}

impl VolumeMount {
    pub fn new(host: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            target: target.into(),
            read_only: false,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Render the `host:target[:opts]` form, adding the SELinux relabel
    /// option where the runtime needs it.
    fn spec(&self, runtime: RuntimeType) -> String {
        let mut opts = Vec::new();
        if self.read_only {
            opts.push("ro");
        }
        if runtime.needs_selinux_labels() {
            opts.push("Z");
        }

        if opts.is_empty() {
            format!("{}:{}", self.host, self.target)
        } else {
            format!("{}:{}:{}", self.host, self.target, opts.join(","))
        }
    }
}

/// Flags for `run`, assembled once before the container is created.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    /// Image to start.
    pub image: String,
    /// Start detached (`--detach`).
    pub detach: bool,
    /// Publish every exposed port to a random host port (`--publish-all`).
    pub publish_all: bool,
    /// Remove the container once it exits (`--rm`).
    pub auto_remove: bool,
    /// `--security-opt` values, in order.
    pub security_opts: Vec<String>,
    /// Bind mounts, in order.
    pub volumes: Vec<VolumeMount>,
    /// Working directory inside the container.
    pub workdir: Option<String>,
    /// Command run as the container's main process.
    pub command: Vec<String>,
}

impl LaunchOptions {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Default::default()
        }
    }

    pub fn detach(mut self) -> Self {
        self.detach = true;
        self
    }

    pub fn publish_all(mut self) -> Self {
        self.publish_all = true;
        self
    }

    pub fn auto_remove(mut self) -> Self {
        self.auto_remove = true;
        self
    }

    pub fn security_opt(mut self, opt: impl Into<String>) -> Self {
        self.security_opts.push(opt.into());
        self
    }

    pub fn volume(mut self, mount: VolumeMount) -> Self {
        self.volumes.push(mount);
        self
    }

    pub fn workdir(mut self, workdir: impl Into<String>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    pub fn command(mut self, cmd: Vec<String>) -> Self {
        self.command = cmd;
        self
    }

    /// Validate every field that ends up on the command line.
    pub fn validate(&self) -> EngineResult<()> {
        validate_image_name(&self.image)?;

        for mount in &self.volumes {
            validate_volume_path(&mount.host, "host")?;
            validate_volume_path(&mount.target, "container")?;
            validate_container_path(&mount.target)?;
        }

        if let Some(ref workdir) = self.workdir {
            validate_container_path(workdir)?;
        }

        Ok(())
    }

    /// Arguments following `run`, ending with the image and command.
    pub fn to_args(&self, runtime: RuntimeType) -> Vec<String> {
        let mut args: Vec<String> = Vec::new();

        if self.detach {
            args.push("--detach".to_string());
        }
        if self.publish_all {
            args.push("--publish-all".to_string());
        }
        if self.auto_remove {
            args.push("--rm".to_string());
        }
        for opt in &self.security_opts {
            args.push("--security-opt".to_string());
            args.push(opt.clone());
        }
        for mount in &self.volumes {
            args.push("--volume".to_string());
            args.push(mount.spec(runtime));
        }
        if let Some(ref workdir) = self.workdir {
            args.push("--workdir".to_string());
            args.push(workdir.clone());
        }

        args.push(self.image.clone());
        args.extend(self.command.iter().cloned());
        args
    }
}

// ============================================================================
// Input Validation Functions
// ============================================================================

/// Validate a Docker/OCI image name.
///
/// Image names follow the pattern: `[registry/][namespace/]name[:tag][@digest]`
pub fn validate_image_name(image: &str) -> EngineResult<()> {
    if image.is_empty() {
        return Err(EngineError::InvalidInput(
            "image name cannot be empty".to_string(),
        ));
    }

    if image.len() > 256 {
        return Err(EngineError::InvalidInput(
            "image name exceeds maximum length of 256 characters".to_string(),
        ));
    }

    let valid_chars = |c: char| {
        c.is_ascii_alphanumeric()
            || c == '.'
            || c == '-'
            || c == '_'
            || c == '/'
            || c == ':'
            || c == '@'
    };

    if !image.chars().all(valid_chars) {
        return Err(EngineError::InvalidInput(format!(
            "image name '{}' contains invalid characters; only alphanumeric, '.', '-', '_', '/', ':', '@' are allowed",
            image
        )));
    }

    if image.contains("..") {
        return Err(EngineError::InvalidInput(
            "image name cannot contain '..'".to_string(),
        ));
    }

    Ok(())
}

/// Validate a container ID as printed by `ps` or `run`.
pub fn validate_container_id(id: &str) -> EngineResult<()> {
    if id.is_empty() {
        return Err(EngineError::InvalidInput(
            "container ID cannot be empty".to_string(),
        ));
    }

    if id.len() > 128 {
        return Err(EngineError::InvalidInput(
            "container ID exceeds maximum length".to_string(),
        ));
    }

    let valid_chars = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_';
    if id.starts_with('-') || !id.chars().all(valid_chars) {
        return Err(EngineError::InvalidInput(format!(
            "container ID '{}' contains invalid characters",
            id
        )));
    }

    Ok(())
}

/// Validate one side of a bind mount.
///
/// `:` is rejected because it separates the fields of `--volume`.
pub fn validate_volume_path(path: &str, side: &str) -> EngineResult<()> {
    if path.is_empty() {
        return Err(EngineError::InvalidInput(format!(
            "{} volume path cannot be empty",
            side
        )));
    }

    if path.len() > 4096 {
        return Err(EngineError::InvalidInput(format!(
            "{} volume path exceeds maximum length of 4096 characters",
            side
        )));
    }

    for c in ['\0', '\n', '\r', ':'] {
        if path.contains(c) {
            return Err(EngineError::InvalidInput(format!(
                "{} volume path '{}' contains forbidden character {:?}",
                side,
                path.escape_debug(),
                c
            )));
        }
    }

    Ok(())
}

/// Validate a container-internal path.
fn validate_container_path(path: &str) -> EngineResult<()> {
    if !path.starts_with('/') {
        return Err(EngineError::InvalidInput(format!(
            "container path '{}' must be absolute",
            path
        )));
    }

    if path.contains('\0') {
        return Err(EngineError::InvalidInput(
            "container path cannot contain null bytes".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace_options() -> LaunchOptions {
        LaunchOptions::new("team/dev:latest")
            .detach()
            .publish_all()
            .auto_remove()
            .security_opt("seccomp=unconfined")
            .volume(VolumeMount::new("/work", "/home/ubuntu/workspace"))
            .volume(VolumeMount::new("/home/me/.ssh", "/home/ubuntu/.ssh").read_only())
            .workdir("/home/ubuntu/workspace")
            .command(vec!["sleep".into(), "infinity".into()])
    }

    #[test]
    fn test_to_args_docker_order() {
        let args = workspace_options().to_args(RuntimeType::Docker);
        assert_eq!(
            args,
            vec![
                "--detach",
                "--publish-all",
                "--rm",
                "--security-opt",
                "seccomp=unconfined",
                "--volume",
                "/work:/home/ubuntu/workspace",
                "--volume",
                "/home/me/.ssh:/home/ubuntu/.ssh:ro",
                "--workdir",
                "/home/ubuntu/workspace",
                "team/dev:latest",
                "sleep",
                "infinity",
            ]
        );
    }

    #[test]
    fn test_podman_mounts_get_selinux_label() {
        let args = workspace_options().to_args(RuntimeType::Podman);
        assert!(args.contains(&"/work:/home/ubuntu/workspace:Z".to_string()));
        assert!(args.contains(&"/home/me/.ssh:/home/ubuntu/.ssh:ro,Z".to_string()));
    }

    #[test]
    fn test_validate_accepts_workspace_options() {
        assert!(workspace_options().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_colon_in_host_path() {
        let options = LaunchOptions::new("ubuntu")
            .volume(VolumeMount::new("/tmp/a:b", "/home/ubuntu/workspace"));
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_relative_workdir() {
        let options = LaunchOptions::new("ubuntu").workdir("workspace");
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_validate_image_name() {
        assert!(validate_image_name("cs50/cli:latest").is_ok());
        assert!(validate_image_name("gcr.io/project/image@sha256:abc123").is_ok());
        assert!(validate_image_name("").is_err());
        assert!(validate_image_name("image;rm -rf /").is_err());
        assert!(validate_image_name("../../../etc/passwd").is_err());
    }

    #[test]
    fn test_validate_container_id() {
        assert!(validate_container_id("abc123").is_ok());
        assert!(validate_container_id("my_container-1").is_ok());
        assert!(validate_container_id("").is_err());
        assert!(validate_container_id("$(whoami)").is_err());
        assert!(validate_container_id("--rm").is_err());
    }
}
