//! Session orchestration and the lifecycle of freshly created containers.
//!
//! A session resolves its bindings, optionally refreshes the image, looks for
//! running containers that already mount the directory, offers them for reuse
//! and otherwise creates, attaches to and stops a new container. Every path
//! ends in a [`SessionOutcome`]; turning that into a process exit status is the
//! caller's job.

use std::fmt;
use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::binding::{AuxiliaryKind, AuxiliaryMount, BindingResolver, DirectoryBinding};
use crate::config::AppConfig;
use crate::discovery::find_running;
use crate::engine::{ContainerHandle, EngineGateway, EngineResult, LaunchOptions};
use crate::error::{SessionError, SessionResult};
use crate::image::ImageReference;
use crate::interrupt::until_cancelled;
use crate::negotiate::{Negotiation, Negotiator, Prompt};

/// What the user asked for on the command line.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    /// Directory to mount. Relative paths and symlinks are resolved.
    pub directory: PathBuf,
    pub image: ImageReference,
    /// Pull the image before looking for containers.
    pub pull: bool,
    /// Mount `~/.gitconfig` read-only.
    pub mount_gitconfig: bool,
    /// Mount `~/.ssh` read-only.
    pub mount_ssh: bool,
}

/// Container-side settings shared by every session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub shell: Vec<String>,
    pub command: Vec<String>,
    pub security_opts: Vec<String>,
    pub stop_timeout: u32,
    pub stop_on_interrupt: bool,
}

impl From<&AppConfig> for SessionSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            shell: config.container.shell.clone(),
            command: config.container.command.clone(),
            security_opts: config.container.security_opts.clone(),
            stop_timeout: config.session.stop_timeout,
            stop_on_interrupt: config.session.stop_on_interrupt,
        }
    }
}

/// How the interactive shell ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellStatus {
    Success,
    Failed { exit_code: Option<i32> },
}

impl From<&EngineResult<()>> for ShellStatus {
    fn from(result: &EngineResult<()>) -> Self {
        match result {
            Ok(()) => ShellStatus::Success,
            Err(e) => ShellStatus::Failed {
                exit_code: e.exit_code(),
            },
        }
    }
}

/// Final result of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Attached to an already running container.
    Reused {
        container: String,
        shell: ShellStatus,
    },
    /// Created a container, attached, then stopped it.
    Created {
        container: String,
        shell: ShellStatus,
        /// Whether the stop call succeeded.
        stopped: bool,
    },
    /// Cut short by an interrupt.
    Interrupted {
        /// Container created before the interrupt, if any.
        container: Option<String>,
        stopped: bool,
    },
}

impl SessionOutcome {
    /// Process exit status for this outcome.
    ///
    /// A reused container's shell status is passed through; a created
    /// container maps to 0 or 1. A failed stop never turns success into
    /// failure. Interrupts exit 0.
    pub fn exit_code(&self) -> u8 {
        match self {
            SessionOutcome::Reused { shell, .. } => match shell {
                ShellStatus::Success => 0,
                ShellStatus::Failed {
                    exit_code: Some(code),
                } if (1..=255).contains(code) => *code as u8,
                ShellStatus::Failed { .. } => 1,
            },
            SessionOutcome::Created { shell, .. } => match shell {
                ShellStatus::Success => 0,
                ShellStatus::Failed { .. } => 1,
            },
            SessionOutcome::Interrupted { .. } => 0,
        }
    }
}

/// Phases of a container created by this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Pulling,
    Creating,
    Running,
    Attached,
    Stopping,
    Terminated,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Pulling => "pulling",
            LifecycleState::Creating => "creating",
            LifecycleState::Running => "running",
            LifecycleState::Attached => "attached",
            LifecycleState::Stopping => "stopping",
            LifecycleState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Drives pull → create → attach → stop for one new container.
///
/// The created container is owned here exclusively: nothing else in the
/// session stops or mutates it.
pub struct Lifecycle<'a> {
    engine: &'a dyn EngineGateway,
    settings: &'a SessionSettings,
    token: CancellationToken,
    state: Option<LifecycleState>,
}

impl<'a> Lifecycle<'a> {
    pub fn new(
        engine: &'a dyn EngineGateway,
        settings: &'a SessionSettings,
        token: CancellationToken,
    ) -> Self {
        Self {
            engine,
            settings,
            token,
            state: None,
        }
    }

    /// Current phase, `None` before anything ran.
    pub fn state(&self) -> Option<LifecycleState> {
        self.state
    }

    fn transition(&mut self, next: LifecycleState) {
        match self.state {
            Some(prev) => debug!("lifecycle {} -> {}", prev, next),
            None => debug!("lifecycle -> {}", next),
        }
        self.state = Some(next);
    }

    /// Pull the image. `Ok(false)` means the pull was interrupted.
    pub async fn refresh_image(&mut self, image: &ImageReference) -> SessionResult<bool> {
        self.transition(LifecycleState::Pulling);
        info!("pulling {}", image);

        match until_cancelled(&self.token, self.engine.pull_image(&image.to_string())).await {
            Some(result) => {
                result?;
                Ok(true)
            }
            None => {
                self.transition(LifecycleState::Terminated);
                Ok(false)
            }
        }
    }

    /// Create a container for `binding`, attach a shell and stop it again.
    pub async fn launch(
        &mut self,
        image: &ImageReference,
        binding: &DirectoryBinding,
        auxiliary: &[AuxiliaryMount],
        prompt: &mut dyn Prompt,
    ) -> SessionResult<SessionOutcome> {
        if self.token.is_cancelled() {
            self.transition(LifecycleState::Terminated);
            return Ok(SessionOutcome::Interrupted {
                container: None,
                stopped: false,
            });
        }

        self.transition(LifecycleState::Creating);
        let options = launch_options(image, binding, auxiliary, self.settings);

        // Not raced against the token: once `run` has been issued the engine
        // may already hold the container, and only its id lets us stop it.
        let container = self.engine.run_container(&options).await?;
        self.transition(LifecycleState::Running);
        info!("started container {}", container.id);

        let shell = if self.token.is_cancelled() {
            debug!("interrupted while starting {}", container.id);
            None
        } else {
            self.attach(&container, prompt).await
        };

        self.transition(LifecycleState::Stopping);
        let stopped = if shell.is_none() && !self.settings.stop_on_interrupt {
            info!("leaving container {} running after interrupt", container.id);
            false
        } else {
            self.stop(&container).await
        };
        self.transition(LifecycleState::Terminated);

        Ok(match shell {
            Some(result) => {
                if let Err(ref e) = result {
                    warn!("shell in {} ended with an error: {}", container.id, e);
                }
                SessionOutcome::Created {
                    container: container.id,
                    shell: ShellStatus::from(&result),
                    stopped,
                }
            }
            None => SessionOutcome::Interrupted {
                container: Some(container.id),
                stopped,
            },
        })
    }

    /// Show the port mapping and run the shell. `None` when interrupted.
    async fn attach(
        &mut self,
        container: &ContainerHandle,
        prompt: &mut dyn Prompt,
    ) -> Option<EngineResult<()>> {
        // Display only: failures here never block the shell.
        match until_cancelled(&self.token, self.engine.ports_of(container)).await? {
            Ok(ports) if !ports.is_empty() => {
                if let Err(e) = prompt.say(&ports).await {
                    warn!("failed to print port mapping: {}", e);
                }
            }
            Ok(_) => debug!("container {} publishes no ports", container.id),
            Err(e) => warn!("could not read port mapping of {}: {}", container.id, e),
        }

        self.transition(LifecycleState::Attached);
        until_cancelled(
            &self.token,
            self.engine
                .exec_interactive_shell(container, &self.settings.shell),
        )
        .await
    }

    /// Stop the container once. Not raced against the interrupt token.
    async fn stop(&self, container: &ContainerHandle) -> bool {
        match self
            .engine
            .stop_container(container, self.settings.stop_timeout)
            .await
        {
            Ok(()) => {
                debug!("stopped container {}", container.id);
                true
            }
            Err(e) => {
                warn!("failed to stop container {}: {}", container.id, e);
                false
            }
        }
    }
}

/// Flags for a new workspace container.
pub fn launch_options(
    image: &ImageReference,
    binding: &DirectoryBinding,
    auxiliary: &[AuxiliaryMount],
    settings: &SessionSettings,
) -> LaunchOptions {
    let mut options = LaunchOptions::new(image.to_string())
        .detach()
        .publish_all()
        .auto_remove();
    for opt in &settings.security_opts {
        options = options.security_opt(opt.clone());
    }
    options = options.volume(binding.to_volume());
    for mount in auxiliary {
        options = options.volume(mount.to_volume());
    }
    options
        .workdir(binding.mount_point())
        .command(settings.command.clone())
}

/// One invocation: resolve, reuse or create, clean up.
pub struct Session<'a> {
    engine: &'a dyn EngineGateway,
    resolver: &'a BindingResolver,
    settings: &'a SessionSettings,
    token: CancellationToken,
}

impl<'a> Session<'a> {
    pub fn new(
        engine: &'a dyn EngineGateway,
        resolver: &'a BindingResolver,
        settings: &'a SessionSettings,
        token: CancellationToken,
    ) -> Self {
        Self {
            engine,
            resolver,
            settings,
            token,
        }
    }

    /// Run the whole session. Bindings are resolved before the first engine
    /// call, so input errors never touch the engine.
    pub async fn run(
        &self,
        request: &SessionRequest,
        prompt: &mut dyn Prompt,
    ) -> SessionResult<SessionOutcome> {
        let binding = self.resolver.resolve(&request.directory)?;
        let mut auxiliary = Vec::new();
        for (kind, enabled) in [
            (AuxiliaryKind::GitConfig, request.mount_gitconfig),
            (AuxiliaryKind::SshKeys, request.mount_ssh),
        ] {
            if let Some(mount) = self.resolver.resolve_auxiliary(kind, enabled)? {
                debug!("mounting {} from {}", kind, mount.host_source);
                auxiliary.push(mount);
            }
        }

        let interrupted = || SessionOutcome::Interrupted {
            container: None,
            stopped: false,
        };

        let mut lifecycle = Lifecycle::new(self.engine, self.settings, self.token.clone());
        if request.pull && !lifecycle.refresh_image(&request.image).await? {
            return Ok(interrupted());
        }

        let Some(candidates) = until_cancelled(
            &self.token,
            find_running(self.engine, &binding, &request.image),
        )
        .await
        else {
            return Ok(interrupted());
        };
        let candidates = candidates?;

        let mut negotiator = Negotiator::new(self.engine, &mut *prompt, &self.settings.shell);
        let Some(negotiation) =
            until_cancelled(&self.token, negotiator.negotiate(&binding, &candidates)).await
        else {
            return Ok(interrupted());
        };

        match negotiation.map_err(SessionError::Prompt)? {
            Negotiation::Attached { container, shell } => {
                if let Err(ref e) = shell {
                    warn!("shell in {} ended with an error: {}", container.id, e);
                }
                Ok(SessionOutcome::Reused {
                    container: container.id,
                    shell: ShellStatus::from(&shell),
                })
            }
            Negotiation::Declined => {
                lifecycle
                    .launch(&request.image, &binding, &auxiliary, prompt)
                    .await
            }
        }
    }
}
