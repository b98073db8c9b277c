//! Configuration loading.
//!
//! Sources, lowest priority first:
//! 1. Built-in defaults
//! 2. `$XDG_CONFIG_HOME/dockside/config.toml` (or the path given with `--config`)
//! 3. `DOCKSIDE__<SECTION>__<KEY>` environment variables; list keys such as
//!    `DOCKSIDE__CONTAINER__SHELL` take comma-separated values

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::engine::{EngineRuntime, RuntimeType};
use crate::image::ImageReference;

pub const APP_NAME: &str = "dockside";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub image: ImageConfig,
    pub container: ContainerConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

/// Which engine CLI to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeChoice {
    /// Docker if installed, else Podman.
    #[default]
    Auto,
    Docker,
    Podman,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub runtime: RuntimeChoice,
    /// Explicit path to the engine binary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub repository: String,
    pub tag: String,
    /// Pull the image before every session.
    pub pull: bool,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            repository: "cs50/cli".to_string(),
            tag: "latest".to_string(),
            pull: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Where the target directory is mounted; also the working directory.
    pub workspace: String,
    /// Home directory of the container user, for auxiliary mounts.
    pub home: String,
    /// Login shell started for the user.
    pub shell: Vec<String>,
    /// Main process that keeps a new container alive.
    pub command: Vec<String>,
    pub security_opts: Vec<String>,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            workspace: "/home/ubuntu/workspace".to_string(),
            home: "/home/ubuntu".to_string(),
            shell: vec!["bash".to_string(), "--login".to_string()],
            command: vec!["sleep".to_string(), "infinity".to_string()],
            security_opts: vec!["seccomp=unconfined".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Stop a container this session created when interrupted.
    pub stop_on_interrupt: bool,
    /// Seconds `stop` waits before killing the container.
    pub stop_timeout: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stop_on_interrupt: true,
            stop_timeout: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl AppConfig {
    /// Load the layered configuration. An explicit `path` must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, environment())
    }

    fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self> {
        let (file, required) = match path {
            Some(path) => (expand_path(path)?, true),
            None => (default_config_dir()?.join("config.toml"), false),
        };

        // Defaults come from the serde(default) impls below.
        let built = Config::builder()
            .add_source(
                File::from(file.as_path())
                    .format(FileFormat::Toml)
                    .required(required),
            )
            .add_source(env)
            .build()
            .with_context(|| format!("loading configuration from {}", file.display()))?;

        let config: Self = built
            .try_deserialize()
            .context("invalid configuration")?;
        Ok(config)
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("serializing configuration to TOML")
    }

    /// Image selected by the configuration, with an optional tag override.
    pub fn image_reference(&self, tag: Option<&str>) -> Result<ImageReference> {
        let tag = tag.unwrap_or(&self.image.tag);
        ImageReference::new(self.image.repository.clone(), tag)
            .with_context(|| format!("invalid image {}:{}", self.image.repository, tag))
    }

    /// Build the engine gateway this configuration asks for.
    pub fn engine_runtime(&self) -> Result<EngineRuntime> {
        let runtime = match (self.engine.runtime, &self.engine.binary) {
            (RuntimeChoice::Auto, None) => EngineRuntime::detect(),
            (choice, Some(binary)) => {
                let kind = match choice {
                    RuntimeChoice::Podman => RuntimeType::Podman,
                    _ => RuntimeType::Docker,
                };
                let binary = expand_str_path(binary)?;
                EngineRuntime::with_binary(kind, binary.display().to_string())
            }
            (RuntimeChoice::Docker, None) => EngineRuntime::with_type(RuntimeType::Docker),
            (RuntimeChoice::Podman, None) => EngineRuntime::with_type(RuntimeType::Podman),
        };
        Ok(runtime)
    }
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    if let Some(text) = path.to_str() {
        expand_str_path(text)
    } else {
        Ok(path.to_path_buf())
    }
}

fn expand_str_path(text: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(text).context("expanding path")?;
    Ok(PathBuf::from(expanded.to_string()))
}

/// Directory holding `config.toml`.
pub fn default_config_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir).join(APP_NAME));
    }

    if let Some(dir) = dirs::config_dir() {
        return Ok(dir.join(APP_NAME));
    }

    dirs::home_dir()
        .map(|home| home.join(".config").join(APP_NAME))
        .ok_or_else(|| anyhow!("unable to determine configuration directory"))
}

/// `DOCKSIDE__SECTION__KEY` overrides. List keys take comma-separated values.
fn environment() -> Environment {
    Environment::with_prefix(&env_prefix())
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("container.shell")
        .with_list_parse_key("container.command")
        .with_list_parse_key("container.security_opts")
}

fn env_prefix() -> String {
    APP_NAME
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
