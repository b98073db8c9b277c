//! Host directory and auxiliary mount resolution.
//!
//! Everything here touches only the local filesystem. A session resolves its
//! bindings before the first engine call so bad input never reaches the engine.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::engine::VolumeMount;

/// Errors raised while resolving mounts.
#[derive(Debug, Error)]
pub enum BindingError {
    /// The target directory is missing or unusable.
    #[error("{}: {reason}", path.display())]
    InvalidDirectory { path: PathBuf, reason: String },

    /// A requested auxiliary mount has no source on the host.
    #[error("{}: no such {}", path.display(), kind.expected())]
    MissingAuxiliarySource { kind: AuxiliaryKind, path: PathBuf },
}

/// Host directory mounted as the container workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryBinding {
    host_path: String,
    mount_point: String,
}

impl DirectoryBinding {
    /// Canonical absolute host path.
    pub fn host_path(&self) -> &str {
        &self.host_path
    }

    /// Where the directory appears inside the container.
    pub fn mount_point(&self) -> &str {
        &self.mount_point
    }

    pub fn to_volume(&self) -> VolumeMount {
        VolumeMount::new(self.host_path.clone(), self.mount_point.clone())
    }
}

/// Optional extra mounts taken from the user's home directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuxiliaryKind {
    /// `~/.gitconfig`
    GitConfig,
    /// `~/.ssh`
    SshKeys,
}

impl AuxiliaryKind {
    /// Name of the entry under both the host and the container home.
    pub fn entry(&self) -> &'static str {
        match self {
            AuxiliaryKind::GitConfig => ".gitconfig",
            AuxiliaryKind::SshKeys => ".ssh",
        }
    }

    fn expected(&self) -> &'static str {
        match self {
            AuxiliaryKind::GitConfig => "file",
            AuxiliaryKind::SshKeys => "directory",
        }
    }

    fn is_present(&self, path: &Path) -> bool {
        match self {
            AuxiliaryKind::GitConfig => path.is_file(),
            AuxiliaryKind::SshKeys => path.is_dir(),
        }
    }
}

impl fmt::Display for AuxiliaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuxiliaryKind::GitConfig => f.write_str("git config"),
            AuxiliaryKind::SshKeys => f.write_str("ssh keys"),
        }
    }
}

/// A validated extra bind mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxiliaryMount {
    pub kind: AuxiliaryKind,
    pub host_source: String,
    pub container_target: String,
    pub read_only: bool,
}

impl AuxiliaryMount {
    pub fn to_volume(&self) -> VolumeMount {
        let mount = VolumeMount::new(self.host_source.clone(), self.container_target.clone());
        if self.read_only {
            mount.read_only()
        } else {
            mount
        }
    }
}

/// Resolves host paths into bindings.
#[derive(Debug, Clone)]
pub struct BindingResolver {
    /// The invoking user's home directory.
    home: PathBuf,
    /// Home directory inside the container.
    container_home: String,
    /// Fixed workspace mount point inside the container.
    workspace: String,
}

impl BindingResolver {
    pub fn new(
        home: impl Into<PathBuf>,
        container_home: impl Into<String>,
        workspace: impl Into<String>,
    ) -> Self {
        Self {
            home: home.into(),
            container_home: container_home.into(),
            workspace: workspace.into(),
        }
    }

    /// Canonicalize `path` into the session's workspace binding.
    pub fn resolve(&self, path: &Path) -> Result<DirectoryBinding, BindingError> {
        let invalid = |reason: &str| BindingError::InvalidDirectory {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        let canonical = path
            .canonicalize()
            .map_err(|_| invalid("no such directory"))?;
        if !canonical.is_dir() {
            return Err(invalid("not a directory"));
        }
        let host_path = canonical
            .to_str()
            .ok_or_else(|| invalid("path is not valid UTF-8"))?
            .to_string();

        Ok(DirectoryBinding {
            host_path,
            mount_point: self.workspace.clone(),
        })
    }

    /// Locate the host source for `kind`. Returns `None` when not requested.
    pub fn resolve_auxiliary(
        &self,
        kind: AuxiliaryKind,
        enabled: bool,
    ) -> Result<Option<AuxiliaryMount>, BindingError> {
        if !enabled {
            return Ok(None);
        }

        let path = self.home.join(kind.entry());
        let missing = || BindingError::MissingAuxiliarySource {
            kind,
            path: path.clone(),
        };
        if !kind.is_present(&path) {
            return Err(missing());
        }
        let host_source = path.to_str().ok_or_else(missing)?.to_string();

        Ok(Some(AuxiliaryMount {
            kind,
            host_source,
            container_target: format!(
                "{}/{}",
                self.container_home.trim_end_matches('/'),
                kind.entry()
            ),
            read_only: true,
        }))
    }
}
