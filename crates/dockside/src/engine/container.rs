//! Container handles and listing filters.

use std::fmt;

/// A container known to the engine, either discovered through `ps` or just
/// created through `run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    /// Container ID as printed by the engine.
    pub id: String,
    /// Image reference the container was started from.
    pub image: String,
    /// Human-readable age (e.g. "2 hours ago"). Empty for fresh containers.
    pub running_for: String,
    /// Status string (e.g. "Up 2 hours", "Exited (0) 5 minutes ago").
    pub status: String,
}

impl ContainerHandle {
    /// Handle for a container that `run` just started.
    pub fn created(id: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            image: image.into(),
            running_for: String::new(),
            status: "Up".to_string(),
        }
    }

    /// Whether the engine reports the container as running.
    pub fn is_running(&self) -> bool {
        self.status.starts_with("Up")
    }
}

impl fmt::Display for ContainerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Filter applied to `ps`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    /// Only containers with this host path mounted.
    pub volume: Option<String>,
    /// Include stopped containers.
    pub all: bool,
}

impl ListFilter {
    /// Every container, running or not, that mounts `host_path`.
    pub fn volume(host_path: impl Into<String>) -> Self {
        Self {
            volume: Some(host_path.into()),
            all: true,
        }
    }

    pub(crate) fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.all {
            args.push("--all".to_string());
        }
        if let Some(ref volume) = self.volume {
            args.push("--filter".to_string());
            args.push(format!("volume={volume}"));
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_running_checks_status_prefix() {
        let mut handle = ContainerHandle::created("abc123", "team/dev:latest");
        assert!(handle.is_running());

        handle.status = "Exited (0) 3 minutes ago".to_string();
        assert!(!handle.is_running());

        handle.status = "Up 2 hours (Paused)".to_string();
        assert!(handle.is_running());
    }

    #[test]
    fn test_volume_filter_args() {
        assert_eq!(
            ListFilter::volume("/work").to_args(),
            vec!["--all", "--filter", "volume=/work"]
        );
        assert!(ListFilter::default().to_args().is_empty());
    }
}
