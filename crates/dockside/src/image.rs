//! Image references.

use std::fmt;

use crate::engine::{EngineError, EngineResult, validate_image_name};

/// `repository:tag` pair selecting the development image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    repository: String,
    tag: String,
}

impl ImageReference {
    /// Build and validate a reference.
    pub fn new(repository: impl Into<String>, tag: impl Into<String>) -> EngineResult<Self> {
        let image = Self {
            repository: repository.into(),
            tag: tag.into(),
        };
        validate_image_name(&image.to_string())?;
        if image.repository.is_empty() || image.tag.is_empty() || image.tag.contains('/') {
            return Err(EngineError::InvalidInput(format!(
                "'{image}' is not a repository:tag reference"
            )));
        }
        Ok(image)
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Whether a listed container image refers to this reference exactly.
    pub fn matches(&self, listed: &str) -> bool {
        listed == self.to_string()
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}
