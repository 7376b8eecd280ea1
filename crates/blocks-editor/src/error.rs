use thiserror::Error;

use crate::path::Path;

/// Fatal at composition time: the plugin set cannot be combined.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("plugin `{plugin}` registers element handler `{tag}` already registered by `{previous}`")]
    DuplicateElement {
        tag: String,
        plugin: String,
        previous: String,
    },
    #[error("plugin `{plugin}` registers node spec `{tag}` already registered by `{previous}`")]
    DuplicateNodeSpec {
        tag: String,
        plugin: String,
        previous: String,
    },
    #[error("node type `{0}` has no markup mapping")]
    UnmappedNodeType(String),
}

/// The normalization rule set failed to converge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("normalization did not converge after {iterations} iterations (last path {path:?})")]
pub struct NormalizationViolation {
    pub iterations: usize,
    pub path: Path,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditorError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Normalization(#[from] NormalizationViolation),
    #[error("invalid reference to path {path:?}: {reason}")]
    InvalidReference { path: Path, reason: String },
    #[error("no pending dialog with id {0}")]
    UnknownDialog(u64),
}

impl EditorError {
    pub fn invalid_reference(path: &[usize], reason: impl Into<String>) -> Self {
        EditorError::InvalidReference {
            path: path.to_vec(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EditorError>;
