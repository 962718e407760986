//! Error types for story loading and execution

use crate::labels::EntityKind;
use crate::story::Action;
use archivist_client::ArchivistError;
use std::path::PathBuf;

/// Errors raised while loading or running a story
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// Story file could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Story is not valid YAML, or does not have the step layout
    #[error("story syntax error: {0}")]
    Syntax(#[from] serde_yaml::Error),

    /// Step names an action the runner does not know
    #[error("step {step}: unknown action '{action}'")]
    UnknownAction { step: usize, action: String },

    /// `delete: true` on a step whose entity cannot be deleted
    #[error("step {step}: {action} does not create a deletable entity")]
    NotDeletable { step: usize, action: Action },

    /// Label was never registered by an earlier step
    #[error("unknown label '{0}'")]
    UnknownLabel(String),

    /// Label names an entity of another kind
    #[error("label '{label}' is a {actual}, expected a {expected}")]
    LabelKind {
        label: String,
        expected: EntityKind,
        actual: EntityKind,
    },

    /// Required argument absent
    #[error("step {step}: {action} requires '{argument}'")]
    MissingArgument {
        step: usize,
        action: Action,
        argument: &'static str,
    },

    /// Keyword arguments do not fit the action
    #[error("step {step}: bad arguments for {action}: {source}")]
    InvalidArguments {
        step: usize,
        action: Action,
        #[source]
        source: serde_json::Error,
    },

    /// The service call behind a step failed
    #[error("step {step}: {action} failed: {source}")]
    Step {
        step: usize,
        action: Action,
        #[source]
        source: ArchivistError,
    },

    /// Deferred deletion failed after the last step
    #[error("deleting {identity} failed: {source}")]
    Cleanup {
        identity: String,
        #[source]
        source: ArchivistError,
    },

    /// Response could not be rendered as JSON
    #[error("response encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl RunnerError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Underlying service error, if the failure came from a call
    #[must_use]
    pub fn archivist_error(&self) -> Option<&ArchivistError> {
        match self {
            Self::Step { source, .. } | Self::Cleanup { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type for runner operations
pub type RunnerResult<T> = Result<T, RunnerError>;
