use std::time::Duration;

use thiserror::Error;

use crate::field::{FieldErrors, FieldKey};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure of a single task. Carried per field; never retried by the resolver.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("{context}")]
    Call {
        context: String,
        #[source]
        source: BoxError,
    },

    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Other(String),
}

impl TaskError {
    /// Wrap a remote call failure with a human-readable context line,
    /// e.g. `"retrieving minipool status"`.
    pub fn call(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Call {
            context: context.into(),
            source: source.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("task set is empty")]
    EmptyTaskSet,

    #[error("field {0} has more than one task")]
    DuplicateField(FieldKey),

    #[error("resolving field {field} ({task})")]
    Task {
        field: FieldKey,
        task: String,
        #[source]
        source: TaskError,
    },

    #[error("resolution timed out after {after:?} with {} field(s) pending", pending.len())]
    Timeout {
        after: Duration,
        pending: Vec<FieldKey>,
    },

    #[error("{0}")]
    Partial(FieldErrors),

    #[error("worker exited without reporting ({received} of {expected} completions)")]
    WorkerLost { received: usize, expected: usize },
}

impl ResolveError {
    /// Field responsible for the failure, when there is exactly one.
    pub fn field(&self) -> Option<FieldKey> {
        match self {
            Self::Task { field, .. } | Self::DuplicateField(field) => Some(*field),
            _ => None,
        }
    }
}
