use std::fmt;

use shared::{domain::TaskId, error::ServiceError};
use thiserror::Error;

/// Remote call that produced a [`ServiceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Count,
    Query,
    Insert,
    Update,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Count => "count",
            Operation::Query => "query",
            Operation::Insert => "insert",
            Operation::Update => "update",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskListError {
    #[error("{0}")]
    Validation(String),
    #[error("{operation} failed: {source}")]
    Service {
        operation: Operation,
        #[source]
        source: ServiceError,
    },
    #[error("task {0} is not on the current page")]
    UnknownTask(TaskId),
    #[error("task {0} already has an update in flight")]
    ToggleInFlight(TaskId),
}

impl TaskListError {
    pub fn service(operation: Operation, source: ServiceError) -> Self {
        TaskListError::Service { operation, source }
    }

    /// Text shown to the user; service failures expose only the remote detail.
    pub fn detail(&self) -> String {
        match self {
            TaskListError::Service { source, .. } => source.detail().to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, TaskListError::Validation(_))
    }
}
