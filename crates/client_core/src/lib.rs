use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{
    domain::{Task, TaskId},
    error::{ErrorCode, ServiceError},
    protocol::{NewTaskRecord, TaskPatch, WindowQuery},
};

pub mod config;
pub mod controller;
pub mod error;
pub mod rest;

pub use controller::{
    notifications::{Notification, NotificationCenter, NotificationKey, NotificationLevel},
    state::{LoadOutcome, LoadTicket, TaskListState},
    ControllerEvent, ControllerOptions, PaginatedTaskListController,
};
pub use error::{Operation, TaskListError};
pub use rest::RestDataService;

/// Contract of the hosted relational data service.
///
/// Row sets are named collections: reads go to a view, writes to the base
/// table. Every call is fallible and the error detail is opaque text.
#[async_trait]
pub trait DataService: Send + Sync {
    /// Exact number of rows in `row_set`.
    async fn count(&self, row_set: &str) -> Result<u64, ServiceError>;
    /// Ordered window of `row_set`.
    async fn query(&self, row_set: &str, window: &WindowQuery) -> Result<Vec<Task>, ServiceError>;
    /// Inserts a record and returns it with the service-assigned id.
    async fn insert(&self, row_set: &str, record: &NewTaskRecord) -> Result<Task, ServiceError>;
    async fn update(&self, row_set: &str, id: TaskId, patch: &TaskPatch)
        -> Result<(), ServiceError>;
}

pub struct MissingDataService;

#[async_trait]
impl DataService for MissingDataService {
    async fn count(&self, row_set: &str) -> Result<u64, ServiceError> {
        Err(unavailable(row_set))
    }

    async fn query(&self, row_set: &str, _window: &WindowQuery) -> Result<Vec<Task>, ServiceError> {
        Err(unavailable(row_set))
    }

    async fn insert(&self, row_set: &str, _record: &NewTaskRecord) -> Result<Task, ServiceError> {
        Err(unavailable(row_set))
    }

    async fn update(
        &self,
        row_set: &str,
        _id: TaskId,
        _patch: &TaskPatch,
    ) -> Result<(), ServiceError> {
        Err(unavailable(row_set))
    }
}

fn unavailable(row_set: &str) -> ServiceError {
    ServiceError::new(
        ErrorCode::Transport,
        format!("data service unavailable for row set {row_set}"),
    )
}

/// Source of client-side write timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
