use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{PageSize, TaskOrder};

/// Record sent when inserting a task; the service assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTaskRecord {
    pub title: String,
    pub completed: bool,
    pub updated_at: DateTime<Utc>,
}

impl NewTaskRecord {
    pub fn open(title: impl Into<String>, updated_at: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            completed: false,
            updated_at,
        }
    }
}

/// Partial update applied to a single task row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    pub completed: bool,
    pub updated_at: DateTime<Utc>,
}

/// Ordered, bounded slice of a row set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowQuery {
    pub order: TaskOrder,
    pub offset: u64,
    pub limit: u32,
}

impl WindowQuery {
    /// Window for a 1-based page; page 0 is treated as page 1.
    pub fn for_page(order: TaskOrder, page: u32, page_size: PageSize) -> Self {
        let page = page.max(1);
        Self {
            order,
            offset: u64::from(page - 1) * u64::from(page_size.get()),
            limit: page_size.get(),
        }
    }
}
