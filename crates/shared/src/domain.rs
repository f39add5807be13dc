use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

id_newtype!(TaskId);

/// A task row as mirrored from the remote row set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub completed: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOrder {
    /// Most recently updated first.
    #[default]
    UpdatedAtDesc,
    /// Insertion order.
    IdAsc,
}

impl TaskOrder {
    /// Column and direction in `column.dir` form.
    pub fn as_order_param(&self) -> &'static str {
        match self {
            TaskOrder::UpdatedAtDesc => "updated_at.desc",
            TaskOrder::IdAsc => "id.asc",
        }
    }
}

impl std::str::FromStr for TaskOrder {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "updated_at_desc" | "updated_at.desc" | "recent" => Ok(TaskOrder::UpdatedAtDesc),
            "id_asc" | "id.asc" | "list" => Ok(TaskOrder::IdAsc),
            other => Err(format!("unknown task order '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unsupported page size {0}; expected one of {opts:?}", opts = PageSize::OPTIONS)]
pub struct InvalidPageSize(pub u32);

/// Number of rows per page, restricted to the selectable options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct PageSize(u32);

impl PageSize {
    pub const OPTIONS: [u32; 10] = [
        10, 20, 50, 100, 500, 1_000, 5_000, 10_000, 50_000, 100_000,
    ];

    pub fn new(size: u32) -> Result<Self, InvalidPageSize> {
        if Self::OPTIONS.contains(&size) {
            Ok(Self(size))
        } else {
            Err(InvalidPageSize(size))
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = PageSize> {
        Self::OPTIONS.into_iter().map(PageSize)
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self(50)
    }
}

impl TryFrom<u32> for PageSize {
    type Error = InvalidPageSize;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PageSize> for u32 {
    fn from(value: PageSize) -> Self {
        value.0
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Number of pages needed to show `total_count` rows; never less than one.
pub fn total_pages(total_count: u64, page_size: PageSize) -> u32 {
    let pages = total_count.div_ceil(u64::from(page_size.get())).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}
