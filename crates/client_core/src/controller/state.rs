//! Reducer-style view state for the paginated task list.
//!
//! Every transition is a plain method on [`TaskListState`]; the async
//! controller only brackets remote calls with a `begin_*` / `finish_*` pair.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use shared::{
    domain::{total_pages, PageSize, Task, TaskId, TaskOrder},
    protocol::{NewTaskRecord, TaskPatch, WindowQuery},
};

use super::notifications::{NotificationCenter, NotificationKey, NotificationLevel};
use crate::error::TaskListError;

/// Sequence number of a page load. Only the latest one may touch the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LoadTicket(u64);

impl LoadTicket {
    pub fn value(self) -> u64 {
        self.0
    }

    fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadRequest {
    pub ticket: LoadTicket,
    pub page: u32,
    pub page_size: PageSize,
    pub window: WindowQuery,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageData {
    pub items: Vec<Task>,
    pub total_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied {
        page: u32,
        item_count: usize,
        total_count: u64,
    },
    /// A newer load was issued before this one completed.
    Discarded { ticket: LoadTicket },
}

#[derive(Debug, Clone)]
pub struct TaskListState {
    items: Vec<Task>,
    is_loading: bool,
    current_page: u32,
    page_size: PageSize,
    total_count: u64,
    latest_load: LoadTicket,
    pending_toggles: BTreeSet<TaskId>,
    create_form_open: bool,
    notifications: NotificationCenter,
}

impl Default for TaskListState {
    fn default() -> Self {
        Self::new(PageSize::default(), NotificationCenter::default())
    }
}

impl TaskListState {
    pub fn new(page_size: PageSize, notifications: NotificationCenter) -> Self {
        Self {
            items: Vec::new(),
            is_loading: false,
            current_page: 1,
            page_size,
            total_count: 0,
            latest_load: LoadTicket::default(),
            pending_toggles: BTreeSet::new(),
            create_form_open: false,
            notifications,
        }
    }

    pub fn items(&self) -> &[Task] {
        &self.items
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn page_size(&self) -> PageSize {
        self.page_size
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn latest_load(&self) -> LoadTicket {
        self.latest_load
    }

    pub fn is_toggle_pending(&self, id: TaskId) -> bool {
        self.pending_toggles.contains(&id)
    }

    pub fn create_form_open(&self) -> bool {
        self.create_form_open
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    pub fn notifications_mut(&mut self) -> &mut NotificationCenter {
        &mut self.notifications
    }

    pub fn completed_count(&self) -> usize {
        self.items.iter().filter(|task| task.completed).count()
    }

    /// Open tasks across the row set: the service total less what this page
    /// shows as completed.
    pub fn remaining_count(&self) -> u64 {
        self.total_count
            .saturating_sub(self.completed_count() as u64)
    }

    pub fn total_pages(&self) -> u32 {
        total_pages(self.total_count, self.page_size)
    }

    /// Moves back one page. Returns `false` when already on the first page.
    pub fn previous_page(&mut self) -> bool {
        if self.current_page <= 1 {
            self.current_page = 1;
            return false;
        }
        self.current_page -= 1;
        true
    }

    /// Moves forward one page. Returns `false` when already on the last page.
    pub fn next_page(&mut self) -> bool {
        let last = self.total_pages();
        if self.current_page >= last {
            return false;
        }
        self.current_page += 1;
        true
    }

    /// Switches page size; the view always restarts at page 1.
    pub fn set_page_size(&mut self, page_size: PageSize) {
        self.page_size = page_size;
        self.current_page = 1;
    }

    pub fn open_create_form(&mut self) {
        self.create_form_open = true;
    }

    pub fn cancel_create_form(&mut self) {
        self.create_form_open = false;
    }

    pub fn begin_load(&mut self, page: u32, page_size: PageSize, order: TaskOrder) -> LoadRequest {
        let page = page.max(1);
        self.latest_load = self.latest_load.next();
        self.current_page = page;
        self.page_size = page_size;
        self.is_loading = true;
        LoadRequest {
            ticket: self.latest_load,
            page,
            page_size,
            window: WindowQuery::for_page(order, page, page_size),
        }
    }

    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<PageData, TaskListError>,
        now: DateTime<Utc>,
    ) -> Result<LoadOutcome, TaskListError> {
        if ticket != self.latest_load {
            return Ok(LoadOutcome::Discarded { ticket });
        }
        self.is_loading = false;

        match result {
            Ok(PageData {
                mut items,
                total_count,
            }) => {
                items.truncate(self.page_size.get() as usize);
                self.items = items;
                self.total_count = total_count;
                self.notifications.dismiss(NotificationKey::Load);
                Ok(LoadOutcome::Applied {
                    page: self.current_page,
                    item_count: self.items.len(),
                    total_count,
                })
            }
            Err(err) => {
                self.notifications.post(
                    NotificationKey::Load,
                    NotificationLevel::Error,
                    format!("Failed to load tasks: {}", err.detail()),
                    now,
                );
                Err(err)
            }
        }
    }

    /// Validates the title and builds the insert record.
    pub fn begin_create(
        &mut self,
        raw_title: &str,
        now: DateTime<Utc>,
    ) -> Result<NewTaskRecord, TaskListError> {
        let title = raw_title.trim();
        if title.is_empty() {
            let err = TaskListError::Validation("Task title cannot be empty".to_string());
            self.notifications.post(
                NotificationKey::Create,
                NotificationLevel::Error,
                err.detail(),
                now,
            );
            return Err(err);
        }

        self.notifications.post(
            NotificationKey::Create,
            NotificationLevel::Loading,
            "Creating task...",
            now,
        );
        Ok(NewTaskRecord::open(title, now))
    }

    pub fn finish_create(
        &mut self,
        result: Result<Task, TaskListError>,
        now: DateTime<Utc>,
    ) -> Result<Task, TaskListError> {
        match result {
            Ok(task) => {
                self.items.push(task.clone());
                self.total_count += 1;
                self.create_form_open = false;
                self.notifications.post(
                    NotificationKey::Create,
                    NotificationLevel::Success,
                    "Task created",
                    now,
                );
                Ok(task)
            }
            Err(err) => {
                self.notifications.post(
                    NotificationKey::Create,
                    NotificationLevel::Error,
                    format!("Failed to create task: {}", err.detail()),
                    now,
                );
                Err(err)
            }
        }
    }

    /// Marks the row pending and returns the patch to send. The local item is
    /// not flipped until the service confirms.
    pub fn begin_toggle(
        &mut self,
        id: TaskId,
        now: DateTime<Utc>,
    ) -> Result<TaskPatch, TaskListError> {
        let task = self
            .items
            .iter()
            .find(|task| task.id == id)
            .ok_or(TaskListError::UnknownTask(id))?;
        if self.pending_toggles.contains(&id) {
            return Err(TaskListError::ToggleInFlight(id));
        }

        let patch = TaskPatch {
            completed: !task.completed,
            updated_at: next_write_timestamp(task.updated_at, now),
        };
        self.pending_toggles.insert(id);
        self.notifications.post(
            NotificationKey::Toggle(id),
            NotificationLevel::Loading,
            "Updating task...",
            now,
        );
        Ok(patch)
    }

    /// Applies a confirmed toggle. Returns the patched row, or `None` when the
    /// row left the page while the update was in flight.
    pub fn finish_toggle(
        &mut self,
        id: TaskId,
        patch: TaskPatch,
        result: Result<(), TaskListError>,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>, TaskListError> {
        self.pending_toggles.remove(&id);

        if let Err(err) = result {
            self.notifications.post(
                NotificationKey::Toggle(id),
                NotificationLevel::Error,
                format!("Failed to update task: {}", err.detail()),
                now,
            );
            return Err(err);
        }

        let message = if patch.completed {
            "Task marked as done"
        } else {
            "Task marked as not done"
        };
        self.notifications.post(
            NotificationKey::Toggle(id),
            NotificationLevel::Success,
            message,
            now,
        );

        let patched = self.items.iter_mut().find(|task| task.id == id).map(|task| {
            task.completed = patch.completed;
            task.updated_at = patch.updated_at;
            task.clone()
        });
        Ok(patched)
    }
}

/// Timestamp for a write that must sort after `previous`.
pub fn next_write_timestamp(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    now.max(previous + Duration::milliseconds(1))
}

#[cfg(test)]
#[path = "../tests/state_tests.rs"]
mod tests;
