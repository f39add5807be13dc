//! Controller layer: owns the task list view state and sequences remote calls.

pub mod notifications;
pub mod state;

use std::sync::Arc;

use chrono::Duration;
use shared::domain::{PageSize, Task, TaskId, TaskOrder};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    error::{Operation, TaskListError},
    Clock, DataService, SystemClock,
};
use notifications::{Notification, NotificationCenter, DEFAULT_NOTIFICATION_TTL_MS};
use state::{LoadOutcome, LoadTicket, PageData, TaskListState};

pub const DEFAULT_READ_ROW_SET: &str = "combined_todos";
pub const DEFAULT_WRITE_ROW_SET: &str = "todos";

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub read_row_set: String,
    pub write_row_set: String,
    pub order: TaskOrder,
    pub page_size: PageSize,
    pub notification_ttl: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            read_row_set: DEFAULT_READ_ROW_SET.to_string(),
            write_row_set: DEFAULT_WRITE_ROW_SET.to_string(),
            order: TaskOrder::default(),
            page_size: PageSize::default(),
            notification_ttl: Duration::milliseconds(DEFAULT_NOTIFICATION_TTL_MS),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ControllerEvent {
    PageLoaded {
        page: u32,
        page_size: PageSize,
        item_count: usize,
        total_count: u64,
    },
    LoadDiscarded {
        ticket: LoadTicket,
    },
    TaskCreated(Task),
    TaskToggled(Task),
    Notified(Notification),
}

pub struct PaginatedTaskListController {
    service: Arc<dyn DataService>,
    clock: Arc<dyn Clock>,
    options: ControllerOptions,
    state: Mutex<TaskListState>,
    events: broadcast::Sender<ControllerEvent>,
}

impl PaginatedTaskListController {
    pub fn new(service: Arc<dyn DataService>, options: ControllerOptions) -> Self {
        Self::new_with_clock(service, Arc::new(SystemClock), options)
    }

    pub fn new_with_clock(
        service: Arc<dyn DataService>,
        clock: Arc<dyn Clock>,
        options: ControllerOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        let state = TaskListState::new(
            options.page_size,
            NotificationCenter::new(options.notification_ttl),
        );
        Self {
            service,
            clock,
            options,
            state: Mutex::new(state),
            events,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    /// Copy of the current view state.
    pub async fn snapshot(&self) -> TaskListState {
        self.state.lock().await.clone()
    }

    pub async fn with_state<R>(&self, f: impl FnOnce(&TaskListState) -> R) -> R {
        let guard = self.state.lock().await;
        f(&guard)
    }

    /// Drops expired notifications; returns how many were removed.
    pub async fn prune_notifications(&self) -> usize {
        let now = self.clock.now();
        self.state.lock().await.notifications_mut().prune(now)
    }

    pub async fn load_page(
        &self,
        page: u32,
        page_size: PageSize,
    ) -> Result<LoadOutcome, TaskListError> {
        let request = {
            let mut state = self.state.lock().await;
            state.begin_load(page, page_size, self.options.order)
        };
        debug!(
            ticket = request.ticket.value(),
            page = request.page,
            page_size = page_size.get(),
            offset = request.window.offset,
            "tasks: loading page"
        );

        // Both requests always go out, even when one of them fails first.
        let row_set = self.options.read_row_set.as_str();
        let (count, query) = futures::join!(
            self.service.count(row_set),
            self.service.query(row_set, &request.window),
        );
        let result = count
            .map_err(|source| TaskListError::service(Operation::Count, source))
            .and_then(|total_count| {
                query
                    .map(|items| PageData { items, total_count })
                    .map_err(|source| TaskListError::service(Operation::Query, source))
            });

        let (outcome, posted) = {
            let mut state = self.state.lock().await;
            let outcome = state.finish_load(request.ticket, result, self.clock.now());
            (outcome, state.notifications_mut().drain_posted())
        };
        self.publish_notifications(posted);

        match &outcome {
            Ok(LoadOutcome::Applied {
                page,
                item_count,
                total_count,
            }) => {
                info!(
                    "tasks: page loaded page={} items={} total={}",
                    page, item_count, total_count
                );
                let _ = self.events.send(ControllerEvent::PageLoaded {
                    page: *page,
                    page_size,
                    item_count: *item_count,
                    total_count: *total_count,
                });
            }
            Ok(LoadOutcome::Discarded { ticket }) => {
                warn!(
                    "tasks: discarded stale page load ticket={} page={}",
                    ticket.value(),
                    request.page
                );
                let _ = self
                    .events
                    .send(ControllerEvent::LoadDiscarded { ticket: *ticket });
            }
            Err(err) => warn!("tasks: page load failed page={}: {err}", request.page),
        }
        outcome
    }

    /// Re-fetches the page currently shown.
    pub async fn reload(&self) -> Result<LoadOutcome, TaskListError> {
        let (page, page_size) = self
            .with_state(|state| (state.current_page(), state.page_size()))
            .await;
        self.load_page(page, page_size).await
    }

    /// Returns `Ok(None)` when already on the last page.
    ///
    /// The new page number is recorded before the load runs and is kept if the
    /// load fails, so `reload` retries the page the user asked for while the
    /// previous items stay visible.
    pub async fn next_page(&self) -> Result<Option<LoadOutcome>, TaskListError> {
        let target = {
            let mut state = self.state.lock().await;
            state
                .next_page()
                .then(|| (state.current_page(), state.page_size()))
        };
        match target {
            Some((page, page_size)) => self.load_page(page, page_size).await.map(Some),
            None => Ok(None),
        }
    }

    /// Returns `Ok(None)` when already on the first page. Failure handling
    /// matches [`Self::next_page`].
    pub async fn previous_page(&self) -> Result<Option<LoadOutcome>, TaskListError> {
        let target = {
            let mut state = self.state.lock().await;
            state
                .previous_page()
                .then(|| (state.current_page(), state.page_size()))
        };
        match target {
            Some((page, page_size)) => self.load_page(page, page_size).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn set_page_size(&self, page_size: PageSize) -> Result<LoadOutcome, TaskListError> {
        let page = {
            let mut state = self.state.lock().await;
            state.set_page_size(page_size);
            state.current_page()
        };
        self.load_page(page, page_size).await
    }

    pub async fn open_create_form(&self) {
        self.state.lock().await.open_create_form();
    }

    pub async fn cancel_create_form(&self) {
        self.state.lock().await.cancel_create_form();
    }

    pub async fn create_task(&self, title: &str) -> Result<Task, TaskListError> {
        let (record, posted) = {
            let mut state = self.state.lock().await;
            let record = state.begin_create(title, self.clock.now());
            (record, state.notifications_mut().drain_posted())
        };
        self.publish_notifications(posted);
        let record = record?;
        debug!(title = %record.title, "tasks: inserting task");

        let result = self
            .service
            .insert(&self.options.write_row_set, &record)
            .await
            .map_err(|source| TaskListError::service(Operation::Insert, source));

        let (outcome, posted) = {
            let mut state = self.state.lock().await;
            let outcome = state.finish_create(result, self.clock.now());
            (outcome, state.notifications_mut().drain_posted())
        };
        self.publish_notifications(posted);

        match &outcome {
            Ok(task) => {
                info!("tasks: created task id={}", task.id);
                let _ = self.events.send(ControllerEvent::TaskCreated(task.clone()));
            }
            Err(err) => warn!("tasks: create failed: {err}"),
        }
        outcome
    }

    /// Flips completion once the service confirms. Returns the patched row, or
    /// `None` if it left the page while the update was in flight.
    pub async fn toggle_complete(&self, id: TaskId) -> Result<Option<Task>, TaskListError> {
        let (patch, posted) = {
            let mut state = self.state.lock().await;
            let patch = state.begin_toggle(id, self.clock.now());
            (patch, state.notifications_mut().drain_posted())
        };
        self.publish_notifications(posted);
        let patch = patch?;
        debug!(
            task_id = id.0,
            completed = patch.completed,
            "tasks: updating completion"
        );

        let result = self
            .service
            .update(&self.options.write_row_set, id, &patch)
            .await
            .map_err(|source| TaskListError::service(Operation::Update, source));

        let (outcome, posted) = {
            let mut state = self.state.lock().await;
            let outcome = state.finish_toggle(id, patch, result, self.clock.now());
            (outcome, state.notifications_mut().drain_posted())
        };
        self.publish_notifications(posted);

        match &outcome {
            Ok(Some(task)) => {
                info!(
                    "tasks: toggled task id={} completed={}",
                    task.id, task.completed
                );
                let _ = self.events.send(ControllerEvent::TaskToggled(task.clone()));
            }
            Ok(None) => debug!("tasks: toggled task id={id} no longer on page"),
            Err(err) => warn!("tasks: toggle failed id={id}: {err}"),
        }
        outcome
    }

    fn publish_notifications(&self, posted: Vec<Notification>) {
        for notification in posted {
            let _ = self.events.send(ControllerEvent::Notified(notification));
        }
    }
}

#[cfg(test)]
#[path = "../tests/controller_tests.rs"]
mod tests;
