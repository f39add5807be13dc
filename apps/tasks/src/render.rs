//! Plain-text rendering of the task list view state.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use client_core::{Notification, NotificationKey, NotificationLevel, TaskListState};
use shared::domain::Task;

pub fn summary_line(state: &TaskListState) -> String {
    format!(
        "Total Items: {}  Completed: {}  Remaining: {}",
        state.total_count(),
        state.completed_count(),
        state.remaining_count()
    )
}

pub fn page_indicator(state: &TaskListState) -> String {
    format!(
        "Page {} of {} ({} per page)",
        state.current_page(),
        state.total_pages(),
        state.page_size()
    )
}

pub fn task_row(task: &Task, pending: bool) -> String {
    let marker = match (pending, task.completed) {
        (true, _) => "[~]",
        (false, true) => "[x]",
        (false, false) => "[ ]",
    };
    format!("{marker} #{:<6} {}", task.id, task.title)
}

pub fn page_view(state: &TaskListState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Todo List");
    let _ = writeln!(out, "{}", summary_line(state));
    if state.is_loading() {
        let _ = writeln!(out, "Loading...");
    }
    if state.items().is_empty() {
        let _ = writeln!(out, "No tasks on this page.");
    }
    for task in state.items() {
        let _ = writeln!(out, "{}", task_row(task, state.is_toggle_pending(task.id)));
    }
    let _ = write!(out, "{}", page_indicator(state));
    out
}

pub fn notification_line(notification: &Notification) -> String {
    let tag = match notification.level {
        NotificationLevel::Loading => "..",
        NotificationLevel::Success => "ok",
        NotificationLevel::Error => "!!",
    };
    format!("[{tag}] {}", notification.message)
}

/// Current notification for each of `keys`, skipping dismissed and expired
/// ones. A key appears at most once since later posts replace earlier ones.
pub fn notification_block(
    state: &TaskListState,
    keys: &[NotificationKey],
    now: DateTime<Utc>,
) -> String {
    state
        .notifications()
        .active(now)
        .filter(|notification| keys.contains(&notification.key))
        .map(notification_line)
        .collect::<Vec<_>>()
        .join("\n")
}
