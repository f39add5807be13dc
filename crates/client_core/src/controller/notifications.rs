//! Keyed transient notifications.
//!
//! A notification posted under a key replaces whatever was shown for that key,
//! so a pending "saving" message turns into its success or failure in place.

use chrono::{DateTime, Duration, Utc};
use shared::domain::TaskId;

pub const DEFAULT_NOTIFICATION_TTL_MS: i64 = 3_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKey {
    Load,
    Create,
    Toggle(TaskId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub key: NotificationKey,
    pub level: NotificationLevel,
    pub message: String,
    pub posted_at: DateTime<Utc>,
}

impl Notification {
    /// Loading entries stay until replaced.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.level != NotificationLevel::Loading && now - self.posted_at >= ttl
    }
}

#[derive(Debug, Clone)]
pub struct NotificationCenter {
    ttl: Duration,
    entries: Vec<Notification>,
    outbox: Vec<Notification>,
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(Duration::milliseconds(DEFAULT_NOTIFICATION_TTL_MS))
    }
}

impl NotificationCenter {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Vec::new(),
            outbox: Vec::new(),
        }
    }

    pub fn post(
        &mut self,
        key: NotificationKey,
        level: NotificationLevel,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) {
        let notification = Notification {
            key,
            level,
            message: message.into(),
            posted_at: now,
        };
        self.entries.retain(|entry| entry.key != key);
        self.entries.push(notification.clone());
        self.outbox.push(notification);
    }

    pub fn dismiss(&mut self, key: NotificationKey) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.key != key);
        self.entries.len() != before
    }

    pub fn get(&self, key: NotificationKey) -> Option<&Notification> {
        self.entries.iter().find(|entry| entry.key == key)
    }

    pub fn active(&self, now: DateTime<Utc>) -> impl Iterator<Item = &Notification> + '_ {
        let ttl = self.ttl;
        self.entries
            .iter()
            .filter(move |entry| !entry.is_expired(now, ttl))
    }

    /// Drops expired entries and returns how many were removed.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|entry| !entry.is_expired(now, ttl));
        before - self.entries.len()
    }

    /// Notifications posted since the last drain, in posting order.
    pub fn drain_posted(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.outbox)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
