//! User-facing notifications and the internal event bus.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::{error, info};

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: u64,
    pub kind: NotificationKind,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub at: DateTime<Utc>,
}

/// Cross-store events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    DepositSuccess { id: u64 },
}

/// Keeps the most recent notifications and fans them out to subscribers.
pub struct Notifier {
    recent: Mutex<VecDeque<Notification>>,
    capacity: usize,
    next_id: AtomicU64,
    notifications: broadcast::Sender<Notification>,
    events: broadcast::Sender<Event>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (notifications, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (events, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            recent: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            next_id: AtomicU64::new(1),
            notifications,
            events,
        }
    }

    pub fn info(&self, title: &str, message: Option<String>) {
        info!(title, "Notification");
        self.push(NotificationKind::Info, title, message);
    }

    pub fn success(&self, title: &str, message: Option<String>) {
        info!(title, message = message.as_deref().unwrap_or(""), "Notification");
        self.push(NotificationKind::Success, title, message);
    }

    pub fn error(&self, title: &str) {
        error!(title, "Notification");
        self.push(NotificationKind::Error, title, None);
    }

    /// Newest last.
    pub fn recent(&self) -> Vec<Notification> {
        self.recent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    pub fn emit(&self, event: Event) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    fn push(&self, kind: NotificationKind, title: &str, message: Option<String>) {
        let notification = Notification {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            kind,
            title: title.to_string(),
            message,
            at: Utc::now(),
        };
        {
            let mut recent = self.recent.lock().unwrap_or_else(|e| e.into_inner());
            if recent.len() == self.capacity {
                recent.pop_front();
            }
            recent.push_back(notification.clone());
        }
        let _ = self.notifications.send(notification);
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(50)
    }
}
