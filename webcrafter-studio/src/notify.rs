//! Transient notifications ("toasts"), dismissed automatically after a TTL.

use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

pub const DEFAULT_NOTIFICATION_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub level: Level,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Active notifications plus a feed every new one is published on.
pub struct Notifier {
    ttl: Duration,
    active: Vec<(Instant, Notification)>,
    feed: broadcast::Sender<Notification>,
}

impl Notifier {
    pub fn new(ttl: Duration) -> Self {
        let (feed, _) = broadcast::channel(64);
        Self {
            ttl,
            active: Vec::new(),
            feed,
        }
    }

    /// Stream of notifications pushed after subscribing.
    pub fn subscribe(&self) -> BroadcastStream<Notification> {
        BroadcastStream::new(self.feed.subscribe())
    }

    pub fn push(&mut self, level: Level, message: impl Into<String>, now: Instant) -> Uuid {
        let notification = Notification {
            id: Uuid::new_v4(),
            level,
            message: message.into(),
            created_at: Utc::now(),
        };
        let id = notification.id;
        match level {
            Level::Error => tracing::warn!(message = %notification.message, "notification"),
            _ => tracing::info!(message = %notification.message, "notification"),
        }
        // No subscribers is fine.
        let _ = self.feed.send(notification.clone());
        self.active.push((now + self.ttl, notification));
        id
    }

    pub fn info(&mut self, message: impl Into<String>, now: Instant) -> Uuid {
        self.push(Level::Info, message, now)
    }

    pub fn success(&mut self, message: impl Into<String>, now: Instant) -> Uuid {
        self.push(Level::Success, message, now)
    }

    pub fn error(&mut self, message: impl Into<String>, now: Instant) -> Uuid {
        self.push(Level::Error, message, now)
    }

    pub fn dismiss(&mut self, id: Uuid) -> bool {
        let before = self.active.len();
        self.active.retain(|(_, n)| n.id != id);
        self.active.len() != before
    }

    /// Drops expired notifications; returns how many went.
    pub fn prune(&mut self, now: Instant) -> usize {
        let before = self.active.len();
        self.active.retain(|(expires, _)| *expires > now);
        before - self.active.len()
    }

    pub fn active(&self) -> impl Iterator<Item = &Notification> {
        self.active.iter().map(|(_, n)| n)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.active.iter().map(|(expires, _)| *expires).min()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_TTL)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
