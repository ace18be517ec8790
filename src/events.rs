//! Application events for the presentation layer.
//!
//! Everything the UI needs to react to (notifications, list changes, the
//! quote being shown, conflicts awaiting review) goes through [`EventBus`],
//! a tokio broadcast channel. Publishing never blocks and never fails when
//! nobody is listening.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::quotes::Quote;
use crate::sync::ConflictRecord;

/// How long a notification stays visible.
pub const DEFAULT_NOTIFICATION_TIMEOUT: Duration = Duration::from_millis(4000);

/// Notification severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Success => write!(f, "success"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A user-facing message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
            created_at: Utc::now(),
        }
    }
}

/// Events published to subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    Notification(Notification),
    /// The quote list changed; `categories` is the refreshed chooser content
    /// and `visible` the number of quotes the current filter selects.
    QuotesChanged {
        categories: Vec<String>,
        selected: String,
        visible: usize,
    },
    QuoteShown(Quote),
    ConflictsDetected {
        conflicts: Vec<ConflictRecord>,
    },
}

impl AppEvent {
    fn kind(&self) -> &'static str {
        match self {
            AppEvent::Notification(_) => "notification",
            AppEvent::QuotesChanged { .. } => "quotes_changed",
            AppEvent::QuoteShown(_) => "quote_shown",
            AppEvent::ConflictsDetected { .. } => "conflicts_detected",
        }
    }
}

/// Fan-out of [`AppEvent`]s to every subscriber.
pub struct EventBus {
    sender: broadcast::Sender<AppEvent>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn emit(&self, event: AppEvent) {
        let kind = event.kind();
        match self.sender.send(event) {
            Ok(n) => tracing::trace!("Event emitted: {} ({} receivers)", kind, n),
            Err(_) => tracing::trace!("Event emitted: {} (no receivers)", kind),
        }
    }

    /// Shorthand for emitting a [`Notification`].
    pub fn notify(&self, message: impl Into<String>, severity: Severity) {
        let notification = Notification::new(message, severity);
        match severity {
            Severity::Error => tracing::warn!("{}", notification.message),
            _ => tracing::debug!("[{}] {}", severity, notification.message),
        }
        self.emit(AppEvent::Notification(notification));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Single visible notification that dismisses itself after a timeout.
///
/// Showing a new notification replaces the current one.
pub struct NotificationSlot {
    timeout: Duration,
    current: Option<(Notification, Instant)>,
}

impl NotificationSlot {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            current: None,
        }
    }

    pub fn show(&mut self, notification: Notification) {
        self.show_at(notification, Instant::now());
    }

    pub fn show_at(&mut self, notification: Notification, now: Instant) {
        self.current = Some((notification, now));
    }

    pub fn current(&mut self) -> Option<&Notification> {
        self.current_at(Instant::now())
    }

    /// The visible notification at `now`, clearing it once expired.
    pub fn current_at(&mut self, now: Instant) -> Option<&Notification> {
        let expired = matches!(
            &self.current,
            Some((_, shown_at)) if now.saturating_duration_since(*shown_at) >= self.timeout
        );
        if expired {
            self.current = None;
        }
        self.current.as_ref().map(|(notification, _)| notification)
    }
}

impl Default for NotificationSlot {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_bus_no_subscribers() {
        let bus = EventBus::new(8);
        bus.notify("nobody listening", Severity::Info);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_event_bus_with_subscriber() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.notify("Quotes synced with server.", Severity::Success);
        match rx.try_recv().unwrap() {
            AppEvent::Notification(n) => {
                assert_eq!(n.severity, Severity::Success);
                assert_eq!(n.message, "Quotes synced with server.");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_event_serialization() {
        let event = AppEvent::Notification(Notification::new("hi", Severity::Warning));
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"notification\""));
        assert!(json.contains("\"severity\":\"warning\""));
        assert!(json.contains("\"createdAt\""));
    }

    #[test]
    fn test_notification_slot_auto_dismisses() {
        let mut slot = NotificationSlot::new(Duration::from_secs(4));
        let start = Instant::now();
        slot.show_at(Notification::new("saved", Severity::Success), start);

        assert!(slot.current_at(start + Duration::from_secs(3)).is_some());
        assert!(slot.current_at(start + Duration::from_secs(4)).is_none());
        assert!(slot.current_at(start).is_none());
    }

    #[test]
    fn test_notification_slot_replaces_current() {
        let mut slot = NotificationSlot::default();
        let start = Instant::now();
        slot.show_at(Notification::new("first", Severity::Info), start);
        slot.show_at(
            Notification::new("second", Severity::Error),
            start + Duration::from_secs(3),
        );

        let current = slot.current_at(start + Duration::from_secs(5)).unwrap();
        assert_eq!(current.message, "second");
    }
}
