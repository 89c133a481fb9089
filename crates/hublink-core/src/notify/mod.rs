//! Notification hub adapter.
//!
//! Translates the raw `ReceiveNotification` payload into a typed
//! [`Notification`], maintains the persistent notification feed and its
//! unread counter, and pushes styled toasts through the consumer's
//! sink. Also binds the backup lifecycle events, which arrive on the
//! same hub under their own event names.

pub mod category;
pub mod styling;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use indexmap::IndexMap;
use serde_json::Value;

use hublink_client::HubConnection;

use crate::error::CoreError;
use crate::model::{Category, Notification, Priority, Severity};
use crate::toast::{Toast, ToastAction, ToastSink};

pub use category::determine_category;
pub use styling::{severity_for_type, style_for, ToastStyle};

/// Server event carrying a notification record.
pub const RECEIVE_NOTIFICATION: &str = "ReceiveNotification";
/// Backup lifecycle events, pushed on the notification hub.
pub const BACKUP_COMPLETED: &str = "BackupCompleted";
pub const BACKUP_FAILED: &str = "BackupFailed";

// ── Payload normalization ────────────────────────────────────────────

/// Read a field that may arrive in either casing, preferring the
/// lowercase form. Which casing arrives depends on the server-side
/// serialization path.
fn field<'a>(payload: &'a Value, lower: &str, upper: &str) -> Option<&'a Value> {
    payload
        .get(lower)
        .filter(|v| !v.is_null())
        .or_else(|| payload.get(upper).filter(|v| !v.is_null()))
}

fn string_field(payload: &Value, lower: &str, upper: &str) -> Option<String> {
    field(payload, lower, upper)
        .and_then(Value::as_str)
        .map(str::to_owned)
}

impl Notification {
    /// Normalize one raw hub payload into a typed notification.
    ///
    /// Every field degrades gracefully: missing ids get a local one,
    /// unknown numeric types collapse to `Info`, unknown tags land in
    /// the `System` category.
    pub fn from_payload(payload: &Value) -> Self {
        let alert_type = string_field(payload, "alertType", "AlertType").or_else(|| {
            field(payload, "data", "Data")
                .and_then(|data| string_field(data, "alertType", "AlertType"))
        });

        let kind = field(payload, "type", "Type").and_then(Value::as_i64);
        let priority = field(payload, "priority", "Priority")
            .and_then(Priority::from_raw)
            .unwrap_or_default();

        let category = alert_type
            .as_deref()
            .map(determine_category)
            .unwrap_or(Category::System);

        let timestamp = field(payload, "timestamp", "Timestamp")
            .or_else(|| field(payload, "createdAt", "CreatedAt"))
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(Utc::now);

        let id = string_field(payload, "id", "Id")
            .unwrap_or_else(|| format!("local-{}", Utc::now().timestamp_millis()));

        Self {
            id,
            title: string_field(payload, "title", "Title").unwrap_or_default(),
            message: string_field(payload, "message", "Message").unwrap_or_default(),
            severity: severity_for_type(kind.unwrap_or(0)),
            category,
            priority,
            alert_type,
            action_url: string_field(payload, "actionUrl", "ActionUrl"),
            icon: string_field(payload, "icon", "Icon"),
            timestamp,
            read: false,
        }
    }
}

// ── Toast selection ──────────────────────────────────────────────────

/// Decide whether a notification shows a toast, and how it looks.
///
/// Known alert types use their hand-mapped style; unmapped ones only
/// toast at `High` priority or above, with a generic severity-based
/// presentation. Everything else stays feed-only.
pub fn toast_for(notification: &Notification) -> Option<Toast> {
    if let Some(style) = notification.alert_type.as_deref().and_then(style_for) {
        let action = match (style.action_label, &notification.action_url) {
            (Some(label), Some(url)) => Some(ToastAction {
                label: label.to_owned(),
                url: url.clone(),
            }),
            _ => None,
        };
        return Some(Toast {
            severity: style.severity,
            title: notification.title.clone(),
            body: notification.message.clone(),
            icon: Some(style.icon.to_owned()),
            duration: style.duration,
            action,
        });
    }

    if notification.priority >= Priority::High {
        let duration = match notification.severity {
            Severity::Error => Duration::from_secs(10),
            Severity::Warning => Duration::from_secs(8),
            Severity::Info | Severity::Success => Duration::from_secs(6),
        };
        return Some(Toast {
            severity: notification.severity,
            title: notification.title.clone(),
            body: notification.message.clone(),
            icon: notification.icon.clone(),
            duration,
            action: None,
        });
    }

    None
}

// ── Notification feed ────────────────────────────────────────────────

/// Insertion-ordered notification history with an unread counter.
///
/// Keyed by notification id: a redelivery of an id already in the feed
/// is dropped, so the canonical history never duplicates.
#[derive(Debug, Default)]
pub struct NotificationFeed {
    items: IndexMap<String, Notification>,
    unread: usize,
}

impl NotificationFeed {
    /// Append a notification. Returns `false` when the id was already
    /// present (the feed is unchanged).
    pub fn push(&mut self, notification: Notification) -> bool {
        if self.items.contains_key(&notification.id) {
            tracing::debug!(id = %notification.id, "duplicate notification delivery dropped");
            return false;
        }
        if !notification.read {
            self.unread += 1;
        }
        self.items.insert(notification.id.clone(), notification);
        true
    }

    pub fn mark_read(&mut self, id: &str) {
        if let Some(notification) = self.items.get_mut(id) {
            if !notification.read {
                notification.read = true;
                self.unread -= 1;
            }
        }
    }

    pub fn mark_all_read(&mut self) {
        for notification in self.items.values_mut() {
            notification.read = true;
        }
        self.unread = 0;
    }

    pub fn unread_count(&self) -> usize {
        self.unread
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Notifications in delivery order.
    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.items.values()
    }
}

// ── Hub adapter ──────────────────────────────────────────────────────

/// Adapter binding the notification hub's events to the feed and the
/// toast sink.
#[derive(Clone)]
pub struct NotificationHub {
    connection: HubConnection,
    feed: Arc<Mutex<NotificationFeed>>,
    sink: ToastSink,
}

impl NotificationHub {
    pub fn new(connection: HubConnection, sink: ToastSink) -> Self {
        Self {
            connection,
            feed: Arc::new(Mutex::new(NotificationFeed::default())),
            sink,
        }
    }

    pub fn connection(&self) -> &HubConnection {
        &self.connection
    }

    /// Register the hub's event handlers. Call once per adapter; the
    /// registrations survive reconnects.
    pub fn bind(&self) {
        let feed = Arc::clone(&self.feed);
        let sink = Arc::clone(&self.sink);
        self.connection.on(RECEIVE_NOTIFICATION, move |args| {
            let Some(payload) = args.first() else {
                tracing::warn!(event = RECEIVE_NOTIFICATION, "event arrived without a payload");
                return;
            };
            ingest(&feed, &sink, payload);
        });

        for (event, ok) in [(BACKUP_COMPLETED, true), (BACKUP_FAILED, false)] {
            let feed = Arc::clone(&self.feed);
            let sink = Arc::clone(&self.sink);
            self.connection.on(event, move |args| {
                let payload = args.first().cloned().unwrap_or(Value::Null);
                ingest(&feed, &sink, &backup_notification(&payload, ok));
            });
        }
    }

    /// Snapshot of the feed in delivery order.
    pub fn notifications(&self) -> Vec<Notification> {
        lock(&self.feed).iter().cloned().collect()
    }

    pub fn unread_count(&self) -> usize {
        lock(&self.feed).unread_count()
    }

    /// Mark one notification read, locally and on the server.
    pub async fn mark_as_read(&self, id: &str) -> Result<(), CoreError> {
        self.connection
            .invoke("MarkNotificationAsRead", vec![Value::String(id.to_owned())])
            .await?;
        lock(&self.feed).mark_read(id);
        Ok(())
    }

    /// Mark the whole feed read, locally and on the server.
    pub async fn mark_all_as_read(&self) -> Result<(), CoreError> {
        self.connection
            .invoke("MarkAllNotificationsAsRead", vec![])
            .await?;
        lock(&self.feed).mark_all_read();
        Ok(())
    }
}

/// Shared ingest path for every notification-bearing event: normalize,
/// dedupe into the feed, toast only on first delivery.
fn ingest(feed: &Arc<Mutex<NotificationFeed>>, sink: &ToastSink, payload: &Value) {
    let notification = Notification::from_payload(payload);
    let toast = toast_for(&notification);

    tracing::debug!(
        id = %notification.id,
        category = ?notification.category,
        severity = ?notification.severity,
        "notification received"
    );

    let fresh = lock(feed).push(notification);
    if fresh {
        if let Some(toast) = toast {
            sink(toast);
        }
    }
}

/// Shape a backup lifecycle event like a regular notification payload.
fn backup_notification(payload: &Value, completed: bool) -> Value {
    let name = string_field(payload, "backupName", "BackupName").unwrap_or_default();
    let (title, message, alert_type, kind) = if completed {
        (
            "Yedekleme Tamamlandı".to_owned(),
            format!("{name} yedeklemesi başarıyla tamamlandı"),
            "backup_completed",
            1,
        )
    } else {
        let error = string_field(payload, "errorMessage", "ErrorMessage").unwrap_or_default();
        (
            "Yedekleme Başarısız".to_owned(),
            format!("{name} yedeklemesi başarısız oldu: {error}"),
            "backup_failed",
            3,
        )
    };

    serde_json::json!({
        "id": string_field(payload, "backupId", "BackupId")
            .map_or_else(|| format!("{alert_type}-{}", Utc::now().timestamp_millis()), |id| format!("{alert_type}-{id}")),
        "title": title,
        "message": message,
        "type": kind,
        "priority": if completed { "Normal" } else { "High" },
        "alertType": alert_type,
        "actionUrl": "/settings/backups",
    })
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
