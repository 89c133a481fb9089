//! Domain message types reconstructed from raw hub payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display severity of a notification or toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// Business category derived from the free-text alert-type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Inventory,
    Sales,
    Crm,
    Hr,
    Backup,
    Finance,
    System,
}

/// Backend priority attached to a notification.
///
/// Ordered so that comparisons like `priority >= Priority::High` select
/// the notifications that warrant a toast even without a styling entry.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
    Critical,
}

impl Priority {
    /// Lenient parse from a raw payload value: the backend serializes
    /// this enum as a number on some paths and as a name on others.
    pub fn from_raw(value: &serde_json::Value) -> Option<Self> {
        if let Some(n) = value.as_i64() {
            return match n {
                0 => Some(Self::Low),
                1 => Some(Self::Normal),
                2 => Some(Self::High),
                3 => Some(Self::Urgent),
                4 => Some(Self::Critical),
                _ => None,
            };
        }
        match value.as_str()?.to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "normal" => Some(Self::Normal),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// A fully normalized notification, ready for the feed and the toast
/// pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub category: Category,
    pub priority: Priority,
    pub alert_type: Option<String>,
    pub action_url: Option<String>,
    pub icon: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
}

/// A chat message as pushed by the hub, room or private.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub message: String,
    #[serde(default)]
    pub room: Option<String>,
    pub timestamp: DateTime<Utc>,
}
