//! Transient UI notifications.
//!
//! The core crate never renders anything; it hands fully-styled toasts
//! to a consumer-supplied sink and moves on.

use std::sync::Arc;
use std::time::Duration;

use crate::model::Severity;

/// A transient notification for the consumer to display.
#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub severity: Severity,
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
    pub duration: Duration,
    pub action: Option<ToastAction>,
}

/// Navigation action attached to a toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToastAction {
    pub label: String,
    pub url: String,
}

/// Consumer callback receiving each toast. Must not block; it runs on
/// the hub dispatch path.
pub type ToastSink = Arc<dyn Fn(Toast) + Send + Sync>;

/// A sink that drops every toast, for headless use and tests.
pub fn null_sink() -> ToastSink {
    Arc::new(|_| {})
}
