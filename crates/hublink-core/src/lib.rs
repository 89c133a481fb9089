// hublink-core: Typed hub adapters and the connection registry between
// hublink-client and consumers.

pub mod chat;
pub mod error;
pub mod model;
pub mod notify;
pub mod registry;
pub mod toast;

// ── Primary re-exports ──────────────────────────────────────────────
pub use chat::{ChatHub, ChatState};
pub use error::CoreError;
pub use model::{Category, ChatMessage, Notification, Priority, Severity};
pub use notify::{determine_category, NotificationFeed, NotificationHub};
pub use registry::{HubRegistry, RegistryConfig, RegistryState};
pub use toast::{Toast, ToastAction, ToastSink};

// Connection-level types consumers commonly need.
pub use hublink_client::ConnectionState;
