//! Hub registry.
//!
//! One instance owns every hub connection for the process. Constructed
//! at application bootstrap and passed to whatever needs it; connected
//! on first mount, disconnected at shutdown. Connection states from all
//! hubs merge into one watch channel, so consumers subscribe instead of
//! polling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use url::Url;

use hublink_client::{ConnectionState, HubConfig, HubConnection, TransportConfig};

use crate::chat::ChatHub;
use crate::error::CoreError;
use crate::notify::NotificationHub;
use crate::toast::ToastSink;

pub const NOTIFICATION_HUB_PATH: &str = "hubs/notification";
pub const CHAT_HUB_PATH: &str = "hubs/chat";

/// Configuration for the registry: one base URL, shared transport
/// settings, hub paths fixed.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Server origin, e.g. `https://app.example.com/`.
    pub base_url: Url,
    pub transport: TransportConfig,
    /// Connect straight over WebSockets without negotiation.
    pub skip_negotiation: bool,
}

impl RegistryConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            transport: TransportConfig::default(),
            skip_negotiation: false,
        }
    }

    fn hub_config(&self, path: &str) -> Result<HubConfig, CoreError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| CoreError::Connection {
                message: format!("invalid hub url for '{path}': {e}"),
            })?;
        let mut config = HubConfig::new(url);
        config.transport = self.transport.clone();
        config.skip_negotiation = self.skip_negotiation;
        Ok(config)
    }
}

/// Merged connection state of every registered hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryState {
    pub notifications: ConnectionState,
    pub chat: ConnectionState,
}

impl Default for RegistryState {
    fn default() -> Self {
        Self {
            notifications: ConnectionState::Disconnected,
            chat: ConnectionState::Disconnected,
        }
    }
}

impl RegistryState {
    /// True when every hub is connected.
    pub fn all_connected(&self) -> bool {
        self.notifications == ConnectionState::Connected && self.chat == ConnectionState::Connected
    }
}

/// The process-wide set of hub connections and their adapters.
#[derive(Clone)]
pub struct HubRegistry {
    inner: Arc<Inner>,
}

struct Inner {
    notifications: NotificationHub,
    chat: ChatHub,
    state_tx: Arc<watch::Sender<RegistryState>>,
    // Latch: global handlers and the state republisher are set up at
    // most once per registry lifetime.
    bound: AtomicBool,
}

impl HubRegistry {
    /// Build the registry and its hub connections. Nothing connects
    /// until [`connect_all`](Self::connect_all).
    pub fn new(config: &RegistryConfig, sink: ToastSink) -> Result<Self, CoreError> {
        let notifications = HubConnection::new(config.hub_config(NOTIFICATION_HUB_PATH)?)?;
        let chat = HubConnection::new(config.hub_config(CHAT_HUB_PATH)?)?;
        let (state_tx, _) = watch::channel(RegistryState::default());

        Ok(Self {
            inner: Arc::new(Inner {
                notifications: NotificationHub::new(notifications, Arc::clone(&sink)),
                chat: ChatHub::new(chat, sink),
                state_tx: Arc::new(state_tx),
                bound: AtomicBool::new(false),
            }),
        })
    }

    pub fn notifications(&self) -> &NotificationHub {
        &self.inner.notifications
    }

    pub fn chat(&self) -> &ChatHub {
        &self.inner.chat
    }

    /// Connect every hub. Idempotent: already-connected hubs are left
    /// alone, and the global handlers bind exactly once no matter how
    /// many times this is called.
    pub async fn connect_all(&self) {
        if !self.inner.bound.swap(true, Ordering::SeqCst) {
            self.inner.notifications.bind();
            self.inner.chat.bind();
            self.spawn_state_republisher();
        }

        tokio::join!(
            self.inner.notifications.connection().start(),
            self.inner.chat.connection().start(),
        );
    }

    /// Gracefully stop every hub. Idempotent; handlers stay registered
    /// for a later `connect_all`.
    pub fn disconnect_all(&self) {
        self.inner.notifications.connection().stop();
        self.inner.chat.connection().stop();
    }

    pub fn state(&self) -> RegistryState {
        self.inner.state_tx.borrow().clone()
    }

    /// Subscribe to merged connection-state changes.
    pub fn state_changes(&self) -> watch::Receiver<RegistryState> {
        self.inner.state_tx.subscribe()
    }

    /// Forward each hub's state stream into the merged watch channel.
    /// The task holds only channel handles, not the registry itself.
    fn spawn_state_republisher(&self) {
        let state_tx = Arc::clone(&self.inner.state_tx);
        let mut notifications = self.inner.notifications.connection().state_changes();
        let mut chat = self.inner.chat.connection().state_changes();

        tokio::spawn(async move {
            loop {
                let merged = RegistryState {
                    notifications: notifications.borrow_and_update().clone(),
                    chat: chat.borrow_and_update().clone(),
                };
                state_tx.send_if_modified(|state| {
                    if *state == merged {
                        false
                    } else {
                        *state = merged;
                        true
                    }
                });

                tokio::select! {
                    changed = notifications.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                    changed = chat.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use crate::toast::null_sink;

    use super::*;

    fn registry() -> HubRegistry {
        let config = RegistryConfig::new("https://app.example.com/".parse().expect("url"));
        HubRegistry::new(&config, null_sink()).expect("registry")
    }

    #[test]
    fn hub_urls_derive_from_the_base() {
        let config = RegistryConfig::new("https://app.example.com/".parse().expect("url"));
        let hub = config.hub_config(NOTIFICATION_HUB_PATH).expect("config");
        assert_eq!(hub.url.as_str(), "https://app.example.com/hubs/notification");
    }

    #[tokio::test]
    async fn fresh_registry_is_fully_disconnected() {
        let registry = registry();
        assert_eq!(registry.state(), RegistryState::default());
        assert!(!registry.state().all_connected());
    }

    #[tokio::test]
    async fn disconnect_all_without_connect_is_a_no_op() {
        let registry = registry();
        registry.disconnect_all();
        registry.disconnect_all();
        assert_eq!(registry.state(), RegistryState::default());
    }
}
