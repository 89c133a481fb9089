//! Chat hub adapter.
//!
//! Keeps four pieces of derived state: the current room's message
//! history (replaced wholesale on room join), per-counterpart private
//! message histories, the online-user presence set, and the
//! currently-typing set. Room messages for rooms other than the one
//! currently open surface as toasts.
//!
//! Private history fetches ride on the connection's per-invocation
//! correlation, so concurrent fetches for different counterparts
//! resolve independently and cannot misattribute replies.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;

use hublink_client::HubConnection;

use crate::error::CoreError;
use crate::model::{ChatMessage, Severity};
use crate::toast::{Toast, ToastSink};

// Server→client events.
pub const RECEIVE_MESSAGE: &str = "ReceiveMessage";
pub const RECEIVE_PRIVATE_MESSAGE: &str = "ReceivePrivateMessage";
pub const RECEIVE_ROOM_HISTORY: &str = "ReceiveRoomHistory";
pub const USER_ONLINE: &str = "UserOnline";
pub const USER_OFFLINE: &str = "UserOffline";
pub const USER_TYPING: &str = "UserTyping";
pub const USER_STOPPED_TYPING: &str = "UserStoppedTyping";

// ── Derived state ────────────────────────────────────────────────────

/// All chat state derived from hub events. Mutations are pure with
/// respect to the connection, which keeps them unit-testable.
#[derive(Debug, Default)]
pub struct ChatState {
    pub current_room: Option<String>,
    pub room_messages: Vec<ChatMessage>,
    pub private_messages: HashMap<String, Vec<ChatMessage>>,
    pub online_users: HashSet<String>,
    pub typing_users: HashSet<String>,
}

impl ChatState {
    /// Append a room message to the history.
    pub fn apply_room_message(&mut self, message: ChatMessage) {
        self.room_messages.push(message);
    }

    /// Replace the room history wholesale, as on room join.
    pub fn replace_room_history(&mut self, messages: Vec<ChatMessage>) {
        self.room_messages = messages;
    }

    /// File a private message under the counterpart's history.
    pub fn apply_private_message(&mut self, counterpart: &str, message: ChatMessage) {
        self.private_messages
            .entry(counterpart.to_owned())
            .or_default()
            .push(message);
    }

    /// Add a user to the presence set. Re-announcing an online user is
    /// a no-op; the set never holds two entries for one id.
    pub fn user_online(&mut self, user_id: &str) {
        self.online_users.insert(user_id.to_owned());
    }

    /// Remove a user from the presence set and the typing set. Removal
    /// of an absent id is a no-op.
    pub fn user_offline(&mut self, user_id: &str) {
        self.online_users.remove(user_id);
        self.typing_users.remove(user_id);
    }

    pub fn typing_started(&mut self, user_id: &str) {
        self.typing_users.insert(user_id.to_owned());
    }

    pub fn typing_stopped(&mut self, user_id: &str) {
        self.typing_users.remove(user_id);
    }
}

// ── Payload helpers ──────────────────────────────────────────────────

/// Presence and typing events carry either a bare user-id string or an
/// object with a `userId` field, depending on the server path.
fn user_id_of(value: &Value) -> Option<String> {
    if let Some(id) = value.as_str() {
        return Some(id.to_owned());
    }
    value
        .get("userId")
        .or_else(|| value.get("UserId"))
        .and_then(Value::as_str)
        .map(str::to_owned)
}

fn parse_message(event: &str, value: &Value) -> Option<ChatMessage> {
    match serde_json::from_value(value.clone()) {
        Ok(message) => Some(message),
        Err(e) => {
            tracing::warn!(event, error = %e, "dropping malformed chat payload");
            None
        }
    }
}

/// Toast for a room message, shown only when the message targets a room
/// other than the one currently open.
fn room_message_toast(current_room: Option<&str>, message: &ChatMessage) -> Option<Toast> {
    if let (Some(room), Some(current)) = (message.room.as_deref(), current_room) {
        if room == current {
            return None;
        }
    }
    Some(message_toast(message))
}

fn message_toast(message: &ChatMessage) -> Toast {
    Toast {
        severity: Severity::Info,
        title: message.user_name.clone(),
        body: message.message.clone(),
        icon: Some("message-circle".to_owned()),
        duration: Duration::from_secs(5),
        action: None,
    }
}

// ── Hub adapter ──────────────────────────────────────────────────────

/// Adapter binding the chat hub's events to [`ChatState`] and the toast
/// sink.
#[derive(Clone)]
pub struct ChatHub {
    connection: HubConnection,
    state: Arc<Mutex<ChatState>>,
    sink: ToastSink,
}

impl ChatHub {
    pub fn new(connection: HubConnection, sink: ToastSink) -> Self {
        Self {
            connection,
            state: Arc::new(Mutex::new(ChatState::default())),
            sink,
        }
    }

    pub fn connection(&self) -> &HubConnection {
        &self.connection
    }

    /// Register the hub's event handlers. Call once per adapter; the
    /// registrations survive reconnects.
    pub fn bind(&self) {
        let state = Arc::clone(&self.state);
        let sink = Arc::clone(&self.sink);
        self.connection.on(RECEIVE_MESSAGE, move |args| {
            let Some(message) = args.first().and_then(|v| parse_message(RECEIVE_MESSAGE, v))
            else {
                return;
            };
            let toast = {
                let mut state = lock(&state);
                let toast = room_message_toast(state.current_room.as_deref(), &message);
                state.apply_room_message(message);
                toast
            };
            if let Some(toast) = toast {
                sink(toast);
            }
        });

        let state = Arc::clone(&self.state);
        let sink = Arc::clone(&self.sink);
        self.connection.on(RECEIVE_PRIVATE_MESSAGE, move |args| {
            let Some(message) = args
                .first()
                .and_then(|v| parse_message(RECEIVE_PRIVATE_MESSAGE, v))
            else {
                return;
            };
            let toast = message_toast(&message);
            let counterpart = message.user_id.clone();
            lock(&state).apply_private_message(&counterpart, message);
            sink(toast);
        });

        let state = Arc::clone(&self.state);
        self.connection.on(RECEIVE_ROOM_HISTORY, move |args| {
            let Some(messages) = args
                .first()
                .and_then(|v| serde_json::from_value::<Vec<ChatMessage>>(v.clone()).ok())
            else {
                tracing::warn!(event = RECEIVE_ROOM_HISTORY, "dropping malformed history payload");
                return;
            };
            lock(&state).replace_room_history(messages);
        });

        for (event, online) in [(USER_ONLINE, true), (USER_OFFLINE, false)] {
            let state = Arc::clone(&self.state);
            self.connection.on(event, move |args| {
                let Some(user_id) = args.first().and_then(user_id_of) else {
                    tracing::warn!(event, "presence event without a user id");
                    return;
                };
                let mut state = lock(&state);
                if online {
                    state.user_online(&user_id);
                } else {
                    state.user_offline(&user_id);
                }
            });
        }

        for (event, typing) in [(USER_TYPING, true), (USER_STOPPED_TYPING, false)] {
            let state = Arc::clone(&self.state);
            self.connection.on(event, move |args| {
                let Some(user_id) = args.first().and_then(user_id_of) else {
                    return;
                };
                let mut state = lock(&state);
                if typing {
                    state.typing_started(&user_id);
                } else {
                    state.typing_stopped(&user_id);
                }
            });
        }
    }

    // ── Client→server operations ─────────────────────────────────

    /// Join a room: clear the current history, record the new room, and
    /// await the server ack. History replay arrives as a pushed event.
    pub async fn join_room(&self, room: &str) -> Result<(), CoreError> {
        {
            let mut state = lock(&self.state);
            state.current_room = Some(room.to_owned());
            state.room_messages.clear();
            state.typing_users.clear();
        }
        self.connection
            .invoke("JoinRoom", vec![Value::String(room.to_owned())])
            .await?;
        Ok(())
    }

    /// Send a message to the current room.
    pub async fn send_message(&self, content: &str) -> Result<(), CoreError> {
        let room = lock(&self.state)
            .current_room
            .clone()
            .ok_or(CoreError::NoRoomJoined)?;
        self.connection
            .invoke(
                "SendMessage",
                vec![Value::String(room), Value::String(content.to_owned())],
            )
            .await?;
        Ok(())
    }

    /// Send a private message and file it under the counterpart's
    /// history.
    pub async fn send_private_message(
        &self,
        user_id: &str,
        content: &str,
    ) -> Result<(), CoreError> {
        let result = self
            .connection
            .invoke(
                "SendPrivateMessage",
                vec![
                    Value::String(user_id.to_owned()),
                    Value::String(content.to_owned()),
                ],
            )
            .await?;
        if let Some(message) = parse_message("SendPrivateMessage", &result) {
            lock(&self.state).apply_private_message(user_id, message);
        }
        Ok(())
    }

    /// Fetch the private history with one counterpart.
    ///
    /// The reply correlates to this call's invocation id, so concurrent
    /// fetches for different counterparts each land in the right
    /// history.
    pub async fn load_private_messages(
        &self,
        user_id: &str,
    ) -> Result<Vec<ChatMessage>, CoreError> {
        let result = self
            .connection
            .invoke(
                "GetPrivateMessageHistory",
                vec![Value::String(user_id.to_owned())],
            )
            .await?;
        let messages: Vec<ChatMessage> =
            serde_json::from_value(result).map_err(|e| CoreError::MalformedPayload {
                event: "GetPrivateMessageHistory".into(),
                reason: e.to_string(),
            })?;
        lock(&self.state)
            .private_messages
            .insert(user_id.to_owned(), messages.clone());
        Ok(messages)
    }

    /// Refresh the presence set from the server.
    pub async fn refresh_online_users(&self) -> Result<(), CoreError> {
        let result = self.connection.invoke("GetOnlineUsers", vec![]).await?;
        let users: Vec<String> =
            serde_json::from_value(result).map_err(|e| CoreError::MalformedPayload {
                event: "GetOnlineUsers".into(),
                reason: e.to_string(),
            })?;
        lock(&self.state).online_users = users.into_iter().collect();
        Ok(())
    }

    /// Announce that the local user started typing in the current room.
    pub async fn start_typing(&self) -> Result<(), CoreError> {
        let room = lock(&self.state)
            .current_room
            .clone()
            .ok_or(CoreError::NoRoomJoined)?;
        self.connection
            .invoke("StartTyping", vec![Value::String(room)])
            .await?;
        Ok(())
    }

    /// Announce that the local user stopped typing.
    pub async fn stop_typing(&self) -> Result<(), CoreError> {
        let room = lock(&self.state)
            .current_room
            .clone()
            .ok_or(CoreError::NoRoomJoined)?;
        self.connection
            .invoke("StopTyping", vec![Value::String(room)])
            .await?;
        Ok(())
    }

    /// Mark the private conversation with `user_id` read on the server.
    pub async fn mark_messages_as_read(&self, user_id: &str) -> Result<(), CoreError> {
        self.connection
            .invoke(
                "MarkMessagesAsRead",
                vec![Value::String(user_id.to_owned())],
            )
            .await?;
        Ok(())
    }

    // ── State queries ────────────────────────────────────────────

    pub fn current_room(&self) -> Option<String> {
        lock(&self.state).current_room.clone()
    }

    pub fn room_messages(&self) -> Vec<ChatMessage> {
        lock(&self.state).room_messages.clone()
    }

    pub fn private_messages(&self, user_id: &str) -> Vec<ChatMessage> {
        lock(&self.state)
            .private_messages
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn online_users(&self) -> HashSet<String> {
        lock(&self.state).online_users.clone()
    }

    pub fn typing_users(&self) -> HashSet<String> {
        lock(&self.state).typing_users.clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
