//! In-memory chat backend.
//!
//! Keeps rooms and their messages in process memory. Used by the
//! `galaxy-chat-plugin` binary and as a reference [`Plugin`] in tests.

use std::collections::BTreeMap;

use galaxy_rpc::ErrorKind;
use galaxy_types::{Message, Room};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::ChatConfig;
use crate::error::Result;
use crate::notifier::Notifier;
use crate::plugin::Plugin;

#[derive(Debug, Default)]
struct RoomLog {
    messages: Vec<Message>,
    unread: u32,
    /// Messages sent by this plugin, counted against the room quota
    sent: usize,
}

impl RoomLog {
    fn last_message_id(&self) -> Option<&str> {
        self.messages.last().map(|m| m.message_id.as_str())
    }
}

#[derive(Debug, Default)]
struct ChatState {
    rooms: BTreeMap<String, RoomLog>,
    next_message_id: u64,
}

impl ChatState {
    fn room_mut(&mut self, room_id: &str) -> Result<&mut RoomLog> {
        self.rooms.get_mut(room_id).ok_or_else(|| {
            debug!("Unknown room {}", room_id);
            ErrorKind::BackendError.into()
        })
    }

    fn room(&self, room_id: &str) -> Result<&RoomLog> {
        self.rooms.get(room_id).ok_or_else(|| {
            debug!("Unknown room {}", room_id);
            ErrorKind::BackendError.into()
        })
    }

    fn allocate_message_id(&mut self) -> String {
        self.next_message_id += 1;
        self.next_message_id.to_string()
    }
}

/// Chat backend holding all rooms in memory
#[derive(Debug)]
pub struct MemoryChat {
    config: ChatConfig,
    notifier: Notifier,
    state: Mutex<ChatState>,
}

impl MemoryChat {
    /// Create a backend with the rooms listed in `config`.
    #[must_use]
    pub fn new(config: ChatConfig, notifier: Notifier) -> Self {
        let state = ChatState {
            rooms: config
                .rooms
                .iter()
                .map(|id| (id.clone(), RoomLog::default()))
                .collect(),
            next_message_id: 0,
        };

        Self {
            config,
            notifier,
            state: Mutex::new(state),
        }
    }

    /// Create a room; an existing room is left untouched.
    pub async fn add_room(&self, room_id: impl Into<String>) {
        let mut state = self.state.lock().await;
        state.rooms.entry(room_id.into()).or_default();
    }

    /// Record a message from another user and tell the host about it.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::BackendError`] for an unknown room.
    pub async fn receive_message(
        &self,
        room_id: &str,
        sender_id: &str,
        text: &str,
    ) -> Result<Message> {
        let mut state = self.state.lock().await;
        let message_id = state.allocate_message_id();
        let room = state.room_mut(room_id)?;

        let message = Message::new(message_id, sender_id, now(), text);
        room.messages.push(message.clone());
        room.unread += 1;

        self.emit_room_update(room_id, room.unread, &message);
        Ok(message)
    }

    fn emit_room_update(&self, room_id: &str, unread: u32, message: &Message) {
        if let Err(e) =
            self.notifier
                .update_room(room_id, Some(unread), Some(std::slice::from_ref(message)))
        {
            warn!("Failed to notify host about room {}: {}", room_id, e);
        }
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

impl Plugin for MemoryChat {
    async fn send_message(&self, room_id: String, message: String) -> Result<()> {
        let mut state = self.state.lock().await;
        let room = state.room_mut(&room_id)?;
        if room.sent >= self.config.max_messages_per_room {
            return Err(ErrorKind::TooManyMessagesSent.into());
        }

        let message_id = state.allocate_message_id();
        let room = state.room_mut(&room_id)?;
        let message = Message::new(message_id, self.config.user_id.as_str(), now(), message);
        room.messages.push(message.clone());
        room.sent += 1;
        debug!("Sent message {} to room {}", message.message_id, room_id);

        self.emit_room_update(&room_id, room.unread, &message);
        Ok(())
    }

    async fn mark_as_read(&self, room_id: String, last_message_id: String) -> Result<()> {
        let mut state = self.state.lock().await;
        let room = state.room_mut(&room_id)?;
        if room.last_message_id() != Some(last_message_id.as_str()) {
            return Err(ErrorKind::IncoherentLastMessage.into());
        }

        room.unread = 0;
        Ok(())
    }

    async fn get_rooms(&self) -> Result<Vec<Room>> {
        let state = self.state.lock().await;
        Ok(state
            .rooms
            .iter()
            .map(|(id, log)| {
                Room::new(id.as_str(), log.unread, log.last_message_id().map(String::from))
            })
            .collect())
    }

    async fn get_room_history_from_message(
        &self,
        room_id: String,
        message_id: String,
    ) -> Result<Vec<Message>> {
        let state = self.state.lock().await;
        let room = state.room(&room_id)?;
        let position = room
            .messages
            .iter()
            .position(|m| m.message_id == message_id)
            .ok_or(ErrorKind::MessageNotFound)?;

        Ok(room.messages[position + 1..].to_vec())
    }

    async fn get_room_history_from_timestamp(
        &self,
        room_id: String,
        from_timestamp: i64,
    ) -> Result<Vec<Message>> {
        let state = self.state.lock().await;
        let room = state.room(&room_id)?;

        Ok(room
            .messages
            .iter()
            .filter(|m| m.sent_time >= from_timestamp)
            .cloned()
            .collect())
    }

    async fn shutdown(&self) -> Result<()> {
        let state = self.state.lock().await;
        info!("Chat backend shutting down with {} rooms", state.rooms.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PluginError;
    use galaxy_rpc::Message as Outgoing;

    fn chat(rooms: &[&str], max_messages_per_room: usize) -> (MemoryChat, crate::Outbox) {
        let (notifier, outbox) = Notifier::channel();
        let config = ChatConfig {
            max_messages_per_room,
            user_id: "me".to_string(),
            rooms: rooms.iter().map(ToString::to_string).collect(),
        };
        (MemoryChat::new(config, notifier), outbox)
    }

    fn assert_kind<T: std::fmt::Debug>(result: Result<T>, kind: ErrorKind) {
        match result {
            Err(PluginError::Kind(actual)) => assert_eq!(actual, kind),
            other => panic!("expected {kind:?}, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rooms_start_empty() {
        let (chat, _outbox) = chat(&["13", "15"], 10);
        let rooms = chat.get_rooms().await.unwrap();
        assert_eq!(rooms, vec![Room::new("13", 0, None), Room::new("15", 0, None)]);
    }

    #[tokio::test]
    async fn test_send_message_appends_and_notifies() {
        let (chat, mut outbox) = chat(&["14"], 10);

        chat.send_message("14".to_string(), "Hello!".to_string())
            .await
            .unwrap();

        let rooms = chat.get_rooms().await.unwrap();
        assert_eq!(rooms[0].last_message_id.as_deref(), Some("1"));

        let Some(Outgoing::Notification(n)) = outbox.recv().await else {
            panic!("expected a notification");
        };
        assert_eq!(n.method, "chat_room_updated");
        let params = n.params.unwrap();
        assert_eq!(params["room_id"], "14");
        assert_eq!(params["messages"][0]["message_text"], "Hello!");
        assert_eq!(params["messages"][0]["sender_id"], "me");
    }

    #[tokio::test]
    async fn test_send_message_unknown_room() {
        let (chat, _outbox) = chat(&[], 10);
        let result = chat.send_message("nope".to_string(), "x".to_string()).await;
        assert_kind(result, ErrorKind::BackendError);
    }

    #[tokio::test]
    async fn test_send_message_quota() {
        let (chat, _outbox) = chat(&["14"], 2);

        for _ in 0..2 {
            chat.send_message("14".to_string(), "x".to_string())
                .await
                .unwrap();
        }
        let result = chat.send_message("14".to_string(), "x".to_string()).await;
        assert_kind(result, ErrorKind::TooManyMessagesSent);
    }

    #[tokio::test]
    async fn test_mark_as_read_requires_newest_message() {
        let (chat, _outbox) = chat(&["14"], 10);
        let first = chat.receive_message("14", "898", "Hi").await.unwrap();
        let second = chat.receive_message("14", "898", "Still there?").await.unwrap();

        let result = chat
            .mark_as_read("14".to_string(), first.message_id.clone())
            .await;
        assert_kind(result, ErrorKind::IncoherentLastMessage);
        assert_eq!(chat.get_rooms().await.unwrap()[0].unread_message_count, 2);

        chat.mark_as_read("14".to_string(), second.message_id)
            .await
            .unwrap();
        assert_eq!(chat.get_rooms().await.unwrap()[0].unread_message_count, 0);
    }

    #[tokio::test]
    async fn test_mark_as_read_empty_room() {
        let (chat, _outbox) = chat(&["14"], 10);
        let result = chat.mark_as_read("14".to_string(), "1".to_string()).await;
        assert_kind(result, ErrorKind::IncoherentLastMessage);
    }

    #[tokio::test]
    async fn test_history_from_message() {
        let (chat, _outbox) = chat(&["14"], 10);
        let first = chat.receive_message("14", "898", "one").await.unwrap();
        chat.receive_message("14", "898", "two").await.unwrap();
        chat.receive_message("14", "898", "three").await.unwrap();

        let history = chat
            .get_room_history_from_message("14".to_string(), first.message_id)
            .await
            .unwrap();
        let texts: Vec<&str> = history.iter().map(|m| m.message_text.as_str()).collect();
        assert_eq!(texts, ["two", "three"]);
    }

    #[tokio::test]
    async fn test_history_from_unknown_message() {
        let (chat, _outbox) = chat(&["14"], 10);
        let result = chat
            .get_room_history_from_message("14".to_string(), "404".to_string())
            .await;
        assert_kind(result, ErrorKind::MessageNotFound);
    }

    #[tokio::test]
    async fn test_history_from_timestamp() {
        let (chat, _outbox) = chat(&["14"], 10);
        chat.receive_message("14", "898", "recent").await.unwrap();

        let all = chat
            .get_room_history_from_timestamp("14".to_string(), 0)
            .await
            .unwrap();
        assert_eq!(all.len(), 1);

        let future = chat
            .get_room_history_from_timestamp("14".to_string(), i64::MAX)
            .await
            .unwrap();
        assert!(future.is_empty());
    }

    #[tokio::test]
    async fn test_history_unknown_room() {
        let (chat, _outbox) = chat(&[], 10);
        let result = chat
            .get_room_history_from_timestamp("14".to_string(), 0)
            .await;
        assert_kind(result, ErrorKind::BackendError);
    }

    #[tokio::test]
    async fn test_add_room_is_idempotent() {
        let (chat, _outbox) = chat(&[], 10);
        chat.add_room("1").await;
        chat.receive_message("1", "898", "hi").await.unwrap();
        chat.add_room("1").await;

        let rooms = chat.get_rooms().await.unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].unread_message_count, 1);
    }

    #[tokio::test]
    async fn test_import_games_not_implemented() {
        let (chat, _outbox) = chat(&[], 10);
        let err = chat.get_owned_games().await.unwrap_err();
        assert!(matches!(err, PluginError::NotImplemented(_)));
    }
}
