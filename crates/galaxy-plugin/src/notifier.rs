//! Plugin-initiated notifications and the single output writer.
//!
//! Every outgoing message (responses and notifications alike) goes through
//! one unbounded queue drained by a single writer task, so lines never
//! interleave on the output stream.

use futures_util::SinkExt;
use galaxy_rpc::{LineCodec, Message, Notification};
use galaxy_types::{Achievement, Game, GameTime, LocalGame, Message as ChatMessage, UserInfo};
use serde::Serialize;
use tokio::io::AsyncWrite;
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::FramedWrite;
use tracing::{debug, trace, warn};

/// Failure to queue an outgoing message
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Output channel closed")]
    Closed,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Cloneable handle for emitting notifications to the host.
///
/// Sending never blocks and does not wait for in-flight requests.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Message>,
}

/// Receiving end of the output queue, consumed by the writer task
#[derive(Debug)]
pub struct Outbox {
    rx: mpsc::UnboundedReceiver<Message>,
}

#[derive(Serialize)]
struct RoomUpdate<'a> {
    room_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    unread_message_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    messages: Option<&'a [ChatMessage]>,
}

#[derive(Serialize)]
struct OwnedGameParams<'a> {
    owned_game: &'a Game,
}

#[derive(Serialize)]
struct GameIdParams<'a> {
    game_id: &'a str,
}

#[derive(Serialize)]
struct AchievementParams<'a> {
    game_id: &'a str,
    achievement: &'a Achievement,
}

#[derive(Serialize)]
struct LocalGameParams<'a> {
    local_game: &'a LocalGame,
}

#[derive(Serialize)]
struct UserInfoParams<'a> {
    user_info: &'a UserInfo,
}

#[derive(Serialize)]
struct UserIdParams<'a> {
    user_id: &'a str,
}

#[derive(Serialize)]
struct GameTimeParams<'a> {
    game_time: &'a GameTime,
}

impl Outbox {
    /// Next queued message; `None` once every [`Notifier`] is gone.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }
}

impl Notifier {
    /// Create a notifier and the outbox its messages land in.
    #[must_use]
    pub fn channel() -> (Notifier, Outbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Notifier { tx }, Outbox { rx })
    }

    /// Queue any outgoing message.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Closed`] once the writer has stopped.
    pub fn send(&self, message: Message) -> Result<(), NotifyError> {
        self.tx.send(message).map_err(|_| NotifyError::Closed)
    }

    /// Emit a notification with arbitrary params.
    ///
    /// # Errors
    ///
    /// Returns an error if `params` cannot be serialized or the output is closed.
    pub fn notify<T: Serialize>(&self, method: &str, params: T) -> Result<(), NotifyError> {
        let params = serde_json::to_value(params)?;
        trace!("Queueing notification {}", method);
        self.send(Notification::new(method, Some(params)).into())
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Report new messages or a changed unread count for a chat room.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Closed`] once the writer has stopped.
    pub fn update_room(
        &self,
        room_id: &str,
        unread_message_count: Option<u32>,
        messages: Option<&[ChatMessage]>,
    ) -> Result<(), NotifyError> {
        self.notify(
            "chat_room_updated",
            RoomUpdate {
                room_id,
                unread_message_count,
                messages,
            },
        )
    }

    /// # Errors
    ///
    /// Returns [`NotifyError::Closed`] once the writer has stopped.
    pub fn add_game(&self, game: &Game) -> Result<(), NotifyError> {
        self.notify("owned_game_added", OwnedGameParams { owned_game: game })
    }

    /// # Errors
    ///
    /// Returns [`NotifyError::Closed`] once the writer has stopped.
    pub fn remove_game(&self, game_id: &str) -> Result<(), NotifyError> {
        self.notify("owned_game_removed", GameIdParams { game_id })
    }

    /// # Errors
    ///
    /// Returns [`NotifyError::Closed`] once the writer has stopped.
    pub fn update_game(&self, game: &Game) -> Result<(), NotifyError> {
        self.notify("owned_game_updated", OwnedGameParams { owned_game: game })
    }

    /// # Errors
    ///
    /// Returns [`NotifyError::Closed`] once the writer has stopped.
    pub fn unlock_achievement(
        &self,
        game_id: &str,
        achievement: &Achievement,
    ) -> Result<(), NotifyError> {
        self.notify(
            "achievement_unlocked",
            AchievementParams {
                game_id,
                achievement,
            },
        )
    }

    /// # Errors
    ///
    /// Returns [`NotifyError::Closed`] once the writer has stopped.
    pub fn update_local_game_status(&self, local_game: &LocalGame) -> Result<(), NotifyError> {
        self.notify("local_game_status_changed", LocalGameParams { local_game })
    }

    /// # Errors
    ///
    /// Returns [`NotifyError::Closed`] once the writer has stopped.
    pub fn add_friend(&self, user_info: &UserInfo) -> Result<(), NotifyError> {
        self.notify("friend_added", UserInfoParams { user_info })
    }

    /// # Errors
    ///
    /// Returns [`NotifyError::Closed`] once the writer has stopped.
    pub fn remove_friend(&self, user_id: &str) -> Result<(), NotifyError> {
        self.notify("friend_removed", UserIdParams { user_id })
    }

    /// # Errors
    ///
    /// Returns [`NotifyError::Closed`] once the writer has stopped.
    pub fn update_game_time(&self, game_time: &GameTime) -> Result<(), NotifyError> {
        self.notify("game_time_updated", GameTimeParams { game_time })
    }
}

fn trace_outgoing(message: &Message) {
    match message {
        Message::Response(r) => trace!("writer: sending response id={}", r.id),
        Message::Notification(n) => trace!("writer: sending notification method={}", n.method),
    }
}

/// Drain `outbox` into `writer` until the queue closes or `close` fires.
///
/// On `close`, messages already queued are still written, then the queue is
/// closed so later sends fail with [`NotifyError::Closed`].
pub(crate) async fn write_loop<W>(
    outbox: Outbox,
    writer: W,
    codec: LineCodec,
    mut close: oneshot::Receiver<()>,
) where
    W: AsyncWrite + Unpin,
{
    let Outbox { mut rx } = outbox;
    let mut sink = FramedWrite::new(writer, codec);

    trace!("writer started");
    loop {
        tokio::select! {
            biased;
            message = rx.recv() => {
                let Some(message) = message else { break };
                trace_outgoing(&message);
                if let Err(e) = sink.send(message).await {
                    warn!("Failed to write to host: {}", e);
                    break;
                }
            }
            _ = &mut close => {
                rx.close();
                while let Ok(message) = rx.try_recv() {
                    trace_outgoing(&message);
                    if let Err(e) = sink.send(message).await {
                        warn!("Failed to write to host: {}", e);
                        break;
                    }
                }
                break;
            }
        }
    }

    if let Err(e) = sink.close().await {
        debug!("Failed to close output: {}", e);
    }
    trace!("writer ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use galaxy_types::{LicenseInfo, LicenseType, LocalGameState};
    use serde_json::{Value, json};
    use tokio::io::AsyncReadExt;

    fn next_notification(outbox: &mut Outbox) -> Value {
        let message = outbox.rx.try_recv().unwrap();
        assert!(message.is_notification());
        serde_json::to_value(message).unwrap()
    }

    #[test]
    fn test_update_room_notification() {
        let (notifier, mut outbox) = Notifier::channel();
        let messages = [ChatMessage::new("10", "898", 1_549_454_832, "Hi")];

        notifier.update_room("14", Some(15), Some(&messages)).unwrap();

        assert_eq!(
            next_notification(&mut outbox),
            json!({
                "jsonrpc": "2.0",
                "method": "chat_room_updated",
                "params": {
                    "room_id": "14",
                    "unread_message_count": 15,
                    "messages": [{
                        "message_id": "10",
                        "sender_id": "898",
                        "sent_time": 1_549_454_832,
                        "message_text": "Hi"
                    }]
                }
            })
        );
    }

    #[test]
    fn test_update_room_omits_absent_fields() {
        let (notifier, mut outbox) = Notifier::channel();
        notifier.update_room("14", None, None).unwrap();

        let value = next_notification(&mut outbox);
        assert_eq!(value["params"], json!({"room_id": "14"}));
        assert!(value.get("id").is_none());
    }

    #[test]
    fn test_game_notifications() {
        let (notifier, mut outbox) = Notifier::channel();
        let game = galaxy_types::Game {
            game_id: "3".to_string(),
            game_title: "Doom".to_string(),
            dlcs: vec![],
            license_info: LicenseInfo::new(LicenseType::SinglePurchase),
        };

        notifier.add_game(&game).unwrap();
        notifier.update_game(&game).unwrap();
        notifier.remove_game("3").unwrap();

        let added = next_notification(&mut outbox);
        assert_eq!(added["method"], "owned_game_added");
        assert_eq!(added["params"]["owned_game"]["game_title"], "Doom");
        assert_eq!(
            added["params"]["owned_game"]["license_info"]["license_type"],
            "SinglePurchase"
        );

        let updated = next_notification(&mut outbox);
        assert_eq!(updated["method"], "owned_game_updated");

        let removed = next_notification(&mut outbox);
        assert_eq!(removed["method"], "owned_game_removed");
        assert_eq!(removed["params"], json!({"game_id": "3"}));
    }

    #[test]
    fn test_local_game_status_notification() {
        let (notifier, mut outbox) = Notifier::channel();
        let local_game = LocalGame {
            game_id: "5".to_string(),
            local_game_state: LocalGameState::INSTALLED | LocalGameState::RUNNING,
        };

        notifier.update_local_game_status(&local_game).unwrap();

        let value = next_notification(&mut outbox);
        assert_eq!(value["method"], "local_game_status_changed");
        assert_eq!(
            value["params"],
            json!({"local_game": {"game_id": "5", "local_game_state": 3}})
        );
    }

    #[test]
    fn test_friend_and_time_notifications() {
        let (notifier, mut outbox) = Notifier::channel();
        let game_time = GameTime {
            game_id: "3".to_string(),
            time_played: 120,
            last_played_time: 1_549_454_832,
        };

        notifier.remove_friend("42").unwrap();
        notifier.update_game_time(&game_time).unwrap();

        let removed = next_notification(&mut outbox);
        assert_eq!(removed["method"], "friend_removed");
        assert_eq!(removed["params"], json!({"user_id": "42"}));

        let time = next_notification(&mut outbox);
        assert_eq!(time["method"], "game_time_updated");
        assert_eq!(time["params"]["game_time"]["time_played"], 120);
    }

    #[test]
    fn test_notify_after_close_fails() {
        let (notifier, outbox) = Notifier::channel();
        drop(outbox);

        assert!(notifier.is_closed());
        let err = notifier.remove_game("3").unwrap_err();
        assert!(matches!(err, NotifyError::Closed));
    }

    #[tokio::test]
    async fn test_write_loop_flushes_queue_on_close() {
        let (notifier, outbox) = Notifier::channel();
        let (plugin_side, mut host_side) = tokio::io::duplex(4096);
        let (close_tx, close_rx) = oneshot::channel();

        notifier.remove_friend("1").unwrap();
        notifier.remove_friend("2").unwrap();
        close_tx.send(()).unwrap();

        write_loop(outbox, plugin_side, LineCodec::new(), close_rx).await;

        let mut output = String::new();
        host_side.read_to_string(&mut output).await.unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"user_id\":\"1\""));
        assert!(lines[1].contains("\"user_id\":\"2\""));

        assert!(matches!(
            notifier.remove_friend("3"),
            Err(NotifyError::Closed)
        ));
    }
}
