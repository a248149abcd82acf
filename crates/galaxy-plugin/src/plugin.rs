//! The plugin trait and the call path from a registry entry to a handler.

use std::future::Future;

use galaxy_types::{Achievement, Game, GameTime, LocalGame, Message, Room, UserInfo};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{PluginError, Result};
use crate::registry::{
    GameIdParams, HistoryFromMessageParams, HistoryFromTimestampParams, MarkAsReadParams, Method,
    MethodSpec, NoParams, SendMessageParams, bind,
};

/// Handlers a plugin exposes to the host.
///
/// Every handler has a default that fails with
/// [`PluginError::NotImplemented`], so a plugin only overrides the features
/// its backend supports. Handlers run concurrently; implementations guard
/// their own shared state.
pub trait Plugin: Send + Sync + 'static {
    fn send_message(
        &self,
        _room_id: String,
        _message: String,
    ) -> impl Future<Output = Result<()>> + Send {
        async { Err(PluginError::NotImplemented("send_message")) }
    }

    fn mark_as_read(
        &self,
        _room_id: String,
        _last_message_id: String,
    ) -> impl Future<Output = Result<()>> + Send {
        async { Err(PluginError::NotImplemented("mark_as_read")) }
    }

    fn get_rooms(&self) -> impl Future<Output = Result<Vec<Room>>> + Send {
        async { Err(PluginError::NotImplemented("import_rooms")) }
    }

    fn get_room_history_from_message(
        &self,
        _room_id: String,
        _message_id: String,
    ) -> impl Future<Output = Result<Vec<Message>>> + Send {
        async { Err(PluginError::NotImplemented("import_room_history_from_message")) }
    }

    fn get_room_history_from_timestamp(
        &self,
        _room_id: String,
        _from_timestamp: i64,
    ) -> impl Future<Output = Result<Vec<Message>>> + Send {
        async { Err(PluginError::NotImplemented("import_room_history_from_timestamp")) }
    }

    fn get_owned_games(&self) -> impl Future<Output = Result<Vec<Game>>> + Send {
        async { Err(PluginError::NotImplemented("import_owned_games")) }
    }

    fn get_unlocked_achievements(
        &self,
        _game_id: String,
    ) -> impl Future<Output = Result<Vec<Achievement>>> + Send {
        async { Err(PluginError::NotImplemented("import_unlocked_achievements")) }
    }

    fn get_local_games(&self) -> impl Future<Output = Result<Vec<LocalGame>>> + Send {
        async { Err(PluginError::NotImplemented("import_local_games")) }
    }

    fn get_friends(&self) -> impl Future<Output = Result<Vec<UserInfo>>> + Send {
        async { Err(PluginError::NotImplemented("import_friends")) }
    }

    fn get_game_times(&self) -> impl Future<Output = Result<Vec<GameTime>>> + Send {
        async { Err(PluginError::NotImplemented("import_game_times")) }
    }

    fn launch_game(&self, _game_id: String) -> impl Future<Output = Result<()>> + Send {
        async { Err(PluginError::NotImplemented("launch_game")) }
    }

    fn install_game(&self, _game_id: String) -> impl Future<Output = Result<()>> + Send {
        async { Err(PluginError::NotImplemented("install_game")) }
    }

    fn uninstall_game(&self, _game_id: String) -> impl Future<Output = Result<()>> + Send {
        async { Err(PluginError::NotImplemented("uninstall_game")) }
    }

    /// Called once after the dispatcher has drained all in-flight calls.
    fn shutdown(&self) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }
}

#[derive(Serialize)]
struct RoomsResult {
    rooms: Vec<Room>,
}

#[derive(Serialize)]
struct MessagesResult {
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct OwnedGamesResult {
    owned_games: Vec<Game>,
}

#[derive(Serialize)]
struct UnlockedAchievementsResult {
    unlocked_achievements: Vec<Achievement>,
}

#[derive(Serialize)]
struct LocalGamesResult {
    local_games: Vec<LocalGame>,
}

#[derive(Serialize)]
struct FriendsResult {
    friend_info_list: Vec<UserInfo>,
}

#[derive(Serialize)]
struct GameTimesResult {
    game_times: Vec<GameTime>,
}

/// Bind `params` for `spec` and run the matching handler.
///
/// Returns the JSON `result` for the response; unit handlers yield `null`.
///
/// # Errors
///
/// Returns the handler's error, or [`PluginError::InvalidParams`] when the
/// params do not fit the method's schema.
pub async fn invoke<P: Plugin>(
    plugin: &P,
    spec: &MethodSpec,
    params: Option<Map<String, Value>>,
) -> Result<Value> {
    let result = match spec.method {
        Method::SendMessage => {
            let p: SendMessageParams = bind(spec, params)?;
            plugin.send_message(p.room_id, p.message).await?;
            Value::Null
        }
        Method::MarkAsRead => {
            let p: MarkAsReadParams = bind(spec, params)?;
            plugin.mark_as_read(p.room_id, p.last_message_id).await?;
            Value::Null
        }
        Method::GetRooms => {
            bind::<NoParams>(spec, params)?;
            let rooms = plugin.get_rooms().await?;
            serde_json::to_value(RoomsResult { rooms })?
        }
        Method::GetRoomHistoryFromMessage => {
            let p: HistoryFromMessageParams = bind(spec, params)?;
            let messages = plugin
                .get_room_history_from_message(p.room_id, p.message_id)
                .await?;
            serde_json::to_value(MessagesResult { messages })?
        }
        Method::GetRoomHistoryFromTimestamp => {
            let p: HistoryFromTimestampParams = bind(spec, params)?;
            let messages = plugin
                .get_room_history_from_timestamp(p.room_id, p.from_timestamp)
                .await?;
            serde_json::to_value(MessagesResult { messages })?
        }
        Method::GetOwnedGames => {
            bind::<NoParams>(spec, params)?;
            let owned_games = plugin.get_owned_games().await?;
            serde_json::to_value(OwnedGamesResult { owned_games })?
        }
        Method::GetUnlockedAchievements => {
            let p: GameIdParams = bind(spec, params)?;
            let unlocked_achievements = plugin.get_unlocked_achievements(p.game_id).await?;
            serde_json::to_value(UnlockedAchievementsResult {
                unlocked_achievements,
            })?
        }
        Method::GetLocalGames => {
            bind::<NoParams>(spec, params)?;
            let local_games = plugin.get_local_games().await?;
            serde_json::to_value(LocalGamesResult { local_games })?
        }
        Method::GetFriends => {
            bind::<NoParams>(spec, params)?;
            let friend_info_list = plugin.get_friends().await?;
            serde_json::to_value(FriendsResult { friend_info_list })?
        }
        Method::GetGameTimes => {
            bind::<NoParams>(spec, params)?;
            let game_times = plugin.get_game_times().await?;
            serde_json::to_value(GameTimesResult { game_times })?
        }
        Method::LaunchGame => {
            let p: GameIdParams = bind(spec, params)?;
            plugin.launch_game(p.game_id).await?;
            Value::Null
        }
        Method::InstallGame => {
            let p: GameIdParams = bind(spec, params)?;
            plugin.install_game(p.game_id).await?;
            Value::Null
        }
        Method::UninstallGame => {
            let p: GameIdParams = bind(spec, params)?;
            plugin.uninstall_game(p.game_id).await?;
            Value::Null
        }
        // The dispatcher stops intake and calls Plugin::shutdown after the drain
        Method::Shutdown => Value::Null,
    };

    Ok(result)
}
