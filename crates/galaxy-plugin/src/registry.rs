//! Method registry mapping host method names to plugin handlers.
//!
//! The table is static and immutable, so lookups need no locking. Each entry
//! declares the params it expects; [`bind`] checks an inbound params object
//! against that schema before deserializing it into the typed params struct.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use galaxy_rpc::json_type_name;

/// Internal identity of a host method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    SendMessage,
    MarkAsRead,
    GetRooms,
    GetRoomHistoryFromMessage,
    GetRoomHistoryFromTimestamp,
    GetOwnedGames,
    GetUnlockedAchievements,
    GetLocalGames,
    GetFriends,
    GetGameTimes,
    LaunchGame,
    InstallGame,
    UninstallGame,
    Shutdown,
}

/// JSON type a declared param must have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
}

impl ParamType {
    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
        }
    }
}

/// A declared param; every declared param is required
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub ty: ParamType,
}

const fn required(name: &'static str, ty: ParamType) -> ParamSpec {
    ParamSpec { name, ty }
}

/// Registry entry for one host method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodSpec {
    /// Name used on the wire
    pub name: &'static str,
    pub method: Method,
    pub params: &'static [ParamSpec],
    /// Host normally sends this without an id
    pub notification_only: bool,
}

const ROOM_ID: ParamSpec = required("room_id", ParamType::String);
const GAME_ID: ParamSpec = required("game_id", ParamType::String);

const fn request(name: &'static str, method: Method, params: &'static [ParamSpec]) -> MethodSpec {
    MethodSpec {
        name,
        method,
        params,
        notification_only: false,
    }
}

const fn notification(
    name: &'static str,
    method: Method,
    params: &'static [ParamSpec],
) -> MethodSpec {
    MethodSpec {
        name,
        method,
        params,
        notification_only: true,
    }
}

/// Every method the host may call
pub static METHODS: &[MethodSpec] = &[
    request(
        "send_message",
        Method::SendMessage,
        &[ROOM_ID, required("message", ParamType::String)],
    ),
    request(
        "mark_as_read",
        Method::MarkAsRead,
        &[ROOM_ID, required("last_message_id", ParamType::String)],
    ),
    request("import_rooms", Method::GetRooms, &[]),
    request(
        "import_room_history_from_message",
        Method::GetRoomHistoryFromMessage,
        &[ROOM_ID, required("message_id", ParamType::String)],
    ),
    request(
        "import_room_history_from_timestamp",
        Method::GetRoomHistoryFromTimestamp,
        &[ROOM_ID, required("from_timestamp", ParamType::Integer)],
    ),
    request("import_owned_games", Method::GetOwnedGames, &[]),
    request(
        "import_unlocked_achievements",
        Method::GetUnlockedAchievements,
        &[GAME_ID],
    ),
    request("import_local_games", Method::GetLocalGames, &[]),
    request("import_friends", Method::GetFriends, &[]),
    request("import_game_times", Method::GetGameTimes, &[]),
    notification("launch_game", Method::LaunchGame, &[GAME_ID]),
    notification("install_game", Method::InstallGame, &[GAME_ID]),
    notification("uninstall_game", Method::UninstallGame, &[GAME_ID]),
    notification("shutdown", Method::Shutdown, &[]),
];

/// Look up a method by its wire name.
#[must_use]
pub fn resolve(name: &str) -> Option<&'static MethodSpec> {
    METHODS.iter().find(|spec| spec.name == name)
}

/// Params that do not fit a method's declared schema
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error("Missing required parameter: {0}")]
    Missing(&'static str),

    #[error("Parameter {name} must be {expected}, got {actual}")]
    WrongType {
        name: &'static str,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Malformed parameters: {0}")]
    Deserialize(#[from] serde_json::Error),
}

impl MethodSpec {
    /// Check a params object against the declared schema.
    ///
    /// Keys the method does not declare are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`BindError`] for a missing required param or a wrongly typed value.
    pub fn validate(&self, params: Option<&Map<String, Value>>) -> Result<(), BindError> {
        for param in self.params {
            match params.and_then(|p| p.get(param.name)) {
                None | Some(Value::Null) => return Err(BindError::Missing(param.name)),
                Some(value) if !param.ty.matches(value) => {
                    return Err(BindError::WrongType {
                        name: param.name,
                        expected: param.ty.name(),
                        actual: json_type_name(value),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// Validate params against `spec` and deserialize them into `T`.
///
/// # Errors
///
/// Returns [`BindError`] if validation or deserialization fails.
pub fn bind<T: DeserializeOwned>(
    spec: &MethodSpec,
    params: Option<Map<String, Value>>,
) -> Result<T, BindError> {
    spec.validate(params.as_ref())?;
    Ok(serde_json::from_value(Value::Object(
        params.unwrap_or_default(),
    ))?)
}

#[derive(Debug, Clone, Deserialize)]
pub struct NoParams {}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageParams {
    pub room_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarkAsReadParams {
    pub room_id: String,
    pub last_message_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryFromMessageParams {
    pub room_id: String,
    pub message_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryFromTimestampParams {
    pub room_id: String,
    pub from_timestamp: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameIdParams {
    pub game_id: String,
}
