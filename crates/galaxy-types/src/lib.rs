//! Shared domain types for Galaxy integration plugins.
//!
//! Every type here has a canonical JSON projection used on the wire between
//! the plugin and its host. Optional fields are omitted from the JSON when
//! absent (never written as `null`), while present-but-falsy values such as
//! `0`, `""` or `false` are always written.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::TryFrom;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Result of a successful authentication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authentication {
    pub user_id: String,
    pub user_name: String,
}

/// Browser cookie handed to the host during a multi-step login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Cookie {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
        }
    }
}

/// Next step of a multi-step authentication flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextStep {
    pub next_step: String,
    pub auth_params: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<Vec<Cookie>>,
}

/// Kind of license a user holds for a game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LicenseType {
    #[default]
    Unknown,
    SinglePurchase,
    FreeToPlay,
    OtherUserLicense,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseInfo {
    pub license_type: LicenseType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl LicenseInfo {
    #[must_use]
    pub fn new(license_type: LicenseType) -> Self {
        Self {
            license_type,
            owner: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dlc {
    pub dlc_id: String,
    pub dlc_title: String,
    pub license_info: LicenseInfo,
}

/// Game owned by the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub game_id: String,
    pub game_title: String,
    pub dlcs: Vec<Dlc>,
    pub license_info: LicenseInfo,
}

/// Unlocked achievement.
///
/// At least one of `achievement_id` or `achievement_name` must be set; this is
/// checked by [`Achievement::new`] and on deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AchievementRaw")]
pub struct Achievement {
    pub unlock_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub achievement_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub achievement_name: Option<String>,
}

#[derive(Deserialize)]
struct AchievementRaw {
    unlock_time: i64,
    #[serde(default)]
    achievement_id: Option<String>,
    #[serde(default)]
    achievement_name: Option<String>,
}

/// Invalid [`Achievement`] fields
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AchievementError {
    #[error("One of achievement_id or achievement_name is required")]
    MissingIdentity,
}

impl TryFrom<AchievementRaw> for Achievement {
    type Error = AchievementError;

    fn try_from(raw: AchievementRaw) -> Result<Self, Self::Error> {
        Achievement::new(raw.unlock_time, raw.achievement_id, raw.achievement_name)
    }
}

impl Achievement {
    /// Create an achievement.
    ///
    /// # Errors
    ///
    /// Returns [`AchievementError::MissingIdentity`] if neither an id nor a
    /// name is given.
    pub fn new(
        unlock_time: i64,
        achievement_id: Option<String>,
        achievement_name: Option<String>,
    ) -> Result<Self, AchievementError> {
        if achievement_id.is_none() && achievement_name.is_none() {
            return Err(AchievementError::MissingIdentity);
        }
        Ok(Self {
            unlock_time,
            achievement_id,
            achievement_name,
        })
    }
}

/// Installation state of a local game, as bit flags.
///
/// Serialized as the raw integer (`0` none, `1` installed, `2` running,
/// `3` installed and running).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalGameState(u8);

impl LocalGameState {
    pub const NONE: Self = Self(0);
    pub const INSTALLED: Self = Self(1);
    pub const RUNNING: Self = Self(2);

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for LocalGameState {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for LocalGameState {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for LocalGameState {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalGame {
    pub game_id: String,
    pub local_game_state: LocalGameState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceState {
    #[default]
    Unknown,
    Online,
    Offline,
    Away,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence {
    pub presence_state: PresenceState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub user_id: String,
    pub is_friend: bool,
    pub user_name: String,
    pub avatar_url: String,
    pub presence: Presence,
}

/// Chat room summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub room_id: String,
    pub unread_message_count: u32,
    /// Absent for rooms without any message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_id: Option<String>,
}

impl Room {
    #[must_use]
    pub fn new(
        room_id: impl Into<String>,
        unread_message_count: u32,
        last_message_id: Option<String>,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            unread_message_count,
            last_message_id,
        }
    }
}

/// Chat message; `sent_time` is a unix timestamp in seconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: String,
    pub sender_id: String,
    pub sent_time: i64,
    pub message_text: String,
}

impl Message {
    #[must_use]
    pub fn new(
        message_id: impl Into<String>,
        sender_id: impl Into<String>,
        sent_time: i64,
        message_text: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            sender_id: sender_id.into(),
            sent_time,
            message_text: message_text.into(),
        }
    }
}

/// Play time statistics; `time_played` is in minutes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameTime {
    pub game_id: String,
    pub time_played: u64,
    pub last_played_time: i64,
}
