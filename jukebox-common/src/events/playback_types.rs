//! Player snapshot types

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Player state machine states
///
/// Serialized as the integers observers expect:
/// 0 = stopped, 1 = playing, 2 = paused, 3 = loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum PlayerState {
    #[default]
    Stopped = 0,
    Playing = 1,
    /// Part of the state space; no control currently enters it
    Paused = 2,
    Loading = 3,
}

impl PlayerState {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Stopped),
            1 => Some(Self::Playing),
            2 => Some(Self::Paused),
            3 => Some(Self::Loading),
            _ => None,
        }
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerState::Stopped => write!(f, "Stopped"),
            PlayerState::Playing => write!(f, "Playing"),
            PlayerState::Paused => write!(f, "Paused"),
            PlayerState::Loading => write!(f, "Loading"),
        }
    }
}

impl Serialize for PlayerState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for PlayerState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u8::deserialize(deserializer)?;
        Self::from_u8(value)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown player state {value}")))
    }
}

/// Point-in-time view of the player
///
/// Times are milliseconds and are only non-zero while playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub current_time: u64,
    pub total_time: u64,
    pub state: PlayerState,
    pub volume: u8,
}
