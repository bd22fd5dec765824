//! World state and progress snapshots
//!
//! [`WorldState`] is the mutable side of a level: hero position, string
//! variables, scan/delivery flags and the run status. [`Snapshot`] is the
//! durable subset a host persists between sessions.

use chrono::{DateTime, SecondsFormat, Utc};
use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};
use thiserror::Error;
use tracing::warn;

use crate::level::{Level, Poi};

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// A snapshot that cannot be applied to a level
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("unsupported snapshot version: expected {expected}, found {found}")]
    Version { expected: u32, found: u32 },

    #[error("snapshot is for level {found}, not {expected}")]
    WrongLevel { expected: String, found: String },
}

/// Runtime status
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Status {
    #[default]
    Idle,
    Running,
    Error,
    Win,
}

impl Status {
    /// Error and win end a run
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Status::Error | Status::Win)
    }
}

/// The learner's avatar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hero {
    pub x: i32,
    pub y: i32,
    pub icon: String,
}

/// A recorded delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    /// Variable the value was delivered from
    pub var: String,
    pub value: String,
}

/// Progress flags, keyed by POI id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags {
    #[serde(default, with = "lenient::scanned")]
    pub scanned: HashSet<String>,
    #[serde(default, with = "lenient::delivered")]
    pub delivered: HashMap<String, Delivery>,
}

impl Flags {
    /// Drop entries for POIs the level does not have
    fn retain_known(&mut self, pois: &HashMap<String, Poi>) {
        let scanned_before = self.scanned.len();
        let delivered_before = self.delivered.len();
        self.scanned.retain(|id| pois.contains_key(id));
        self.delivered.retain(|id, _| pois.contains_key(id));

        let dropped =
            scanned_before - self.scanned.len() + delivered_before - self.delivered.len();
        if dropped > 0 {
            warn!(dropped, "dropped flags for unknown POIs");
        }
    }
}

/// Mutable simulation state for one level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldState {
    pub level_id: String,
    pub hero: Hero,
    /// Variables only ever hold strings
    pub vars: HashMap<String, String>,
    pub flags: Flags,
    /// POI registry, copied from the level
    pub pois: HashMap<String, Poi>,
    pub status: Status,
}

impl WorldState {
    /// Fresh state at the level's spawn point
    pub fn new(level: &Level) -> Self {
        let spawn = &level.spawn.hero;
        Self {
            level_id: level.id.clone(),
            hero: Hero {
                x: spawn.x,
                y: spawn.y,
                icon: spawn.icon.clone(),
            },
            vars: HashMap::new(),
            flags: Flags::default(),
            pois: level
                .pois
                .iter()
                .map(|p| (p.id.clone(), p.clone()))
                .collect(),
            status: Status::Idle,
        }
    }

    pub fn poi(&self, id: &str) -> Option<&Poi> {
        self.pois.get(id)
    }

    /// Hero stands exactly on (x, y)
    pub fn hero_at(&self, x: i32, y: i32) -> bool {
        self.hero.x == x && self.hero.y == y
    }

    pub fn hero_on(&self, poi: &Poi) -> bool {
        self.hero_at(poi.x, poi.y)
    }

    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }
}

/// Hero as persisted; missing coordinates fall back to the spawn point
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedHero {
    #[serde(
        default,
        deserialize_with = "lenient::coord",
        skip_serializing_if = "Option::is_none"
    )]
    pub x: Option<i32>,
    #[serde(
        default,
        deserialize_with = "lenient::coord",
        skip_serializing_if = "Option::is_none"
    )]
    pub y: Option<i32>,
    #[serde(
        default,
        deserialize_with = "lenient::or_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotState {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub hero: SavedHero,
    #[serde(default, with = "lenient::vars")]
    pub vars: HashMap<String, String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub flags: Flags,
}

/// Durable progress for one level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Format version; snapshots written without one are read as current
    #[serde(rename = "v", default = "current_version")]
    pub version: u32,
    /// ISO-8601 timestamp
    #[serde(default)]
    pub saved_at: String,
    #[serde(default)]
    pub level_id: String,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub state: SnapshotState,
    /// Program text, kept verbatim
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub code: String,
}

fn current_version() -> u32 {
    SNAPSHOT_VERSION
}

impl Snapshot {
    /// Capture progress stamped with the current time
    pub fn capture(level_id: &str, state: &WorldState, code: &str) -> Self {
        Self::capture_at(level_id, state, code, Utc::now())
    }

    pub fn capture_at(
        level_id: &str,
        state: &WorldState,
        code: &str,
        saved_at: DateTime<Utc>,
    ) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: saved_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            level_id: level_id.to_string(),
            state: SnapshotState {
                hero: SavedHero {
                    x: Some(state.hero.x),
                    y: Some(state.hero.y),
                    icon: Some(state.hero.icon.clone()),
                },
                vars: state.vars.clone(),
                flags: state.flags.clone(),
            },
            code: code.to_string(),
        }
    }

    /// Whether this snapshot was taken on `level`
    pub fn is_for(&self, level: &Level) -> bool {
        self.level_id == level.id
    }

    /// Check the format version and that the snapshot belongs to `level`
    pub fn validate(&self, level: &Level) -> Result<(), SnapshotError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::Version {
                expected: SNAPSHOT_VERSION,
                found: self.version,
            });
        }
        if !self.is_for(level) {
            return Err(SnapshotError::WrongLevel {
                expected: level.id.clone(),
                found: self.level_id.clone(),
            });
        }
        Ok(())
    }

    /// Rebuild a world state by merging this snapshot onto a fresh one.
    ///
    /// Missing fields keep their spawn defaults, the hero is clamped into the
    /// board and flags for POIs the level does not have are dropped. The
    /// hero icon always comes from the level.
    pub fn hydrate(&self, level: &Level) -> WorldState {
        let mut state = WorldState::new(level);

        let saved = &self.state.hero;
        let (x, y) = level.board.clamp(
            saved.x.unwrap_or(state.hero.x),
            saved.y.unwrap_or(state.hero.y),
        );
        state.hero.x = x;
        state.hero.y = y;

        state.vars = self.state.vars.clone();
        state.flags = self.state.flags.clone();
        state.flags.retain_known(&state.pois);
        state
    }
}

/// Tolerant (de)serializers for persisted state
mod lenient {
    use super::*;
    use serde::de::DeserializeOwned;
    use serde::{Deserializer, Serializer};
    use serde_json::Value;

    /// `null` or a value of the wrong shape reads as `T::default()`
    pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        let value = Value::deserialize(deserializer)?;
        if value.is_null() {
            return Ok(T::default());
        }
        Ok(serde_json::from_value(value).unwrap_or_else(|err| {
            warn!(error = %err, "replacing malformed snapshot field with its default");
            T::default()
        }))
    }

    /// Any JSON number (or numeric string), truncated toward zero
    pub fn coord<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let n = match Value::deserialize(deserializer)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        // `as` saturates out-of-range values; hydrate clamps them onto the board
        Ok(n.filter(|n| n.is_finite()).map(|n| n.trunc() as i32))
    }

    /// Entries of a JSON object, or nothing for any other value
    fn entries(value: Value, field: &str) -> serde_json::Map<String, Value> {
        match value {
            Value::Object(map) => map,
            Value::Null => serde_json::Map::new(),
            _ => {
                warn!(field, "ignoring malformed snapshot field");
                serde_json::Map::new()
            }
        }
    }

    /// `scanned` is written as `{ "id": true }`; a plain list is also read.
    pub mod scanned {
        use super::*;
        use serde::ser::SerializeMap;

        pub fn serialize<S>(set: &HashSet<String>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            let mut map = serializer.serialize_map(Some(set.len()))?;
            for id in set {
                map.serialize_entry(id, &true)?;
            }
            map.end()
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<HashSet<String>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Ok(match Value::deserialize(deserializer)? {
                Value::Array(ids) => ids
                    .into_iter()
                    .filter_map(|id| id.as_str().map(str::to_string))
                    .collect(),
                other => entries(other, "scanned")
                    .into_iter()
                    .filter(|(_, v)| v.as_bool().unwrap_or(false))
                    .map(|(k, _)| k)
                    .collect(),
            })
        }
    }

    /// Entries that are not `{ "var": .., "value": .. }` are dropped.
    pub mod delivered {
        use super::*;

        pub fn serialize<S>(
            map: &HashMap<String, Delivery>,
            serializer: S,
        ) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            map.serialize(serializer)
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<HashMap<String, Delivery>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let raw = entries(Value::deserialize(deserializer)?, "delivered");
            Ok(raw
                .into_iter()
                .filter_map(|(id, v)| match serde_json::from_value::<Delivery>(v) {
                    Ok(delivery) => Some((id, delivery)),
                    Err(_) => {
                        warn!(poi = %id, "dropping malformed delivery entry");
                        None
                    }
                })
                .collect())
        }
    }

    /// Non-string values are dropped.
    pub mod vars {
        use super::*;

        pub fn serialize<S>(map: &HashMap<String, String>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            map.serialize(serializer)
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let raw = entries(Value::deserialize(deserializer)?, "vars");
            Ok(raw
                .into_iter()
                .filter_map(|(name, v)| match v {
                    Value::String(s) => Some((name, s)),
                    _ => {
                        warn!(var = %name, "dropping non-string variable");
                        None
                    }
                })
                .collect())
        }
    }
}
