//! Level definitions
//!
//! A level is loaded once from JSON, validated, and from then on only read by
//! the parser (allow-list), the rules (board, POIs) and the goal evaluator.

use std::path::Path;

use hashbrown::HashSet;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use strum::{Display, EnumIter};
use thiserror::Error;
use tracing::{info, warn};

use crate::action::{AllowList, CommandId};

/// Icon used for the hero when the level does not name one
pub const DEFAULT_HERO_ICON: &str = "🧑‍🚀";

/// Icon used for a POI when the level does not name one
pub const DEFAULT_POI_ICON: &str = "❖";

/// Level loading errors
#[derive(Debug, Error)]
pub enum LevelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid level JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Level is missing an id")]
    MissingId,

    #[error("Board must be at least 1x1, got {w}x{h}")]
    EmptyBoard { w: i32, h: i32 },

    #[error("Hero spawn ({x},{y}) is outside the {w}x{h} board")]
    SpawnOutOfBounds { x: i32, y: i32, w: i32, h: i32 },

    #[error("POI at ({x},{y}) has an empty id")]
    UnnamedPoi { x: i32, y: i32 },

    #[error("Duplicate POI id: {0}")]
    DuplicatePoi(String),

    #[error("POI {id} at ({x},{y}) is outside the board")]
    PoiOutOfBounds { id: String, x: i32, y: i32 },
}

/// Board dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub w: i32,
    pub h: i32,
}

impl Board {
    /// Check if a cell lies on the board
    pub const fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && x < self.w && y >= 0 && y < self.h
    }

    /// Clamp a coordinate pair into `[0,w) x [0,h)`. A board with no cells
    /// (only reachable by skipping [`Level::validate`]) clamps to the origin.
    pub fn clamp(&self, x: i32, y: i32) -> (i32, i32) {
        (
            x.clamp(0, self.w.saturating_sub(1).max(0)),
            y.clamp(0, self.h.saturating_sub(1).max(0)),
        )
    }
}

/// Hero spawn point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeroSpawn {
    pub x: i32,
    pub y: i32,
    #[serde(default = "default_hero_icon")]
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spawn {
    pub hero: HeroSpawn,
}

/// What a point of interest lets the hero do
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PoiKind {
    /// Provides a payload readable with `scan`
    Data,
    /// Accepts `deliver`
    Deliver,
    /// Decoration only
    #[default]
    Landmark,
}

/// Point of interest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poi {
    pub id: String,
    pub x: i32,
    pub y: i32,
    #[serde(default = "default_poi_icon")]
    pub icon: String,
    /// Scannable payload. Numbers and booleans are stored as their text form.
    #[serde(
        default,
        deserialize_with = "deserialize_payload",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: PoiKind,
}

/// Win condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Goal {
    /// Hero stands exactly on (x, y)
    Reached { x: i32, y: i32 },
    /// `var_name` was delivered to `poi`, containing every string of `contains`
    Deliver {
        #[serde(rename = "to")]
        poi: String,
        #[serde(rename = "var")]
        var_name: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        contains: Vec<String>,
    },
    /// Any goal type this engine does not know; never satisfied
    #[serde(other)]
    Unknown,
}

/// Narrative text shown by hosts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intro: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail: Option<String>,
}

/// A playable level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Level {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson: Option<String>,
    #[serde(default)]
    pub story: Story,
    #[serde(default)]
    pub hints: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starter_code: Option<String>,
    pub board: Board,
    pub spawn: Spawn,
    #[serde(default)]
    pub pois: Vec<Poi>,
    /// Command identifiers unlocked in this level (e.g. `hero.moveUp`, `set`)
    pub allowed: Vec<String>,
    pub goals: Vec<Goal>,
}

impl Level {
    /// Parse and validate a level from JSON text
    pub fn from_json(json: &str) -> Result<Self, LevelError> {
        let level: Level = serde_json::from_str(json)?;
        level.validate()?;
        Ok(level)
    }

    /// Load and validate a level file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LevelError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let level = Self::from_json(&content)?;
        info!(level = %level.id, path = %path.display(), "level loaded");
        Ok(level)
    }

    /// Check the invariants the engine relies on
    pub fn validate(&self) -> Result<(), LevelError> {
        if self.id.trim().is_empty() {
            return Err(LevelError::MissingId);
        }

        let Board { w, h } = self.board;
        if w <= 0 || h <= 0 {
            return Err(LevelError::EmptyBoard { w, h });
        }

        let hero = &self.spawn.hero;
        if !self.board.contains(hero.x, hero.y) {
            return Err(LevelError::SpawnOutOfBounds {
                x: hero.x,
                y: hero.y,
                w,
                h,
            });
        }

        let mut seen = HashSet::with_capacity(self.pois.len());
        for poi in &self.pois {
            if poi.id.is_empty() {
                return Err(LevelError::UnnamedPoi { x: poi.x, y: poi.y });
            }
            if !seen.insert(poi.id.as_str()) {
                return Err(LevelError::DuplicatePoi(poi.id.clone()));
            }
            if !self.board.contains(poi.x, poi.y) {
                return Err(LevelError::PoiOutOfBounds {
                    id: poi.id.clone(),
                    x: poi.x,
                    y: poi.y,
                });
            }
        }

        for id in &self.allowed {
            if id.parse::<CommandId>().is_err() {
                warn!(level = %self.id, command = %id, "ignoring unknown allowed command");
            }
        }
        if self.allow_list().is_empty() {
            warn!(level = %self.id, "no commands unlocked; every program will be rejected");
        }

        Ok(())
    }

    /// Title for display, falling back to the id
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }

    /// Find a POI by id
    pub fn poi(&self, id: &str) -> Option<&Poi> {
        self.pois.iter().find(|p| p.id == id)
    }

    /// Commands unlocked in this level
    pub fn allow_list(&self) -> AllowList {
        AllowList::from_ids(&self.allowed)
    }
}

fn default_hero_icon() -> String {
    DEFAULT_HERO_ICON.to_string()
}

fn default_poi_icon() -> String {
    DEFAULT_POI_ICON.to_string()
}

fn deserialize_payload<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "POI data must be a string, number or bool, got {}",
            other
        ))),
    }
}
