//! lq-core: scripting engine for the LearnQuest programming sandbox
//!
//! A learner writes short line-oriented programs that move a hero around a
//! grid, scan points of interest into string variables, combine those
//! variables and deliver them. This crate holds the whole engine: level
//! schema, world state and snapshots, the parser, the action rules, goal
//! evaluation and the step/run controller.
//!
//! The engine depends only on a [`Level`] value and injected
//! [`RuntimeHooks`]; rendering and storage belong to the host.

pub mod action;
pub mod goals;
pub mod level;
pub mod options;
pub mod runtime;
pub mod state;

pub use action::{Action, ActionKind, AllowList, CommandId, Direction, ParseError, RuleError};
pub use goals::{GoalProgress, GoalReport, evaluate_goals};
pub use level::{Goal, Level, LevelError, Poi, PoiKind};
pub use options::{EngineOptions, OptionsError};
pub use runtime::{RunOptions, Runtime, RuntimeHooks, StepOutcome};
pub use state::{Snapshot, SnapshotError, Status, WorldState};
