//! Program actions
//!
//! An [`Action`] is one parsed statement of a learner's program. Actions are
//! produced by [`parser::parse_program`] and applied by
//! [`rules::apply_action`].

use core::fmt;

use hashbrown::HashSet;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

pub mod parser;
pub mod rules;

pub use parser::{COMMENT_MARKER, ParseError, parse_program};
pub use rules::{RuleError, apply_action};

/// Command identifiers a level can unlock
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, AsRefStr,
)]
pub enum CommandId {
    #[strum(serialize = "hero.moveUp")]
    MoveUp,
    #[strum(serialize = "hero.moveDown")]
    MoveDown,
    #[strum(serialize = "hero.moveLeft")]
    MoveLeft,
    #[strum(serialize = "hero.moveRight")]
    MoveRight,
    #[strum(serialize = "hero.scan")]
    Scan,
    #[strum(serialize = "hero.deliver")]
    Deliver,
    #[strum(serialize = "set")]
    Set,
}

/// Set of commands usable in a level
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList(HashSet<CommandId>);

impl AllowList {
    /// Build from raw identifiers, skipping unknown ones
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            ids.into_iter()
                .filter_map(|id| id.as_ref().parse().ok())
                .collect(),
        )
    }

    /// Every command unlocked
    pub fn all() -> Self {
        Self(CommandId::iter().collect())
    }

    pub fn contains(&self, command: CommandId) -> bool {
        self.0.contains(&command)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<CommandId> for AllowList {
    fn from_iter<T: IntoIterator<Item = CommandId>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Movement directions. Up decreases y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Get the delta (dx, dy) for this direction
    pub const fn delta(&self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    /// Method name used in programs (`moveUp`, ...)
    pub const fn method(&self) -> &'static str {
        match self {
            Direction::Up => "moveUp",
            Direction::Down => "moveDown",
            Direction::Left => "moveLeft",
            Direction::Right => "moveRight",
        }
    }

    /// Look up a direction by its method name
    pub fn from_method(name: &str) -> Option<Self> {
        Self::iter().find(|dir| dir.method() == name)
    }

    pub const fn command(&self) -> CommandId {
        match self {
            Direction::Up => CommandId::MoveUp,
            Direction::Down => CommandId::MoveDown,
            Direction::Left => CommandId::MoveLeft,
            Direction::Right => CommandId::MoveRight,
        }
    }
}

/// One operand of a `set` expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    /// A double-quoted string literal (quotes stripped)
    Literal(String),
    /// A reference to a variable
    Var(String),
}

/// `+`-joined sequence of literals and variable references
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    pub terms: Vec<Term>,
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                f.write_str(" + ")?;
            }
            match term {
                Term::Literal(s) => write!(f, "\"{}\"", s)?,
                Term::Var(name) => f.write_str(name)?,
            }
        }
        Ok(())
    }
}

/// What an action does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    Move { dir: Direction, repeat: u32 },
    Scan { poi: String, var: String },
    Set { var: String, expr: Expr },
    Deliver { poi: String, var: String },
}

impl ActionKind {
    /// The allow-list entry that gates this action
    pub const fn command(&self) -> CommandId {
        match self {
            ActionKind::Move { dir, .. } => dir.command(),
            ActionKind::Scan { .. } => CommandId::Scan,
            ActionKind::Set { .. } => CommandId::Set,
            ActionKind::Deliver { .. } => CommandId::Deliver,
        }
    }
}

/// A parsed statement with its 1-based source line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub line: usize,
    pub kind: ActionKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_id_strings() {
        assert_eq!(CommandId::MoveUp.to_string(), "hero.moveUp");
        assert_eq!("hero.deliver".parse::<CommandId>().ok(), Some(CommandId::Deliver));
        assert_eq!("set".parse::<CommandId>().ok(), Some(CommandId::Set));
        assert!("hero.fly".parse::<CommandId>().is_err());
    }

    #[test]
    fn test_allow_list_skips_unknown() {
        let allowed = AllowList::from_ids(["hero.moveUp", "hero.teleport", "set"]);
        assert_eq!(allowed.len(), 2);
        assert!(allowed.contains(CommandId::MoveUp));
        assert!(allowed.contains(CommandId::Set));
        assert!(!allowed.contains(CommandId::Scan));
        assert!(!allowed.is_empty());
        assert!(AllowList::from_ids(["hero.fly"]).is_empty());
        assert_eq!(AllowList::all().len(), 7);
    }

    #[test]
    fn test_direction_lookup() {
        assert_eq!(Direction::from_method("moveLeft"), Some(Direction::Left));
        assert_eq!(Direction::from_method("moveNorth"), None);
        for dir in Direction::iter() {
            assert_eq!(Direction::from_method(dir.method()), Some(dir));
            assert_eq!(dir.command().to_string(), format!("hero.{}", dir.method()));
        }
    }

    #[test]
    fn test_expr_display() {
        let expr = Expr {
            terms: vec![Term::Var("msg".to_string()), Term::Literal("!".to_string())],
        };
        assert_eq!(expr.to_string(), "msg + \"!\"");
    }
}
