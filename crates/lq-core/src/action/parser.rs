//! Program parser
//!
//! Programs are strictly line oriented: every non-blank line that is not a
//! comment is exactly one statement. Recognized statements, tried in order:
//!
//! ```text
//! hero.moveUp()   hero.moveDown()   hero.moveLeft()   hero.moveRight()
//! hero.scan("poi", "var")
//! hero.deliver("poi", "var")
//! set var = "literal" + other_var + ...
//! ```
//!
//! The whole program is validated before anything is returned. A command the
//! level has not unlocked is reported exactly like a line that does not parse.

use thiserror::Error;
use tracing::debug;

use super::{Action, ActionKind, AllowList, Direction, Expr, Term};

/// Lines starting with this are ignored
pub const COMMENT_MARKER: &str = "//";

/// A rejected program line
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    /// 1-based line number
    pub line: usize,
    pub message: String,
}

impl ParseError {
    fn rejected(line: usize, text: &str) -> Self {
        Self {
            line,
            message: format!("invalid command: {}", text),
        }
    }
}

/// Parse a whole program against a level's allow-list
pub fn parse_program(source: &str, allowed: &AllowList) -> Result<Vec<Action>, ParseError> {
    let mut actions = Vec::new();

    for (idx, raw) in source.lines().enumerate() {
        let line = idx + 1;
        let text = raw.trim();
        if text.is_empty() || text.starts_with(COMMENT_MARKER) {
            continue;
        }

        let Some(kind) = parse_statement(text) else {
            debug!(line, "syntax error");
            return Err(ParseError::rejected(line, text));
        };

        if !allowed.contains(kind.command()) {
            debug!(line, command = %kind.command(), "command not unlocked");
            return Err(ParseError::rejected(line, text));
        }

        actions.push(Action { line, kind });
    }

    debug!(actions = actions.len(), "program parsed");
    Ok(actions)
}

/// Parse one trimmed, non-comment line
fn parse_statement(text: &str) -> Option<ActionKind> {
    if let Some(call) = text.strip_prefix("hero.") {
        return parse_hero_call(call);
    }
    parse_set(text)
}

fn parse_hero_call(call: &str) -> Option<ActionKind> {
    let mut s = Scanner::new(call);
    let name = s.ident()?;
    if !s.eat('(') {
        return None;
    }

    let kind = if let Some(dir) = Direction::from_method(name) {
        ActionKind::Move { dir, repeat: 1 }
    } else {
        let (poi, var) = match name {
            "scan" | "deliver" => parse_poi_args(&mut s)?,
            _ => return None,
        };
        if name == "scan" {
            ActionKind::Scan { poi, var }
        } else {
            ActionKind::Deliver { poi, var }
        }
    };

    s.skip_ws();
    if !s.eat(')') {
        return None;
    }
    s.skip_ws();
    s.is_done().then_some(kind)
}

/// `"poi", "var"`
fn parse_poi_args(s: &mut Scanner<'_>) -> Option<(String, String)> {
    s.skip_ws();
    let poi = s.quoted().filter(|p| !p.is_empty())?;
    s.skip_ws();
    if !s.eat(',') {
        return None;
    }
    s.skip_ws();
    let var = s.quoted().filter(|v| is_ident(v))?;
    Some((poi.to_string(), var.to_string()))
}

/// `set name = expr`
fn parse_set(text: &str) -> Option<ActionKind> {
    let rest = text.strip_prefix("set")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let mut s = Scanner::new(rest);
    s.skip_ws();
    let var = s.ident()?.to_string();
    s.skip_ws();
    if !s.eat('=') {
        return None;
    }
    let expr = parse_expr(&mut s)?;
    Some(ActionKind::Set { var, expr })
}

fn parse_expr(s: &mut Scanner<'_>) -> Option<Expr> {
    let mut terms = Vec::new();
    loop {
        s.skip_ws();
        let term = if s.peek() == Some('"') {
            Term::Literal(s.quoted()?.to_string())
        } else {
            Term::Var(s.ident()?.to_string())
        };
        terms.push(term);

        s.skip_ws();
        if s.is_done() {
            return Some(Expr { terms });
        }
        if !s.eat('+') {
            return None;
        }
    }
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Minimal cursor over a statement
struct Scanner<'a> {
    rest: &'a str,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self { rest: text }
    }

    fn peek(&self) -> Option<char> {
        self.rest.chars().next()
    }

    fn is_done(&self) -> bool {
        self.rest.is_empty()
    }

    fn skip_ws(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn eat(&mut self, c: char) -> bool {
        match self.rest.strip_prefix(c) {
            Some(rest) => {
                self.rest = rest;
                true
            }
            None => false,
        }
    }

    /// `[A-Za-z_][A-Za-z0-9_]*`
    fn ident(&mut self) -> Option<&'a str> {
        let end = self
            .rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(self.rest.len());
        let (ident, rest) = self.rest.split_at(end);
        if !is_ident(ident) {
            return None;
        }
        self.rest = rest;
        Some(ident)
    }

    /// Double-quoted string without escapes; returns the contents
    fn quoted(&mut self) -> Option<&'a str> {
        let body = self.rest.strip_prefix('"')?;
        let end = body.find('"')?;
        self.rest = &body[end + 1..];
        Some(&body[..end])
    }
}
