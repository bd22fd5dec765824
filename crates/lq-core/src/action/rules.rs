//! Action rules
//!
//! Applies a single action to the world state. Every precondition is checked
//! before the first write, so a failed action leaves the state untouched.

use hashbrown::HashMap;
use thiserror::Error;
use tracing::trace;

use super::{Action, ActionKind, Direction, Expr, Term};
use crate::level::{Level, Poi, PoiKind};
use crate::state::{Delivery, WorldState};

/// Runtime precondition failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("unknown POI: {0}")]
    UnknownPoi(String),

    #[error("you are not at {0}")]
    NotAtPoi(String),

    #[error("{0} has no data to scan")]
    NothingToScan(String),

    #[error("{0} does not accept deliveries")]
    NotDeliverable(String),

    #[error("variable {0} is not set")]
    UnboundVariable(String),
}

/// Apply one action, returning a short description of its effect
pub fn apply_action(
    level: &Level,
    state: &mut WorldState,
    action: &Action,
) -> Result<String, RuleError> {
    trace!(line = action.line, action = ?action.kind, "applying action");

    match &action.kind {
        ActionKind::Move { dir, repeat } => {
            move_hero(level, state, *dir, *repeat);
            Ok(if *repeat > 1 {
                format!("{}({})", dir.command(), repeat)
            } else {
                format!("{}()", dir.command())
            })
        }

        ActionKind::Scan { poi, var } => {
            let payload = {
                let target = poi_in_reach(state, poi)?;
                if target.kind != PoiKind::Data {
                    return Err(RuleError::NothingToScan(poi.clone()));
                }
                target
                    .data
                    .clone()
                    .ok_or_else(|| RuleError::NothingToScan(poi.clone()))?
            };
            state.vars.insert(var.clone(), payload);
            state.flags.scanned.insert(poi.clone());
            Ok(format!("scan {} -> {}", poi, var))
        }

        ActionKind::Set { var, expr } => {
            let value = eval_concat(expr, &state.vars)?;
            let effect = format!("set {} = \"{}\"", var, value);
            state.vars.insert(var.clone(), value);
            Ok(effect)
        }

        ActionKind::Deliver { poi, var } => {
            let target = poi_in_reach(state, poi)?;
            if target.kind != PoiKind::Deliver {
                return Err(RuleError::NotDeliverable(poi.clone()));
            }
            let value = state
                .vars
                .get(var)
                .cloned()
                .ok_or_else(|| RuleError::UnboundVariable(var.clone()))?;
            state.flags.delivered.insert(
                poi.clone(),
                Delivery {
                    var: var.clone(),
                    value,
                },
            );
            Ok(format!("deliver {} -> {}", var, poi))
        }
    }
}

/// Step the hero one cell at a time, clamping after every step
fn move_hero(level: &Level, state: &mut WorldState, dir: Direction, repeat: u32) {
    let (dx, dy) = dir.delta();
    for _ in 0..repeat {
        let (x, y) = level.board.clamp(
            state.hero.x.saturating_add(dx),
            state.hero.y.saturating_add(dy),
        );
        state.hero.x = x;
        state.hero.y = y;
    }
}

/// Look up a POI and require the hero to stand on it
fn poi_in_reach<'s>(state: &'s WorldState, id: &str) -> Result<&'s Poi, RuleError> {
    let poi = state
        .poi(id)
        .ok_or_else(|| RuleError::UnknownPoi(id.to_string()))?;
    if !state.hero_on(poi) {
        return Err(RuleError::NotAtPoi(id.to_string()));
    }
    Ok(poi)
}

/// Evaluate a `set` expression against the current variables
pub fn eval_concat(expr: &Expr, vars: &HashMap<String, String>) -> Result<String, RuleError> {
    let mut out = String::new();
    for term in &expr.terms {
        match term {
            Term::Literal(s) => out.push_str(s),
            Term::Var(name) => {
                let value = vars
                    .get(name)
                    .ok_or_else(|| RuleError::UnboundVariable(name.clone()))?;
                out.push_str(value);
            }
        }
    }
    Ok(out)
}
