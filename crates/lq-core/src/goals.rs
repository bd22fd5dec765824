//! Goal evaluation
//!
//! Pure function of the level's goals and the current world state.

use serde::Serialize;

use crate::level::{Goal, Level};
use crate::state::WorldState;

/// One goal's label and whether it currently holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GoalProgress {
    pub label: String,
    pub ok: bool,
}

/// Result of evaluating every goal of a level
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GoalReport {
    /// All goals hold
    pub win: bool,
    pub progress: Vec<GoalProgress>,
}

impl GoalReport {
    /// Number of goals currently met
    pub fn completed(&self) -> usize {
        self.progress.iter().filter(|p| p.ok).count()
    }

    pub fn total(&self) -> usize {
        self.progress.len()
    }
}

/// Evaluate all goals. A level with no goals is trivially won.
pub fn evaluate_goals(level: &Level, state: &WorldState) -> GoalReport {
    let progress: Vec<GoalProgress> = level.goals.iter().map(|g| check_goal(g, state)).collect();
    GoalReport {
        win: progress.iter().all(|p| p.ok),
        progress,
    }
}

fn check_goal(goal: &Goal, state: &WorldState) -> GoalProgress {
    match goal {
        Goal::Reached { x, y } => GoalProgress {
            label: format!("Reach ({},{})", x, y),
            ok: state.hero_at(*x, *y),
        },
        Goal::Deliver {
            poi,
            var_name,
            contains,
        } => {
            let ok = state.flags.delivered.get(poi).is_some_and(|d| {
                d.var == *var_name && contains.iter().all(|needle| d.value.contains(needle.as_str()))
            });
            let mut label = format!("Deliver {} to {}", var_name, poi);
            if !contains.is_empty() {
                let quoted: Vec<String> = contains.iter().map(|c| format!("\"{}\"", c)).collect();
                label.push_str(&format!(" containing {}", quoted.join(", ")));
            }
            GoalProgress { label, ok }
        }
        Goal::Unknown => GoalProgress {
            label: "Unknown goal".to_string(),
            ok: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Delivery;

    fn level(goals: &str) -> Level {
        Level::from_json(&format!(
            r#"{{
            "id": "goals",
            "board": {{ "w": 8, "h": 8 }},
            "spawn": {{ "hero": {{ "x": 0, "y": 4 }} }},
            "pois": [ {{ "id": "post", "x": 4, "y": 0, "type": "deliver" }} ],
            "allowed": [],
            "goals": {}
        }}"#,
            goals
        ))
        .unwrap()
    }

    fn deliver(state: &mut WorldState, var: &str, value: &str) {
        state.flags.delivered.insert(
            "post".to_string(),
            Delivery {
                var: var.to_string(),
                value: value.to_string(),
            },
        );
    }

    #[test]
    fn test_reached_goal() {
        let level = level(r#"[ { "type": "reached", "x": 2, "y": 4 } ]"#);
        let mut state = WorldState::new(&level);
        let report = evaluate_goals(&level, &state);
        assert!(!report.win);
        assert_eq!(report.progress[0].label, "Reach (2,4)");

        state.hero.x = 2;
        assert!(evaluate_goals(&level, &state).win);
    }

    #[test]
    fn test_deliver_goal_checks_variable_and_substrings() {
        let level = level(
            r#"[ { "type": "deliver", "to": "post", "var": "msg", "contains": ["hello", "!"] } ]"#,
        );
        let mut state = WorldState::new(&level);
        assert!(!evaluate_goals(&level, &state).win);

        deliver(&mut state, "other", "hello!");
        assert!(!evaluate_goals(&level, &state).win);

        deliver(&mut state, "msg", "hello");
        assert!(!evaluate_goals(&level, &state).win);

        deliver(&mut state, "msg", "hello world!");
        let report = evaluate_goals(&level, &state);
        assert!(report.win);
        assert_eq!(
            report.progress[0].label,
            "Deliver msg to post containing \"hello\", \"!\""
        );
    }

    #[test]
    fn test_deliver_goal_without_substrings() {
        let level = level(r#"[ { "type": "deliver", "to": "post", "var": "msg" } ]"#);
        let mut state = WorldState::new(&level);
        deliver(&mut state, "msg", "");
        let report = evaluate_goals(&level, &state);
        assert!(report.win);
        assert_eq!(report.progress[0].label, "Deliver msg to post");
    }

    #[test]
    fn test_unknown_goal_never_wins() {
        let level = level(
            r#"[ { "type": "reached", "x": 0, "y": 4 }, { "type": "dance", "moves": 3 } ]"#,
        );
        let state = WorldState::new(&level);
        let report = evaluate_goals(&level, &state);
        assert!(!report.win);
        assert_eq!(report.completed(), 1);
        assert_eq!(report.total(), 2);
        assert_eq!(report.progress[1], GoalProgress { label: "Unknown goal".to_string(), ok: false });
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let level = level(r#"[ { "type": "reached", "x": 0, "y": 4 } ]"#);
        let state = WorldState::new(&level);
        let before = state.clone();
        assert_eq!(evaluate_goals(&level, &state), evaluate_goals(&level, &state));
        assert_eq!(state, before);
    }

    #[test]
    fn test_no_goals_is_win() {
        let level = level("[]");
        let state = WorldState::new(&level);
        let report = evaluate_goals(&level, &state);
        assert!(report.win);
        assert_eq!(report.total(), 0);
    }
}
