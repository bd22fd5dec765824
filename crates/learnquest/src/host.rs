//! Terminal host for the runtime

use std::io::{self, BufRead, Write};
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use lq_core::level::Board;
use lq_core::{EngineOptions, GoalReport, Level, RuntimeHooks, Snapshot, WorldState, evaluate_goals};
use lq_save::save_snapshot;

/// Empty board cell
const EMPTY_CELL: &str = "·";

/// Prints runtime events to the terminal and autosaves progress
pub struct TerminalHost {
    level: Level,
    options: EngineOptions,
    /// Program text stored with every snapshot
    code: String,
    save_path: Option<PathBuf>,
    /// Wait for Enter between steps instead of sleeping
    interactive: bool,
}

impl TerminalHost {
    pub fn new(level: Level, options: EngineOptions, code: String) -> Self {
        Self {
            level,
            options,
            code,
            save_path: None,
            interactive: false,
        }
    }

    pub fn with_save_path(mut self, path: PathBuf) -> Self {
        self.save_path = Some(path);
        self
    }

    pub fn interactive(mut self, on: bool) -> Self {
        self.interactive = on;
        self
    }

    /// Persist the given state when autosave is on
    pub fn save(&self, state: &WorldState) {
        let Some(path) = &self.save_path else {
            return;
        };
        if !self.options.autosave {
            return;
        }
        let snapshot = Snapshot::capture(&self.level.id, state, &self.code);
        if let Err(err) = save_snapshot(&snapshot, path) {
            warn!(path = %path.display(), error = %err, "autosave failed");
        }
    }

    pub fn show(&self, state: &WorldState) {
        if self.options.board {
            println!("{}", render_board(self.level.board, state));
            println!("{}", render_vars(state));
        }
        if self.options.verbose {
            print!("{}", render_progress(&evaluate_goals(&self.level, state)));
        }
    }
}

impl RuntimeHooks for TerminalHost {
    fn on_update(&mut self, state: &WorldState) {
        self.show(state);
        self.save(state);
    }

    fn on_log(&mut self, message: &str) {
        println!("> {}", message);
    }

    fn on_error(&mut self, message: &str) {
        eprintln!("error: {}", message);
    }

    fn on_win(&mut self, report: &GoalReport) {
        print!("{}", render_progress(report));
    }

    fn pause(&mut self, delay: Duration) -> ControlFlow<()> {
        if !self.interactive {
            std::thread::sleep(delay);
            return ControlFlow::Continue(());
        }

        print!("[enter] next step, q to stop: ");
        io::stdout().flush().ok();
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => ControlFlow::Break(()),
            Ok(_) if line.trim().eq_ignore_ascii_case("q") => ControlFlow::Break(()),
            Ok(_) => ControlFlow::Continue(()),
        }
    }
}

/// Draw the board, one row per line
pub fn render_board(board: Board, state: &WorldState) -> String {
    let mut rows = Vec::with_capacity(board.h.max(0) as usize);
    for y in 0..board.h {
        let cells: Vec<&str> = (0..board.w)
            .map(|x| {
                if state.hero_at(x, y) {
                    return state.hero.icon.as_str();
                }
                state
                    .pois
                    .values()
                    .find(|p| p.x == x && p.y == y)
                    .map_or(EMPTY_CELL, |p| p.icon.as_str())
            })
            .collect();
        rows.push(cells.join(" "));
    }
    rows.join("\n")
}

/// Hero position and variables, sorted by name
pub fn render_vars(state: &WorldState) -> String {
    let mut vars: Vec<(&String, &String)> = state.vars.iter().collect();
    vars.sort();
    let vars: Vec<String> = vars
        .into_iter()
        .map(|(name, value)| format!("{} = {:?}", name, value))
        .collect();
    let vars = if vars.is_empty() {
        "(no variables)".to_string()
    } else {
        vars.join(", ")
    };
    format!("hero at ({}, {}) | {}", state.hero.x, state.hero.y, vars)
}

/// Goal checklist
pub fn render_progress(report: &GoalReport) -> String {
    let mut out = format!("goals {}/{}\n", report.completed(), report.total());
    for goal in &report.progress {
        let mark = if goal.ok { "x" } else { " " };
        out.push_str(&format!("  [{}] {}\n", mark, goal.label));
    }
    out
}
