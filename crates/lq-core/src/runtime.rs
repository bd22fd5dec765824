//! Runtime controller
//!
//! Owns the world state and the queue of parsed actions, and drives them
//! through the rules and the goal evaluator one at a time. Hosts observe
//! progress through [`RuntimeHooks`].
//!
//! Status transitions:
//!
//! ```text
//! idle --run--> running --queue drained--> idle
//!   |              |----action failed----> error
//!   |              `----goals met--------> win
//!   `--bad program--> error
//! any --reset--> idle
//! ```

use std::collections::VecDeque;
use std::ops::ControlFlow;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::action::{Action, AllowList, apply_action, parse_program};
use crate::goals::{GoalReport, evaluate_goals};
use crate::level::Level;
use crate::state::{Snapshot, Status, WorldState};

/// Default pause between steps of [`Runtime::run`]
pub const DEFAULT_STEP_DELAY_MS: u64 = 220;

/// Host callbacks. Every method defaults to doing nothing, except
/// [`RuntimeHooks::pause`] which sleeps.
pub trait RuntimeHooks {
    /// State changed after a successful, non-winning step (or a reset)
    fn on_update(&mut self, _state: &WorldState) {}

    /// Human-readable effect of an action, prefixed with its line
    fn on_log(&mut self, _message: &str) {}

    /// Parse or runtime failure, prefixed with its line
    fn on_error(&mut self, _message: &str) {}

    /// All goals met
    fn on_win(&mut self, _report: &GoalReport) {}

    /// Pause between two steps of a run. Returning `Break` cancels the run
    /// and resets the runtime.
    fn pause(&mut self, delay: Duration) -> ControlFlow<()> {
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        ControlFlow::Continue(())
    }
}

/// Hooks that ignore everything
impl RuntimeHooks for () {}

/// Options for [`Runtime::run`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub delay: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(DEFAULT_STEP_DELAY_MS),
        }
    }
}

impl RunOptions {
    /// Run without pausing between steps
    pub const fn immediate() -> Self {
        Self {
            delay: Duration::ZERO,
        }
    }
}

/// Result of a single [`Runtime::step`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Nothing queued
    Empty,
    /// Action applied, goals not yet met
    Continue,
    /// Action applied and every goal is met
    Won,
    /// Action failed; the queue was discarded
    Failed,
}

/// Execution controller for one level
pub struct Runtime<H: RuntimeHooks> {
    level: Level,
    allowed: AllowList,
    state: WorldState,
    hooks: H,
    queue: VecDeque<Action>,
    running: bool,
}

impl<H: RuntimeHooks> Runtime<H> {
    pub fn new(level: Level, state: WorldState, hooks: H) -> Self {
        let allowed = level.allow_list();
        Self {
            level,
            allowed,
            state,
            hooks,
            queue: VecDeque::new(),
            running: false,
        }
    }

    /// Runtime on a fresh spawn state
    pub fn fresh(level: Level, hooks: H) -> Self {
        let state = WorldState::new(&level);
        Self::new(level, state, hooks)
    }

    pub fn level(&self) -> &Level {
        &self.level
    }

    pub fn state(&self) -> &WorldState {
        &self.state
    }

    pub fn status(&self) -> Status {
        self.state.status
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Evaluate goals against the current state
    pub fn goals(&self) -> GoalReport {
        evaluate_goals(&self.level, &self.state)
    }

    /// Capture the current progress together with the program text
    pub fn snapshot(&self, code: &str) -> Snapshot {
        Snapshot::capture(&self.level.id, &self.state, code)
    }

    /// Parse a program and replace the queue with it.
    ///
    /// On a parse error the status becomes `error`, the queue is left as it
    /// was and `false` is returned. On success the status is unchanged.
    pub fn load_program(&mut self, code: &str) -> bool {
        match parse_program(code, &self.allowed) {
            Ok(actions) => {
                debug!(level = %self.level.id, actions = actions.len(), "program loaded");
                self.queue = actions.into();
                true
            }
            Err(err) => {
                warn!(level = %self.level.id, line = err.line, "program rejected");
                self.state.status = Status::Error;
                self.hooks.on_error(&err.to_string());
                false
            }
        }
    }

    /// Execute the next queued action
    pub fn step(&mut self) -> StepOutcome {
        let Some(action) = self.queue.pop_front() else {
            return StepOutcome::Empty;
        };

        match apply_action(&self.level, &mut self.state, &action) {
            Err(err) => {
                warn!(level = %self.level.id, line = action.line, error = %err, "action failed");
                self.state.status = Status::Error;
                self.queue.clear();
                self.running = false;
                self.hooks
                    .on_error(&format!("line {}: {}", action.line, err));
                StepOutcome::Failed
            }
            Ok(effect) => {
                self.hooks
                    .on_log(&format!("line {}: {}", action.line, effect));

                let report = evaluate_goals(&self.level, &self.state);
                if report.win {
                    info!(level = %self.level.id, line = action.line, "level completed");
                    self.state.status = Status::Win;
                    self.queue.clear();
                    self.running = false;
                    self.hooks.on_win(&report);
                    StepOutcome::Won
                } else {
                    self.hooks.on_update(&self.state);
                    StepOutcome::Continue
                }
            }
        }
    }

    /// Drain the queue, pausing between steps.
    ///
    /// Does nothing if a run is already in progress. Returns the status the
    /// run ended with.
    pub fn run(&mut self, options: RunOptions) -> Status {
        if self.running {
            return self.state.status;
        }
        self.running = true;
        self.state.status = Status::Running;

        while self.running && !self.queue.is_empty() {
            self.step();
            if self.state.status.is_terminal() || self.queue.is_empty() {
                break;
            }
            if self.hooks.pause(options.delay).is_break() {
                debug!(level = %self.level.id, "run cancelled by host");
                self.reset(None);
                break;
            }
        }

        if self.state.status == Status::Running {
            self.state.status = Status::Idle;
        }
        self.running = false;
        self.state.status
    }

    /// Stop everything and go back to `idle`, optionally swapping in a new
    /// world state.
    pub fn reset(&mut self, new_state: Option<WorldState>) {
        self.running = false;
        self.queue.clear();
        if let Some(state) = new_state {
            self.state = state;
        }
        self.state.status = Status::Idle;
        self.hooks.on_update(&self.state);
    }

    /// Reset to the level's spawn state
    pub fn restart(&mut self) {
        let fresh = WorldState::new(&self.level);
        self.reset(Some(fresh));
    }
}
