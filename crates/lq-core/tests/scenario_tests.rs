use std::ops::ControlFlow;
use std::time::Duration;

use lq_core::{
    GoalReport, Level, RunOptions, Runtime, RuntimeHooks, Snapshot, Status, StepOutcome,
    WorldState,
};

const STRINGS_01: &str = include_str!("../../../levels/strings-01.json");
const STRINGS_01_PROGRAM: &str = include_str!("../../../levels/strings-01.lq");
const STRINGS_02: &str = include_str!("../../../levels/strings-02.json");
const MOVES_01: &str = include_str!("../../../levels/moves-01.json");

#[derive(Default)]
struct Host {
    updates: usize,
    log: Vec<String>,
    errors: Vec<String>,
    win: Option<GoalReport>,
}

impl RuntimeHooks for Host {
    fn on_update(&mut self, _state: &WorldState) {
        self.updates += 1;
    }
    fn on_log(&mut self, message: &str) {
        self.log.push(message.to_string());
    }
    fn on_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }
    fn on_win(&mut self, report: &GoalReport) {
        self.win = Some(report.clone());
    }
    fn pause(&mut self, _delay: Duration) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

#[test]
fn test_carry_the_message() {
    let level = Level::from_json(STRINGS_01).unwrap();
    let mut rt = Runtime::fresh(level, Host::default());

    assert!(rt.load_program(STRINGS_01_PROGRAM));
    assert_eq!(rt.queue_len(), 10);
    assert_eq!(rt.run(RunOptions::default()), Status::Win);

    let host = rt.hooks();
    assert!(host.errors.is_empty());
    assert!(host.updates <= 10);
    let report = host.win.as_ref().expect("win callback should fire");
    assert!(report.win);
    assert_eq!(report.completed(), 1);

    let state = rt.state();
    assert_eq!((state.hero.x, state.hero.y), (4, 0));
    assert_eq!(state.var("msg"), Some("hello"));
    assert!(state.flags.scanned.contains("library"));
    assert_eq!(state.flags.delivered["post"].value, "hello");
}

#[test]
fn test_set_is_locked_in_first_strings_level() {
    let level = Level::from_json(STRINGS_01).unwrap();
    let mut rt = Runtime::fresh(level, Host::default());

    let program = format!("{}\nset msg = msg + \"!\"", STRINGS_01_PROGRAM);
    assert!(!rt.load_program(&program));
    assert_eq!(rt.status(), Status::Error);
    assert_eq!(rt.queue_len(), 0);
    assert_eq!(
        rt.hooks().errors,
        vec!["line 14: invalid command: set msg = msg + \"!\""]
    );
}

#[test]
fn test_signed_letter_starter_code_wins() {
    let level = Level::from_json(STRINGS_02).unwrap();
    let starter = level.starter_code.clone().unwrap();
    let mut rt = Runtime::fresh(level, Host::default());

    assert!(rt.load_program(&starter));
    assert_eq!(rt.run(RunOptions::immediate()), Status::Win);
    assert_eq!(rt.state().var("msg"), Some("hello ✅"));
    assert!(rt.hooks().log.contains(&"line 7: set msg = \"hello ✅\"".to_string()));
}

#[test]
fn test_substring_goal_needs_every_substring() {
    let level = Level::from_json(STRINGS_02).unwrap();
    let mut rt = Runtime::fresh(level, Host::default());

    let unsigned = "hero.moveUp()\nhero.moveUp()\nhero.moveUp()\nhero.moveUp()\n\
        hero.scan(\"library\", \"msg\")\n\
        hero.moveRight()\nhero.moveRight()\nhero.moveRight()\nhero.moveRight()\n\
        hero.deliver(\"post\", \"msg\")";
    assert!(rt.load_program(unsigned));
    assert_eq!(rt.run(RunOptions::immediate()), Status::Idle);
    assert!(rt.state().flags.delivered.contains_key("post"));
    assert!(!rt.goals().win);

    assert!(rt.load_program("set msg = msg + \" ✅\"\nhero.deliver(\"post\", \"msg\")"));
    assert_eq!(rt.step(), StepOutcome::Continue);
    assert!(!rt.goals().win);
    assert_eq!(rt.step(), StepOutcome::Won);
    assert_eq!(rt.status(), Status::Win);
}

#[test]
fn test_scan_before_arriving_fails_then_succeeds() {
    let level = Level::from_json(STRINGS_01).unwrap();
    let mut rt = Runtime::fresh(level, Host::default());

    assert!(rt.load_program("hero.moveUp()\nhero.scan(\"library\", \"msg\")"));
    assert_eq!(rt.run(RunOptions::immediate()), Status::Error);
    assert_eq!(rt.hooks().errors, vec!["line 2: you are not at library"]);
    assert!(rt.state().flags.scanned.is_empty());

    rt.restart();
    assert!(rt.load_program(
        "hero.moveUp()\nhero.moveUp()\nhero.moveUp()\nhero.moveUp()\nhero.scan(\"library\", \"msg\")"
    ));
    assert_eq!(rt.run(RunOptions::immediate()), Status::Idle);
    assert!(rt.state().flags.scanned.contains("library"));
}

#[test]
fn test_deliver_of_unset_variable_fails() {
    let level = Level::from_json(STRINGS_01).unwrap();
    let mut rt = Runtime::fresh(level, Host::default());

    let program = "hero.moveUp()\nhero.moveUp()\nhero.moveUp()\nhero.moveUp()\n\
        hero.moveRight()\nhero.moveRight()\nhero.moveRight()\nhero.moveRight()\n\
        hero.deliver(\"post\", \"msg\")";
    assert!(rt.load_program(program));
    assert_eq!(rt.run(RunOptions::immediate()), Status::Error);
    assert_eq!(rt.hooks().errors, vec!["line 9: variable msg is not set"]);
    assert!(rt.state().flags.delivered.is_empty());
}

#[test]
fn test_walls_clamp_instead_of_failing() {
    let level = Level::from_json(MOVES_01).unwrap();
    let mut rt = Runtime::fresh(level, Host::default());

    let program = "hero.moveLeft()\nhero.moveLeft()\n".to_string() + &"hero.moveRight()\n".repeat(3);
    assert!(rt.load_program(&program));
    assert_eq!(rt.run(RunOptions::immediate()), Status::Win);
    assert_eq!((rt.state().hero.x, rt.state().hero.y), (3, 1));
    assert_eq!(rt.hooks().updates, 4);
}

#[test]
fn test_update_count_never_exceeds_action_count() {
    let level = Level::from_json(MOVES_01).unwrap();
    let programs = [
        "hero.moveRight()\nhero.moveLeft()\nhero.moveRight()",
        "hero.moveRight()\nhero.moveRight()\nhero.moveRight()\nhero.moveRight()",
        "hero.moveLeft()",
    ];
    for program in programs {
        let mut rt = Runtime::fresh(level.clone(), Host::default());
        assert!(rt.load_program(program));
        let n = rt.queue_len();
        rt.run(RunOptions::immediate());
        assert!(rt.hooks().updates <= n, "{}", program);
    }
}

#[test]
fn test_resume_from_snapshot() {
    let level = Level::from_json(STRINGS_01).unwrap();
    let mut rt = Runtime::fresh(level.clone(), Host::default());
    let first_half = "hero.moveUp()\nhero.moveUp()\nhero.moveUp()\nhero.moveUp()\nhero.scan(\"library\", \"msg\")";
    assert!(rt.load_program(first_half));
    rt.run(RunOptions::immediate());

    let json = serde_json::to_string(&rt.snapshot(first_half)).unwrap();
    let snap: Snapshot = serde_json::from_str(&json).unwrap();
    assert!(snap.is_for(&level));
    assert_eq!(snap.code, first_half);

    let restored = snap.hydrate(&level);
    assert_eq!(restored.hero, rt.state().hero);
    assert_eq!(restored.vars, rt.state().vars);
    assert_eq!(restored.flags, rt.state().flags);

    let mut resumed = Runtime::new(level, restored, Host::default());
    assert!(resumed.load_program(
        "hero.moveRight()\nhero.moveRight()\nhero.moveRight()\nhero.moveRight()\nhero.deliver(\"post\", \"msg\")"
    ));
    assert_eq!(resumed.run(RunOptions::immediate()), Status::Win);
}
