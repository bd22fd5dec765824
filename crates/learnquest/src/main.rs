//! LearnQuest command-line host
//!
//! Loads a level, runs a learner's program against it and keeps per-level
//! progress on disk.

mod catalog;
mod host;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};

use lq_core::action::parse_program;
use lq_core::{EngineOptions, Level, Runtime, Status, WorldState};
use lq_save::{
    SaveError, default_snapshot_dir, delete_snapshot, list_snapshots_in, load_snapshot_for,
    snapshot_exists, snapshot_path,
};

use catalog::Catalog;
use host::{TerminalHost, render_progress};

/// LearnQuest programming sandbox
#[derive(Parser, Debug)]
#[command(name = "learnquest")]
#[command(author, version, about = "LearnQuest - guide the hero with code", long_about = None)]
struct Args {
    /// Options file (defaults to ~/.learnquestrc when present)
    #[arg(long = "options", global = true)]
    options: Option<PathBuf>,

    /// Directory holding saved progress
    #[arg(long = "save-dir", global = true)]
    save_dir: Option<PathBuf>,

    /// Level catalog
    #[arg(long = "index", global = true, default_value = "levels/index.json")]
    index: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the levels of the catalog
    List,

    /// Run a program on a level
    Run {
        /// Level file or catalog id
        level: String,

        /// Program file (defaults to the saved code, then the level's starter code)
        #[arg(short = 'p', long = "program")]
        program: Option<PathBuf>,

        /// Wait for Enter between steps
        #[arg(long = "step")]
        step: bool,

        /// Continue from the saved snapshot of this level
        #[arg(long = "resume")]
        resume: bool,

        /// Pause between steps, in milliseconds
        #[arg(long = "delay-ms")]
        delay_ms: Option<u64>,

        /// Do not save progress
        #[arg(long = "no-autosave")]
        no_autosave: bool,
    },

    /// Validate a level and parse a program without running it
    Check {
        /// Level file or catalog id
        level: String,

        #[arg(short = 'p', long = "program")]
        program: Option<PathBuf>,
    },

    /// Delete the saved progress of a level
    Reset {
        level_id: String,
    },

    /// Show saved progress, newest first
    Progress,

    /// Print the effective options in rc-file format
    Options {
        /// Write them to this file instead
        #[arg(long = "write")]
        write: Option<PathBuf>,
    },
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<ExitCode> {
    init_tracing();
    let args = Args::parse();

    let options = load_options(args.options.as_deref())?;
    let save_dir = args.save_dir.clone().unwrap_or_else(default_snapshot_dir);
    debug!(?options, save_dir = %save_dir.display(), "options loaded");

    match &args.command {
        Command::List => list_levels(&args.index, &save_dir),
        Command::Run {
            level,
            program,
            step,
            resume,
            delay_ms,
            no_autosave,
        } => {
            let mut options = options;
            if let Some(ms) = delay_ms {
                options.delay_ms = *ms;
            }
            if *no_autosave {
                options.autosave = false;
            }
            let level = load_level(level, &args.index)?;
            run_level(level, program.as_deref(), *step, *resume, options, &save_dir)
        }
        Command::Check { level, program } => {
            let level = load_level(level, &args.index)?;
            check_level(&level, program.as_deref())
        }
        Command::Reset { level_id } => reset_level(level_id, &save_dir),
        Command::Progress => show_progress(&save_dir),
        Command::Options { write } => show_options(&options, write.as_deref()),
    }
}

/// Explicit options file, else `~/.learnquestrc`, else defaults
fn load_options(path: Option<&Path>) -> Result<EngineOptions> {
    if let Some(path) = path {
        return EngineOptions::load_from_file(path)
            .with_context(|| format!("cannot read options from {}", path.display()));
    }
    match dirs::home_dir().map(|home| home.join(".learnquestrc")) {
        Some(rc) if rc.exists() => EngineOptions::load_from_file(&rc)
            .with_context(|| format!("cannot read options from {}", rc.display())),
        _ => Ok(EngineOptions::default()),
    }
}

/// A path to a level file, or an id looked up in the catalog
fn load_level(arg: &str, index: &Path) -> Result<Level> {
    let path = Path::new(arg);
    let path = if path.exists() {
        path.to_path_buf()
    } else {
        let catalog = Catalog::load(index)?;
        let entry = catalog
            .find(arg)
            .with_context(|| format!("no level file or catalog entry named {}", arg))?;
        catalog.level_path(entry)
    };
    Level::load(&path).with_context(|| format!("cannot load level {}", path.display()))
}

fn read_program(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("cannot read program {}", path.display()))
}

fn list_levels(index: &Path, save_dir: &Path) -> Result<ExitCode> {
    let catalog = Catalog::load(index)?;
    for (chapter, entries) in catalog.chapters() {
        println!("{}", chapter);
        for entry in entries {
            let saved = if snapshot_exists(snapshot_path(save_dir, &entry.id)) {
                " (saved)"
            } else {
                ""
            };
            println!("  {:<12} {}{}", entry.id, entry.display_title(), saved);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_level(
    level: Level,
    program: Option<&Path>,
    step: bool,
    resume: bool,
    options: EngineOptions,
    save_dir: &Path,
) -> Result<ExitCode> {
    let save_path = snapshot_path(save_dir, &level.id);

    let mut state = WorldState::new(&level);
    let mut saved_code = None;
    if resume {
        match load_snapshot_for(&level, &save_path) {
            Ok(snapshot) => {
                info!(level = %level.id, saved_at = %snapshot.saved_at, "resuming");
                state = snapshot.hydrate(&level);
                saved_code = Some(snapshot.code);
            }
            Err(SaveError::NotFound) => println!("No saved progress for {}, starting fresh.", level.id),
            Err(err) => warn!(level = %level.id, error = %err, "ignoring saved progress"),
        }
    }

    let code = match program {
        Some(path) => read_program(path)?,
        None => match saved_code.filter(|c| !c.trim().is_empty()) {
            Some(code) => code,
            None => match &level.starter_code {
                Some(code) => code.clone(),
                None => bail!("level {} has no starter code; pass --program", level.id),
            },
        },
    };

    println!("== {} ==", level.display_title());
    if let Some(lesson) = &level.lesson {
        println!("{}", lesson);
    }
    if let Some(intro) = &level.story.intro {
        println!("{}", intro);
    }
    for hint in &level.hints {
        println!("  hint: {}", hint);
    }

    let mut run_options = options.run_options();
    if step {
        run_options.delay = Duration::ZERO;
    }
    let host = TerminalHost::new(level.clone(), options, code.clone())
        .with_save_path(save_path)
        .interactive(step);
    host.show(&state);

    let mut runtime = Runtime::new(level, state, host);
    if !runtime.load_program(&code) {
        return Ok(ExitCode::FAILURE);
    }

    let status = runtime.run(run_options);
    runtime.hooks().save(runtime.state());

    let level = runtime.level();
    match status {
        Status::Win => {
            println!(
                "{}",
                level.story.success.as_deref().unwrap_or("Level complete!")
            );
            Ok(ExitCode::SUCCESS)
        }
        _ => {
            print!("{}", render_progress(&runtime.goals()));
            println!(
                "{}",
                level.story.fail.as_deref().unwrap_or("The goal is not met yet.")
            );
            Ok(ExitCode::FAILURE)
        }
    }
}

fn check_level(level: &Level, program: Option<&Path>) -> Result<ExitCode> {
    println!("level {} is valid ({} goals)", level.id, level.goals.len());
    let allowed = level.allow_list();
    if allowed.is_empty() {
        println!("no commands unlocked");
    } else {
        println!("{} commands unlocked", allowed.len());
    }

    let code = match program {
        Some(path) => read_program(path)?,
        None => match &level.starter_code {
            Some(code) => code.clone(),
            None => return Ok(ExitCode::SUCCESS),
        },
    };

    match parse_program(&code, &level.allow_list()) {
        Ok(actions) => {
            println!("program ok: {} actions", actions.len());
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("error: {}", err);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn reset_level(level_id: &str, save_dir: &Path) -> Result<ExitCode> {
    match delete_snapshot(snapshot_path(save_dir, level_id)) {
        Ok(()) => {
            println!("Progress for {} deleted.", level_id);
            Ok(ExitCode::SUCCESS)
        }
        Err(SaveError::NotFound) => {
            println!("No saved progress for {}.", level_id);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => Err(err).with_context(|| format!("cannot delete progress for {}", level_id)),
    }
}

fn show_progress(save_dir: &Path) -> Result<ExitCode> {
    let snapshots = list_snapshots_in(save_dir)
        .with_context(|| format!("cannot list {}", save_dir.display()))?;
    if snapshots.is_empty() {
        println!("No saved progress.");
    }
    for (_, snapshot) in snapshots {
        let hero = &snapshot.state.hero;
        println!(
            "{:<12} {}  hero ({}, {})",
            snapshot.level_id,
            snapshot.saved_at,
            hero.x.map_or("?".to_string(), |x| x.to_string()),
            hero.y.map_or("?".to_string(), |y| y.to_string()),
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn show_options(options: &EngineOptions, write: Option<&Path>) -> Result<ExitCode> {
    match write {
        Some(path) => {
            options
                .save_to_file(path)
                .with_context(|| format!("cannot write options to {}", path.display()))?;
            println!("Options written to {}.", path.display());
        }
        None => print!("{}", options.to_config_string()),
    }
    Ok(ExitCode::SUCCESS)
}
