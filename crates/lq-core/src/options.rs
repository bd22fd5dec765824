//! Engine options and configuration
//!
//! Options are read from an rc file in the classic `OPTIONS=` format:
//!
//! ```text
//! # learnquestrc
//! OPTIONS=delay:150,!autosave
//! OPTIONS=board
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::runtime::{DEFAULT_STEP_DELAY_MS, RunOptions};

/// Options parsing error
#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown option: {0}")]
    UnknownOption(String),

    #[error("Invalid value '{value}' for option '{option}'")]
    InvalidValue { option: String, value: String },

    #[error("Missing value for option '{0}'")]
    MissingValue(String),
}

/// User-configurable engine options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Pause between steps of a run, in milliseconds
    pub delay_ms: u64,
    /// Persist a snapshot after every update
    pub autosave: bool,
    /// Render the board after every update
    pub board: bool,
    /// Print goal progress after every update
    pub verbose: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            delay_ms: DEFAULT_STEP_DELAY_MS,
            autosave: true,
            board: true,
            verbose: false,
        }
    }
}

impl EngineOptions {
    /// Load options from a file
    pub fn load_from_file(path: &Path) -> Result<Self, OptionsError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_config(&contents)
    }

    /// Parse options from a config string
    pub fn parse_config(contents: &str) -> Result<Self, OptionsError> {
        let mut options = Self::default();

        for line in contents.lines() {
            let line = line.trim();

            // Skip comments and empty lines
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(opts) = line.strip_prefix("OPTIONS=") {
                for opt in opts.split(',') {
                    let opt = opt.trim();
                    if !opt.is_empty() {
                        options.parse_option(opt)?;
                    }
                }
            }
        }

        Ok(options)
    }

    /// Parse a single option
    fn parse_option(&mut self, opt: &str) -> Result<(), OptionsError> {
        if let Some((key, value)) = opt.split_once(':').or_else(|| opt.split_once('=')) {
            return self.set_option(key.trim(), value.trim());
        }

        if let Some(name) = opt.strip_prefix('!') {
            return self.set_bool_option(name, false);
        }
        match opt.strip_prefix("no") {
            Some(name) if Self::is_bool_option(name) => self.set_bool_option(name, false),
            _ => self.set_bool_option(opt, true),
        }
    }

    fn is_bool_option(name: &str) -> bool {
        matches!(name, "autosave" | "board" | "verbose")
    }

    /// Set a boolean option
    fn set_bool_option(&mut self, name: &str, value: bool) -> Result<(), OptionsError> {
        match name {
            "autosave" => self.autosave = value,
            "board" => self.board = value,
            "verbose" => self.verbose = value,
            "delay" => return Err(OptionsError::MissingValue(name.to_string())),
            _ => return Err(OptionsError::UnknownOption(name.to_string())),
        }
        Ok(())
    }

    /// Set a key:value option
    fn set_option(&mut self, name: &str, value: &str) -> Result<(), OptionsError> {
        match name {
            "delay" => {
                self.delay_ms = value.parse().map_err(|_| OptionsError::InvalidValue {
                    option: name.to_string(),
                    value: value.to_string(),
                })?;
            }
            _ if Self::is_bool_option(name) => {
                let flag = match value {
                    "true" | "yes" | "on" | "1" => true,
                    "false" | "no" | "off" | "0" => false,
                    _ => {
                        return Err(OptionsError::InvalidValue {
                            option: name.to_string(),
                            value: value.to_string(),
                        });
                    }
                };
                self.set_bool_option(name, flag)?;
            }
            _ => return Err(OptionsError::UnknownOption(name.to_string())),
        }
        Ok(())
    }

    /// Save options to a file
    pub fn save_to_file(&self, path: &Path) -> Result<(), OptionsError> {
        std::fs::write(path, self.to_config_string())?;
        Ok(())
    }

    /// Convert options to config file format
    pub fn to_config_string(&self) -> String {
        let flag = |name: &str, on: bool| {
            if on {
                name.to_string()
            } else {
                format!("!{}", name)
            }
        };

        [
            "# LearnQuest configuration file".to_string(),
            String::new(),
            format!("OPTIONS=delay:{}", self.delay_ms),
            format!(
                "OPTIONS={},{},{}",
                flag("autosave", self.autosave),
                flag("board", self.board),
                flag("verbose", self.verbose)
            ),
            String::new(),
        ]
        .join("\n")
    }

    /// Pacing for [`crate::runtime::Runtime::run`]
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            delay: Duration::from_millis(self.delay_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = EngineOptions::default();
        assert_eq!(opts.delay_ms, 220);
        assert!(opts.autosave);
        assert!(opts.board);
        assert!(!opts.verbose);
    }

    #[test]
    fn test_parse_bool_options() {
        let opts = EngineOptions::parse_config("OPTIONS=!autosave,noboard,verbose").unwrap();
        assert!(!opts.autosave);
        assert!(!opts.board);
        assert!(opts.verbose);
    }

    #[test]
    fn test_parse_value_options() {
        let config = "# pacing\n\nOPTIONS=delay:50\nOPTIONS=verbose=on";
        let opts = EngineOptions::parse_config(config).unwrap();
        assert_eq!(opts.delay_ms, 50);
        assert!(opts.verbose);
        assert_eq!(opts.run_options().delay, Duration::from_millis(50));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            EngineOptions::parse_config("OPTIONS=turbo"),
            Err(OptionsError::UnknownOption(name)) if name == "turbo"
        ));
        assert!(matches!(
            EngineOptions::parse_config("OPTIONS=delay:fast"),
            Err(OptionsError::InvalidValue { .. })
        ));
        assert!(matches!(
            EngineOptions::parse_config("OPTIONS=delay"),
            Err(OptionsError::MissingValue(_))
        ));
    }

    #[test]
    fn test_save_to_file() {
        let path = std::env::temp_dir().join("learnquest_test_options.rc");
        let opts = EngineOptions {
            delay_ms: 75,
            autosave: false,
            ..EngineOptions::default()
        };
        opts.save_to_file(&path).unwrap();
        assert_eq!(EngineOptions::load_from_file(&path).unwrap(), opts);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_roundtrip() {
        let opts = EngineOptions {
            delay_ms: 0,
            autosave: false,
            board: true,
            verbose: true,
        };
        let parsed = EngineOptions::parse_config(&opts.to_config_string()).unwrap();
        assert_eq!(parsed, opts);
    }
}
