//! The workflow-command side channel.
//!
//! Running steps talk back to the runner two ways: specially formatted
//! lines on stdout (`::set-output …::…`, `##[debug]…`) and appends to the
//! per-step command files exposed through `GITHUB_ENV`, `GITHUB_OUTPUT` and
//! friends. This module owns both wire formats.

mod envfile;
mod parse;

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub use envfile::{
    encode_key_value, parse_key_value_content, parse_key_value_file, parse_path_file,
    read_step_summary, STEP_SUMMARY_MAX_BYTES,
};
pub use parse::parse_workflow_command;

/// The closed set of recognized workflow commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandName {
    SetEnv,
    SetOutput,
    SaveState,
    AddMask,
    AddPath,
    AddMatcher,
    RemoveMatcher,
    Debug,
    Warning,
    Error,
    Notice,
    Group,
    Endgroup,
    Echo,
}

impl CommandName {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandName::SetEnv => "set-env",
            CommandName::SetOutput => "set-output",
            CommandName::SaveState => "save-state",
            CommandName::AddMask => "add-mask",
            CommandName::AddPath => "add-path",
            CommandName::AddMatcher => "add-matcher",
            CommandName::RemoveMatcher => "remove-matcher",
            CommandName::Debug => "debug",
            CommandName::Warning => "warning",
            CommandName::Error => "error",
            CommandName::Notice => "notice",
            CommandName::Group => "group",
            CommandName::Endgroup => "endgroup",
            CommandName::Echo => "echo",
        }
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandName {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "set-env" => CommandName::SetEnv,
            "set-output" => CommandName::SetOutput,
            "save-state" => CommandName::SaveState,
            "add-mask" => CommandName::AddMask,
            "add-path" => CommandName::AddPath,
            "add-matcher" => CommandName::AddMatcher,
            "remove-matcher" => CommandName::RemoveMatcher,
            "debug" => CommandName::Debug,
            "warning" => CommandName::Warning,
            "error" => CommandName::Error,
            "notice" => CommandName::Notice,
            "group" => CommandName::Group,
            "endgroup" => CommandName::Endgroup,
            "echo" => CommandName::Echo,
            _ => return Err(()),
        })
    }
}

/// The five per-step command files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandFile {
    Output,
    State,
    Path,
    Env,
    StepSummary,
}

impl CommandFile {
    pub const ALL: [CommandFile; 5] = [
        CommandFile::Output,
        CommandFile::State,
        CommandFile::Path,
        CommandFile::Env,
        CommandFile::StepSummary,
    ];

    fn key(&self) -> &'static str {
        match self {
            CommandFile::Output => "output",
            CommandFile::State => "state",
            CommandFile::Path => "path",
            CommandFile::Env => "env",
            CommandFile::StepSummary => "step_summary",
        }
    }

    /// The file name inside the step scratch directory, e.g. `output.txt`.
    pub fn file_name(&self) -> String {
        format!("{}.txt", self.key())
    }

    /// The environment variable exposing the file's absolute path, e.g.
    /// `GITHUB_OUTPUT`.
    pub fn env_var_name(&self) -> String {
        format!("GITHUB_{}", self.key().to_uppercase())
    }

    /// Variable names rejected for this file kind.
    pub fn blocked_names(&self) -> &'static [&'static str] {
        match self {
            CommandFile::Env => &["NODE_OPTIONS"],
            _ => &[],
        }
    }
}

/// A workflow command parsed from one line of step output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: CommandName,
    pub props: std::collections::HashMap<String, String>,
    pub data: String,
    /// The line exactly as the step printed it.
    pub raw: String,
}

/// Errors from the command-file grammar.
#[derive(Debug, Error)]
pub enum CommandFileError {
    #[error("invalid format {0:?}: name must not be empty")]
    EmptyName(String),

    #[error("invalid format {0:?}: name and delimiter must not be empty")]
    EmptyHeredocParts(String),

    #[error("invalid format {0:?}")]
    MalformedLine(String),

    #[error("invalid value: matching delimiter not found {0:?}")]
    UnterminatedHeredoc(String),

    #[error("can't store {name} output parameter using '${env_var}' command")]
    BlockedName { name: String, env_var: String },

    #[error("step summary exceeds {STEP_SUMMARY_MAX_BYTES} bytes")]
    SummaryTooLarge,

    #[error("reading command file: {0}")]
    Io(#[from] std::io::Error),
}
