//! Thin facade over spawning a shell process.
//!
//! Steps never exec their scripts directly: the job runtime materializes a
//! script file, substitutes its path into the step's shell command template
//! and hands the resulting argv to this facade.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::process::Command;

/// A resolved shell binary plus its fixed leading arguments.
#[derive(Debug, Clone)]
pub struct Shell {
    bin: String,
    args: Vec<String>,
}

/// Options for one command invocation.
#[derive(Debug, Default)]
pub struct CommandOpts {
    /// Extra argv appended after the shell's own arguments.
    pub args: Vec<String>,
    /// The complete environment for the child. The child does not inherit
    /// the parent process environment.
    pub env: HashMap<String, String>,
    /// Working directory for the child.
    pub dir: Option<PathBuf>,
}

impl Shell {
    /// Build a shell from an argv-style command line.
    pub fn new(bin: &str, args: &[String]) -> Result<Self> {
        if bin.is_empty() {
            bail!("path to shell binary was not specified");
        }
        Ok(Shell {
            bin: bin.to_string(),
            args: args.to_vec(),
        })
    }

    /// Split a full shell command line (e.g. `bash -e /tmp/script.sh`) into
    /// a shell facade.
    pub fn from_command_line(command_line: &str) -> Result<Self> {
        let parts = shlex::split(command_line)
            .with_context(|| format!("cannot parse shell command {command_line:?}"))?;
        let Some((bin, args)) = parts.split_first() else {
            bail!("shell command is empty");
        };
        Shell::new(bin, args)
    }

    pub fn bin(&self) -> &str {
        &self.bin
    }

    pub fn argv(&self, opts: &CommandOpts) -> Vec<String> {
        let mut argv = vec![self.bin.clone()];
        argv.extend(self.args.iter().cloned());
        argv.extend(opts.args.iter().cloned());
        argv
    }

    /// Build the child process. Stdout and stderr are piped so the caller
    /// can stream them into the step output interpreter.
    pub fn command(&self, opts: &CommandOpts) -> Command {
        let mut cmd = Command::new(&self.bin);
        cmd.args(&self.args);
        cmd.args(&opts.args);
        cmd.env_clear();
        cmd.envs(&opts.env);
        if let Some(dir) = &opts.dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        cmd
    }
}

/// Quote a path for interpolation into a shell command template.
pub fn quote_path(path: &Path) -> String {
    shlex::try_quote(&path.to_string_lossy())
        .map(|q| q.into_owned())
        .unwrap_or_else(|_| path.to_string_lossy().into_owned())
}
