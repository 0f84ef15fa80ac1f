//! Step identity, context and results.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use crate::model;

/// Outcome of one executed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub status: StepStatus,
    pub fail_reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Succeeded,
    SucceededWithIssues,
    Failed,
    Canceled,
    Skipped,
    Abandoned,
}

impl StepResult {
    pub fn succeeded() -> Self {
        StepResult {
            status: StepStatus::Succeeded,
            fail_reason: String::new(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        StepResult {
            status: StepStatus::Failed,
            fail_reason: reason.into(),
        }
    }
}

/// Per-step execution context. Borrowed by the output backend while the
/// step runs; the scratch directory itself belongs to the job.
#[derive(Debug)]
pub struct StepContext {
    /// `<index>_<sanitized-slug>`, also the scratch sub-directory name.
    pub step_id: String,
    pub index_in_job: usize,
    /// The step's scratch directory holding the command files and script.
    pub step_dir: PathBuf,
    /// Where user scripts execute from (before `working-directory`).
    pub workspace_dir: PathBuf,
    /// The composed environment for the step process.
    pub env: HashMap<String, String>,
    /// Whether recognized commands are echoed back to the console.
    /// Toggled by the `echo` command mid-step.
    pub echo_commands: AtomicBool,
}

/// Build the step id from its index and the best available slug.
pub fn step_id(index: usize, step: &model::Step) -> String {
    let slug = if !step.id.is_empty() {
        step.id.as_str()
    } else if !step.name.is_empty() {
        step.name.as_str()
    } else {
        "<unnamed>"
    };
    format!("{index}_{}", sanitize_id(slug))
}

/// Make an arbitrary step name filesystem-safe: lowercase, runs of
/// characters outside `[a-z0-9._-]` collapse to a single dash. Paths built
/// from the result never contain spaces, so unquoted redirections like
/// `>> $GITHUB_ENV` keep working.
fn sanitize_id(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_dash = false;
    for c in s.to_lowercase().chars() {
        let allowed = c == '-' || c == '_' || c == '.' || c.is_ascii_digit() || c.is_ascii_lowercase();
        if allowed {
            out.push(c);
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    let out = out.trim_matches('-').to_string();
    if out.is_empty() {
        "unnamed".to_string()
    } else {
        out
    }
}
