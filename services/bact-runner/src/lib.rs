//! Execution engine for GitHub-Actions-compatible workflows.
//!
//! Given a parsed workflow tree and a bundle of invocation contexts, the
//! engine runs every step in a filesystem-scoped sandbox, interprets the
//! workflow-command protocol on the steps' output, masks secrets in
//! everything user-visible, propagates env/PATH/outputs across steps, and
//! returns the accumulated workflow state.
//!
//! The pieces, roughly bottom-up:
//! - [`expr`]: the `${{ … }}` expression sub-language
//! - [`commands`]: workflow-command line formats and the five command files
//! - [`interpreter`]: the streaming step output interpreter
//! - [`masker`]: the secrets masker
//! - [`model`] / [`contexts`]: the workflow tree and invocation contexts
//! - [`job`] / [`workflow`]: the job and workflow runtimes

pub mod commands;
pub mod contexts;
pub mod expr;
pub mod interpreter;
pub mod job;
pub mod masker;
pub mod model;
pub mod scratch;
pub mod shell;
pub mod step;
mod step_run;
pub mod workflow;

pub use contexts::WorkflowContexts;
pub use job::{console_from_writer, Console, Job};
pub use masker::SecretsMasker;
pub use model::{parse_workflow, read_workflow, Workflow};
pub use workflow::{env_from, Runner, WorkflowState};
