//! The parsed workflow tree.
//!
//! This is the in-memory shape of a workflow YAML file as consumed by the
//! runtime. Values that the engine templates (`env`, `if`) stay as raw
//! strings here; evaluation happens at run time against the live context.

use std::collections::HashMap;
use std::io::Read;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A workflow definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Workflow {
    /// Workflow name.
    #[serde(default)]
    pub name: String,
    /// Trigger configuration. Opaque to the engine.
    #[serde(default)]
    pub on: serde_yaml::Value,
    /// Workflow-level environment. Values may contain `${{ … }}` templates.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Jobs, in declared order.
    #[serde(default)]
    pub jobs: IndexMap<String, Job>,
}

/// One job of a workflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Job {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Runner label selector. Opaque to the local engine.
    #[serde(default, rename = "runs-on")]
    pub runs_on: serde_yaml::Value,
    /// Job-level environment.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Names of jobs this job depends on.
    #[serde(default)]
    pub needs: Vec<String>,
    /// The ordered step list.
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// One step of a job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Step {
    /// Step id, used to address outputs from later steps.
    #[serde(default)]
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Inline script to run.
    #[serde(default)]
    pub run: String,
    /// Action reference. Resolution is not part of this engine.
    #[serde(default)]
    pub uses: String,
    /// Shell selector, or a full custom command template containing `{0}`.
    #[serde(default)]
    pub shell: String,
    /// Condition expression.
    #[serde(default, rename = "if")]
    pub if_cond: String,
    /// Step-level environment.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Action inputs.
    #[serde(default)]
    pub with: HashMap<String, String>,
    /// Working directory, relative to the workspace.
    #[serde(default, rename = "working-directory")]
    pub working_directory: String,
}

impl Step {
    /// The shell invocation template for this step. `{0}` stands for the
    /// quoted path of the materialized script file.
    pub fn shell_command(&self) -> String {
        match self.shell.as_str() {
            "" => "bash -e {0}".to_string(),
            "bash" => "bash --noprofile --norc -eo pipefail {0}".to_string(),
            "sh" => "sh -e {0}".to_string(),
            "python" => "python {0}".to_string(),
            custom => {
                if custom.contains("{0}") {
                    custom.to_string()
                } else {
                    format!("{custom} {{0}}")
                }
            }
        }
    }
}

/// Parse a workflow from YAML text.
pub fn parse_workflow(yaml: &str) -> Result<Workflow> {
    serde_yaml::from_str(yaml).context("parsing workflow YAML")
}

/// Read a workflow definition from a reader.
pub fn read_workflow(mut reader: impl Read) -> Result<Workflow> {
    let mut buf = String::new();
    reader
        .read_to_string(&mut buf)
        .context("reading workflow file")?;
    parse_workflow(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_workflow_preserves_job_order() {
        let yaml = r#"
name: CI
on: push
env:
  GREETING: hello
jobs:
  zebra:
    steps:
      - run: echo one
  alpha:
    steps:
      - run: echo two
  middle:
    steps:
      - run: echo three
"#;
        let wf = parse_workflow(yaml).unwrap();
        assert_eq!(wf.name, "CI");
        assert_eq!(wf.env["GREETING"], "hello");
        let names: Vec<&String> = wf.jobs.keys().collect();
        assert_eq!(names, vec!["zebra", "alpha", "middle"]);
    }

    #[test]
    fn test_parse_step_fields() {
        let yaml = r#"
jobs:
  build:
    steps:
      - id: compile
        name: Compile it
        run: make all
        shell: sh
        working-directory: src
        if: github.event_name == 'push'
        env:
          CC: clang
"#;
        let wf = parse_workflow(yaml).unwrap();
        let step = &wf.jobs["build"].steps[0];
        assert_eq!(step.id, "compile");
        assert_eq!(step.run, "make all");
        assert_eq!(step.shell, "sh");
        assert_eq!(step.working_directory, "src");
        assert_eq!(step.if_cond, "github.event_name == 'push'");
        assert_eq!(step.env["CC"], "clang");
    }

    #[test]
    fn test_shell_command_templates() {
        let mut step = Step::default();
        assert_eq!(step.shell_command(), "bash -e {0}");

        step.shell = "bash".to_string();
        assert_eq!(step.shell_command(), "bash --noprofile --norc -eo pipefail {0}");

        step.shell = "sh".to_string();
        assert_eq!(step.shell_command(), "sh -e {0}");

        step.shell = "python".to_string();
        assert_eq!(step.shell_command(), "python {0}");

        step.shell = "deno run {0}".to_string();
        assert_eq!(step.shell_command(), "deno run {0}");

        step.shell = "zsh -f".to_string();
        assert_eq!(step.shell_command(), "zsh -f {0}");
    }
}
