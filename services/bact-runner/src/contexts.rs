//! The bundle of invocation contexts a caller hands to the runner.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::expr::{GithubContext, RunnerContext};

/// Event payload, inputs, secrets, vars and runner metadata for one
/// workflow invocation. The CLI builds this from JSON flags; embedders
/// construct it directly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowContexts {
    /// The `github` context, including the event payload.
    pub github: GithubContext,
    /// Extra ambient environment on top of the runner's own.
    pub env: HashMap<String, String>,
    /// Workflow inputs (`workflow_dispatch` / reusable workflow inputs).
    pub inputs: serde_json::Value,
    /// Secrets. Registered with the masker before anything runs.
    pub secrets: HashMap<String, String>,
    /// Repository/organization variables.
    pub vars: HashMap<String, String>,
    /// The `runner` context.
    pub runner: RunnerContext,
}

impl WorkflowContexts {
    /// Inputs normalized to an object, since `${{ inputs.x }}` should see
    /// `undefined` rather than a type error when no inputs were given.
    pub fn inputs_object(&self) -> serde_json::Value {
        match &self.inputs {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            other => other.clone(),
        }
    }
}
