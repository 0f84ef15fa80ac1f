//! Evaluation context records.
//!
//! These mirror the documented GitHub Actions context shapes. Serde field
//! names (including the renames) are load-bearing: the evaluator projects
//! this record into a dynamic object, so the serialized name is the name an
//! expression like `github.repository_owner_id` resolves.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Everything available to `${{ … }}` expressions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalContext {
    /// Information about the workflow run and the event that triggered it.
    pub github: GithubContext,
    /// Environment variables visible at the current scope.
    pub env: HashMap<String, String>,
    /// The currently running job.
    pub job: JobContext,
    /// Jobs of a reusable workflow (only populated there).
    pub jobs: HashMap<String, JobsContextEntry>,
    /// Steps of the current job that already ran and have an id.
    pub steps: HashMap<String, StepsContextEntry>,
    /// The runner executing the job.
    pub runner: RunnerContext,
    /// Secrets available to the run.
    pub secrets: HashMap<String, String>,
    /// Repository/organization variables.
    pub vars: HashMap<String, String>,
    /// Matrix execution strategy of the current job.
    pub strategy: StrategyContext,
    /// The matrix combination for the current job.
    pub matrix: serde_json::Value,
    /// Outputs and results of dependency jobs.
    pub needs: HashMap<String, NeedsContext>,
    /// Workflow inputs (dispatch or reusable-workflow inputs).
    pub inputs: serde_json::Value,
}

/// Modeled after the documented `github` context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubContext {
    pub action: String,
    pub action_path: String,
    pub action_ref: String,
    pub action_repository: String,
    pub action_status: String,
    pub actor: String,
    pub actor_id: String,
    pub api_url: String,
    pub base_ref: String,
    /// Path to the file receiving `set-env` style workflow commands.
    pub env: String,
    /// The full event webhook payload.
    pub event: serde_json::Value,
    pub event_name: String,
    pub event_path: String,
    pub graphql_url: String,
    pub head_ref: String,
    pub job: String,
    /// Path to the file receiving `add-path` style workflow commands.
    pub path: String,
    pub r#ref: String,
    pub ref_name: String,
    pub ref_protected: bool,
    pub ref_type: String,
    pub repository: String,
    pub repository_id: String,
    pub repository_owner: String,
    pub repository_owner_id: String,
    #[serde(rename = "repositoryUrl")]
    pub repository_url: String,
    pub retention_days: String,
    pub run_id: String,
    pub run_number: String,
    pub run_attempt: String,
    pub secret_source: String,
    pub server_url: String,
    pub sha: String,
    pub token: String,
    pub triggering_actor: String,
    pub workflow: String,
    pub workflow_ref: String,
    pub workflow_sha: String,
    /// Default working directory on the runner for steps.
    pub workspace: String,
}

/// Result and outputs of a job the current job depends on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NeedsContext {
    pub outputs: HashMap<String, String>,
    /// `success`, `failure`, `cancelled`, or `skipped`.
    pub result: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobContext {
    pub check_run_id: i64,
    pub container: JobContextContainer,
    pub services: HashMap<String, JobContextService>,
    /// `success`, `failure`, or `cancelled`.
    pub status: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobContextContainer {
    pub id: String,
    pub network: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobContextService {
    pub id: String,
    pub network: String,
    pub ports: HashMap<String, String>,
}

/// Result and outputs of a job in a reusable workflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsContextEntry {
    pub result: String,
    pub outputs: HashMap<String, String>,
}

/// Results and outputs of a completed step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StepsContextEntry {
    pub outputs: HashMap<String, String>,
    /// Result after `continue-on-error` is applied.
    pub conclusion: String,
    /// Result before `continue-on-error` is applied.
    pub outcome: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerContext {
    pub name: String,
    pub os: String,
    pub arch: String,
    pub temp: String,
    pub tool_cache: String,
    /// `"1"` when debug logging is enabled, empty otherwise.
    pub debug: String,
    pub environment: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyContext {
    #[serde(rename = "fail-fast")]
    pub fail_fast: bool,
    #[serde(rename = "job-index")]
    pub job_index: i64,
    #[serde(rename = "job-total")]
    pub job_total: i64,
    #[serde(rename = "max-parallel")]
    pub max_parallel: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::value::{JsValue, PathSegment};

    #[test]
    fn test_field_name_projection() {
        let mut ctx = EvalContext::default();
        ctx.github.repository_owner_id = "583231".to_string();
        ctx.github.repository_url = "git://example.com/repo.git".to_string();
        ctx.strategy.fail_fast = true;

        let v = JsValue::from_serialize(&ctx).unwrap();
        let owner = v
            .access(&[
                PathSegment::Key("github".into()),
                PathSegment::Key("repository_owner_id".into()),
            ])
            .unwrap();
        assert_eq!(owner, JsValue::String("583231".into()));

        let url = v
            .access(&[
                PathSegment::Key("github".into()),
                PathSegment::Key("repositoryUrl".into()),
            ])
            .unwrap();
        assert_eq!(url, JsValue::String("git://example.com/repo.git".into()));

        let ff = v
            .access(&[
                PathSegment::Key("strategy".into()),
                PathSegment::Key("fail-fast".into()),
            ])
            .unwrap();
        assert_eq!(ff, JsValue::Bool(true));
    }
}
