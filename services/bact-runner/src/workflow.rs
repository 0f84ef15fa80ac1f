//! The workflow runtime: templating workflow-level env, instantiating jobs
//! and running them in declared order.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use indexmap::IndexMap;

use crate::contexts::WorkflowContexts;
use crate::expr::{EvalContext, Evaluator};
use crate::job::{Console, Job};
use crate::masker::SecretsMasker;
use crate::model;

/// Entry point for executing workflows.
pub struct Runner {
    console: Console,
    env: HashMap<String, String>,
}

/// The result surface of one workflow run: per-job accumulated state, the
/// evaluated workflow environment and the invocation inputs.
#[derive(Debug)]
pub struct WorkflowState {
    pub name: String,
    pub jobs: IndexMap<String, Job>,
    pub env: HashMap<String, String>,
    pub inputs: serde_json::Value,
}

impl Runner {
    /// A runner writing user-visible output to `console`, starting from the
    /// given ambient environment.
    pub fn new(console: Console, env: HashMap<String, String>) -> Self {
        Runner { console, env }
    }

    /// Execute every job of `workflow` in declared order.
    ///
    /// Secrets from `contexts` are registered with a fresh masker before
    /// anything runs. The returned state carries each job's accumulated
    /// outputs, env, path entries and summaries.
    pub async fn run_workflow(
        &self,
        workflow: &model::Workflow,
        contexts: &WorkflowContexts,
    ) -> Result<WorkflowState> {
        tracing::info!(workflow = %workflow.name, "starting workflow");

        let masker = Arc::new(SecretsMasker::new());
        masker.add_strings(contexts.secrets.values().map(String::as_str));
        if !contexts.github.token.is_empty() {
            masker.add_string(&contexts.github.token);
        }

        let mut runner_env = self.env.clone();
        for (k, v) in &contexts.env {
            runner_env.insert(k.clone(), v.clone());
        }

        let workflow_env = self
            .evaluate_workflow_env(workflow, contexts, &runner_env)
            .context("evaluating workflow env")?;

        let mut state = WorkflowState {
            name: workflow.name.clone(),
            jobs: IndexMap::with_capacity(workflow.jobs.len()),
            env: workflow_env.clone(),
            inputs: contexts.inputs_object(),
        };

        for (job_name, job_config) in &workflow.jobs {
            let job = Job::new(
                job_name.clone(),
                job_config.clone(),
                workflow_env.clone(),
                contexts.clone(),
                Arc::clone(&masker),
                Arc::clone(&self.console),
            );
            state.jobs.insert(job_name.clone(), job);
        }

        for (job_name, job) in &state.jobs {
            job.run()
                .await
                .with_context(|| format!("running job '{job_name}'"))?;
            tracing::info!(workflow = %workflow.name, job = %job_name, "job finished");
        }

        tracing::info!(workflow = %workflow.name, "workflow finished");
        Ok(state)
    }

    /// Template-evaluate workflow-level env values against an initial
    /// context whose `env` is the runner environment.
    fn evaluate_workflow_env(
        &self,
        workflow: &model::Workflow,
        contexts: &WorkflowContexts,
        runner_env: &HashMap<String, String>,
    ) -> Result<HashMap<String, String>> {
        let mut merged = runner_env.clone();
        if workflow.env.is_empty() {
            return Ok(merged);
        }

        let eval_context = EvalContext {
            github: contexts.github.clone(),
            env: runner_env.clone(),
            secrets: contexts.secrets.clone(),
            vars: contexts.vars.clone(),
            runner: contexts.runner.clone(),
            inputs: contexts.inputs_object(),
            matrix: serde_json::Value::Object(Default::default()),
            ..Default::default()
        };
        let evaluator = Evaluator::new(&eval_context)?;

        for (key, template) in &workflow.env {
            let value = evaluator
                .evaluate_template(template)
                .with_context(|| format!("evaluating workflow env var '{key}'"))?;
            merged.insert(key.clone(), value);
        }
        Ok(merged)
    }
}

/// Environment sources for constructing a [`Runner`].
pub mod env_from {
    use std::collections::HashMap;

    /// The current process environment.
    pub fn os() -> HashMap<String, String> {
        std::env::vars().collect()
    }

    /// A `KEY=VALUE` list, as passed on a command line.
    pub fn environ<'a>(pairs: impl IntoIterator<Item = &'a str>) -> HashMap<String, String> {
        pairs
            .into_iter()
            .map(|pair| match pair.split_once('=') {
                Some((k, v)) => (k.to_string(), v.to_string()),
                None => (pair.to_string(), String::new()),
            })
            .collect()
    }

    /// No ambient environment at all.
    pub fn empty() -> HashMap<String, String> {
        HashMap::new()
    }

    /// Later sources override earlier ones.
    pub fn chain(sources: impl IntoIterator<Item = HashMap<String, String>>) -> HashMap<String, String> {
        let mut merged = HashMap::new();
        for source in sources {
            merged.extend(source);
        }
        merged
    }
}
