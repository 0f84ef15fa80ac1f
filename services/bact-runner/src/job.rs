//! The job runtime.
//!
//! A job owns a scratch root for the lifetime of one run. Each step gets a
//! sub-directory with the five command files, a composed environment, and a
//! step output interpreter wired to a [`JobStepBackend`]. After a step
//! exits, its command files are folded back into the job's accumulated
//! state, which is what later steps (and the caller) observe.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;

use crate::commands::{
    encode_key_value, parse_key_value_file, parse_path_file, read_step_summary, CommandFile,
    CommandName, ParsedCommand,
};
use crate::contexts::WorkflowContexts;
use crate::expr::{EvalContext, Evaluator};
use crate::interpreter::{OutputBackend, StepOutputInterpreter};
use crate::masker::SecretsMasker;
use crate::model;
use crate::scratch::ScratchRoot;
use crate::step::{step_id, StepContext, StepStatus};
use crate::step_run;

/// Shared writer for user-visible output.
pub type Console = Arc<Mutex<Box<dyn Write + Send>>>;

/// Build a console over any writer.
pub fn console_from_writer(writer: impl Write + Send + 'static) -> Console {
    Arc::new(Mutex::new(Box::new(writer)))
}

const ENV_ALLOW_UNSECURE_COMMANDS: &str = "ACTIONS_ALLOW_UNSECURE_COMMANDS";

fn unsecure_command_disabled(command: CommandName) -> anyhow::Error {
    anyhow!(
        "The {command} command is disabled. Please upgrade to using Environment Files or opt \
         into unsecure command execution by setting the `{ENV_ALLOW_UNSECURE_COMMANDS}` \
         environment variable to `true`. For more information see: \
         https://github.blog/changelog/2020-10-01-github-actions-deprecating-set-env-and-add-path-commands/"
    )
}

/// Accumulated, lock-guarded job state. Each field has its own lock so the
/// backend and snapshot readers never contend on unrelated maps.
#[derive(Debug, Default)]
struct JobState {
    steps_env: RwLock<HashMap<String, String>>,
    steps_path: RwLock<Vec<String>>,
    step_outputs: RwLock<HashMap<String, HashMap<String, String>>>,
    step_states: RwLock<HashMap<String, HashMap<String, String>>>,
    step_summaries: RwLock<HashMap<String, String>>,
}

/// One job of a running workflow.
pub struct Job {
    pub name: String,
    pub config: model::Job,
    /// Environment snapshot the job starts from (runner env plus evaluated
    /// workflow env).
    runner_env: HashMap<String, String>,
    /// Invocation contexts, for templating job/step `env:` values.
    contexts: WorkflowContexts,
    console: Console,
    masker: Arc<SecretsMasker>,
    debug_enabled: bool,
    state: JobState,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("runner_env", &self.runner_env)
            .field("contexts", &self.contexts)
            .field("debug_enabled", &self.debug_enabled)
            .field("state", &self.state)
            .finish()
    }
}

impl Job {
    pub fn new(
        name: impl Into<String>,
        config: model::Job,
        runner_env: HashMap<String, String>,
        contexts: WorkflowContexts,
        masker: Arc<SecretsMasker>,
        console: Console,
    ) -> Self {
        let debug_enabled = runner_env
            .get("ACTIONS_STEP_DEBUG")
            .is_some_and(|v| v == "true")
            || runner_env.get("RUNNER_DEBUG").is_some_and(|v| v == "1");
        Job {
            name: name.into(),
            config,
            runner_env,
            contexts,
            console,
            masker,
            debug_enabled,
            state: JobState::default(),
        }
    }

    /// Run every step in declared order. The first failing step fails the
    /// job; accumulated state up to that point stays readable.
    pub async fn run(&self) -> Result<()> {
        tracing::debug!(job = %self.name, "running job");

        let scratch = ScratchRoot::create(&self.name)
            .with_context(|| format!("preparing job '{}'", self.name))?;

        for (index, step) in self.config.steps.iter().enumerate() {
            let sid = step_id(index, step);
            tracing::debug!(job = %self.name, step = %sid, "running step");

            let step_ctx = Arc::new(
                self.new_step_context(&scratch, index, step)
                    .with_context(|| format!("creating context for step '{sid}'"))?,
            );

            let backend = Arc::new(JobStepBackend {
                masker: Arc::clone(&self.masker),
                console: Arc::clone(&self.console),
                step: Arc::clone(&step_ctx),
                debug_enabled: self.debug_enabled,
                allow_unsecure_commands: step_ctx
                    .env
                    .get(ENV_ALLOW_UNSECURE_COMMANDS)
                    .is_some_and(|v| v == "true"),
            });
            let mut interpreter = StepOutputInterpreter::start(backend);

            let run_result = if !step.run.is_empty() {
                step_run::run_step(step, &step_ctx, interpreter.writer()).await
            } else if !step.uses.is_empty() {
                Err(anyhow!("'uses' steps are not supported"))
            } else {
                Err(anyhow!("step is invalid: it has neither 'run' nor 'uses'"))
            };

            interpreter.close().await;
            if let Some(err) = interpreter.take_error() {
                return Err(err).with_context(|| {
                    format!("interpreting output of step '{sid}' in job '{}'", self.name)
                });
            }

            let step_result = run_result
                .with_context(|| format!("executing step '{sid}' in job '{}'", self.name))?;

            if step_result.status == StepStatus::Failed {
                bail!(
                    "step '{sid}' in job '{}' failed: {}",
                    self.name,
                    step_result.fail_reason
                );
            }

            self.reconcile_command_files(&step_ctx)
                .with_context(|| format!("processing command files of step '{sid}'"))?;
        }

        Ok(())
    }

    /// Build the step scratch dir, the five command files and the composed
    /// environment.
    fn new_step_context(
        &self,
        scratch: &ScratchRoot,
        index: usize,
        step: &model::Step,
    ) -> Result<StepContext> {
        let sid = step_id(index, step);
        let step_dir = scratch.create_dir(&sid)?;

        let mut env = self.runner_env.clone();
        {
            let steps_env = self.state.steps_env.read().unwrap_or_else(|e| e.into_inner());
            for (k, v) in steps_env.iter() {
                env.insert(k.clone(), v.clone());
            }
        }
        self.overlay_declared_env(step, &mut env)?;
        self.apply_prepend_path(&mut env);

        for kind in CommandFile::ALL {
            let path = scratch.write_file(format!("{sid}/{}", kind.file_name()), b"")?;
            env.insert(kind.env_var_name(), path.to_string_lossy().into_owned());
        }

        let workspace_dir = match env.get("GITHUB_WORKSPACE") {
            Some(ws) if !ws.is_empty() => PathBuf::from(ws),
            _ => std::env::current_dir().context("determining workspace directory")?,
        };

        Ok(StepContext {
            step_id: sid,
            index_in_job: index,
            step_dir,
            workspace_dir,
            env,
            echo_commands: AtomicBool::new(false),
        })
    }

    /// Overlay the job's and step's declared `env:` values, templating each
    /// one against the live context first — the values are raw strings in
    /// the workflow tree, the same as workflow-level env.
    fn overlay_declared_env(
        &self,
        step: &model::Step,
        env: &mut HashMap<String, String>,
    ) -> Result<()> {
        if self.config.env.is_empty() && step.env.is_empty() {
            return Ok(());
        }

        let eval_context = EvalContext {
            github: self.contexts.github.clone(),
            env: env.clone(),
            secrets: self.contexts.secrets.clone(),
            vars: self.contexts.vars.clone(),
            runner: self.contexts.runner.clone(),
            inputs: self.contexts.inputs_object(),
            matrix: serde_json::Value::Object(Default::default()),
            ..Default::default()
        };
        let evaluator = Evaluator::new(&eval_context)?;

        for (key, template) in self.config.env.iter().chain(step.env.iter()) {
            let value = evaluator
                .evaluate_template(template)
                .with_context(|| format!("evaluating env var '{key}'"))?;
            env.insert(key.clone(), value);
        }
        Ok(())
    }

    /// Prepend the accumulated path entries, most recent first, in front of
    /// the existing PATH.
    fn apply_prepend_path(&self, env: &mut HashMap<String, String>) {
        let steps_path = self.state.steps_path.read().unwrap_or_else(|e| e.into_inner());
        if steps_path.is_empty() {
            return;
        }

        let original = env
            .get("PATH")
            .or_else(|| env.get("Path"))
            .cloned()
            .unwrap_or_default();

        let mut entries: Vec<&str> = steps_path.iter().rev().map(String::as_str).collect();
        if !original.is_empty() {
            entries.push(&original);
        }

        let separator = if cfg!(windows) { ";" } else { ":" };
        let new_path = entries.join(separator);

        tracing::debug!(
            job = %self.name,
            from_steps = %steps_path.join(separator),
            original = %original,
            new_path = %new_path,
            "prepending accumulated PATH entries"
        );

        if env.contains_key("Path") {
            env.insert("Path".to_string(), new_path.clone());
        }
        env.insert("PATH".to_string(), new_path);
    }

    /// Fold a finished step's command files into the accumulated state.
    fn reconcile_command_files(&self, step_ctx: &StepContext) -> Result<()> {
        if let Some(path) = command_file_path(step_ctx, CommandFile::Env) {
            let updates = parse_key_value_file(&path, CommandFile::Env)
                .context("parsing env command file")?;
            let mut steps_env = self.state.steps_env.write().unwrap_or_else(|e| e.into_inner());
            for (key, value) in updates {
                tracing::debug!(job = %self.name, env_name = %key, "applied env from command file");
                steps_env.insert(key, value);
            }
        }

        if let Some(path) = command_file_path(step_ctx, CommandFile::Path) {
            let entries = parse_path_file(&path).context("parsing path command file")?;
            if !entries.is_empty() {
                let mut steps_path =
                    self.state.steps_path.write().unwrap_or_else(|e| e.into_inner());
                for entry in entries {
                    tracing::debug!(job = %self.name, path_entry = %entry, "applied path from command file");
                    add_path_entry(&mut steps_path, entry);
                }
            }
        }

        if let Some(path) = command_file_path(step_ctx, CommandFile::Output) {
            let updates = parse_key_value_file(&path, CommandFile::Output)
                .context("parsing output command file")?;
            if !updates.is_empty() {
                let mut outputs =
                    self.state.step_outputs.write().unwrap_or_else(|e| e.into_inner());
                outputs
                    .entry(step_ctx.step_id.clone())
                    .or_default()
                    .extend(updates);
            }
        }

        if let Some(path) = command_file_path(step_ctx, CommandFile::State) {
            let updates = parse_key_value_file(&path, CommandFile::State)
                .context("parsing state command file")?;
            if !updates.is_empty() {
                let mut states =
                    self.state.step_states.write().unwrap_or_else(|e| e.into_inner());
                states
                    .entry(step_ctx.step_id.clone())
                    .or_default()
                    .extend(updates);
            }
        }

        if let Some(path) = command_file_path(step_ctx, CommandFile::StepSummary) {
            let summary = read_step_summary(&path).context("reading step summary")?;
            let mut summaries =
                self.state.step_summaries.write().unwrap_or_else(|e| e.into_inner());
            summaries.insert(step_ctx.step_id.clone(), summary);
        }

        Ok(())
    }

    /// Env accumulated from `$GITHUB_ENV` appends across completed steps.
    pub fn steps_env_copy(&self) -> HashMap<String, String> {
        self.state
            .steps_env
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// PATH entries accumulated from `$GITHUB_PATH` appends.
    pub fn steps_path_copy(&self) -> Vec<String> {
        self.state
            .steps_path
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Outputs per step id.
    pub fn step_outputs_copy(&self) -> HashMap<String, HashMap<String, String>> {
        self.state
            .step_outputs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Saved state per step id.
    pub fn step_states_copy(&self) -> HashMap<String, HashMap<String, String>> {
        self.state
            .step_states
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Step summaries per step id.
    pub fn step_summaries_copy(&self) -> HashMap<String, String> {
        self.state
            .step_summaries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

fn command_file_path(step_ctx: &StepContext, kind: CommandFile) -> Option<PathBuf> {
    let path = step_ctx.env.get(&kind.env_var_name())?;
    if path.is_empty() {
        return None;
    }
    Some(PathBuf::from(path))
}

/// Append a path entry, moving a repeated entry to the tail so the most
/// recent addition wins once the list is reversed into PATH.
fn add_path_entry(entries: &mut Vec<String>, entry: String) {
    if entry.is_empty() {
        return;
    }
    entries.retain(|existing| *existing != entry);
    entries.push(entry);
}

/// Executes the workflow commands a running step emits on stdout.
struct JobStepBackend {
    masker: Arc<SecretsMasker>,
    console: Console,
    step: Arc<StepContext>,
    debug_enabled: bool,
    allow_unsecure_commands: bool,
}

impl JobStepBackend {
    async fn echo_if_enabled(&self, command: &ParsedCommand) -> Result<()> {
        if self.step.echo_commands.load(Ordering::SeqCst) {
            self.print(&command.raw).await?;
        }
        Ok(())
    }

    fn append_to_command_file(&self, kind: CommandFile, entry: &str) -> Result<()> {
        let path = command_file_path(&self.step, kind)
            .ok_or_else(|| anyhow!("{} file is not available for this step", kind.env_var_name()))?;
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .with_context(|| format!("opening {}", path.display()))?;
        writeln!(file, "{entry}").with_context(|| format!("appending to {}", path.display()))?;
        Ok(())
    }

    fn required_name(command: &ParsedCommand) -> Result<&str> {
        match command.props.get("name").map(String::as_str) {
            Some(name) if !name.is_empty() => Ok(name),
            _ => bail!("{} requires a non-empty 'name' property", command.command),
        }
    }
}

#[async_trait]
impl OutputBackend for JobStepBackend {
    async fn execute_command(&self, command: ParsedCommand) -> Result<()> {
        tracing::debug!(workflow_command = %command.command, step = %self.step.step_id, "executing workflow command");

        match command.command {
            CommandName::SetEnv => {
                if !self.allow_unsecure_commands {
                    return Err(unsecure_command_disabled(command.command));
                }
                self.echo_if_enabled(&command).await?;
                let name = Self::required_name(&command)?;
                self.append_to_command_file(
                    CommandFile::Env,
                    &encode_key_value(name, &command.data),
                )
            }

            CommandName::SetOutput => {
                self.echo_if_enabled(&command).await?;
                let name = Self::required_name(&command)?;
                self.append_to_command_file(
                    CommandFile::Output,
                    &encode_key_value(name, &command.data),
                )
            }

            CommandName::SaveState => {
                self.echo_if_enabled(&command).await?;
                let name = Self::required_name(&command)?;
                self.append_to_command_file(
                    CommandFile::State,
                    &encode_key_value(name, &command.data),
                )
            }

            CommandName::AddMask => {
                self.masker.add_string(&command.data);
                Ok(())
            }

            CommandName::AddPath => {
                if !self.allow_unsecure_commands {
                    return Err(unsecure_command_disabled(command.command));
                }
                self.echo_if_enabled(&command).await?;
                if command.data.is_empty() {
                    bail!("add-path requires a non-empty path");
                }
                self.append_to_command_file(CommandFile::Path, &command.data)
            }

            CommandName::AddMatcher | CommandName::RemoveMatcher => {
                tracing::warn!(
                    step = %self.step.step_id,
                    "matcher commands are not supported (add-matcher, remove-matcher)"
                );
                Ok(())
            }

            CommandName::Debug => {
                if !self.debug_enabled {
                    return Ok(());
                }
                let clean = command.raw.replace("\r\n", "\n");
                for line in clean.split('\n') {
                    self.print(&format!("##[debug] {line}")).await?;
                }
                Ok(())
            }

            CommandName::Notice | CommandName::Warning | CommandName::Error => {
                // reserved for structured issue reporting; surfaced as
                // plain output for now
                self.print(&command.raw).await
            }

            CommandName::Group => {
                self.echo_if_enabled(&command).await?;
                self.print(&format!("##[group]{}", command.data)).await
            }

            CommandName::Endgroup => {
                self.echo_if_enabled(&command).await?;
                self.print(&format!("##[endgroup]{}", command.data)).await
            }

            CommandName::Echo => {
                self.echo_if_enabled(&command).await?;
                match command.data.trim().to_uppercase().as_str() {
                    "ON" => {
                        self.step.echo_commands.store(true, Ordering::SeqCst);
                        Ok(())
                    }
                    "OFF" => {
                        self.step.echo_commands.store(false, Ordering::SeqCst);
                        Ok(())
                    }
                    other => bail!("echo command accepts only 'on' or 'off', got '{other}'"),
                }
            }
        }
    }

    async fn print(&self, text: &str) -> Result<()> {
        let masked = self.masker.mask(text);
        let mut console = self.console.lock().unwrap_or_else(|e| e.into_inner());
        console
            .write_all(masked.as_bytes())
            .context("writing to step console")?;
        if !masked.ends_with('\n') {
            console.write_all(b"\n").context("writing to step console")?;
        }
        console.flush().context("flushing step console")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn test_job(runner_env: HashMap<String, String>) -> Job {
        Job::new(
            "test",
            model::Job::default(),
            runner_env,
            WorkflowContexts::default(),
            Arc::new(SecretsMasker::new()),
            console_from_writer(Vec::new()),
        )
    }

    fn step_ctx_with_files(dir: &std::path::Path) -> StepContext {
        let mut env = HashMap::new();
        for kind in CommandFile::ALL {
            env.insert(
                kind.env_var_name(),
                dir.join(kind.file_name()).to_string_lossy().into_owned(),
            );
        }
        StepContext {
            step_id: "0_test".to_string(),
            index_in_job: 0,
            step_dir: dir.to_path_buf(),
            workspace_dir: dir.to_path_buf(),
            env,
            echo_commands: AtomicBool::new(false),
        }
    }

    #[test]
    fn test_reconcile_all_command_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("env.txt"), "FOO=bar\n").unwrap();
        fs::write(dir.path().join("path.txt"), "/tmp/bin\n").unwrap();
        fs::write(dir.path().join("output.txt"), "RESULT=42\n").unwrap();
        fs::write(dir.path().join("state.txt"), "KEY=value\n").unwrap();
        fs::write(dir.path().join("step_summary.txt"), "## summary\n").unwrap();

        let job = test_job(HashMap::from([("PATH".to_string(), "/usr/bin".to_string())]));
        let ctx = step_ctx_with_files(dir.path());
        job.reconcile_command_files(&ctx).unwrap();

        assert_eq!(job.steps_env_copy()["FOO"], "bar");
        assert!(job.steps_path_copy().contains(&"/tmp/bin".to_string()));
        assert_eq!(job.step_outputs_copy()["0_test"]["RESULT"], "42");
        assert_eq!(job.step_states_copy()["0_test"]["KEY"], "value");
        assert_eq!(job.step_summaries_copy()["0_test"], "## summary\n");
    }

    #[test]
    fn test_reconcile_env_heredoc() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("env.txt"), "MULTI<<EOF\nhello\nworld\nEOF\n").unwrap();

        let job = test_job(HashMap::new());
        let ctx = step_ctx_with_files(dir.path());
        job.reconcile_command_files(&ctx).unwrap();
        assert_eq!(job.steps_env_copy()["MULTI"], "hello\nworld");
    }

    #[test]
    fn test_declared_env_is_templated_against_live_context() {
        let mut config = model::Job::default();
        config
            .env
            .insert("JOB_LEVEL".to_string(), "job-${{ vars.SUFFIX }}".to_string());

        let mut contexts = WorkflowContexts::default();
        contexts
            .vars
            .insert("SUFFIX".to_string(), "from-vars".to_string());

        let job = Job::new(
            "test",
            config,
            HashMap::from([("AMBIENT".to_string(), "ambient".to_string())]),
            contexts,
            Arc::new(SecretsMasker::new()),
            console_from_writer(Vec::new()),
        );

        let mut step = model::Step::default();
        step.env
            .insert("STEP_LEVEL".to_string(), "step-${{ env.AMBIENT }}".to_string());
        step.env
            .insert("JOB_LEVEL".to_string(), "overridden".to_string());

        let mut env = job.runner_env.clone();
        job.overlay_declared_env(&step, &mut env).unwrap();

        assert_eq!(env["JOB_LEVEL"], "overridden");
        assert_eq!(env["STEP_LEVEL"], "step-ambient");
    }

    #[test]
    fn test_add_path_entry_moves_repeat_to_tail() {
        let mut entries = vec!["/a".to_string(), "/b".to_string()];
        add_path_entry(&mut entries, "/a".to_string());
        assert_eq!(entries, vec!["/b".to_string(), "/a".to_string()]);
        add_path_entry(&mut entries, String::new());
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_apply_prepend_path_orders_recent_first() {
        let job = test_job(HashMap::from([("PATH".to_string(), "/usr/bin".to_string())]));
        {
            let mut steps_path = job.state.steps_path.write().unwrap();
            add_path_entry(&mut steps_path, "/first".to_string());
            add_path_entry(&mut steps_path, "/second".to_string());
        }

        let mut env = job.runner_env.clone();
        job.apply_prepend_path(&mut env);
        assert_eq!(env["PATH"], "/second:/first:/usr/bin");
    }

    #[tokio::test]
    async fn test_backend_set_env_requires_opt_in() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JobStepBackend {
            masker: Arc::new(SecretsMasker::new()),
            console: console_from_writer(Vec::new()),
            step: Arc::new(step_ctx_with_files(dir.path())),
            debug_enabled: false,
            allow_unsecure_commands: false,
        };

        let command = ParsedCommand {
            command: CommandName::SetEnv,
            props: HashMap::from([("name".to_string(), "X".to_string())]),
            data: "y".to_string(),
            raw: "::set-env name=X::y".to_string(),
        };
        let err = backend.execute_command(command).await.unwrap_err();
        assert!(err.to_string().contains("The set-env command is disabled"));
    }

    #[tokio::test]
    async fn test_backend_set_output_appends_encoded_pair() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JobStepBackend {
            masker: Arc::new(SecretsMasker::new()),
            console: console_from_writer(Vec::new()),
            step: Arc::new(step_ctx_with_files(dir.path())),
            debug_enabled: false,
            allow_unsecure_commands: false,
        };

        let command = ParsedCommand {
            command: CommandName::SetOutput,
            props: HashMap::from([("name".to_string(), "foo".to_string())]),
            data: "bar\nbaz".to_string(),
            raw: String::new(),
        };
        backend.execute_command(command).await.unwrap();

        let written = fs::read_to_string(dir.path().join("output.txt")).unwrap();
        let parsed =
            crate::commands::parse_key_value_content(&written, CommandFile::Output).unwrap();
        assert_eq!(parsed["foo"], "bar\nbaz");
    }

    #[tokio::test]
    async fn test_backend_print_masks_and_terminates_line() {
        let dir = tempfile::tempdir().unwrap();
        let masker = Arc::new(SecretsMasker::new());
        masker.add_string("hunter2");

        let sink: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        struct SharedSink(Arc<Mutex<Vec<u8>>>);
        impl Write for SharedSink {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let backend = JobStepBackend {
            masker,
            console: console_from_writer(SharedSink(Arc::clone(&sink))),
            step: Arc::new(step_ctx_with_files(dir.path())),
            debug_enabled: false,
            allow_unsecure_commands: false,
        };

        backend.print("my secret is hunter2").await.unwrap();
        let out = String::from_utf8(sink.lock().unwrap().clone()).unwrap();
        assert_eq!(out, "my secret is ***\n");
    }
}
