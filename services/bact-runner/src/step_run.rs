//! Executing one `run:` step.
//!
//! The script body is materialized into the step scratch directory, the
//! step's shell command template gets the quoted script path substituted
//! for `{0}`, and the resulting process runs with the composed environment
//! while both of its output streams feed the step output interpreter.

use std::path::Path;

use anyhow::{bail, Context, Result};
use tokio::io::AsyncReadExt;

use crate::interpreter::InterpreterWriter;
use crate::model;
use crate::shell::{quote_path, CommandOpts, Shell};
use crate::step::{StepContext, StepResult};

const SCRIPT_NAME: &str = "script.sh";

/// Materialize and run a step script, streaming its output into `writer`.
///
/// A non-zero exit is not an error at this level: it produces a `Failed`
/// [`StepResult`] carrying the argv and exit status, and the caller decides
/// what that means for the job.
pub async fn run_step(
    step: &model::Step,
    ctx: &StepContext,
    writer: InterpreterWriter,
) -> Result<StepResult> {
    let script_path = ctx.step_dir.join(SCRIPT_NAME);
    write_script(&script_path, &step.run)
        .with_context(|| format!("writing script file {}", script_path.display()))?;

    let shell_command = step
        .shell_command()
        .replace("{0}", &quote_path(&script_path));
    let shell = Shell::from_command_line(&shell_command)?;

    let working_dir = resolve_working_dir(step, ctx)?;

    let opts = CommandOpts {
        args: Vec::new(),
        env: ctx.env.clone(),
        dir: Some(working_dir),
    };
    let argv = shell.argv(&opts);

    tracing::debug!(
        step = %ctx.step_id,
        command = %shlex::try_join(argv.iter().map(String::as_str)).unwrap_or_default(),
        "running step script"
    );

    let mut child = shell
        .command(&opts)
        .spawn()
        .with_context(|| format!("spawning {}", shell.bin()))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdout_task = stdout.map(|out| tokio::spawn(pump(out, writer.clone())));
    let stderr_task = stderr.map(|err| tokio::spawn(pump(err, writer.clone())));

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for {}", shell.bin()))?;

    for task in [stdout_task, stderr_task].into_iter().flatten() {
        task.await.context("joining output pump")??;
    }

    if !status.success() {
        return Ok(StepResult::failed(format!(
            "{} returned {status}",
            shlex::try_join(argv.iter().map(String::as_str)).unwrap_or_default(),
        )));
    }

    Ok(StepResult::succeeded())
}

/// Copy one child stream into the interpreter until EOF.
async fn pump(mut stream: impl AsyncReadExt + Unpin, writer: InterpreterWriter) -> Result<()> {
    let mut buf = [0u8; 8192];
    loop {
        let n = stream.read(&mut buf).await.context("reading step output")?;
        if n == 0 {
            return Ok(());
        }
        writer.write(&buf[..n])?;
    }
}

fn write_script(path: &Path, body: &str) -> Result<()> {
    std::fs::write(path, body)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o777))?;
    }
    Ok(())
}

/// The user-declared `working-directory` is validated: relative paths join
/// under the workspace, absolute paths are rejected.
fn resolve_working_dir(step: &model::Step, ctx: &StepContext) -> Result<std::path::PathBuf> {
    if step.working_directory.is_empty() {
        return Ok(ctx.workspace_dir.clone());
    }
    let declared = Path::new(&step.working_directory);
    if declared.is_absolute() {
        bail!(
            "absolute paths are not allowed in working-directory: {}",
            step.working_directory
        );
    }
    Ok(ctx.workspace_dir.join(declared))
}
