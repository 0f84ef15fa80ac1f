//! The `bact` command line: run GitHub-Actions-compatible workflows
//! locally.

use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use bact_common::config::Config;
use bact_common::logging::init_logging;
use bact_runner::{console_from_writer, env_from, read_workflow, Runner, WorkflowContexts};

#[derive(Parser, Debug)]
#[command(name = "bact")]
#[command(version)]
#[command(about = "Run GitHub-Actions-compatible workflows locally", long_about = None)]
struct Cli {
    /// Path to a JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log format (pretty, json)
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Workflow management commands
    Workflow {
        #[command(subcommand)]
        command: WorkflowCommands,
    },
}

#[derive(Subcommand, Debug)]
enum WorkflowCommands {
    /// Execute a workflow from a file
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Path to the workflow file
    #[arg(short, long)]
    file: PathBuf,

    /// The `github` context as JSON (includes the event payload)
    #[arg(long)]
    github: Option<String>,

    /// Extra environment as a JSON object
    #[arg(long)]
    env: Option<String>,

    /// Workflow inputs as JSON
    #[arg(long)]
    inputs: Option<String>,

    /// Secrets as a JSON object
    #[arg(long)]
    secrets: Option<String>,

    /// Variables as a JSON object
    #[arg(long)]
    vars: Option<String>,

    /// The `runner` context as JSON
    #[arg(long)]
    runner: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(level) = &cli.log_level {
        config.log.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.log.format = format.clone();
    }
    init_logging(&config.log.level, &config.log.format);
    bact_common::config::set_global(config);

    match cli.command {
        Commands::Workflow {
            command: WorkflowCommands::Run(args),
        } => run_workflow(args).await,
    }
}

async fn run_workflow(args: RunArgs) -> Result<()> {
    let file = File::open(&args.file)
        .with_context(|| format!("opening workflow file {}", args.file.display()))?;
    let workflow = read_workflow(file)
        .with_context(|| format!("reading workflow file {}", args.file.display()))?;

    let contexts = build_contexts(&args)?;

    let console = console_from_writer(std::io::stdout());
    let runner = Runner::new(console, env_from::os());

    let state = runner.run_workflow(&workflow, &contexts).await?;

    for (job_name, job) in &state.jobs {
        let outputs = job.step_outputs_copy();
        tracing::info!(
            job = %job_name,
            steps_with_outputs = outputs.len(),
            "job state collected"
        );
    }
    println!("workflow '{}' finished: {} job(s) succeeded", state.name, state.jobs.len());
    Ok(())
}

/// Assemble the invocation contexts from the JSON flags.
fn build_contexts(args: &RunArgs) -> Result<WorkflowContexts> {
    let mut contexts = WorkflowContexts::default();

    if let Some(github) = &args.github {
        contexts.github = serde_json::from_str(github).context("parsing --github JSON")?;
    }
    if let Some(env) = &args.env {
        contexts.env = serde_json::from_str(env).context("parsing --env JSON")?;
    }
    if let Some(inputs) = &args.inputs {
        contexts.inputs = serde_json::from_str(inputs).context("parsing --inputs JSON")?;
    }
    if let Some(secrets) = &args.secrets {
        contexts.secrets = serde_json::from_str(secrets).context("parsing --secrets JSON")?;
    }
    if let Some(vars) = &args.vars {
        contexts.vars = serde_json::from_str(vars).context("parsing --vars JSON")?;
    }
    if let Some(runner) = &args.runner {
        contexts.runner = serde_json::from_str(runner).context("parsing --runner JSON")?;
    }

    Ok(contexts)
}
