/// # pagesmith CLI
///
/// Command parsing and wiring of the concrete clients into the core pipeline. All pipeline
/// logic lives in `pagesmith-core`; this module only loads configuration, constructs the
/// GitHub, chat-completions and callback clients, and prints results.
///
/// Call [`run`] with a constructed [`Cli`] for programmatic or integration use.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;

use pagesmith_core::extract::extract;
use pagesmith_core::lifecycle::RepositoryLifecycle;
use pagesmith_core::model::TaskRequest;
use pagesmith_core::notify::{HttpCallbackTransport, NotifyOutcome};
use pagesmith_core::orchestrate::TaskOrchestrator;

use crate::github::GitHubClient;
use crate::llm::ChatCompletionsClient;
use crate::load_config::load_config;

/// Generate a static site with an LLM, publish it to GitHub Pages and report it for grading.
#[derive(Parser)]
#[clap(name = "pagesmith", version, about)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one task round and print the evaluation report as JSON
    Run {
        /// Path to the task JSON file
        #[clap(long)]
        task: PathBuf,
        /// Optional YAML config file (defaults are used when omitted)
        #[clap(long)]
        config: Option<PathBuf>,
    },
    /// Recover the files mapping from a saved model response
    Extract {
        /// File holding the raw model output
        #[clap(long)]
        input: PathBuf,
    },
    /// Delete a repository; an absent repository counts as deleted
    Delete {
        /// Repository name under the configured owner
        #[clap(long)]
        name: String,
        #[clap(long)]
        config: Option<PathBuf>,
    },
}

pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Run { task, config } => run_task(&task, config.as_deref()).await,
        Commands::Extract { input } => extract_file(&input),
        Commands::Delete { name, config } => delete_repo(&name, config.as_deref()).await,
    }
}

fn read_task(path: &Path) -> Result<TaskRequest> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read task file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid task JSON in {}", path.display()))
}

async fn run_task(task_path: &Path, config_path: Option<&Path>) -> Result<()> {
    let task = read_task(task_path)?;
    let config = load_config(config_path)?;
    tracing::info!(command = "run", task = %task.task, round = task.round, "Starting task");

    let github = GitHubClient::new(&config.github, &config.secrets)?;
    let generator = ChatCompletionsClient::new(&config.llm, &config.secrets)?;
    let transport = HttpCallbackTransport::new(config.pipeline.notify.request_timeout())?;
    let orchestrator = TaskOrchestrator::new(
        github.clone(),
        github,
        generator,
        transport,
        config.pipeline.clone(),
        config.github.pages_domain.clone(),
    );

    let outcome = orchestrator.run(&task).await.map_err(|e| {
        tracing::error!(command = "run", error = %e, "Task failed");
        anyhow!(e)
    })?;

    let notification = match &outcome.notification {
        NotifyOutcome::Delivered { attempts, status, .. } => {
            json!({ "delivered": true, "attempts": attempts, "status": status })
        }
        NotifyOutcome::GaveUp {
            attempts,
            last_error,
        } => json!({ "delivered": false, "attempts": attempts, "error": last_error }),
        NotifyOutcome::Skipped => json!({ "delivered": false, "skipped": true }),
    };
    let summary = json!({
        "report": outcome.report,
        "attempts": outcome.attempts,
        "notification": notification,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    tracing::info!(command = "run", "Task complete");
    Ok(())
}

fn extract_file(input: &Path) -> Result<()> {
    let raw = fs::read_to_string(input)
        .with_context(|| format!("Failed to read model output {}", input.display()))?;
    let result = extract(&raw)?;
    let files: Vec<_> = result
        .files
        .iter()
        .map(|(path, content)| json!({ "path": path, "chars": content.chars().count() }))
        .collect();
    let summary = json!({
        "strategy": format!("{:?}", result.strategy),
        "main_language": result.main_language,
        "description": result.description,
        "changes_summary": result.changes_summary,
        "files": files,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn delete_repo(name: &str, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let github = GitHubClient::new(&config.github, &config.secrets)?;
    let lifecycle = RepositoryLifecycle::new(
        &github,
        &github,
        &config.pipeline.lifecycle,
        &config.github.pages_domain,
    );
    if lifecycle.delete(name).await {
        println!("deleted {name}");
        Ok(())
    } else {
        Err(anyhow!("failed to delete repository {name}"))
    }
}
