//! Two-round task state machine.
//!
//! Round 1: generate → create repository → enable hosting → publish → notify.
//! Round 2: fetch current files → regenerate → publish → notify.
//!
//! Each round runs as one unit of work retried up to `task.max_attempts` times. Every
//! attempt of round 1 recreates the repository from scratch, so no partial state of a
//! failed attempt survives into the next one. When round 1 finally fails, the repository
//! is deleted on a best-effort basis before the error is returned. Round 2 never deletes.

use std::fmt;

use tracing::{debug, error, info, warn};

use crate::contract::{CallbackTransport, ContentGenerator, ObjectStore, RepositoryHost};
use crate::error::TaskError;
use crate::extract::extract;
use crate::fetch::fetch_all_files;
use crate::lifecycle::{pages_url_for, RepositoryLifecycle};
use crate::model::{EvaluationReport, RepositoryRef, Snapshot, TaskRequest};
use crate::notify::{EvaluationNotifier, NotifyOutcome};
use crate::prompt::{initial_prompt, revision_prompt, Prompt};
use crate::publish::SnapshotPublisher;
use crate::scaffold::normalize_files;
use crate::settings::PipelineSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Round1Start,
    Round2Start,
    FilesFetched,
    Generating,
    RepoCreated,
    HostingEnabled,
    Published,
    Notified,
    Done,
    Failed,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Result of a completed round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub report: EvaluationReport,
    /// Attempts the round needed before it succeeded.
    pub attempts: u32,
    pub notification: NotifyOutcome,
}

/// What one successful attempt produced, before notification.
struct RoundOutput {
    repo: RepositoryRef,
    commit_sha: String,
    pages_url: String,
}

pub struct TaskOrchestrator<H, S, G, N> {
    host: H,
    store: S,
    generator: G,
    notifier: EvaluationNotifier<N>,
    settings: PipelineSettings,
    pages_domain: String,
}

impl<H, S, G, N> TaskOrchestrator<H, S, G, N>
where
    H: RepositoryHost,
    S: ObjectStore,
    G: ContentGenerator,
    N: CallbackTransport,
{
    pub fn new(
        host: H,
        store: S,
        generator: G,
        transport: N,
        settings: PipelineSettings,
        pages_domain: impl Into<String>,
    ) -> Self {
        let notifier = EvaluationNotifier::new(transport, settings.notify.clone());
        Self {
            host,
            store,
            generator,
            notifier,
            settings,
            pages_domain: pages_domain.into(),
        }
    }

    fn lifecycle(&self) -> RepositoryLifecycle<'_, H, S> {
        RepositoryLifecycle::new(
            &self.host,
            &self.store,
            &self.settings.lifecycle,
            &self.pages_domain,
        )
    }

    fn publisher(&self) -> SnapshotPublisher<'_, S> {
        SnapshotPublisher::new(&self.store, &self.settings.publish)
    }

    /// Runs the round named by `task.round`: round 1 builds a new repository, any later
    /// round revises the existing one.
    pub async fn run(&self, task: &TaskRequest) -> Result<TaskReport, TaskError> {
        let name = task.repo_name();
        let initial = task.is_initial_round();
        enter(
            &name,
            if initial {
                TaskState::Round1Start
            } else {
                TaskState::Round2Start
            },
        );

        let max_attempts = self.settings.task.max_attempts.max(1);
        let mut attempt = 1;
        let (output, attempts) = loop {
            let result = if initial {
                self.round_one(task, &name).await
            } else {
                self.revision_round(task, &name).await
            };
            match result {
                Ok(output) => break (output, attempt),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    warn!(repo = %name, attempt, max_attempts, error = %e, "[TASK] Attempt failed, retrying round");
                    attempt += 1;
                }
                Err(e) => {
                    enter(&name, TaskState::Failed);
                    error!(repo = %name, attempt, error = %e, "[TASK][ERROR] Round failed");
                    if initial {
                        info!(repo = %name, "[TASK] Cleaning up repository after failed round 1");
                        self.lifecycle().delete(&name).await;
                    }
                    return Err(TaskError::Exhausted {
                        round: task.round,
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
            }
        };

        let report = EvaluationReport {
            email: task.email.clone(),
            task: task.task.clone(),
            round: task.round,
            nonce: task.nonce.clone(),
            repo_url: output.repo.html_url.clone(),
            commit_sha: output.commit_sha,
            pages_url: output.pages_url,
        };
        let notification = self.notifier.notify(&task.evaluation_url, &report).await;
        enter(&name, TaskState::Notified);
        enter(&name, TaskState::Done);

        Ok(TaskReport {
            report,
            attempts,
            notification,
        })
    }

    async fn round_one(&self, task: &TaskRequest, name: &str) -> Result<RoundOutput, TaskError> {
        enter(name, TaskState::Generating);
        let snapshot = self.generate_snapshot(task, initial_prompt(task)).await?;

        let lifecycle = self.lifecycle();
        let repo = lifecycle.create(name, true).await?;
        enter(name, TaskState::RepoCreated);

        let pages_url = lifecycle.enable_hosting(&repo).await?;
        enter(name, TaskState::HostingEnabled);

        let published = self
            .publisher()
            .publish(&repo, &snapshot, task.round, true)
            .await?;
        enter(name, TaskState::Published);

        Ok(RoundOutput {
            repo,
            commit_sha: published.commit_sha,
            pages_url,
        })
    }

    async fn revision_round(
        &self,
        task: &TaskRequest,
        name: &str,
    ) -> Result<RoundOutput, TaskError> {
        let repo = self.store.get_repository(name).await?;
        let current = fetch_all_files(&self.store, name).await?;
        enter(name, TaskState::FilesFetched);

        enter(name, TaskState::Generating);
        let snapshot = self
            .generate_snapshot(task, revision_prompt(task, &current))
            .await?;

        let published = self
            .publisher()
            .publish(&repo, &snapshot, task.round, false)
            .await?;
        enter(name, TaskState::Published);

        let pages_url = pages_url_for(&repo.owner, &self.pages_domain, &repo.name);
        Ok(RoundOutput {
            repo,
            commit_sha: published.commit_sha,
            pages_url,
        })
    }

    async fn generate_snapshot(
        &self,
        task: &TaskRequest,
        prompt: Prompt,
    ) -> Result<Snapshot, TaskError> {
        let raw = self.generator.generate(&prompt).await?;
        debug!(task = %task.task, response_len = raw.len(), "[TASK] Received model output");

        let extracted = extract(&raw)?;
        info!(
            task = %task.task,
            files = extracted.files.len(),
            strategy = ?extracted.strategy,
            main_language = extracted.main_language.as_deref().unwrap_or("-"),
            description = extracted.description.as_deref().unwrap_or("-"),
            "[TASK] Extracted files"
        );
        if let Some(summary) = &extracted.changes_summary {
            info!(task = %task.task, changes = %summary, "[TASK] Model change summary");
        }

        let files = normalize_files(extracted.files, &task.task, &task.brief)?;
        Snapshot::from_text_files(&files)
    }
}

fn enter(repo: &str, state: TaskState) {
    info!(repo, state = %state, "[TASK] State transition");
}
