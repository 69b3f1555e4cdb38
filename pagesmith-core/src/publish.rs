//! Publishes a [`Snapshot`] as one new commit built from primitive objects.
//!
//! The pipeline is linear with no rollback:
//!
//! 1. read the branch tip (retried while the ref of a new repository is not yet visible)
//! 2. read the tip commit's tree
//! 3. upload one blob per file, sequentially
//! 4. overlay the blobs onto the base tree
//! 5. commit with the tip as sole parent
//! 6. fast-forward the branch
//!
//! A failure before step 6 leaves unreferenced objects behind but never moves the branch.

use tracing::{debug, error, info, warn};

use crate::contract::ObjectStore;
use crate::error::{PublishError, PublishStage, StoreError};
use crate::model::{NewCommit, PublishResult, RepositoryRef, Snapshot, TreeEntry};
use crate::settings::PublishSettings;

pub struct SnapshotPublisher<'a, S> {
    store: &'a S,
    settings: &'a PublishSettings,
}

impl<'a, S: ObjectStore> SnapshotPublisher<'a, S> {
    pub fn new(store: &'a S, settings: &'a PublishSettings) -> Self {
        Self { store, settings }
    }

    /// `round` and `is_first_publish` only shape the commit message and logs.
    pub async fn publish(
        &self,
        repo: &RepositoryRef,
        snapshot: &Snapshot,
        round: u32,
        is_first_publish: bool,
    ) -> Result<PublishResult, PublishError> {
        info!(
            repo = %repo.name,
            branch = %repo.default_branch,
            files = snapshot.len(),
            round,
            first = is_first_publish,
            "[PUBLISH] Starting publish"
        );

        let parent_sha = self.resolve_tip(repo).await?;

        let base_tree_sha = self
            .store
            .get_commit_tree(&repo.name, &parent_sha)
            .await
            .map_err(|e| fail(PublishStage::BaseTree, e))?;
        debug!(repo = %repo.name, %parent_sha, %base_tree_sha, "[PUBLISH] Resolved base tree");

        let mut entries = Vec::with_capacity(snapshot.len());
        for file in snapshot.entries() {
            let blob_sha = self
                .store
                .create_blob(&repo.name, file.content.as_bytes())
                .await
                .map_err(|e| {
                    error!(repo = %repo.name, path = %file.path, "[PUBLISH][ERROR] Blob upload failed");
                    fail(PublishStage::Blob, e)
                })?;
            debug!(path = %file.path, bytes = file.content.len(), %blob_sha, "[PUBLISH] Created blob");
            entries.push(TreeEntry {
                path: file.path.clone(),
                blob_sha,
            });
        }

        let tree_sha = self
            .store
            .create_tree(&repo.name, &base_tree_sha, &entries)
            .await
            .map_err(|e| fail(PublishStage::Tree, e))?;

        let verb = if is_first_publish { "Add" } else { "Update" };
        let commit = NewCommit {
            message: format!("Round {round}: {verb} {} file(s)", snapshot.len()),
            tree_sha,
            parent_sha,
        };
        let commit_sha = self
            .store
            .create_commit(&repo.name, &commit)
            .await
            .map_err(|e| fail(PublishStage::Commit, e))?;

        self.store
            .update_ref(&repo.name, &repo.default_branch, &commit_sha, false)
            .await
            .map_err(|e| fail(PublishStage::RefUpdate, e))?;

        info!(repo = %repo.name, %commit_sha, "[PUBLISH] Branch advanced");
        Ok(PublishResult { commit_sha })
    }

    /// The ref of a just-created repository may lag behind its creation, so `NotFound`
    /// is waited out for a bounded number of reads. Any other failure is immediate.
    async fn resolve_tip(&self, repo: &RepositoryRef) -> Result<String, PublishError> {
        let attempts = self.settings.branch_tip_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self
                .store
                .get_branch_tip(&repo.name, &repo.default_branch)
                .await
            {
                Ok(sha) => {
                    debug!(repo = %repo.name, attempt, %sha, "[PUBLISH] Resolved branch tip");
                    return Ok(sha);
                }
                Err(e) if e.is_not_found() && attempt < attempts => {
                    warn!(
                        repo = %repo.name,
                        attempt,
                        max_attempts = attempts,
                        "[PUBLISH] Branch tip not visible yet, waiting"
                    );
                    tokio::time::sleep(self.settings.branch_tip_pause()).await;
                    attempt += 1;
                }
                Err(e) => return Err(fail(PublishStage::BranchTip, e)),
            }
        }
    }
}

fn fail(stage: PublishStage, source: StoreError) -> PublishError {
    error!(stage = %stage, error = %source, "[PUBLISH][ERROR] Publish failed");
    PublishError::new(stage, source)
}
