#![allow(unused)]

//! # contract: collaborator interfaces of the pipeline
//!
//! Every network-facing dependency of the core is a trait defined here, so the
//! orchestration logic can run against the real clients in the binary crate or against
//! `mockall` mocks in tests.
//!
//! - [`ObjectStore`]: object-level primitives of the remote repository (blobs, trees,
//!   commits, refs) plus repository metadata and content listing.
//! - [`RepositoryHost`]: whole-repository lifecycle and static hosting.
//! - [`ContentGenerator`]: the language model producing raw text.
//! - [`CallbackTransport`]: delivery of the evaluation report.
//!
//! Implementors map every failure onto the typed errors in [`crate::error`]; none of the
//! traits carries a retry policy of its own.

use async_trait::async_trait;

use mockall::{automock, predicate::*};

use crate::error::{GenerationError, StoreError, TransportError};
use crate::model::{
    ContentEntry, EvaluationReport, NewCommit, PagesOutcome, RepositoryRef, TreeEntry,
};
use crate::prompt::Prompt;

/// Object-level access to one owner's repositories. Each method is a single request.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Repository metadata. `NotFound` when the repository does not exist.
    async fn get_repository(&self, repo: &str) -> Result<RepositoryRef, StoreError>;

    /// Commit sha the branch points at. `NotFound` while the ref is not yet visible.
    async fn get_branch_tip(&self, repo: &str, branch: &str) -> Result<String, StoreError>;

    /// Tree sha of a commit.
    async fn get_commit_tree(&self, repo: &str, commit_sha: &str) -> Result<String, StoreError>;

    /// Uploads raw bytes; the implementor base64-encodes them for transmission.
    async fn create_blob(&self, repo: &str, content: &[u8]) -> Result<String, StoreError>;

    /// New tree overlaying `entries` on `base_tree_sha`; unlisted base paths are kept.
    async fn create_tree(
        &self,
        repo: &str,
        base_tree_sha: &str,
        entries: &[TreeEntry],
    ) -> Result<String, StoreError>;

    async fn create_commit(&self, repo: &str, commit: &NewCommit) -> Result<String, StoreError>;

    /// Moves the branch. Without `force` this is fast-forward only and fails with
    /// `Conflict` when the branch moved since its tip was read.
    async fn update_ref(
        &self,
        repo: &str,
        branch: &str,
        commit_sha: &str,
        force: bool,
    ) -> Result<(), StoreError>;

    /// Immediate children of a directory (`""` is the repository root).
    async fn list_directory(&self, repo: &str, path: &str)
        -> Result<Vec<ContentEntry>, StoreError>;

    /// Decoded content of a single file on the default branch.
    async fn read_file(&self, repo: &str, path: &str) -> Result<Vec<u8>, StoreError>;
}

/// Creation, deletion and hosting of whole repositories.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RepositoryHost: Send + Sync {
    /// Creates a public, auto-initialised repository. `Conflict` when the name is taken.
    async fn create_repository(&self, name: &str) -> Result<RepositoryRef, StoreError>;

    /// `NotFound` when the repository is already absent.
    async fn delete_repository(&self, name: &str) -> Result<(), StoreError>;

    /// Switches on static hosting for `branch` at the repository root.
    async fn enable_pages(&self, name: &str, branch: &str) -> Result<PagesOutcome, StoreError>;

    /// Site URL of an already-enabled hosting configuration.
    async fn get_pages_url(&self, name: &str) -> Result<String, StoreError>;
}

/// The language model. Returns raw text expected to contain a JSON files mapping.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError>;
}

/// Status and body of a callback response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackResponse {
    pub status: u16,
    pub body: String,
}

/// POSTs the evaluation report; any HTTP status is a successful transport.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CallbackTransport: Send + Sync {
    async fn post_report(
        &self,
        url: &str,
        report: &EvaluationReport,
    ) -> Result<CallbackResponse, TransportError>;
}
