//! Plain data flowing through the pipeline: task input, snapshots, repository refs and reports.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::TaskError;

/// Path of the page the hosting feature serves; every snapshot must contain it.
pub const ENTRY_POINT: &str = "index.html";

/// Raw file content. Both variants are base64-encoded on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Text(String),
    Binary(Vec<u8>),
}

impl FileContent {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            FileContent::Text(text) => text.as_bytes(),
            FileContent::Binary(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Repository-relative, forward-slash separated.
    pub path: String,
    pub content: FileContent,
}

impl FileEntry {
    pub fn text(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: FileContent::Text(content.into()),
        }
    }

    pub fn binary(path: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            content: FileContent::Binary(content),
        }
    }
}

/// The full set of files published in one commit: non-empty, unique paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    entries: Vec<FileEntry>,
}

impl Snapshot {
    pub fn new(entries: Vec<FileEntry>) -> Result<Self, TaskError> {
        if entries.is_empty() {
            return Err(TaskError::InvalidSnapshot("snapshot has no files".into()));
        }
        let mut seen = HashSet::new();
        for entry in &entries {
            if entry.path.is_empty() || entry.path.starts_with('/') || entry.path.contains('\\') {
                return Err(TaskError::InvalidSnapshot(format!(
                    "invalid repository path {:?}",
                    entry.path
                )));
            }
            if !seen.insert(entry.path.as_str()) {
                return Err(TaskError::InvalidSnapshot(format!(
                    "duplicate path {}",
                    entry.path
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Text snapshot from a path → content mapping; iteration order is the map's key order.
    pub fn from_text_files(files: &BTreeMap<String, String>) -> Result<Self, TaskError> {
        Self::new(
            files
                .iter()
                .map(|(path, content)| FileEntry::text(path.clone(), content.clone()))
                .collect(),
        )
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.iter().any(|e| e.path == path)
    }
}

/// Identifies a remote repository and the branch a publish builds on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub owner: String,
    pub name: String,
    pub default_branch: String,
    pub html_url: String,
}

/// One `{path, blob}` pair overlaid onto a base tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: String,
    pub blob_sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCommit {
    pub message: String,
    pub tree_sha: String,
    pub parent_sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishResult {
    pub commit_sha: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    File,
    Dir,
    /// Symlinks and submodules; ignored by the round-2 fetch.
    Other,
}

/// One item of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentEntry {
    pub path: String,
    pub kind: ContentKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PagesOutcome {
    Enabled { url: Option<String> },
    /// Hosting was already switched on for the repository.
    AlreadyEnabled,
}

/// Attachment supplied with a task; `url` is usually a `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub url: String,
}

/// Task input as delivered by the request layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub task: String,
    pub nonce: String,
    pub round: u32,
    #[serde(default)]
    pub brief: String,
    #[serde(default)]
    pub checks: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub evaluation_url: String,
    #[serde(default)]
    pub email: String,
}

impl TaskRequest {
    /// `<task-with-spaces-as-hyphens>-<nonce>`.
    pub fn repo_name(&self) -> String {
        format!("{}-{}", self.task.replace(' ', "-"), self.nonce)
    }

    pub fn is_initial_round(&self) -> bool {
        self.round == 1
    }
}

/// Body POSTed to the evaluation callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub email: String,
    pub task: String,
    pub round: u32,
    pub nonce: String,
    pub repo_url: String,
    pub commit_sha: String,
    pub pages_url: String,
}
