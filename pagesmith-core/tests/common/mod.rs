#![allow(dead_code)]

//! In-memory content-addressed repository host used by the integration tests.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use pagesmith_core::contract::{ObjectStore, RepositoryHost};
use pagesmith_core::error::{ErrorKind, StoreError};
use pagesmith_core::model::{
    ContentEntry, ContentKind, NewCommit, PagesOutcome, RepositoryRef, TreeEntry,
};

pub const OWNER: &str = "octo";
pub const BRANCH: &str = "main";

#[derive(Debug, Clone)]
pub struct StoredCommit {
    pub tree: String,
    pub parent: Option<String>,
    pub message: String,
}

#[derive(Default)]
pub struct State {
    pub repos: HashMap<String, RepositoryRef>,
    pub branches: HashMap<String, String>,
    pub pages: BTreeSet<String>,
    pub blobs: HashMap<String, Vec<u8>>,
    pub trees: HashMap<String, BTreeMap<String, String>>,
    pub commits: HashMap<String, StoredCommit>,
    pub calls: Vec<String>,
    /// `NotFound` answers to give for the branch tip before it becomes visible.
    pub tip_misses: u32,
    /// Fail the blob upload with this 1-based index.
    pub fail_blob_at: Option<usize>,
    pub blob_count: usize,
    /// Move the branch behind the publisher's back right before its ref update.
    pub race_ref_update: bool,
    pub unreadable: BTreeSet<String>,
}

/// Cloneable handle; clones share state.
#[derive(Clone, Default)]
pub struct FakeStore {
    pub state: Arc<Mutex<State>>,
}

fn sha(kind: &str, bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update([0]);
    hasher.update(bytes);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

pub fn blob_sha(content: &[u8]) -> String {
    sha("blob", content)
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn calls_named(&self, prefix: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    /// Adds a repository whose branch points at a commit holding `files`.
    pub fn seed_repo(&self, name: &str, files: &[(&str, &str)]) -> RepositoryRef {
        let mut st = self.lock();
        let tree: BTreeMap<String, String> = files
            .iter()
            .map(|(path, content)| {
                let blob = blob_sha(content.as_bytes());
                st.blobs.insert(blob.clone(), content.as_bytes().to_vec());
                (path.to_string(), blob)
            })
            .collect();
        insert_repo(&mut st, name, tree)
    }

    pub fn tip(&self, name: &str) -> Option<String> {
        self.lock().branches.get(name).cloned()
    }

    /// Path → content of the tree at the branch tip.
    pub fn files_at_tip(&self, name: &str) -> BTreeMap<String, String> {
        let st = self.lock();
        let Some(tip) = st.branches.get(name) else {
            return BTreeMap::new();
        };
        let tree = &st.trees[&st.commits[tip].tree];
        tree.iter()
            .map(|(path, blob)| {
                (
                    path.clone(),
                    String::from_utf8_lossy(&st.blobs[blob]).into_owned(),
                )
            })
            .collect()
    }

    pub fn commit(&self, sha: &str) -> StoredCommit {
        self.lock().commits[sha].clone()
    }

    pub fn tree_of(&self, commit_sha: &str) -> BTreeMap<String, String> {
        let st = self.lock();
        st.trees[&st.commits[commit_sha].tree].clone()
    }
}

fn insert_repo(st: &mut State, name: &str, tree: BTreeMap<String, String>) -> RepositoryRef {
    let tree_sha = sha("tree", format!("{tree:?}").as_bytes());
    st.trees.insert(tree_sha.clone(), tree);
    let commit_sha = sha("commit", format!("{name}:{tree_sha}:init").as_bytes());
    st.commits.insert(
        commit_sha.clone(),
        StoredCommit {
            tree: tree_sha,
            parent: None,
            message: "Initial commit".into(),
        },
    );
    st.branches.insert(name.to_string(), commit_sha);
    let repo = RepositoryRef {
        owner: OWNER.into(),
        name: name.into(),
        default_branch: BRANCH.into(),
        html_url: format!("https://github.com/{OWNER}/{name}"),
    };
    st.repos.insert(name.to_string(), repo.clone());
    repo
}

fn missing(operation: &str, what: &str) -> StoreError {
    StoreError::not_found(operation, format!("{what} not found"))
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn get_repository(&self, repo: &str) -> Result<RepositoryRef, StoreError> {
        let mut st = self.lock();
        st.calls.push(format!("get_repository {repo}"));
        st.repos
            .get(repo)
            .cloned()
            .ok_or_else(|| missing("get repository", repo))
    }

    async fn get_branch_tip(&self, repo: &str, branch: &str) -> Result<String, StoreError> {
        let mut st = self.lock();
        st.calls.push(format!("get_branch_tip {repo}"));
        if st.tip_misses > 0 {
            st.tip_misses -= 1;
            return Err(missing("get branch tip", branch));
        }
        st.branches
            .get(repo)
            .cloned()
            .ok_or_else(|| missing("get branch tip", branch))
    }

    async fn get_commit_tree(&self, repo: &str, commit_sha: &str) -> Result<String, StoreError> {
        let mut st = self.lock();
        st.calls.push(format!("get_commit_tree {repo}"));
        st.commits
            .get(commit_sha)
            .map(|c| c.tree.clone())
            .ok_or_else(|| missing("get commit", commit_sha))
    }

    async fn create_blob(&self, repo: &str, content: &[u8]) -> Result<String, StoreError> {
        let mut st = self.lock();
        st.calls.push(format!("create_blob {repo}"));
        st.blob_count += 1;
        if st.fail_blob_at == Some(st.blob_count) {
            return Err(StoreError::from_status("create blob", 502, "bad gateway"));
        }
        let blob = blob_sha(content);
        st.blobs.insert(blob.clone(), content.to_vec());
        Ok(blob)
    }

    async fn create_tree(
        &self,
        repo: &str,
        base_tree_sha: &str,
        entries: &[TreeEntry],
    ) -> Result<String, StoreError> {
        let mut st = self.lock();
        st.calls.push(format!("create_tree {repo}"));
        let mut tree = st
            .trees
            .get(base_tree_sha)
            .cloned()
            .ok_or_else(|| missing("create tree", base_tree_sha))?;
        for entry in entries {
            if !st.blobs.contains_key(&entry.blob_sha) {
                return Err(StoreError::new(ErrorKind::Fatal, "create tree", "unknown blob"));
            }
            tree.insert(entry.path.clone(), entry.blob_sha.clone());
        }
        let tree_sha = sha("tree", format!("{tree:?}").as_bytes());
        st.trees.insert(tree_sha.clone(), tree);
        Ok(tree_sha)
    }

    async fn create_commit(&self, repo: &str, commit: &NewCommit) -> Result<String, StoreError> {
        let mut st = self.lock();
        st.calls.push(format!("create_commit {repo}"));
        let commit_sha = sha(
            "commit",
            format!("{}:{}:{}", commit.tree_sha, commit.parent_sha, commit.message).as_bytes(),
        );
        st.commits.insert(
            commit_sha.clone(),
            StoredCommit {
                tree: commit.tree_sha.clone(),
                parent: Some(commit.parent_sha.clone()),
                message: commit.message.clone(),
            },
        );
        Ok(commit_sha)
    }

    async fn update_ref(
        &self,
        repo: &str,
        _branch: &str,
        commit_sha: &str,
        force: bool,
    ) -> Result<(), StoreError> {
        let mut st = self.lock();
        st.calls.push(format!("update_ref {repo}"));
        if st.race_ref_update {
            st.branches.insert(repo.to_string(), "concurrent".into());
        }
        let parent = st.commits.get(commit_sha).and_then(|c| c.parent.clone());
        let current = st.branches.get(repo).cloned();
        if !force && parent != current {
            return Err(StoreError::from_status(
                "update ref",
                422,
                "Update is not a fast forward",
            ));
        }
        st.branches.insert(repo.to_string(), commit_sha.to_string());
        Ok(())
    }

    async fn list_directory(
        &self,
        repo: &str,
        path: &str,
    ) -> Result<Vec<ContentEntry>, StoreError> {
        let files = self.files_at_tip(repo);
        {
            let mut st = self.lock();
            st.calls.push(format!("list_directory {repo} {path}"));
            if !st.repos.contains_key(repo) {
                return Err(missing("list directory", repo));
            }
        }
        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{path}/")
        };
        let mut children = BTreeMap::new();
        for file in files.keys() {
            let Some(rest) = file.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((dir, _)) => {
                    children.insert(format!("{prefix}{dir}"), ContentKind::Dir);
                }
                None => {
                    children.insert(file.clone(), ContentKind::File);
                }
            }
        }
        if children.is_empty() && !path.is_empty() {
            return Err(missing("list directory", path));
        }
        Ok(children
            .into_iter()
            .map(|(path, kind)| ContentEntry { path, kind })
            .collect())
    }

    async fn read_file(&self, repo: &str, path: &str) -> Result<Vec<u8>, StoreError> {
        let files = self.files_at_tip(repo);
        let mut st = self.lock();
        st.calls.push(format!("read_file {repo} {path}"));
        if st.unreadable.contains(path) {
            return Err(StoreError::from_status("read file", 500, "boom"));
        }
        files
            .get(path)
            .map(|c| c.as_bytes().to_vec())
            .ok_or_else(|| missing("read file", path))
    }
}

#[async_trait]
impl RepositoryHost for FakeStore {
    async fn create_repository(&self, name: &str) -> Result<RepositoryRef, StoreError> {
        let mut st = self.lock();
        st.calls.push(format!("create_repository {name}"));
        if st.repos.contains_key(name) {
            return Err(StoreError::from_status(
                "create repository",
                422,
                "name already exists on this account",
            ));
        }
        let readme = b"# init".to_vec();
        let blob = blob_sha(&readme);
        st.blobs.insert(blob.clone(), readme);
        let tree = BTreeMap::from([("README.md".to_string(), blob)]);
        Ok(insert_repo(&mut st, name, tree))
    }

    async fn delete_repository(&self, name: &str) -> Result<(), StoreError> {
        let mut st = self.lock();
        st.calls.push(format!("delete_repository {name}"));
        st.pages.remove(name);
        st.branches.remove(name);
        st.repos
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| missing("delete repository", name))
    }

    async fn enable_pages(&self, name: &str, _branch: &str) -> Result<PagesOutcome, StoreError> {
        let mut st = self.lock();
        st.calls.push(format!("enable_pages {name}"));
        if !st.repos.contains_key(name) {
            return Err(missing("enable pages", name));
        }
        if st.pages.insert(name.to_string()) {
            Ok(PagesOutcome::Enabled { url: None })
        } else {
            Ok(PagesOutcome::AlreadyEnabled)
        }
    }

    async fn get_pages_url(&self, name: &str) -> Result<String, StoreError> {
        let mut st = self.lock();
        st.calls.push(format!("get_pages_url {name}"));
        Ok(format!("https://{OWNER}.github.io/{name}/"))
    }
}
