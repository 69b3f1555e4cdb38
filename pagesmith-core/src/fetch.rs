//! Reads every file of an existing repository for a revision round.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::contract::ObjectStore;
use crate::error::StoreError;
use crate::model::ContentKind;

/// Walks the repository with an explicit worklist of directories, starting at the root.
///
/// Files that cannot be read are skipped with a warning; a directory that cannot be
/// listed fails the whole fetch. Contents are decoded as lossy UTF-8.
pub async fn fetch_all_files<S: ObjectStore>(
    store: &S,
    repo: &str,
) -> Result<BTreeMap<String, String>, StoreError> {
    let mut files = BTreeMap::new();
    let mut pending = vec![String::new()];

    while let Some(dir) = pending.pop() {
        let listing = store.list_directory(repo, &dir).await?;
        debug!(repo, dir = %dir, entries = listing.len(), "[FETCH] Listed directory");
        for entry in listing {
            match entry.kind {
                ContentKind::Dir => pending.push(entry.path),
                ContentKind::File => match store.read_file(repo, &entry.path).await {
                    Ok(bytes) => {
                        files.insert(entry.path, String::from_utf8_lossy(&bytes).into_owned());
                    }
                    Err(e) => {
                        warn!(repo, path = %entry.path, error = %e, "[FETCH] Skipping unreadable file");
                    }
                },
                ContentKind::Other => {
                    debug!(repo, path = %entry.path, "[FETCH] Ignoring non-file entry");
                }
            }
        }
    }

    info!(repo, files = files.len(), "[FETCH] Fetched existing repository files");
    Ok(files)
}
