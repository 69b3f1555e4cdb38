//! Whole-repository lifecycle: existence checks, idempotent (re)creation, deletion and
//! static hosting.
//!
//! Creation tolerates the delete/create visibility race of the host: when a freshly
//! deleted name still collides, the repository is deleted again and creation retried
//! exactly once after a longer settling pause.

use tracing::{error, info, warn};

use crate::contract::{ObjectStore, RepositoryHost};
use crate::error::{LifecycleError, StoreError};
use crate::model::{PagesOutcome, RepositoryRef};
use crate::settings::LifecycleSettings;

/// Public site URL of a repository under the owner's pages domain.
pub fn pages_url_for(owner: &str, pages_domain: &str, repo: &str) -> String {
    format!("https://{owner}.{pages_domain}/{repo}/")
}

pub struct RepositoryLifecycle<'a, H, S> {
    host: &'a H,
    store: &'a S,
    settings: &'a LifecycleSettings,
    pages_domain: &'a str,
}

impl<'a, H, S> RepositoryLifecycle<'a, H, S>
where
    H: RepositoryHost,
    S: ObjectStore,
{
    pub fn new(
        host: &'a H,
        store: &'a S,
        settings: &'a LifecycleSettings,
        pages_domain: &'a str,
    ) -> Self {
        Self {
            host,
            store,
            settings,
            pages_domain,
        }
    }

    pub async fn exists(&self, name: &str) -> Result<bool, StoreError> {
        match self.store.get_repository(name).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Deletes `name`. An absent repository counts as deleted; any other failure is
    /// logged and reported as `false`.
    pub async fn delete(&self, name: &str) -> bool {
        match self.host.delete_repository(name).await {
            Ok(()) => {
                info!(repo = %name, "[LIFECYCLE] Deleted repository");
                true
            }
            Err(e) if e.is_not_found() => {
                info!(repo = %name, "[LIFECYCLE] Repository already absent");
                true
            }
            Err(e) => {
                error!(repo = %name, error = %e, "[LIFECYCLE][ERROR] Failed to delete repository");
                false
            }
        }
    }

    pub async fn create(
        &self,
        name: &str,
        force_recreate: bool,
    ) -> Result<RepositoryRef, LifecycleError> {
        if force_recreate && self.exists(name).await? {
            info!(repo = %name, "[LIFECYCLE] Repository exists, deleting before recreate");
            self.delete(name).await;
            tokio::time::sleep(self.settings.settle_after_delete()).await;
        }

        match self.host.create_repository(name).await {
            Ok(repo) => {
                info!(repo = %name, url = %repo.html_url, "[LIFECYCLE] Created repository");
                Ok(repo)
            }
            Err(e) if e.is_conflict() => {
                warn!(repo = %name, error = %e, "[LIFECYCLE] Name still taken, deleting and retrying once");
                self.delete(name).await;
                tokio::time::sleep(self.settings.settle_before_retry()).await;
                match self.host.create_repository(name).await {
                    Ok(repo) => {
                        info!(repo = %name, "[LIFECYCLE] Created repository on retry");
                        Ok(repo)
                    }
                    Err(e) if e.is_conflict() => {
                        error!(repo = %name, error = %e, "[LIFECYCLE][ERROR] Create retry collided again");
                        Err(LifecycleError::CreateConflict {
                            name: name.to_string(),
                        })
                    }
                    Err(e) => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Enables hosting for the default branch and returns the site URL. Hosting that is
    /// already on is not an error.
    pub async fn enable_hosting(&self, repo: &RepositoryRef) -> Result<String, StoreError> {
        let outcome = self
            .host
            .enable_pages(&repo.name, &repo.default_branch)
            .await?;
        let url = match outcome {
            PagesOutcome::Enabled { url: Some(url) } => url,
            PagesOutcome::Enabled { url: None } => {
                pages_url_for(&repo.owner, self.pages_domain, &repo.name)
            }
            PagesOutcome::AlreadyEnabled => {
                info!(repo = %repo.name, "[LIFECYCLE] Hosting already enabled, fetching URL");
                self.host.get_pages_url(&repo.name).await?
            }
        };
        info!(repo = %repo.name, pages_url = %url, "[LIFECYCLE] Hosting enabled");
        Ok(url)
    }
}
