use crate::RepoError;
use charm_format::{Charm, CharmBundle};
use charm_remote::{CatalogClient, RemoteError};
use charm_schema::Url;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Repository backed by the remote catalog.
pub struct CatalogRepository {
    client: Arc<dyn CatalogClient>,
}

impl fmt::Debug for CatalogRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogRepository").finish_non_exhaustive()
    }
}

impl CatalogRepository {
    pub fn new(client: Arc<dyn CatalogClient>) -> Self {
        Self { client }
    }

    /// Download and read the bundle for `url`.
    pub fn get(&self, url: &Url) -> Result<Charm, RepoError> {
        let data = self
            .client
            .fetch_charm(url)
            .map_err(|e| not_found_as_missing(e, url))?;
        let bundle = CharmBundle::from_bytes(data, url.to_string())?;
        info!(
            "fetched {url} from catalog (revision {})",
            bundle.revision()
        );
        Ok(Charm::Bundle(bundle))
    }

    pub fn latest(&self, url: &Url) -> Result<i32, RepoError> {
        self.client
            .latest_revision(url)
            .map_err(|e| not_found_as_missing(e, url))
    }
}

fn not_found_as_missing(err: RemoteError, url: &Url) -> RepoError {
    match err {
        RemoteError::NotFound(_) => RepoError::CharmNotFound {
            url: url.to_string(),
        },
        other => RepoError::Remote(other),
    }
}
