use crate::{CatalogRepository, LocalRepository, RepoError, Repository};
use charm_remote::{CatalogClient, CatalogConfig, HttpCatalog};
use charm_schema::{Url, CATALOG_SCHEMA, LOCAL_SCHEMA};
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Chooses the repository responsible for a charm URL.
///
/// The catalog repository is created on first use and then shared by every
/// `cs` resolution made through this resolver.
#[derive(Debug)]
pub struct Resolver {
    config: CatalogConfig,
    catalog: OnceLock<Arc<CatalogRepository>>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(CatalogConfig::default())
    }
}

impl Resolver {
    pub fn new(config: CatalogConfig) -> Self {
        Self {
            config,
            catalog: OnceLock::new(),
        }
    }

    /// A resolver whose catalog talks to `client` instead of HTTP.
    pub fn with_client(client: Arc<dyn CatalogClient>) -> Self {
        Self {
            config: CatalogConfig::default(),
            catalog: OnceLock::from(Arc::new(CatalogRepository::new(client))),
        }
    }

    pub fn catalog_config(&self) -> &CatalogConfig {
        &self.config
    }

    /// The shared catalog repository.
    pub fn catalog(&self) -> Arc<CatalogRepository> {
        let repo = self.catalog.get_or_init(|| {
            debug!("connecting catalog at {}", self.config.url);
            let client = HttpCatalog::new(self.config.clone());
            Arc::new(CatalogRepository::new(Arc::new(client)))
        });
        Arc::clone(repo)
    }

    /// Repository for `url`.
    ///
    /// `local_root` is only consulted for `local` URLs and must then be
    /// non-empty. The result depends on nothing but the URL's schema and
    /// `local_root`; no filesystem or network access happens here.
    pub fn infer(&self, url: &Url, local_root: &Path) -> Result<Repository, RepoError> {
        match url.schema() {
            CATALOG_SCHEMA => Ok(Repository::Catalog(self.catalog())),
            LOCAL_SCHEMA => {
                if local_root.as_os_str().is_empty() {
                    return Err(RepoError::MissingLocalRoot {
                        url: url.to_string(),
                    });
                }
                Ok(Repository::Local(LocalRepository::new(local_root)))
            }
            other => Err(RepoError::UnknownSchema {
                schema: other.to_owned(),
                url: url.to_string(),
            }),
        }
    }
}
