use crate::{CatalogRepository, LocalRepository, RepoError};
use charm_format::Charm;
use charm_schema::Url;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryKind {
    Catalog,
    Local,
}

impl fmt::Display for RepositoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryKind::Catalog => write!(f, "catalog"),
            RepositoryKind::Local => write!(f, "local"),
        }
    }
}

/// A source of charms, as chosen by [`crate::Resolver::infer`].
#[derive(Debug, Clone)]
pub enum Repository {
    /// The resolver's shared catalog.
    Catalog(Arc<CatalogRepository>),
    Local(LocalRepository),
}

impl Repository {
    /// Fetch the charm `url` refers to. A pinned revision must match exactly;
    /// otherwise the newest available revision is returned.
    pub fn get(&self, url: &Url) -> Result<Charm, RepoError> {
        match self {
            Repository::Catalog(c) => c.get(url),
            Repository::Local(l) => l.get(url),
        }
    }

    /// Newest revision available for the charm `url` names.
    pub fn latest(&self, url: &Url) -> Result<i32, RepoError> {
        match self {
            Repository::Catalog(c) => c.latest(url),
            Repository::Local(l) => l.latest(url),
        }
    }

    pub fn kind(&self) -> RepositoryKind {
        match self {
            Repository::Catalog(_) => RepositoryKind::Catalog,
            Repository::Local(_) => RepositoryKind::Local,
        }
    }
}
