//! Repository resolution for charm URLs.
//!
//! A [`Resolver`] maps a URL's schema to a [`Repository`]: `cs` URLs go to the
//! remote catalog, `local` URLs to a directory of charms on disk. Repositories
//! fetch charms through the readers in `charm-format`, so a charm obtained
//! from either source has passed the same path and bundle checks.

pub mod catalog;
pub mod local;
pub mod repository;
pub mod resolver;

pub use catalog::CatalogRepository;
pub use local::LocalRepository;
pub use repository::{Repository, RepositoryKind};
pub use resolver::Resolver;

use charm_format::CharmError;
use charm_remote::RemoteError;
use charm_schema::UrlError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("invalid charm URL: {0}")]
    Url(#[from] UrlError),
    #[error("unknown schema {schema:?} for charm URL {url:?}")]
    UnknownSchema { schema: String, url: String },
    #[error("path to local repository not specified for {url}")]
    MissingLocalRoot { url: String },
    #[error("charm not found: {url}")]
    CharmNotFound { url: String },
    #[error("charm error: {0}")]
    Charm(#[from] CharmError),
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),
}
