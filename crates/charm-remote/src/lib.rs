//! Client side of the remote charm catalog.
//!
//! The catalog answers two questions about a charm URL: which revision it
//! currently resolves to (with the digest of that revision's bundle), and the
//! bundle bytes themselves. [`CatalogClient`] is the seam the repository layer
//! talks to; [`HttpCatalog`] is the production implementation and
//! [`CatalogConfig`] locates the endpoint.

pub mod config;
pub mod http;

pub use config::CatalogConfig;
pub use http::HttpCatalog;

use charm_schema::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Protocol version sent as `X-Charm-Protocol` header on all HTTP requests.
/// Catalogs can reject clients with incompatible protocol versions.
pub const PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("catalog config error: {0}")]
    Config(String),
    #[error("integrity failure for '{key}': expected {expected}, got {actual}")]
    IntegrityFailure {
        key: String,
        expected: String,
        actual: String,
    },
}

/// What the catalog knows about a charm URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharmInfo {
    pub revision: i32,
    /// Hex blake3 digest of the bundle for `revision`.
    pub digest: String,
}

/// Remote charm catalog.
pub trait CatalogClient: Send + Sync {
    /// Look up the revision and bundle digest a URL resolves to.
    fn charm_info(&self, url: &Url) -> Result<CharmInfo, RemoteError>;

    /// Download the bundle bytes for a URL.
    fn fetch_charm(&self, url: &Url) -> Result<Vec<u8>, RemoteError>;

    /// Latest revision available for the charm, ignoring any pinned revision.
    fn latest_revision(&self, url: &Url) -> Result<i32, RemoteError> {
        Ok(self.charm_info(&url.unrevisioned())?.revision)
    }
}

/// Hex blake3 digest of `data`, as carried in [`CharmInfo::digest`].
pub fn digest(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}
