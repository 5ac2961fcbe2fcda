//! Charm readers for the directory and bundle encodings.
//!
//! A charm is either an extracted directory tree (`CharmDir`) or a single tar
//! archive (`CharmBundle`). Both are normalized into the same logical model
//! (`Meta`, `Config`, revision) and every path they contain is checked by
//! `validate_path` before it is trusted. [`read`] inspects a filesystem path once
//! and dispatches to the matching reader.

pub mod bundle;
pub mod charm;
pub mod dir;
pub mod path;

pub use bundle::{BundleOrigin, CharmBundle};
pub use charm::{read, Charm, CharmKind};
pub use dir::CharmDir;
pub use path::{clean_path, validate_path, RESERVED_HOOK_PREFIX};

use charm_schema::{Config, DecodeError, Meta};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Revision reported by charms that carry no revision marker.
pub const UNSET_REVISION: i32 = -1;

pub const METADATA_FILE: &str = "metadata.yaml";
pub const CONFIG_FILE: &str = "config.yaml";
pub const REVISION_FILE: &str = "revision";

/// File extension of bundles in a local repository.
pub const BUNDLE_EXTENSION: &str = "charm";

#[derive(Debug, Error)]
pub enum CharmError {
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to decode {}: {source}", path.display())]
    Decode { path: PathBuf, source: DecodeError },
    #[error("invalid revision in {}: {content:?}", path.display())]
    InvalidRevision { path: PathBuf, content: String },
    #[error("charm contains reserved path {path:?}")]
    ReservedPath { path: String },
    #[error("unsafe entry {entry:?} in bundle {}: {reason}", bundle.display())]
    UnsafeBundle {
        bundle: PathBuf,
        entry: String,
        reason: String,
    },
    #[error("unsafe link {entry:?} in charm {}: {reason}", root.display())]
    UnsafeLink {
        root: PathBuf,
        entry: String,
        reason: String,
    },
    #[error("invalid bundle {}: {reason}", path.display())]
    BundleFormat { path: PathBuf, reason: String },
}

impl CharmError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Whether a cleaned relative path names one of the logical files.
pub(crate) fn is_logical_file(rel: &str) -> bool {
    matches!(rel, METADATA_FILE | CONFIG_FILE | REVISION_FILE)
}

/// Raw bytes of the three logical files, as found in either encoding.
#[derive(Debug, Default)]
pub(crate) struct LogicalFiles {
    pub metadata: Option<Vec<u8>>,
    pub config: Option<Vec<u8>>,
    pub revision: Option<Vec<u8>>,
}

impl LogicalFiles {
    /// Slot for a cleaned relative path, if it names a logical file.
    pub fn slot(&mut self, rel: &str) -> Option<&mut Option<Vec<u8>>> {
        match rel {
            METADATA_FILE => Some(&mut self.metadata),
            CONFIG_FILE => Some(&mut self.config),
            REVISION_FILE => Some(&mut self.revision),
            _ => None,
        }
    }

    /// Decode into the logical model. `root` only labels error paths.
    /// A missing metadata file must be rejected by the caller beforehand.
    pub fn decode(self, root: &Path) -> Result<(Meta, Config, i32), CharmError> {
        let meta_path = root.join(METADATA_FILE);
        let meta_bytes = self.metadata.unwrap_or_default();
        let meta = Meta::from_slice(&meta_bytes).map_err(|source| CharmError::Decode {
            path: meta_path,
            source,
        })?;

        let config = match self.config {
            Some(bytes) => Config::from_slice(&bytes).map_err(|source| CharmError::Decode {
                path: root.join(CONFIG_FILE),
                source,
            })?,
            None => Config::empty(),
        };

        let revision = match self.revision {
            Some(bytes) => parse_revision(&root.join(REVISION_FILE), &bytes)?,
            None => meta.legacy_revision.unwrap_or(UNSET_REVISION),
        };

        Ok((meta, config, revision))
    }
}

/// A revision marker holds a single run of ASCII digits, optionally padded
/// with whitespace. Anything else is rejected rather than treated as unset.
pub(crate) fn parse_revision(path: &Path, data: &[u8]) -> Result<i32, CharmError> {
    let text = String::from_utf8_lossy(data);
    let trimmed = text.trim();
    Some(trimmed)
        .filter(|t| !t.is_empty() && t.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|t| t.parse::<i32>().ok())
        .ok_or_else(|| CharmError::InvalidRevision {
            path: path.to_path_buf(),
            content: trimmed.to_owned(),
        })
}

/// Whether a link living in directory `entry_parent` (relative,
/// `/`-separated) and pointing at `target` resolves inside the charm root.
/// Hard links in archives resolve from the root, so callers pass `""`.
pub(crate) fn link_stays_inside(entry_parent: &str, target: &str) -> bool {
    if target.starts_with('/') || target.is_empty() {
        return false;
    }
    let mut stack: Vec<&str> = entry_parent
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if stack.pop().is_none() {
                    return false;
                }
            }
            other => stack.push(other),
        }
    }
    true
}

/// Root-relative path a link resolves to, given the directory it lives in.
/// Only meaningful once [`link_stays_inside`] has accepted the target.
pub(crate) fn resolve_link(entry_parent: &str, target: &str) -> String {
    if entry_parent.is_empty() {
        clean_path(target)
    } else {
        clean_path(&format!("{entry_parent}/{target}"))
    }
}

/// `/`-joined form of `full` relative to `root`.
pub(crate) fn relative_str(root: &Path, full: &Path) -> String {
    full.strip_prefix(root)
        .unwrap_or(full)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
