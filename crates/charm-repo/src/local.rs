use crate::RepoError;
use charm_format::{Charm, CharmError, BUNDLE_EXTENSION};
use charm_schema::Url;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Repository of charms on the local filesystem.
///
/// Layout: `<root>/<series>/<anything>` where each entry is a charm directory
/// or a `.charm` bundle. Entry names carry no meaning; charms are matched by
/// the name in their metadata. URLs without a series are looked up directly
/// under `<root>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRepository {
    root: PathBuf,
}

impl LocalRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The charm named by `url`: the exact revision when the URL pins one,
    /// the highest revision otherwise.
    pub fn get(&self, url: &Url) -> Result<Charm, RepoError> {
        let candidates = self.candidates(url)?;
        let found = match url.revision() {
            Some(rev) => candidates.into_iter().find(|(_, c)| c.revision() == rev),
            None => candidates.into_iter().max_by_key(|(_, c)| c.revision()),
        };
        match found {
            Some((path, charm)) => {
                info!("resolved {url} to {}", path.display());
                Ok(charm)
            }
            None => Err(RepoError::CharmNotFound {
                url: url.to_string(),
            }),
        }
    }

    /// Highest revision of the charm `url` names. Any pinned revision on the
    /// URL is ignored.
    pub fn latest(&self, url: &Url) -> Result<i32, RepoError> {
        self.candidates(url)?
            .iter()
            .map(|(_, c)| c.revision())
            .max()
            .ok_or_else(|| RepoError::CharmNotFound {
                url: url.to_string(),
            })
    }

    fn search_dir(&self, url: &Url) -> PathBuf {
        match url.series() {
            Some(series) => self.root.join(series),
            None => self.root.clone(),
        }
    }

    /// Every readable charm in the search directory whose metadata name
    /// matches `url`, ordered by path so that equal revisions resolve
    /// deterministically (`max_by_key` keeps the last maximum).
    fn candidates(&self, url: &Url) -> Result<Vec<(PathBuf, Charm)>, RepoError> {
        let dir = self.search_dir(url);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no series directory {}", dir.display());
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(CharmError::Io { path: dir, source }.into());
            }
        };

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| CharmError::Io {
                path: dir.clone(),
                source,
            })?;
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            let path = entry.path();
            let is_bundle = path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext == BUNDLE_EXTENSION);
            if path.is_dir() || is_bundle {
                paths.push(path);
            }
        }
        paths.sort();

        let mut found = Vec::new();
        for path in paths {
            match charm_format::read(&path) {
                Ok(charm) if charm.meta().name == url.name() => {
                    debug!("candidate {} revision {}", path.display(), charm.revision());
                    found.push((path, charm));
                }
                Ok(_) => {}
                Err(e) => warn!("skipping unreadable charm {}: {e}", path.display()),
            }
        }
        Ok(found)
    }
}
