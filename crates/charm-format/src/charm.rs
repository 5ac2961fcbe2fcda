use crate::{CharmBundle, CharmDir, CharmError};
use charm_schema::{Config, Meta};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Storage encoding of a charm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CharmKind {
    Dir,
    Bundle,
}

impl std::fmt::Display for CharmKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CharmKind::Dir => write!(f, "dir"),
            CharmKind::Bundle => write!(f, "bundle"),
        }
    }
}

/// A charm in either encoding. Both expose the same logical content.
#[derive(Debug, Clone)]
pub enum Charm {
    Dir(CharmDir),
    Bundle(CharmBundle),
}

impl Charm {
    pub fn meta(&self) -> &Meta {
        match self {
            Charm::Dir(d) => d.meta(),
            Charm::Bundle(b) => b.meta(),
        }
    }

    pub fn config(&self) -> &Config {
        match self {
            Charm::Dir(d) => d.config(),
            Charm::Bundle(b) => b.config(),
        }
    }

    pub fn revision(&self) -> i32 {
        match self {
            Charm::Dir(d) => d.revision(),
            Charm::Bundle(b) => b.revision(),
        }
    }

    pub fn kind(&self) -> CharmKind {
        match self {
            Charm::Dir(_) => CharmKind::Dir,
            Charm::Bundle(_) => CharmKind::Bundle,
        }
    }
}

impl From<CharmDir> for Charm {
    fn from(d: CharmDir) -> Self {
        Charm::Dir(d)
    }
}

impl From<CharmBundle> for Charm {
    fn from(b: CharmBundle) -> Self {
        Charm::Bundle(b)
    }
}

/// Read the charm at `path`, whichever encoding it uses.
///
/// The path is inspected exactly once: a directory is read as an extracted
/// charm, anything else as a bundle. A failed inspection is returned as-is.
pub fn read(path: impl AsRef<Path>) -> Result<Charm, CharmError> {
    let path = path.as_ref();
    let stat = fs::metadata(path).map_err(|e| CharmError::io(path, e))?;
    if stat.is_dir() {
        CharmDir::read(path).map(Charm::Dir)
    } else {
        CharmBundle::read(path).map(Charm::Bundle)
    }
}
