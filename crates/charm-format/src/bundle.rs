use crate::path::validate_path;
use crate::{
    is_logical_file, link_stays_inside, resolve_link, CharmError, LogicalFiles, METADATA_FILE,
};
use charm_schema::{Config, Meta};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Where a bundle's bytes live.
#[derive(Clone)]
pub enum BundleOrigin {
    File(PathBuf),
    /// Bytes received from elsewhere, typically a catalog download.
    Memory { label: String, data: Arc<[u8]> },
}

impl BundleOrigin {
    /// Path used to label errors and log lines.
    pub fn label(&self) -> PathBuf {
        match self {
            BundleOrigin::File(path) => path.clone(),
            BundleOrigin::Memory { label, .. } => PathBuf::from(label),
        }
    }

    fn open(&self) -> Result<Box<dyn Read + '_>, CharmError> {
        match self {
            BundleOrigin::File(path) => {
                let file = File::open(path).map_err(|e| CharmError::io(path, e))?;
                Ok(Box::new(BufReader::new(file)))
            }
            BundleOrigin::Memory { data, .. } => Ok(Box::new(&data[..])),
        }
    }
}

impl fmt::Debug for BundleOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BundleOrigin::File(path) => f.debug_tuple("File").field(path).finish(),
            BundleOrigin::Memory { label, data } => f
                .debug_struct("Memory")
                .field("label", label)
                .field("len", &data.len())
                .finish(),
        }
    }
}

/// A charm read from a single archive file.
#[derive(Debug, Clone)]
pub struct CharmBundle {
    origin: BundleOrigin,
    meta: Meta,
    config: Config,
    revision: i32,
}

impl CharmBundle {
    /// Read and validate the bundle at `path`.
    ///
    /// The archive is scanned once. Every entry name is checked for
    /// absolute paths, parent references, reserved hook names and duplicates.
    /// Link targets must resolve inside the charm and may not name a
    /// directory or a reserved hook. No entry may live below a link, and the
    /// logical files must be regular entries. The file handle is closed
    /// before this returns, whether or not reading succeeded.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, CharmError> {
        Self::load(BundleOrigin::File(path.as_ref().to_path_buf()))
    }

    /// Read a bundle held in memory. `label` names it in errors.
    pub fn from_bytes(
        data: impl Into<Arc<[u8]>>,
        label: impl Into<String>,
    ) -> Result<Self, CharmError> {
        Self::load(BundleOrigin::Memory {
            label: label.into(),
            data: data.into(),
        })
    }

    fn load(origin: BundleOrigin) -> Result<Self, CharmError> {
        let label = origin.label();
        let files = scan(origin.open()?, &label)?;
        let (meta, config, revision) = files.decode(&label)?;
        info!(
            "read charm bundle {} ({} rev {revision})",
            label.display(),
            meta.name
        );
        Ok(Self {
            origin,
            meta,
            config,
            revision,
        })
    }

    /// Filesystem path of the bundle, if it was read from a file.
    pub fn path(&self) -> Option<&Path> {
        match &self.origin {
            BundleOrigin::File(path) => Some(path),
            BundleOrigin::Memory { .. } => None,
        }
    }

    pub fn origin(&self) -> &BundleOrigin {
        &self.origin
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn revision(&self) -> i32 {
        self.revision
    }

    /// Unpack the bundle into `target_dir`, creating it if needed.
    ///
    /// The archive is validated again first so a file swapped on disk after
    /// [`CharmBundle::read`] cannot slip unsafe entries through.
    pub fn expand_to(&self, target_dir: impl AsRef<Path>) -> Result<(), CharmError> {
        let target = target_dir.as_ref();
        let label = self.origin.label();
        scan(self.origin.open()?, &label)?;

        fs::create_dir_all(target).map_err(|e| CharmError::io(target, e))?;
        let mut ar = tar::Archive::new(self.origin.open()?);
        ar.set_preserve_permissions(true);
        ar.set_preserve_mtime(false);
        ar.set_unpack_xattrs(false);
        ar.unpack(target).map_err(|e| CharmError::io(target, e))?;
        info!("expanded {} into {}", label.display(), target.display());
        Ok(())
    }
}

fn format_error(bundle: &Path, reason: impl fmt::Display) -> CharmError {
    CharmError::BundleFormat {
        path: bundle.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn unsafe_entry(bundle: &Path, entry: &str, reason: impl Into<String>) -> CharmError {
    CharmError::UnsafeBundle {
        bundle: bundle.to_path_buf(),
        entry: entry.to_owned(),
        reason: reason.into(),
    }
}

/// Normalize an archive entry name to a `/`-separated relative path.
/// Returns an empty string for the archive root itself.
fn normalize_entry(name: &str) -> Result<String, &'static str> {
    if name.starts_with('/') {
        return Err("absolute path");
    }
    if name.contains('\\') {
        return Err("backslash in path");
    }
    let bytes = name.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return Err("drive-qualified path");
    }
    let mut parts = Vec::new();
    for segment in name.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err("parent directory reference"),
            other => parts.push(other),
        }
    }
    Ok(parts.join("/"))
}

/// Strict ancestors of a `/`-separated relative path, shortest first.
fn ancestors(rel: &str) -> impl Iterator<Item = &str> {
    rel.match_indices('/').map(move |(i, _)| &rel[..i])
}

/// Walk every entry of an archive, validating names and link targets and
/// collecting the logical files.
fn scan<R: Read>(reader: R, bundle: &Path) -> Result<LogicalFiles, CharmError> {
    let mut ar = tar::Archive::new(reader);
    let entries = ar.entries().map_err(|e| format_error(bundle, e))?;

    let mut files = LogicalFiles::default();
    let mut seen = HashSet::new();
    let mut count = 0usize;
    // (relative path, raw entry name) of everything in the archive
    let mut names = Vec::new();
    // "." is the charm root, the target of links like `x -> .`
    let mut dirs: HashSet<String> = HashSet::from([".".to_owned()]);
    // link path -> root-relative target
    let mut links: HashMap<String, String> = HashMap::new();

    for entry in entries {
        let mut entry = entry.map_err(|e| format_error(bundle, e))?;
        let raw = entry.path_bytes().into_owned();
        let name = String::from_utf8(raw).map_err(|e| {
            let lossy = String::from_utf8_lossy(e.as_bytes()).into_owned();
            unsafe_entry(bundle, &lossy, "name is not UTF-8")
        })?;
        let rel = normalize_entry(&name).map_err(|reason| unsafe_entry(bundle, &name, reason))?;
        if rel.is_empty() {
            continue;
        }
        count += 1;
        dirs.extend(ancestors(&rel).map(str::to_owned));
        names.push((rel.clone(), name.clone()));

        let kind = entry.header().entry_type();
        if kind.is_dir() {
            dirs.insert(rel);
            continue;
        }
        validate_path(&rel)?;
        if !seen.insert(rel.clone()) {
            return Err(unsafe_entry(bundle, &name, "duplicate entry"));
        }

        match kind {
            tar::EntryType::Regular | tar::EntryType::Continuous => {
                if let Some(slot) = files.slot(&rel) {
                    let mut data = Vec::new();
                    entry
                        .read_to_end(&mut data)
                        .map_err(|e| format_error(bundle, e))?;
                    *slot = Some(data);
                }
            }
            tar::EntryType::Symlink | tar::EntryType::Link => {
                let target = entry
                    .link_name_bytes()
                    .map(|t| String::from_utf8_lossy(&t).into_owned())
                    .unwrap_or_default();
                let parent = if kind == tar::EntryType::Link {
                    ""
                } else {
                    rel.rsplit_once('/').map_or("", |(p, _)| p)
                };
                if target.contains('\\') || !link_stays_inside(parent, &target) {
                    return Err(unsafe_entry(
                        bundle,
                        &name,
                        format!("link target {target:?} leaves the charm"),
                    ));
                }
                if is_logical_file(&rel) {
                    return Err(unsafe_entry(
                        bundle,
                        &name,
                        format!("{rel} must be a regular file"),
                    ));
                }
                let resolved = resolve_link(parent, &target);
                validate_path(&resolved)?;
                links.insert(rel, resolved);
            }
            other => {
                return Err(unsafe_entry(
                    bundle,
                    &name,
                    format!("unsupported entry type {other:?}"),
                ));
            }
        }
    }

    for (rel, name) in &names {
        if let Some(link) = ancestors(rel).find(|a| links.contains_key(*a)) {
            return Err(unsafe_entry(
                bundle,
                name,
                format!("entry lies below link {link:?}"),
            ));
        }
    }
    for (rel, target) in &links {
        // Follow link chains; a cycle stops after one pass over the links.
        let mut dest = target;
        for _ in 0..links.len() {
            match links.get(dest) {
                Some(next) => dest = next,
                None => break,
            }
        }
        if dirs.contains(dest) {
            let name = names
                .iter()
                .find(|(r, _)| r == rel)
                .map_or(rel.as_str(), |(_, n)| n.as_str());
            return Err(unsafe_entry(
                bundle,
                name,
                format!("link target {target:?} is a directory"),
            ));
        }
    }

    if files.metadata.is_none() {
        return Err(format_error(bundle, format!("missing {METADATA_FILE}")));
    }
    debug!("scanned {count} entries in {}", bundle.display());
    Ok(files)
}
