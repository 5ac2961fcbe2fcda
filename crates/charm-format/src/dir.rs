use crate::path::validate_path;
use crate::{
    is_logical_file, link_stays_inside, relative_str, resolve_link, CharmError, LogicalFiles,
    CONFIG_FILE, METADATA_FILE, REVISION_FILE,
};
use charm_schema::{Config, Meta};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// A charm read from an extracted directory tree.
#[derive(Debug, Clone, PartialEq)]
pub struct CharmDir {
    path: PathBuf,
    meta: Meta,
    config: Config,
    revision: i32,
}

impl CharmDir {
    /// Read and validate the charm rooted at `path`.
    ///
    /// Every file under the root is checked with [`validate_path`] before the
    /// logical files are decoded. Symlinks must stay inside the charm and may
    /// not point at a directory, a reserved path or stand in for a logical
    /// file. Nothing is written.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, CharmError> {
        let root = path.as_ref();
        let stat = fs::metadata(root).map_err(|e| CharmError::io(root, e))?;
        if !stat.is_dir() {
            return Err(CharmError::io(
                root,
                io::Error::other("charm path is not a directory"),
            ));
        }

        let checked = validate_tree(root, root)?;
        debug!("validated {checked} entries under {}", root.display());

        let meta_path = root.join(METADATA_FILE);
        let files = LogicalFiles {
            metadata: Some(fs::read(&meta_path).map_err(|e| CharmError::io(&meta_path, e))?),
            config: read_optional(&root.join(CONFIG_FILE))?,
            revision: read_optional(&root.join(REVISION_FILE))?,
        };
        let (meta, config, revision) = files.decode(root)?;

        info!(
            "read charm directory {} ({} rev {revision})",
            root.display(),
            meta.name
        );
        Ok(Self {
            path: root.to_path_buf(),
            meta,
            config,
            revision,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
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

    /// Write the charm as a bundle to `out`.
    ///
    /// Determinism guarantees:
    /// - Entries sorted lexicographically by relative path
    /// - All timestamps set to 0 (Unix epoch)
    /// - All ownership set to 0:0
    /// - Hidden entries (leading `.`) are left out
    ///
    /// Symlinks are stored as links and are held to the same rules as
    /// [`CharmDir::read`].
    pub fn archive_to<W: Write>(&self, out: W) -> Result<(), CharmError> {
        let root = self.path.as_path();
        let mut entries = collect_entries(root, root)?;
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut ar = tar::Builder::new(out);
        ar.follow_symlinks(false);

        for (rel_path, full_path) in &entries {
            let meta = full_path
                .symlink_metadata()
                .map_err(|e| CharmError::io(full_path, e))?;
            let ft = meta.file_type();
            if !ft.is_dir() {
                validate_path(rel_path)?;
            }
            if ft.is_file() {
                append_file(&mut ar, rel_path, full_path, &meta)?;
            } else if ft.is_dir() {
                append_dir(&mut ar, rel_path, full_path, &meta)?;
            } else if ft.is_symlink() {
                append_symlink(&mut ar, root, rel_path, full_path, &meta)?;
            } else {
                debug!("skipping unsupported file type: {rel_path}");
            }
        }

        ar.into_inner()
            .and_then(|mut w| w.flush())
            .map_err(|e| CharmError::io(root, e))?;
        Ok(())
    }

    /// Atomically write the charm as a bundle file at `dest`.
    pub fn bundle_to(&self, dest: impl AsRef<Path>) -> Result<(), CharmError> {
        let dest = dest.as_ref();
        let dir = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| CharmError::io(&dir, e))?;
        self.archive_to(&mut tmp)?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| CharmError::io(dest, e))?;
        tmp.persist(dest).map_err(|e| CharmError::io(dest, e.error))?;
        info!("bundled {} into {}", self.path.display(), dest.display());
        Ok(())
    }
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, CharmError> {
    match fs::read(path) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CharmError::io(path, e)),
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// Check every non-directory entry below `current`. Directory recursion
/// never follows symlinks.
fn validate_tree(root: &Path, current: &Path) -> Result<usize, CharmError> {
    let mut checked = 0;
    for entry in fs::read_dir(current).map_err(|e| CharmError::io(current, e))? {
        let entry = entry.map_err(|e| CharmError::io(current, e))?;
        if is_hidden(&entry.file_name()) {
            continue;
        }
        let full = entry.path();
        let ft = entry.file_type().map_err(|e| CharmError::io(&full, e))?;
        if ft.is_dir() {
            checked += validate_tree(root, &full)?;
        } else {
            let rel = relative_str(root, &full);
            validate_path(&rel)?;
            if ft.is_symlink() {
                check_symlink(root, &rel, &full)?;
            }
            checked += 1;
        }
    }
    Ok(checked)
}

/// Validate the symlink at `full` and return its raw target.
fn check_symlink(root: &Path, rel: &str, full: &Path) -> Result<PathBuf, CharmError> {
    let unsafe_link = |reason: String| CharmError::UnsafeLink {
        root: root.to_path_buf(),
        entry: rel.to_owned(),
        reason,
    };
    let target = fs::read_link(full).map_err(|e| CharmError::io(full, e))?;
    let target_str = target.to_string_lossy().replace('\\', "/");
    let parent = rel.rsplit_once('/').map_or("", |(p, _)| p);
    if !link_stays_inside(parent, &target_str) {
        return Err(unsafe_link(format!(
            "symlink target {target_str:?} leaves the charm"
        )));
    }
    if is_logical_file(rel) {
        return Err(unsafe_link(format!("{rel} must be a regular file")));
    }
    if fs::metadata(full).is_ok_and(|m| m.is_dir()) {
        return Err(unsafe_link(format!(
            "symlink target {target_str:?} is a directory"
        )));
    }
    validate_path(&resolve_link(parent, &target_str))?;
    Ok(target)
}

/// Recursively collect (relative_path, full_path) pairs, skipping hidden entries.
fn collect_entries(root: &Path, current: &Path) -> Result<Vec<(String, PathBuf)>, CharmError> {
    let mut result = Vec::new();
    for entry in fs::read_dir(current).map_err(|e| CharmError::io(current, e))? {
        let entry = entry.map_err(|e| CharmError::io(current, e))?;
        if is_hidden(&entry.file_name()) {
            continue;
        }
        let full = entry.path();
        let rel = relative_str(root, &full);
        let ft = entry.file_type().map_err(|e| CharmError::io(&full, e))?;
        if ft.is_dir() {
            result.push((rel, full.clone()));
            result.extend(collect_entries(root, &full)?);
        } else {
            result.push((rel, full));
        }
    }
    Ok(result)
}

#[cfg(unix)]
fn mode_of(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode()
}

#[cfg(not(unix))]
fn mode_of(meta: &fs::Metadata) -> u32 {
    if meta.is_dir() {
        0o755
    } else {
        0o644
    }
}

fn make_header(meta: &fs::Metadata, entry_type: tar::EntryType) -> tar::Header {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(entry_type);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mode(mode_of(meta));
    header
}

fn append_file<W: Write>(
    ar: &mut tar::Builder<W>,
    rel_path: &str,
    full_path: &Path,
    meta: &fs::Metadata,
) -> Result<(), CharmError> {
    let data = fs::read(full_path).map_err(|e| CharmError::io(full_path, e))?;
    let mut header = make_header(meta, tar::EntryType::Regular);
    header.set_size(data.len() as u64);
    header.set_cksum();
    ar.append_data(&mut header, rel_path, data.as_slice())
        .map_err(|e| CharmError::io(full_path, e))
}

fn append_dir<W: Write>(
    ar: &mut tar::Builder<W>,
    rel_path: &str,
    full_path: &Path,
    meta: &fs::Metadata,
) -> Result<(), CharmError> {
    let mut header = make_header(meta, tar::EntryType::Directory);
    header.set_size(0);
    header.set_cksum();
    let path = format!("{rel_path}/");
    ar.append_data(&mut header, &path, &[] as &[u8])
        .map_err(|e| CharmError::io(full_path, e))
}

fn append_symlink<W: Write>(
    ar: &mut tar::Builder<W>,
    root: &Path,
    rel_path: &str,
    full_path: &Path,
    meta: &fs::Metadata,
) -> Result<(), CharmError> {
    let target = check_symlink(root, rel_path, full_path)?;
    let mut header = make_header(meta, tar::EntryType::Symlink);
    header.set_size(0);
    header.set_cksum();
    ar.append_link(&mut header, rel_path, &target)
        .map_err(|e| CharmError::io(full_path, e))
}
