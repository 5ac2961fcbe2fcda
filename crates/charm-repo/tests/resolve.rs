//! End-to-end resolution: URL text in, charm out, through both repository
//! kinds.

use charm_format::{CharmDir, CharmKind};
use charm_remote::{digest, CatalogClient, CharmInfo, RemoteError};
use charm_repo::{RepoError, Repository, RepositoryKind, Resolver};
use charm_schema::Url;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// In-memory catalog keyed by unrevisioned URL.
struct MemoryCatalog {
    charms: HashMap<String, (i32, Vec<u8>)>,
}

impl CatalogClient for MemoryCatalog {
    fn charm_info(&self, url: &Url) -> Result<CharmInfo, RemoteError> {
        let key = url.unrevisioned().to_string();
        let (revision, data) = self
            .charms
            .get(&key)
            .ok_or_else(|| RemoteError::NotFound(key.clone()))?;
        if url.revision().is_some_and(|r| r != *revision) {
            return Err(RemoteError::NotFound(url.to_string()));
        }
        Ok(CharmInfo {
            revision: *revision,
            digest: digest(data),
        })
    }

    fn fetch_charm(&self, url: &Url) -> Result<Vec<u8>, RemoteError> {
        self.charm_info(url)?;
        Ok(self.charms[&url.unrevisioned().to_string()].1.clone())
    }
}

fn write_charm(dir: &Path, name: &str, revision: i32) {
    fs::create_dir_all(dir.join("hooks")).unwrap();
    fs::write(
        dir.join("metadata.yaml"),
        format!("name: {name}\nsummary: s\ndescription: d\nprovides:\n  website: http\n"),
    )
    .unwrap();
    fs::write(dir.join("revision"), revision.to_string()).unwrap();
    fs::write(dir.join("hooks").join("install"), "#!/bin/sh\n").unwrap();
}

fn bundle_bytes(dir: &Path) -> Vec<u8> {
    let mut out = Vec::new();
    CharmDir::read(dir).unwrap().archive_to(&mut out).unwrap();
    out
}

#[test]
fn local_and_catalog_yield_same_charm() {
    let repo_root = tempfile::tempdir().unwrap();
    let charm_dir = repo_root.path().join("precise").join("wordpress");
    write_charm(&charm_dir, "wordpress", 5);

    let mut charms = HashMap::new();
    charms.insert(
        "cs:precise/wordpress".to_owned(),
        (5, bundle_bytes(&charm_dir)),
    );
    let resolver = Resolver::with_client(Arc::new(MemoryCatalog { charms }));

    let local_url = Url::infer("local:precise/wordpress", None).unwrap();
    let local_repo = resolver.infer(&local_url, repo_root.path()).unwrap();
    assert_eq!(local_repo.kind(), RepositoryKind::Local);
    let local = local_repo.get(&local_url).unwrap();

    let cs_url = Url::infer("wordpress", Some("precise")).unwrap();
    assert_eq!(cs_url.to_string(), "cs:precise/wordpress");
    let catalog_repo = resolver.infer(&cs_url, Path::new("")).unwrap();
    assert!(matches!(catalog_repo, Repository::Catalog(_)));
    let remote = catalog_repo.get(&cs_url).unwrap();

    assert_eq!(local.kind(), CharmKind::Dir);
    assert_eq!(remote.kind(), CharmKind::Bundle);
    assert_eq!(local.meta(), remote.meta());
    assert_eq!(local.config(), remote.config());
    assert_eq!(local.revision(), remote.revision());
    assert_eq!(catalog_repo.latest(&cs_url).unwrap(), 5);
}

#[test]
fn pinned_catalog_revision_must_exist() {
    let src = tempfile::tempdir().unwrap();
    write_charm(src.path(), "mysql", 3);
    let mut charms = HashMap::new();
    charms.insert("cs:precise/mysql".to_owned(), (3, bundle_bytes(src.path())));
    let resolver = Resolver::with_client(Arc::new(MemoryCatalog { charms }));

    let url = Url::parse("cs:precise/mysql-2").unwrap();
    let repo = resolver.infer(&url, Path::new("")).unwrap();
    assert!(matches!(
        repo.get(&url),
        Err(RepoError::CharmNotFound { .. })
    ));
    assert_eq!(repo.latest(&url).unwrap(), 3);
}

#[test]
fn reserved_hook_in_local_repository_is_skipped() {
    let repo_root = tempfile::tempdir().unwrap();
    let good = repo_root.path().join("precise").join("mysql");
    let bad = repo_root.path().join("precise").join("mysql-evil");
    write_charm(&good, "mysql", 1);
    write_charm(&bad, "mysql", 50);
    fs::write(bad.join("hooks").join("juju-run"), "#!/bin/sh\n").unwrap();

    let resolver = Resolver::default();
    let url = Url::parse("local:precise/mysql").unwrap();
    let repo = resolver.infer(&url, repo_root.path()).unwrap();
    assert_eq!(repo.latest(&url).unwrap(), 1);
    assert_eq!(repo.get(&url).unwrap().revision(), 1);
}
