//! Concurrent bundle reads must not leak file handles, on success or failure.

#![cfg(target_os = "linux")]

use charm_format::{CharmBundle, CharmError};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;

fn open_fds() -> usize {
    fs::read_dir("/proc/self/fd").unwrap().count()
}

fn write_bundle(path: &Path, metadata: &[u8]) {
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(metadata.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, "metadata.yaml", metadata)
        .unwrap();
    fs::write(path, builder.into_inner().unwrap()).unwrap();
}

#[test]
fn concurrent_reads_release_handles() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.charm");
    let bad = dir.path().join("bad.charm");
    write_bundle(&good, b"name: good\nsummary: s\ndescription: d\n");
    write_bundle(&bad, b"name: [broken\n");
    let good = Arc::new(good);
    let bad = Arc::new(bad);

    // Warm up anything lazily opened by the test harness before counting.
    CharmBundle::read(good.as_path()).unwrap();
    let before = open_fds();

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let good = Arc::clone(&good);
            let bad = Arc::clone(&bad);
            thread::spawn(move || {
                for _ in 0..25 {
                    if i % 2 == 0 {
                        let bundle = CharmBundle::read(good.as_path()).unwrap();
                        assert_eq!(bundle.meta().name, "good");
                    } else {
                        let err = CharmBundle::read(bad.as_path()).unwrap_err();
                        assert!(matches!(err, CharmError::Decode { .. }));
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(open_fds(), before, "file handles leaked");
}
