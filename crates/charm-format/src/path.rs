use crate::CharmError;

/// Hook names under this prefix are generated by the agent at runtime and may
/// not be shipped inside a charm.
pub const RESERVED_HOOK_PREFIX: &str = "hooks/juju-";

/// Lexically clean a `/`-separated relative path: drop empty and `.`
/// segments and fold `..` into its parent where one exists. Leading `..`
/// segments that cannot be folded are kept.
pub fn clean_path(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if rooted => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_owned(),
        (false, false) => joined,
    }
}

/// Reject paths that would shadow agent-generated hooks.
pub fn validate_path(path: &str) -> Result<(), CharmError> {
    if clean_path(path).starts_with(RESERVED_HOOK_PREFIX) {
        return Err(CharmError::ReservedPath {
            path: path.to_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_collapses_segments() {
        assert_eq!(clean_path("hooks/./start"), "hooks/start");
        assert_eq!(clean_path("hooks//start"), "hooks/start");
        assert_eq!(clean_path("a/b/../c"), "a/c");
        assert_eq!(clean_path("a/.."), ".");
        assert_eq!(clean_path(""), ".");
        assert_eq!(clean_path("../a"), "../a");
        assert_eq!(clean_path("../../a/.."), "../..");
        assert_eq!(clean_path("/../a"), "/a");
        assert_eq!(clean_path("./hooks/"), "hooks");
    }

    #[test]
    fn reserved_hooks_are_rejected() {
        for path in [
            "hooks/juju-run",
            "hooks/juju-",
            "./hooks/juju-run",
            "hooks/../hooks/juju-run",
            "hooks//juju-x/nested",
            "x/../hooks/juju-foo",
        ] {
            let err = validate_path(path).unwrap_err();
            assert!(
                matches!(err, CharmError::ReservedPath { path: ref p } if p == path),
                "{path} should be reserved"
            );
        }
    }

    #[test]
    fn ordinary_paths_pass() {
        for path in [
            "hooks/start",
            "hooks/install",
            "hooks/juju",
            "juju-run",
            "hook/juju-run",
            "metadata.yaml",
            "files/hooks/juju-run",
        ] {
            assert!(validate_path(path).is_ok(), "{path} should be allowed");
        }
    }

    #[test]
    fn error_names_offending_path() {
        let err = validate_path("hooks/./juju-run").unwrap_err();
        assert!(err.to_string().contains("hooks/./juju-run"));
    }
}
