//! Charm URLs of the form `<schema>:[~<user>/][<series>/]<name>[-<revision>]`.
//!
//! Parsing is permissive about the schema token: any well-formed token is
//! accepted here, and only repository resolution decides whether it is one it
//! can serve.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Schema served by the remote charm catalog.
pub const CATALOG_SCHEMA: &str = "cs";
/// Schema served by a local repository tree.
pub const LOCAL_SCHEMA: &str = "local";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("charm URL {url:?} is malformed: {reason}")]
    Malformed { url: String, reason: String },
}

impl UrlError {
    fn malformed(url: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            url: url.to_owned(),
            reason: reason.into(),
        }
    }
}

/// A parsed charm reference. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Url {
    schema: String,
    user: Option<String>,
    series: Option<String>,
    name: String,
    revision: Option<i32>,
}

impl Url {
    pub fn parse(input: &str) -> Result<Self, UrlError> {
        let (schema, rest) = input
            .split_once(':')
            .ok_or_else(|| UrlError::malformed(input, "missing schema"))?;
        if !is_valid_schema(schema) {
            return Err(UrlError::malformed(
                input,
                format!("invalid schema {schema:?}"),
            ));
        }
        if rest.is_empty() {
            return Err(UrlError::malformed(input, "missing name"));
        }

        let mut parts: Vec<&str> = rest.split('/').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(UrlError::malformed(input, "empty path segment"));
        }

        let user = match parts[0].strip_prefix('~') {
            Some(user) => {
                if !is_valid_user(user) {
                    return Err(UrlError::malformed(input, format!("invalid user {user:?}")));
                }
                parts.remove(0);
                Some(user.to_owned())
            }
            None => None,
        };

        let (series, last) = match parts.as_slice() {
            [] => return Err(UrlError::malformed(input, "missing name")),
            [last] => (None, *last),
            [series, last] => {
                if !is_valid_series(series) {
                    return Err(UrlError::malformed(
                        input,
                        format!("invalid series {series:?}"),
                    ));
                }
                (Some((*series).to_owned()), *last)
            }
            _ => return Err(UrlError::malformed(input, "too many path segments")),
        };

        let (name, revision) = split_revision(input, last)?;
        if !is_valid_name(name) {
            return Err(UrlError::malformed(input, format!("invalid name {name:?}")));
        }

        Ok(Self {
            schema: schema.to_owned(),
            user,
            series,
            name: name.to_owned(),
            revision,
        })
    }

    /// Expand shorthand references (`mysql`, `precise/mysql`, `~user/mysql`)
    /// into catalog URLs. Fully qualified URLs are parsed as-is; a missing
    /// series is filled from `default_series` when one is given.
    pub fn infer(src: &str, default_series: Option<&str>) -> Result<Self, UrlError> {
        let mut url = if src.contains(':') {
            Self::parse(src)?
        } else {
            Self::parse(&format!("{CATALOG_SCHEMA}:{src}"))?
        };
        if url.series.is_none() {
            if let Some(series) = default_series {
                if !is_valid_series(series) {
                    return Err(UrlError::malformed(
                        src,
                        format!("invalid default series {series:?}"),
                    ));
                }
                url.series = Some(series.to_owned());
            }
        }
        Ok(url)
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn series(&self) -> Option<&str> {
        self.series.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn revision(&self) -> Option<i32> {
        self.revision
    }

    /// Copy of this URL pinned to `revision`. `None` and negative values
    /// (the unset sentinel) yield the unpinned form.
    #[must_use]
    pub fn with_revision(&self, revision: Option<i32>) -> Self {
        Self {
            revision: revision.filter(|r| *r >= 0),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn unrevisioned(&self) -> Self {
        self.with_revision(None)
    }

    /// Everything after `<schema>:`.
    pub fn path(&self) -> String {
        let mut out = String::new();
        if let Some(user) = &self.user {
            out.push('~');
            out.push_str(user);
            out.push('/');
        }
        if let Some(series) = &self.series {
            out.push_str(series);
            out.push('/');
        }
        out.push_str(&self.name);
        if let Some(rev) = self.revision {
            out.push('-');
            out.push_str(&rev.to_string());
        }
        out
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.schema, self.path())
    }
}

impl FromStr for Url {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Url {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Url {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(de::Error::custom)
    }
}

fn split_revision<'a>(input: &str, last: &'a str) -> Result<(&'a str, Option<i32>), UrlError> {
    if let Some((base, rev)) = last.rsplit_once('-') {
        if !rev.is_empty() && rev.bytes().all(|b| b.is_ascii_digit()) {
            let revision = rev
                .parse::<i32>()
                .map_err(|_| UrlError::malformed(input, format!("revision {rev} out of range")))?;
            return Ok((base, Some(revision)));
        }
    }
    Ok((last, None))
}

fn is_valid_schema(schema: &str) -> bool {
    let mut bytes = schema.bytes();
    matches!(bytes.next(), Some(b) if b.is_ascii_lowercase())
        && bytes.all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

fn is_valid_user(user: &str) -> bool {
    let mut bytes = user.bytes();
    matches!(bytes.next(), Some(b) if b.is_ascii_lowercase() || b.is_ascii_digit())
        && user.len() >= 2
        && bytes.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'.' | b'-'))
}

fn is_valid_series(series: &str) -> bool {
    let mut bytes = series.bytes();
    matches!(bytes.next(), Some(b) if b.is_ascii_lowercase())
        && bytes.all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

/// Charm names are lowercase `-`-separated segments starting with a letter.
/// No segment may be all digits, which keeps a trailing `-<revision>`
/// unambiguous.
pub fn is_valid_name(name: &str) -> bool {
    if !name.bytes().next().is_some_and(|b| b.is_ascii_lowercase()) {
        return false;
    }
    name.split('-').all(|segment| {
        !segment.is_empty()
            && segment
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
            && segment.bytes().any(|b| b.is_ascii_lowercase())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_url() {
        let url = Url::parse("cs:~alice/precise/wordpress-42").unwrap();
        assert_eq!(url.schema(), "cs");
        assert_eq!(url.user(), Some("alice"));
        assert_eq!(url.series(), Some("precise"));
        assert_eq!(url.name(), "wordpress");
        assert_eq!(url.revision(), Some(42));
    }

    #[test]
    fn parses_minimal_url() {
        let url = Url::parse("local:mysql").unwrap();
        assert_eq!(url.schema(), "local");
        assert_eq!(url.user(), None);
        assert_eq!(url.series(), None);
        assert_eq!(url.name(), "mysql");
        assert_eq!(url.revision(), None);
    }

    #[test]
    fn dashed_name_without_revision() {
        let url = Url::parse("cs:trusty/mongo-db-server").unwrap();
        assert_eq!(url.name(), "mongo-db-server");
        assert_eq!(url.revision(), None);
    }

    #[test]
    fn dashed_name_with_revision() {
        let url = Url::parse("cs:trusty/haproxy-lb-7").unwrap();
        assert_eq!(url.name(), "haproxy-lb");
        assert_eq!(url.revision(), Some(7));
    }

    #[test]
    fn unknown_schema_is_accepted_at_parse_time() {
        let url = Url::parse("ftp:precise/mysql").unwrap();
        assert_eq!(url.schema(), "ftp");
    }

    #[test]
    fn round_trip_is_identity() {
        for input in [
            "cs:~alice/precise/wordpress-42",
            "cs:precise/wordpress",
            "local:oneiric/mysql-0",
            "local:mysql",
            "cs:~bob.smith/juju-gui",
            "ftp:x/y-1",
        ] {
            let url = Url::parse(input).unwrap();
            assert_eq!(url.to_string(), input);
            assert_eq!(Url::parse(&url.to_string()).unwrap(), url);
        }
    }

    #[test]
    fn leading_zero_revision_normalizes() {
        let url = Url::parse("cs:precise/mysql-007").unwrap();
        assert_eq!(url.to_string(), "cs:precise/mysql-7");
        assert_eq!(Url::parse(&url.to_string()).unwrap(), url);
    }

    #[test]
    fn rejects_malformed_urls() {
        for input in [
            "",
            "precise/mysql",
            ":mysql",
            "cs:",
            "cs:precise/",
            "cs:/mysql",
            "cs:~a/precise/mysql",
            "cs:~/mysql",
            "cs:a/b/c",
            "cs:Precise/mysql",
            "cs:precise/MySQL",
            "cs:precise/1mysql",
            "cs:precise/mysql-1-2x",
            "cs:precise/mysql-",
            "CS:mysql",
            "cs:precise/mysql-99999999999",
        ] {
            let err = Url::parse(input).unwrap_err();
            assert!(
                matches!(err, UrlError::Malformed { ref url, .. } if url == input),
                "expected Malformed for {input:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn error_carries_input() {
        let err = Url::parse("cs:a/b/c").unwrap_err();
        assert!(err.to_string().contains("cs:a/b/c"));
    }

    #[test]
    fn with_revision_and_unrevisioned() {
        let url = Url::parse("cs:precise/mysql").unwrap();
        let pinned = url.with_revision(Some(3));
        assert_eq!(pinned.to_string(), "cs:precise/mysql-3");
        assert_eq!(pinned.unrevisioned(), url);
        assert_eq!(url.with_revision(Some(-1)), url);
    }

    #[test]
    fn path_omits_schema() {
        let url = Url::parse("cs:~alice/precise/wordpress-42").unwrap();
        assert_eq!(url.path(), "~alice/precise/wordpress-42");
    }

    #[test]
    fn infer_fills_schema_and_series() {
        let url = Url::infer("mysql", Some("precise")).unwrap();
        assert_eq!(url.to_string(), "cs:precise/mysql");

        let url = Url::infer("~alice/wordpress-3", Some("trusty")).unwrap();
        assert_eq!(url.to_string(), "cs:~alice/trusty/wordpress-3");

        let url = Url::infer("oneiric/mysql", Some("precise")).unwrap();
        assert_eq!(url.series(), Some("oneiric"));
    }

    #[test]
    fn infer_passes_qualified_urls_through() {
        let url = Url::infer("local:mysql", None).unwrap();
        assert_eq!(url.to_string(), "local:mysql");
    }

    #[test]
    fn infer_rejects_bad_default_series() {
        assert!(Url::infer("mysql", Some("Bad")).is_err());
    }

    #[test]
    fn serde_uses_canonical_string() {
        let url = Url::parse("cs:precise/mysql-1").unwrap();
        let json = serde_json::to_string(&url).unwrap();
        assert_eq!(json, "\"cs:precise/mysql-1\"");
        let back: Url = serde_json::from_str(&json).unwrap();
        assert_eq!(back, url);
        assert!(serde_json::from_str::<Url>("\"nope\"").is_err());
    }

    #[test]
    fn name_validation() {
        assert!(is_valid_name("wordpress"));
        assert!(is_valid_name("a1-b2c"));
        assert!(!is_valid_name("wordpress-"));
        assert!(!is_valid_name("word--press"));
        assert!(!is_valid_name("mysql-5"));
        assert!(!is_valid_name("../etc"));
        assert!(!is_valid_name(""));
    }
}
