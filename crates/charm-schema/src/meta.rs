use crate::url::is_valid_name;
use crate::{DecodeError, Entries};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Hooks every charm may implement regardless of its relations.
pub const LIFECYCLE_HOOKS: &[&str] = &[
    "install",
    "start",
    "config-changed",
    "upgrade-charm",
    "stop",
];

const RELATION_HOOK_SUFFIXES: &[&str] = &["joined", "changed", "departed", "broken"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationRole {
    Provider,
    Requirer,
    Peer,
}

impl RelationRole {
    fn default_limit(self) -> u32 {
        match self {
            RelationRole::Provider => 0,
            RelationRole::Requirer | RelationRole::Peer => 1,
        }
    }
}

impl fmt::Display for RelationRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationRole::Provider => write!(f, "provider"),
            RelationRole::Requirer => write!(f, "requirer"),
            RelationRole::Peer => write!(f, "peer"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationScope {
    #[default]
    Global,
    Container,
}

/// A declared relation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relation {
    pub name: String,
    pub role: RelationRole,
    pub interface: String,
    pub optional: bool,
    /// Maximum number of counterpart services; 0 means unlimited.
    pub limit: u32,
    pub scope: RelationScope,
}

/// Structural metadata decoded from `metadata.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Meta {
    pub name: String,
    pub summary: String,
    pub description: String,
    pub subordinate: bool,
    pub provides: BTreeMap<String, Relation>,
    pub requires: BTreeMap<String, Relation>,
    pub peers: BTreeMap<String, Relation>,
    pub categories: Vec<String>,
    pub format: u32,
    /// Revision carried by older charms inside `metadata.yaml` itself. Only
    /// consulted when the charm has no `revision` file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legacy_revision: Option<i32>,
}

#[derive(Deserialize)]
struct MetaFile {
    name: String,
    summary: String,
    description: String,
    #[serde(default)]
    subordinate: bool,
    #[serde(default)]
    provides: Option<Entries<RelationDecl>>,
    #[serde(default)]
    requires: Option<Entries<RelationDecl>>,
    #[serde(default)]
    peers: Option<Entries<RelationDecl>>,
    #[serde(default)]
    categories: Option<Vec<String>>,
    #[serde(default = "default_format")]
    format: u32,
    #[serde(default)]
    revision: Option<i32>,
}

/// Relations are written either as `name: interface` or as a full mapping.
#[derive(Deserialize)]
#[serde(untagged)]
enum RelationDecl {
    Interface(String),
    Full(RelationFields),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RelationFields {
    interface: String,
    #[serde(default)]
    limit: Option<u32>,
    #[serde(default)]
    optional: bool,
    #[serde(default)]
    scope: RelationScope,
}

fn default_format() -> u32 {
    1
}

impl Meta {
    pub fn from_yaml(input: &str) -> Result<Self, DecodeError> {
        let file: MetaFile = serde_yaml::from_str(input)?;
        Self::build(file)
    }

    pub fn from_slice(input: &[u8]) -> Result<Self, DecodeError> {
        let file: MetaFile = serde_yaml::from_slice(input)?;
        Self::build(file)
    }

    fn build(file: MetaFile) -> Result<Self, DecodeError> {
        if !is_valid_name(&file.name) {
            return Err(DecodeError::InvalidName(file.name));
        }
        if let Some(rev) = file.revision.filter(|r| *r < 0) {
            return Err(DecodeError::NegativeRevision(rev));
        }

        let mut seen = BTreeSet::new();
        let provides = build_relations(file.provides, RelationRole::Provider, &mut seen)?;
        let requires = build_relations(file.requires, RelationRole::Requirer, &mut seen)?;
        let peers = build_relations(file.peers, RelationRole::Peer, &mut seen)?;

        if file.subordinate
            && !requires
                .values()
                .any(|r| r.scope == RelationScope::Container)
        {
            return Err(DecodeError::SubordinateWithoutContainer(file.name));
        }

        Ok(Self {
            name: file.name,
            summary: file.summary,
            description: file.description,
            subordinate: file.subordinate,
            provides,
            requires,
            peers,
            categories: file.categories.unwrap_or_default(),
            format: file.format,
            legacy_revision: file.revision,
        })
    }

    /// All relation endpoints, providers first, then requirers, then peers.
    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.provides
            .values()
            .chain(self.requires.values())
            .chain(self.peers.values())
    }

    /// Names of every hook the charm may implement.
    pub fn hooks(&self) -> BTreeSet<String> {
        let mut hooks: BTreeSet<String> =
            LIFECYCLE_HOOKS.iter().map(|h| (*h).to_owned()).collect();
        for relation in self.relations() {
            for suffix in RELATION_HOOK_SUFFIXES {
                hooks.insert(format!("{}-relation-{suffix}", relation.name));
            }
        }
        hooks
    }
}

fn build_relations(
    decls: Option<Entries<RelationDecl>>,
    role: RelationRole,
    seen: &mut BTreeSet<String>,
) -> Result<BTreeMap<String, Relation>, DecodeError> {
    let mut out = BTreeMap::new();
    for (name, decl) in decls.map(|Entries(e)| e).unwrap_or_default() {
        if name == "juju" || name.starts_with("juju-") {
            return Err(DecodeError::ReservedRelation(name));
        }
        if !seen.insert(name.clone()) {
            return Err(DecodeError::DuplicateRelation(name));
        }
        let relation = match decl {
            RelationDecl::Interface(interface) => Relation {
                name: name.clone(),
                role,
                interface,
                optional: false,
                limit: role.default_limit(),
                scope: RelationScope::Global,
            },
            RelationDecl::Full(fields) => Relation {
                name: name.clone(),
                role,
                interface: fields.interface,
                optional: fields.optional,
                limit: fields.limit.unwrap_or_else(|| role.default_limit()),
                scope: fields.scope,
            },
        };
        if relation.interface.trim().is_empty() {
            return Err(DecodeError::MissingInterface(name));
        }
        out.insert(name, relation);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r"
name: wordpress
summary: Blog engine
description: A pretty popular blog engine.
provides:
  url:
    interface: http
    limit: 3
    optional: false
requires:
  db: mysql
  cache:
    interface: varnish
    optional: true
peers:
  ring: wp-ring
categories:
  - applications
";

    #[test]
    fn parses_full_metadata() {
        let meta = Meta::from_yaml(FULL).expect("should parse");
        assert_eq!(meta.name, "wordpress");
        assert_eq!(meta.summary, "Blog engine");
        assert_eq!(meta.format, 1);
        assert!(!meta.subordinate);
        assert_eq!(meta.categories, vec!["applications"]);

        let url = &meta.provides["url"];
        assert_eq!(url.role, RelationRole::Provider);
        assert_eq!(url.interface, "http");
        assert_eq!(url.limit, 3);

        let db = &meta.requires["db"];
        assert_eq!(db.interface, "mysql");
        assert_eq!(db.limit, 1);
        assert!(!db.optional);
        assert_eq!(db.scope, RelationScope::Global);

        assert!(meta.requires["cache"].optional);
        assert_eq!(meta.peers["ring"].role, RelationRole::Peer);
    }

    #[test]
    fn provider_shorthand_is_unlimited() {
        let meta = Meta::from_yaml(
            "name: a\nsummary: s\ndescription: d\nprovides:\n  web: http\n",
        )
        .unwrap();
        assert_eq!(meta.provides["web"].limit, 0);
    }

    #[test]
    fn parses_minimal_metadata() {
        let meta = Meta::from_yaml("name: mysql\nsummary: db\ndescription: database\n").unwrap();
        assert!(meta.provides.is_empty());
        assert!(meta.requires.is_empty());
        assert!(meta.peers.is_empty());
        assert_eq!(meta.legacy_revision, None);
    }

    #[test]
    fn empty_relation_sections_are_tolerated() {
        let meta =
            Meta::from_yaml("name: mysql\nsummary: s\ndescription: d\nprovides:\nrequires:\n")
                .unwrap();
        assert_eq!(meta.relations().count(), 0);
    }

    #[test]
    fn rejects_missing_name() {
        assert!(matches!(
            Meta::from_yaml("summary: s\ndescription: d\n"),
            Err(DecodeError::Yaml(_))
        ));
    }

    #[test]
    fn rejects_invalid_names() {
        for name in ["\"\"", "../etc", "MySQL", "mysql-5"] {
            let input = format!("name: {name}\nsummary: s\ndescription: d\n");
            assert!(
                matches!(Meta::from_yaml(&input), Err(DecodeError::InvalidName(_))),
                "name {name} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_relation_declared_in_two_directions() {
        let input = "name: a\nsummary: s\ndescription: d\nprovides:\n  db: mysql\nrequires:\n  db: mysql\n";
        assert!(matches!(
            Meta::from_yaml(input),
            Err(DecodeError::DuplicateRelation(ref n)) if n == "db"
        ));
    }

    #[test]
    fn rejects_relation_repeated_in_one_direction() {
        let input = "name: a\nsummary: s\ndescription: d\nprovides:\n  db: mysql\n  db: pgsql\n";
        assert!(matches!(
            Meta::from_yaml(input),
            Err(DecodeError::DuplicateRelation(ref n)) if n == "db"
        ));

        let peers = "name: a\nsummary: s\ndescription: d\npeers:\n  ring: r\n  ring:\n    interface: r\n";
        assert!(matches!(
            Meta::from_yaml(peers),
            Err(DecodeError::DuplicateRelation(ref n)) if n == "ring"
        ));
    }

    #[test]
    fn rejects_reserved_relation_names() {
        for name in ["juju", "juju-info"] {
            let input = format!("name: a\nsummary: s\ndescription: d\nprovides:\n  {name}: foo\n");
            assert!(matches!(
                Meta::from_yaml(&input),
                Err(DecodeError::ReservedRelation(_))
            ));
        }
    }

    #[test]
    fn rejects_empty_interface() {
        let input = "name: a\nsummary: s\ndescription: d\nrequires:\n  db: \"\"\n";
        assert!(matches!(
            Meta::from_yaml(input),
            Err(DecodeError::MissingInterface(_))
        ));
    }

    #[test]
    fn rejects_unknown_relation_fields() {
        let input =
            "name: a\nsummary: s\ndescription: d\nrequires:\n  db:\n    interface: x\n    bogus: 1\n";
        assert!(Meta::from_yaml(input).is_err());
    }

    #[test]
    fn subordinate_needs_container_scope() {
        let bad = "name: logger\nsummary: s\ndescription: d\nsubordinate: true\nrequires:\n  host: juju-info\n";
        assert!(matches!(
            Meta::from_yaml(bad),
            Err(DecodeError::SubordinateWithoutContainer(_))
        ));

        let good = "name: logger\nsummary: s\ndescription: d\nsubordinate: true\nrequires:\n  host:\n    interface: juju-info\n    scope: container\n";
        let meta = Meta::from_yaml(good).unwrap();
        assert!(meta.subordinate);
        assert_eq!(meta.requires["host"].scope, RelationScope::Container);
    }

    #[test]
    fn legacy_revision_is_kept() {
        let meta = Meta::from_yaml("name: a\nsummary: s\ndescription: d\nrevision: 7\n").unwrap();
        assert_eq!(meta.legacy_revision, Some(7));
        assert!(matches!(
            Meta::from_yaml("name: a\nsummary: s\ndescription: d\nrevision: -2\n"),
            Err(DecodeError::NegativeRevision(-2))
        ));
    }

    #[test]
    fn hooks_cover_lifecycle_and_relations() {
        let meta = Meta::from_yaml(FULL).unwrap();
        let hooks = meta.hooks();
        for hook in LIFECYCLE_HOOKS {
            assert!(hooks.contains(*hook));
        }
        assert!(hooks.contains("db-relation-joined"));
        assert!(hooks.contains("ring-relation-broken"));
        assert!(hooks.contains("url-relation-departed"));
        assert_eq!(hooks.len(), LIFECYCLE_HOOKS.len() + 4 * 4);
    }

    #[test]
    fn from_slice_matches_from_yaml() {
        assert_eq!(
            Meta::from_slice(FULL.as_bytes()).unwrap(),
            Meta::from_yaml(FULL).unwrap()
        );
    }
}
