//! Charm URLs, metadata and configuration declarations.
//!
//! This crate defines the passive model layer: `Url` parsing and canonical
//! formatting, `Meta` decoded from `metadata.yaml`, and `Config` decoded from
//! `config.yaml`. Every model validates its invariants on construction and is
//! immutable afterwards.

pub mod config;
pub mod meta;
pub mod url;

pub use config::{Config, ConfigOption, OptionType, OptionValue};
pub use meta::{Meta, Relation, RelationRole, RelationScope};
pub use url::{is_valid_name, Url, UrlError, CATALOG_SCHEMA, LOCAL_SCHEMA};

use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use std::fmt;
use std::marker::PhantomData;
use thiserror::Error;

/// Malformed metadata or configuration content.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid charm name {0:?}")]
    InvalidName(String),
    #[error("relation {0:?} is declared more than once")]
    DuplicateRelation(String),
    #[error("relation name {0:?} is reserved")]
    ReservedRelation(String),
    #[error("relation {0:?} declares no interface")]
    MissingInterface(String),
    #[error("subordinate charm {0:?} has no container-scoped requirer relation")]
    SubordinateWithoutContainer(String),
    #[error("revision must be non-negative, got {0}")]
    NegativeRevision(i32),
    #[error("option {option:?} has unknown type {kind:?}")]
    UnknownOptionType { option: String, kind: String },
    #[error("option {option:?}: {value:?} is not a valid {kind}")]
    InvalidValue {
        option: String,
        kind: OptionType,
        value: String,
    },
    #[error("unknown option {0:?}")]
    UnknownOption(String),
    #[error("option {0:?} is declared more than once")]
    DuplicateOption(String),
}

/// Mapping entries in document order. Repeated keys are kept so the caller
/// can reject them instead of letting the last one win.
pub(crate) struct Entries<V>(pub Vec<(String, V)>);

impl<'de, V: Deserialize<'de>> Deserialize<'de> for Entries<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for EntriesVisitor<V> {
            type Value = Entries<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, V>()? {
                    entries.push(entry);
                }
                Ok(Entries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor(PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_display_duplicate_relation() {
        let e = DecodeError::DuplicateRelation("db".to_owned());
        assert!(e.to_string().contains("\"db\""));
    }

    #[test]
    fn entries_keep_repeated_keys() {
        let Entries(entries) = serde_yaml::from_str::<Entries<u32>>("a: 1\nb: 2\na: 3\n").unwrap();
        assert_eq!(
            entries,
            vec![("a".to_owned(), 1), ("b".to_owned(), 2), ("a".to_owned(), 3)]
        );
    }

    #[test]
    fn decode_error_display_invalid_value() {
        let e = DecodeError::InvalidValue {
            option: "port".to_owned(),
            kind: OptionType::Int,
            value: "eighty".to_owned(),
        };
        let msg = e.to_string();
        assert!(msg.contains("port"));
        assert!(msg.contains("eighty"));
        assert!(msg.contains("int"));
    }
}
