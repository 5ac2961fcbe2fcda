use crate::{DecodeError, Entries};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    #[default]
    String,
    Int,
    Boolean,
    Float,
}

impl OptionType {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "string" => Some(Self::String),
            "int" => Some(Self::Int),
            "boolean" => Some(Self::Boolean),
            "float" => Some(Self::Float),
            _ => None,
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionType::String => write!(f, "string"),
            OptionType::Int => write!(f, "int"),
            OptionType::Boolean => write!(f, "boolean"),
            OptionType::Float => write!(f, "float"),
        }
    }
}

/// A typed option value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OptionValue {
    String(String),
    Int(i64),
    Boolean(bool),
    Float(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigOption {
    #[serde(rename = "type")]
    pub kind: OptionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<OptionValue>,
    pub description: String,
}

/// Configuration options declared in `config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Config {
    pub options: BTreeMap<String, ConfigOption>,
}

#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default)]
    options: Option<Entries<OptionDecl>>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct OptionDecl {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    default: Value,
    #[serde(default)]
    description: Option<String>,
}

impl Config {
    /// A config declaring no options, used when a charm ships no `config.yaml`.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_yaml(input: &str) -> Result<Self, DecodeError> {
        if input.trim().is_empty() {
            return Ok(Self::empty());
        }
        let file: ConfigFile = serde_yaml::from_str(input)?;
        Self::build(file)
    }

    pub fn from_slice(input: &[u8]) -> Result<Self, DecodeError> {
        if input.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::empty());
        }
        let file: ConfigFile = serde_yaml::from_slice(input)?;
        Self::build(file)
    }

    fn build(file: ConfigFile) -> Result<Self, DecodeError> {
        let mut options = BTreeMap::new();
        for (name, decl) in file.options.map(|Entries(e)| e).unwrap_or_default() {
            if options.contains_key(&name) {
                return Err(DecodeError::DuplicateOption(name));
            }
            let kind = match decl.kind.as_deref() {
                None => OptionType::String,
                Some(tag) => {
                    OptionType::from_tag(tag).ok_or_else(|| DecodeError::UnknownOptionType {
                        option: name.clone(),
                        kind: tag.to_owned(),
                    })?
                }
            };
            let default = typed_default(&name, kind, decl.default)?;
            options.insert(
                name,
                ConfigOption {
                    kind,
                    default,
                    description: decl.description.unwrap_or_default(),
                },
            );
        }
        Ok(Self { options })
    }

    pub fn option(&self, name: &str) -> Option<&ConfigOption> {
        self.options.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Defaults of every option that declares one.
    pub fn default_settings(&self) -> BTreeMap<String, OptionValue> {
        self.options
            .iter()
            .filter_map(|(name, opt)| opt.default.clone().map(|d| (name.clone(), d)))
            .collect()
    }

    /// Convert a raw command-line style value into the option's typed value.
    pub fn parse_setting(&self, name: &str, raw: &str) -> Result<OptionValue, DecodeError> {
        let option = self
            .option(name)
            .ok_or_else(|| DecodeError::UnknownOption(name.to_owned()))?;
        let invalid = || DecodeError::InvalidValue {
            option: name.to_owned(),
            kind: option.kind,
            value: raw.to_owned(),
        };
        match option.kind {
            OptionType::String => Ok(OptionValue::String(raw.to_owned())),
            OptionType::Int => raw
                .trim()
                .parse()
                .map(OptionValue::Int)
                .map_err(|_| invalid()),
            OptionType::Float => raw
                .trim()
                .parse()
                .map(OptionValue::Float)
                .map_err(|_| invalid()),
            OptionType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(OptionValue::Boolean(true)),
                "false" | "0" => Ok(OptionValue::Boolean(false)),
                _ => Err(invalid()),
            },
        }
    }
}

fn typed_default(
    name: &str,
    kind: OptionType,
    value: Value,
) -> Result<Option<OptionValue>, DecodeError> {
    let typed = match (kind, &value) {
        (_, Value::Null) => return Ok(None),
        (OptionType::String, Value::String(s)) => Some(OptionValue::String(s.clone())),
        (OptionType::Boolean, Value::Bool(b)) => Some(OptionValue::Boolean(*b)),
        (OptionType::Int, Value::Number(n)) => n.as_i64().map(OptionValue::Int),
        (OptionType::Float, Value::Number(n)) => n.as_f64().map(OptionValue::Float),
        _ => None,
    };
    typed.map(Some).ok_or_else(|| DecodeError::InvalidValue {
        option: name.to_owned(),
        kind,
        value: serde_yaml::to_string(&value)
            .map(|s| s.trim_end().to_owned())
            .unwrap_or_default(),
    })
}
