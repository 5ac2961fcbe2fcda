use crate::RemoteError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Public catalog used when nothing else is configured.
pub const DEFAULT_CATALOG_URL: &str = "https://store.juju.ubuntu.com";

/// Environment variable overriding the catalog endpoint.
pub const CATALOG_URL_ENV: &str = "CHARM_CATALOG_URL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub url: String,
    #[serde(default)]
    pub auth_token: Option<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CATALOG_URL)
    }
}

impl CatalogConfig {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_owned(),
            auth_token: None,
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: &str) -> Self {
        self.auth_token = Some(token.to_owned());
        self
    }

    /// Resolve the effective config: `~/.config/charm/catalog.json` when it
    /// exists, otherwise the public catalog. `CHARM_CATALOG_URL` replaces the
    /// endpoint either way and keeps any configured token.
    pub fn load_default() -> Result<Self, RemoteError> {
        let mut config = match default_config_path() {
            Ok(path) if path.exists() => Self::load(&path)?,
            _ => Self::default(),
        };
        if let Ok(url) = std::env::var(CATALOG_URL_ENV) {
            if !url.trim().is_empty() {
                config.url = url.trim().trim_end_matches('/').to_owned();
            }
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, RemoteError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| RemoteError::Config(format!("invalid catalog config: {e}")))?;
        Ok(Self {
            url: config.url.trim_end_matches('/').to_owned(),
            ..config
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), RemoteError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| RemoteError::Serialization(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

pub fn default_config_path() -> Result<PathBuf, RemoteError> {
    let home = std::env::var("HOME").map_err(|_| RemoteError::Config("HOME not set".to_owned()))?;
    Ok(PathBuf::from(home).join(".config/charm/catalog.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("catalog.json");

        let config = CatalogConfig::new("https://charms.example.com/v1").with_token("secret123");
        config.save(&path).unwrap();

        let loaded = CatalogConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.auth_token.as_deref(), Some("secret123"));
    }

    #[test]
    fn config_strips_trailing_slash() {
        let config = CatalogConfig::new("https://example.com/");
        assert_eq!(config.url, "https://example.com");
    }

    #[test]
    fn loaded_url_is_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, r#"{"url": "http://localhost:8080//"}"#).unwrap();
        let loaded = CatalogConfig::load(&path).unwrap();
        assert_eq!(loaded.url, "http://localhost:8080");
        assert!(loaded.auth_token.is_none());
    }

    #[test]
    fn invalid_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            CatalogConfig::load(&path),
            Err(RemoteError::Config(_))
        ));
    }

    #[test]
    fn default_points_at_public_catalog() {
        assert_eq!(CatalogConfig::default().url, DEFAULT_CATALOG_URL);
    }
}
