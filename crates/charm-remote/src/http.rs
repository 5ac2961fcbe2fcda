use crate::{digest, CatalogClient, CatalogConfig, CharmInfo, RemoteError};
use charm_schema::Url;
use std::io::Read;

/// HTTP catalog client.
///
/// Expects a simple REST API:
/// - `GET /charm-info/<path>` returns JSON `{"revision": N, "digest": "<hex blake3>"}`
/// - `GET /charm/<path>` returns the bundle bytes
///
/// `<path>` is the URL without its schema, e.g. `~joe/precise/mysql-3`.
pub struct HttpCatalog {
    config: CatalogConfig,
    agent: ureq::Agent,
}

impl HttpCatalog {
    pub fn new(config: CatalogConfig) -> Self {
        let agent = ureq::Agent::new_with_defaults();
        Self { config, agent }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    fn endpoint(&self, route: &str, url: &Url) -> String {
        format!("{}/{route}/{}", self.config.url, url.path())
    }

    fn do_get(&self, endpoint: &str) -> Result<Vec<u8>, RemoteError> {
        let mut req = self
            .agent
            .get(endpoint)
            .header("X-Charm-Protocol", &crate::PROTOCOL_VERSION.to_string());
        if let Some(ref token) = self.config.auth_token {
            req = req.header("Authorization", &format!("Bearer {token}"));
        }
        let resp = match req.call() {
            Ok(r) => r,
            Err(ureq::Error::StatusCode(404)) => {
                return Err(RemoteError::NotFound(endpoint.to_owned()));
            }
            Err(ureq::Error::StatusCode(code)) => {
                return Err(RemoteError::Http(format!("HTTP {code} for {endpoint}")));
            }
            Err(e) => {
                return Err(RemoteError::Http(e.to_string()));
            }
        };

        let code = resp.status().as_u16();
        if code == 404 {
            return Err(RemoteError::NotFound(endpoint.to_owned()));
        }
        if code >= 400 {
            return Err(RemoteError::Http(format!("HTTP {code} for {endpoint}")));
        }

        let mut reader = resp.into_body().into_reader();
        let mut body = Vec::new();
        reader
            .read_to_end(&mut body)
            .map_err(|e| RemoteError::Http(e.to_string()))?;
        Ok(body)
    }
}

impl CatalogClient for HttpCatalog {
    fn charm_info(&self, url: &Url) -> Result<CharmInfo, RemoteError> {
        let endpoint = self.endpoint("charm-info", url);
        tracing::debug!("GET {endpoint}");
        let body = self.do_get(&endpoint)?;
        serde_json::from_slice(&body).map_err(|e| RemoteError::Serialization(e.to_string()))
    }

    /// Fetches the revision the catalog reports for `url` and checks the
    /// downloaded bytes against the advertised digest.
    fn fetch_charm(&self, url: &Url) -> Result<Vec<u8>, RemoteError> {
        let info = self.charm_info(url)?;
        let pinned = url.with_revision(Some(info.revision));
        let endpoint = self.endpoint("charm", &pinned);
        tracing::debug!("GET {endpoint}");
        let data = self.do_get(&endpoint)?;

        let actual = digest(&data);
        if !actual.eq_ignore_ascii_case(&info.digest) {
            return Err(RemoteError::IntegrityFailure {
                key: pinned.to_string(),
                expected: info.digest,
                actual,
            });
        }
        tracing::debug!("fetched {pinned} ({} bytes)", data.len());
        Ok(data)
    }
}
