//! Validated gateway endpoint and the URLs derived from it.

use linkhub_core::Collection;
use reqwest::Url;
use std::fmt;

use crate::error::{RemoteSyncError, Result};

/// Absolute http(s) URL of the sync gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint(Url);

impl Endpoint {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(RemoteSyncError::config("no sync endpoint configured"));
        }
        let url = Url::parse(raw)
            .map_err(|e| RemoteSyncError::config(format!("invalid endpoint '{}': {}", raw, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RemoteSyncError::config(format!(
                "endpoint must use http or https, got '{}'",
                url.scheme()
            )));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(RemoteSyncError::config(format!(
                "endpoint '{}' has no host",
                raw
            )));
        }
        Ok(Self(url))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Target of the aggregate push and of the diagnostics GET.
    pub fn base_url(&self) -> Url {
        self.0.clone()
    }

    /// `<endpoint>?op=load`, preserving any existing query.
    pub fn combined_url(&self) -> Url {
        let mut url = self.0.clone();
        url.query_pairs_mut().append_pair("op", "load");
        url
    }

    /// `<endpoint>/data/<file>` for one collection.
    pub fn resource_url(&self, collection: Collection) -> Url {
        let mut url = self.0.clone();
        let base = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{}/{}", base, collection.resource_path()));
        url.set_query(None);
        url.set_fragment(None);
        url
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_endpoints() {
        for raw in ["", "   ", "gateway.local", "ftp://example.org/sync", "file:///tmp/x"] {
            let err = Endpoint::parse(raw).unwrap_err();
            assert!(matches!(err, RemoteSyncError::Config(_)), "{raw}: {err}");
        }
    }

    #[test]
    fn derives_combined_and_resource_urls() {
        let endpoint = Endpoint::parse(" https://sync.example.dev/api/linkhub/?v=2 ").unwrap();
        assert_eq!(
            endpoint.combined_url().as_str(),
            "https://sync.example.dev/api/linkhub/?v=2&op=load"
        );
        assert_eq!(
            endpoint.resource_url(Collection::OpenPoints).as_str(),
            "https://sync.example.dev/api/linkhub/data/open-points.json"
        );

        let root = Endpoint::parse("http://127.0.0.1:8787").unwrap();
        assert_eq!(root.combined_url().as_str(), "http://127.0.0.1:8787/?op=load");
        assert_eq!(
            root.resource_url(Collection::ChangeRequests).as_str(),
            "http://127.0.0.1:8787/data/crq.json"
        );
    }
}
