//! Repository contents API store.
//!
//! GET  /repos/{owner}/{repo}/contents/{path}?ref={branch}  -> sha + base64 content
//! PUT  /repos/{owner}/{repo}/contents/{path}               -> {message, content, sha?, branch}
//!
//! The blob sha is the version token. A PUT without `sha` creates the file and
//! fails when it already exists; a PUT with a stale `sha` is rejected.
//!
//! Files over 1 MB come back from the contents API with `encoding: "none"` and
//! no content; those are read through GET /repos/{owner}/{repo}/git/blobs/{sha}.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use linkhub_core::sync::VersionToken;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{StoreError, StoreResult, StoredFile, VersionedStore};

const MAX_LOG_BODY_CHARS: usize = 512;

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BlobResponse {
    content: String,
    encoding: String,
}

#[derive(Debug, Serialize)]
struct PutContentsRequest<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
    branch: &'a str,
}

#[derive(Debug, Deserialize)]
struct PutContentsResponse {
    content: PutContentsFile,
}

#[derive(Debug, Deserialize)]
struct PutContentsFile {
    sha: String,
}

pub struct GitHubStore {
    client: reqwest::Client,
    api_url: String,
    owner: String,
    repo: String,
    branch: String,
}

impl GitHubStore {
    pub fn new(
        api_url: &str,
        owner: &str,
        repo: &str,
        token: &str,
        branch: &str,
        timeout: Duration,
    ) -> StoreResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("linkhub-gateway"));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| StoreError::Unavailable("invalid token format".to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch: branch.to_string(),
        })
    }

    fn contents_url(&self, path: &str) -> String {
        let encoded = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_url,
            urlencoding::encode(&self.owner),
            urlencoding::encode(&self.repo),
            encoded
        )
    }

    fn upstream_error(status: StatusCode, body: &str) -> StoreError {
        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("[GitHubStore] Response error ({}): {}", status, preview);
        StoreError::Upstream {
            status: status.as_u16(),
            message: preview,
        }
    }

    fn blob_url(&self, sha: &str) -> String {
        format!(
            "{}/repos/{}/{}/git/blobs/{}",
            self.api_url,
            urlencoding::encode(&self.owner),
            urlencoding::encode(&self.repo),
            urlencoding::encode(sha)
        )
    }

    /// Send a GET and parse the JSON body; 404 is `None`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        path: &str,
    ) -> StoreResult<Option<T>> {
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        if !status.is_success() {
            return Err(Self::upstream_error(status, &body));
        }
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| StoreError::Decode(format!("{}: {}", path, e)))
    }

    async fn fetch(&self, path: &str) -> StoreResult<Option<ContentsResponse>> {
        let request = self
            .client
            .get(self.contents_url(path))
            .query(&[("ref", self.branch.as_str())]);
        self.get_json(request, path).await
    }

    async fn fetch_blob(&self, path: &str, sha: &str) -> StoreResult<Vec<u8>> {
        debug!("[GitHubStore] {} is too large for the contents API, reading blob {}", path, sha);
        let blob: BlobResponse = self
            .get_json(self.client.get(self.blob_url(sha)), path)
            .await?
            .ok_or_else(|| StoreError::Decode(format!("{}: blob {} not found", path, sha)))?;
        match blob.encoding.as_str() {
            "base64" => decode_base64(path, &blob.content),
            "utf-8" => Ok(blob.content.into_bytes()),
            other => Err(StoreError::Decode(format!(
                "{} blob has unsupported encoding {}",
                path, other
            ))),
        }
    }
}

/// Decode base64 as the API returns it, wrapped at 60 columns.
fn decode_base64(path: &str, encoded: &str) -> StoreResult<Vec<u8>> {
    let packed: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    BASE64
        .decode(packed)
        .map_err(|e| StoreError::Decode(format!("{}: {}", path, e)))
}

#[async_trait]
impl VersionedStore for GitHubStore {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn read(&self, path: &str) -> StoreResult<Option<StoredFile>> {
        let Some(contents) = self.fetch(path).await? else {
            return Ok(None);
        };
        let content = match (contents.encoding.as_deref(), contents.content.as_deref()) {
            (Some("base64"), Some(encoded)) => decode_base64(path, encoded)?,
            (Some("none") | None, _) | (Some("base64"), None) => {
                self.fetch_blob(path, &contents.sha).await?
            }
            (Some(other), _) => {
                return Err(StoreError::Decode(format!(
                    "{} has unsupported encoding {}",
                    path, other
                )))
            }
        };
        Ok(Some(StoredFile {
            content,
            version: VersionToken::new(contents.sha),
        }))
    }

    async fn read_version(&self, path: &str) -> StoreResult<Option<VersionToken>> {
        Ok(self
            .fetch(path)
            .await?
            .map(|contents| VersionToken::new(contents.sha)))
    }

    async fn write(
        &self,
        path: &str,
        content: &[u8],
        expected: Option<&VersionToken>,
        message: &str,
    ) -> StoreResult<VersionToken> {
        let request = PutContentsRequest {
            message,
            content: BASE64.encode(content),
            sha: expected.map(VersionToken::as_str),
            branch: &self.branch,
        };
        let response = self
            .client
            .put(self.contents_url(path))
            .json(&request)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        if status.is_success() {
            let parsed: PutContentsResponse = serde_json::from_str(&body)
                .map_err(|e| StoreError::Decode(format!("{}: {}", path, e)))?;
            return Ok(VersionToken::new(parsed.content.sha));
        }
        // 409: sha mismatch; 422: sha missing for an existing file
        if status == StatusCode::CONFLICT
            || (status == StatusCode::UNPROCESSABLE_ENTITY && body.contains("sha"))
        {
            return Err(StoreError::Conflict(path.to_string()));
        }
        Err(Self::upstream_error(status, &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{start_upstream, Reply};
    use crate::writer::{write_one, ResourceWrite};
    use linkhub_core::sync::WriteOutcome;
    use linkhub_core::Collection;
    use serde_json::{json, Value};

    const CRQ_CONTENTS: &str = "GET /repos/acme/links/contents/data/crq.json?ref=main";
    const CRQ_BASE64: &str = "eyJjcnEiOlt7ImlkIjoiYzEifV19Cg==";

    fn store_for(api_url: &str) -> GitHubStore {
        GitHubStore::new(api_url, "acme", "links", "secret", "main", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn contents_url_encodes_segments() {
        let store = GitHubStore::new(
            "https://api.github.com/",
            "acme",
            "links",
            "secret",
            "main",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            store.contents_url("/my site/data/crq.json"),
            "https://api.github.com/repos/acme/links/contents/my%20site/data/crq.json"
        );
    }

    #[test]
    fn put_request_omits_sha_on_create() {
        let request = PutContentsRequest {
            message: "chore: autosave data/crq.json",
            content: BASE64.encode(b"{}"),
            sha: None,
            branch: "main",
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("sha").is_none());
        assert_eq!(value["content"], "e30=");
    }

    #[tokio::test]
    async fn missing_file_has_no_version() {
        let upstream = start_upstream(vec![]).await;
        let store = store_for(&upstream.base_url);

        assert!(store.read_version("data/crq.json").await.unwrap().is_none());
        assert!(store.read("data/crq.json").await.unwrap().is_none());

        let requests = upstream.requests().await;
        assert_eq!(requests[0].headers["authorization"], "Bearer secret");
        assert_eq!(requests[0].headers["user-agent"], "linkhub-gateway");
    }

    #[tokio::test]
    async fn create_then_update_round_trips_the_sha() {
        let upstream = start_upstream(vec![
            (CRQ_CONTENTS, Reply::json(404, json!({ "message": "Not Found" }))),
            (
                CRQ_CONTENTS,
                Reply::json(200, json!({ "sha": "v1", "content": CRQ_BASE64, "encoding": "base64" })),
            ),
            (
                "PUT /repos/acme/links/contents/data/crq.json",
                Reply::json(201, json!({ "content": { "sha": "v1" } })),
            ),
            (
                "PUT /repos/acme/links/contents/data/crq.json",
                Reply::json(200, json!({ "content": { "sha": "v2" } })),
            ),
        ])
        .await;
        let store = store_for(&upstream.base_url);
        let write = ResourceWrite {
            collection: Collection::ChangeRequests,
            path: "data/crq.json".to_string(),
            document: json!({ "crq": [{ "id": "c1" }] }),
        };

        assert_eq!(
            write_one(&store, &write).await,
            WriteOutcome::Created(VersionToken::new("v1"))
        );
        assert_eq!(
            write_one(&store, &write).await,
            WriteOutcome::Updated(VersionToken::new("v2"))
        );

        let puts: Vec<Value> = upstream
            .requests()
            .await
            .iter()
            .filter(|request| request.method == "PUT")
            .map(|request| serde_json::from_str(&request.body).unwrap())
            .collect();
        assert_eq!(puts.len(), 2);
        assert!(puts[0].get("sha").is_none());
        assert_eq!(puts[1]["sha"], "v1");
        assert_eq!(puts[1]["branch"], "main");
        assert_eq!(puts[1]["message"], "chore: autosave data/crq.json");
        let written = BASE64.decode(puts[1]["content"].as_str().unwrap()).unwrap();
        assert_eq!(written, write.encode().unwrap());
    }

    #[tokio::test]
    async fn rejected_writes_are_classified() {
        let upstream = start_upstream(vec![
            (
                "PUT /repos/acme/links/contents/data/stale.json",
                Reply::json(409, json!({ "message": "data/stale.json does not match" })),
            ),
            (
                "PUT /repos/acme/links/contents/data/exists.json",
                Reply::json(422, json!({ "message": "Invalid request. \"sha\" wasn't supplied." })),
            ),
            (
                "PUT /repos/acme/links/contents/data/invalid.json",
                Reply::json(422, json!({ "message": "Invalid request. Branch is protected." })),
            ),
            (
                "PUT /repos/acme/links/contents/data/broken.json",
                Reply::json(500, json!({ "message": "Server Error" })),
            ),
        ])
        .await;
        let store = store_for(&upstream.base_url);

        let stale = VersionToken::new("old");
        let result = store.write("data/stale.json", b"{}", Some(&stale), "m").await;
        assert!(matches!(result, Err(StoreError::Conflict(path)) if path == "data/stale.json"));

        let result = store.write("data/exists.json", b"{}", None, "m").await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));

        let result = store.write("data/invalid.json", b"{}", None, "m").await;
        assert!(matches!(result, Err(StoreError::Upstream { status: 422, .. })));

        let result = store.write("data/broken.json", b"{}", None, "m").await;
        match result {
            Err(StoreError::Upstream { status, message }) => {
                assert_eq!(status, 500);
                assert!(message.contains("Server Error"));
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[tokio::test]
    async fn failed_read_is_an_upstream_error() {
        let upstream = start_upstream(vec![(
            CRQ_CONTENTS,
            Reply::json(500, json!({ "message": "Server Error" })),
        )])
        .await;
        let store = store_for(&upstream.base_url);

        let result = store.read("data/crq.json").await;
        assert!(matches!(result, Err(StoreError::Upstream { status: 500, .. })));
    }

    #[tokio::test]
    async fn wrapped_base64_content_is_decoded() {
        let upstream = start_upstream(vec![(
            CRQ_CONTENTS,
            Reply::json(
                200,
                json!({ "sha": "v7", "content": "eyJjcnEiOlt7ImlkIjoi\nYzEifV19Cg==\n", "encoding": "base64" }),
            ),
        )])
        .await;
        let store = store_for(&upstream.base_url);

        let file = store.read("data/crq.json").await.unwrap().unwrap();
        assert_eq!(file.content, b"{\"crq\":[{\"id\":\"c1\"}]}\n".to_vec());
        assert_eq!(file.version, VersionToken::new("v7"));
    }

    #[tokio::test]
    async fn large_files_are_read_through_the_blob_api() {
        let upstream = start_upstream(vec![
            (
                CRQ_CONTENTS,
                Reply::json(
                    200,
                    json!({ "sha": "b1", "content": "", "encoding": "none", "size": 2_000_000 }),
                ),
            ),
            (
                "GET /repos/acme/links/git/blobs/b1",
                Reply::json(200, json!({ "sha": "b1", "content": CRQ_BASE64, "encoding": "base64" })),
            ),
        ])
        .await;
        let store = store_for(&upstream.base_url);

        let file = store.read("data/crq.json").await.unwrap().unwrap();
        let parsed: Value = serde_json::from_slice(&file.content).unwrap();
        assert_eq!(parsed, json!({ "crq": [{ "id": "c1" }] }));
        assert_eq!(file.version, VersionToken::new("b1"));
        assert_eq!(upstream.requests().await.len(), 2);
    }
}
