//! AT Protocol PDS client
//!
//! Session management, blob uploads, and record operations against a
//! personal data server, speaking XRPC over HTTP.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ApiError, Result, SkycastError};
use crate::facets::HandleResolver;
use crate::markdown::{BlobUploader, UploadedBlob};
use crate::xrpc::{require_success, RetryPolicy, XrpcClient};

/// Default PDS for accounts hosted by Bluesky itself.
pub const DEFAULT_PDS_HOST: &str = "https://bsky.social";

const SESSION_TIMEOUT: Duration = Duration::from_secs(15);
const RECORD_TIMEOUT: Duration = Duration::from_secs(15);
const RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// An authenticated session returned by `com.atproto.server.createSession`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub did: String,
    pub handle: String,
    pub access_jwt: String,
    #[serde(default)]
    pub refresh_jwt: Option<String>,
}

/// Reference to an uploaded blob, embedded verbatim in records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
    #[serde(rename = "$type")]
    pub kind: String,
    #[serde(rename = "ref")]
    pub reference: CidLink,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CidLink {
    #[serde(rename = "$link")]
    pub link: String,
}

/// URI and CID of a freshly created record.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordRef {
    pub uri: String,
    pub cid: String,
}

/// One record from `com.atproto.repo.listRecords`.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordEntry {
    pub uri: String,
    pub cid: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct UploadBlobResponse {
    blob: BlobRef,
}

#[derive(Debug, Deserialize)]
struct ResolveHandleResponse {
    did: String,
}

#[derive(Debug, Deserialize)]
struct ListRecordsResponse {
    records: Vec<RecordEntry>,
}

/// Client for one personal data server.
pub struct PdsClient {
    xrpc: XrpcClient,
}

impl PdsClient {
    pub fn new(host: impl Into<String>) -> Result<Self> {
        Ok(Self {
            xrpc: XrpcClient::new(host)?,
        })
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.xrpc = self.xrpc.with_retry(retry);
        self
    }

    #[must_use]
    pub fn host(&self) -> &str {
        self.xrpc.host()
    }

    /// Log in with a handle (or DID) and app password.
    pub fn create_session(&self, identifier: &str, password: &str) -> Result<Session> {
        let request = self
            .xrpc
            .post("com.atproto.server.createSession")
            .timeout(SESSION_TIMEOUT)
            .json(&serde_json::json!({
                "identifier": identifier,
                "password": password,
            }));

        let response = self.xrpc.execute(request, "createSession")?;
        let response = require_success(response, "createSession")?;
        let session: Session = response.json().map_err(|e| {
            ApiError::Network(format!("Failed to parse createSession response: {}", e))
        })?;

        debug!("Session established for {}", session.handle);
        Ok(session)
    }

    /// Upload a file as a blob owned by the session's repo.
    ///
    /// The MIME type is guessed from the file extension and falls back to
    /// `application/octet-stream`.
    pub fn upload_blob(&self, session: &Session, path: &Path) -> Result<BlobRef> {
        let bytes = std::fs::read(path).map_err(|e| {
            SkycastError::InvalidInput(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let size = bytes.len();
        let mime = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or("application/octet-stream");

        let request = self
            .xrpc
            .post("com.atproto.repo.uploadBlob")
            .timeout(UPLOAD_TIMEOUT)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", session.access_jwt),
            )
            .header(reqwest::header::CONTENT_TYPE, mime)
            .body(bytes);

        let response = self.xrpc.execute(request, "uploadBlob")?;
        let response = require_success(response, "uploadBlob")?;
        let parsed: UploadBlobResponse = response.json().map_err(|e| {
            ApiError::Network(format!("Failed to parse uploadBlob response: {}", e))
        })?;

        info!(
            "Uploaded {} ({} bytes) as {}",
            path.display(),
            size,
            parsed.blob.reference.link
        );
        Ok(parsed.blob)
    }

    /// Public URL where an uploaded blob can be fetched back.
    #[must_use]
    pub fn blob_url(&self, did: &str, cid: &str) -> String {
        format!(
            "{}/xrpc/com.atproto.sync.getBlob?did={}&cid={}",
            self.xrpc.host(),
            did,
            cid
        )
    }

    /// Create a record in the given collection of the session's repo.
    pub fn create_record<R: Serialize>(
        &self,
        session: &Session,
        collection: &str,
        record: &R,
    ) -> Result<RecordRef> {
        let request = self
            .xrpc
            .post("com.atproto.repo.createRecord")
            .timeout(RECORD_TIMEOUT)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", session.access_jwt),
            )
            .json(&serde_json::json!({
                "repo": session.did,
                "collection": collection,
                "record": record,
            }));

        let response = self.xrpc.execute(request, "createRecord")?;
        let response = require_success(response, "createRecord")?;
        response.json().map_err(|e| {
            ApiError::Network(format!("Failed to parse createRecord response: {}", e)).into()
        })
    }

    /// List the most recent records in a collection of the session's repo.
    pub fn list_records(
        &self,
        session: &Session,
        collection: &str,
        limit: u32,
    ) -> Result<Vec<RecordEntry>> {
        let limit = limit.to_string();
        let request = self
            .xrpc
            .get("com.atproto.repo.listRecords")
            .timeout(RECORD_TIMEOUT)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", session.access_jwt),
            )
            .query(&[
                ("repo", session.did.as_str()),
                ("collection", collection),
                ("limit", limit.as_str()),
            ]);

        let response = self.xrpc.execute(request, "listRecords")?;
        let response = require_success(response, "listRecords")?;
        let parsed: ListRecordsResponse = response.json().map_err(|e| {
            ApiError::Network(format!("Failed to parse listRecords response: {}", e))
        })?;
        Ok(parsed.records)
    }
}

impl HandleResolver for PdsClient {
    /// Resolve a handle to a DID through the PDS, returning `None` on any
    /// failure so callers can skip the mention and move on.
    fn resolve_handle(&self, handle: &str) -> Option<String> {
        let request = self
            .xrpc
            .get("com.atproto.identity.resolveHandle")
            .timeout(RESOLVE_TIMEOUT)
            .query(&[("handle", handle)]);

        let response = match self.xrpc.execute(request, "resolveHandle") {
            Ok(response) => response,
            Err(e) => {
                debug!("resolveHandle for @{} failed: {}", handle, e);
                return None;
            }
        };
        if !response.status().is_success() {
            debug!(
                "resolveHandle for @{} returned HTTP {}",
                handle,
                response.status().as_u16()
            );
            return None;
        }
        match response.json::<ResolveHandleResponse>() {
            Ok(parsed) => Some(parsed.did),
            Err(e) => {
                debug!("resolveHandle for @{} returned malformed JSON: {}", handle, e);
                None
            }
        }
    }
}

/// Uploads markdown assets through an authenticated session.
pub struct SessionUploader<'a> {
    client: &'a PdsClient,
    session: &'a Session,
}

impl<'a> SessionUploader<'a> {
    #[must_use]
    pub fn new(client: &'a PdsClient, session: &'a Session) -> Self {
        Self { client, session }
    }
}

impl BlobUploader for SessionUploader<'_> {
    fn upload(&self, path: &Path) -> Result<UploadedBlob> {
        let blob = self.client.upload_blob(self.session, path)?;
        let public_url = self
            .client
            .blob_url(&self.session.did, &blob.reference.link);
        Ok(UploadedBlob { blob, public_url })
    }
}

/// Last path segment of an AT URI, used as the record key.
#[must_use]
pub fn record_key(uri: &str) -> &str {
    uri.rsplit('/').next().unwrap_or(uri)
}

/// Current time in the fixed-millisecond UTC profile the record schemas use.
#[must_use]
pub fn created_at_now() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S.000Z")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_deserializes_from_wire_shape() {
        let json = r#"{
            "did": "did:plc:abc123",
            "handle": "alice.bsky.social",
            "accessJwt": "access-token",
            "refreshJwt": "refresh-token"
        }"#;

        let session: Session = serde_json::from_str(json).unwrap();
        assert_eq!(session.did, "did:plc:abc123");
        assert_eq!(session.handle, "alice.bsky.social");
        assert_eq!(session.access_jwt, "access-token");
        assert_eq!(session.refresh_jwt.as_deref(), Some("refresh-token"));
    }

    #[test]
    fn test_session_tolerates_missing_refresh_jwt() {
        let json = r#"{
            "did": "did:plc:abc123",
            "handle": "alice.bsky.social",
            "accessJwt": "access-token"
        }"#;

        let session: Session = serde_json::from_str(json).unwrap();
        assert!(session.refresh_jwt.is_none());
    }

    #[test]
    fn test_blob_ref_round_trips_wire_shape() {
        let json = serde_json::json!({
            "$type": "blob",
            "ref": {"$link": "bafyreib2rxk3rw6"},
            "mimeType": "image/png",
            "size": 12345
        });

        let blob: BlobRef = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(blob.kind, "blob");
        assert_eq!(blob.reference.link, "bafyreib2rxk3rw6");
        assert_eq!(blob.mime_type, "image/png");
        assert_eq!(blob.size, 12345);

        assert_eq!(serde_json::to_value(&blob).unwrap(), json);
    }

    #[test]
    fn test_record_key_takes_last_uri_segment() {
        assert_eq!(
            record_key("at://did:plc:abc/com.whtwnd.blog.entry/3kabc123"),
            "3kabc123"
        );
        assert_eq!(record_key("no-slashes-at-all"), "no-slashes-at-all");
    }

    #[test]
    fn test_blob_url_points_at_sync_get_blob() {
        let client = PdsClient::new("https://bsky.social").unwrap();
        assert_eq!(
            client.blob_url("did:plc:abc", "bafyreib2"),
            "https://bsky.social/xrpc/com.atproto.sync.getBlob?did=did:plc:abc&cid=bafyreib2"
        );
    }

    #[test]
    fn test_created_at_has_fixed_millisecond_utc_shape() {
        let stamp = created_at_now();

        assert_eq!(stamp.len(), "2024-01-02T03:04:05.000Z".len());
        assert!(stamp.ends_with(".000Z"));
        assert_eq!(&stamp[4..5], "-");
        assert_eq!(&stamp[10..11], "T");
    }
}
