//! WhiteWind blog entry records
//!
//! WhiteWind is a markdown blog service that stores entries as
//! `com.whtwnd.blog.entry` records in the author's own PDS repo.

use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::atproto::{record_key, BlobRef};
use crate::xrpc::XrpcClient;

/// Collection NSID for blog entries.
pub const BLOG_ENTRY_COLLECTION: &str = "com.whtwnd.blog.entry";

/// Public WhiteWind instance.
pub const DEFAULT_WHITEWIND_HOST: &str = "https://whtwnd.com";

/// Syntax highlighting theme applied to new entries.
pub const DEFAULT_THEME: &str = "github-light";

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Who can see a blog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Url,
    Author,
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(Visibility::Public),
            "url" => Ok(Visibility::Url),
            "author" => Ok(Visibility::Author),
            _ => Err(format!(
                "Invalid visibility: '{}'. Valid options: public, url, author",
                s
            )),
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::Url => write!(f, "url"),
            Visibility::Author => write!(f, "author"),
        }
    }
}

/// A `com.whtwnd.blog.entry` record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogEntry {
    #[serde(rename = "$type")]
    pub record_type: String,
    pub content: String,
    pub created_at: String,
    pub visibility: Visibility,
    pub theme: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blobs: Vec<BlobEntry>,
}

impl BlogEntry {
    #[must_use]
    pub fn new(
        content: impl Into<String>,
        created_at: impl Into<String>,
        visibility: Visibility,
    ) -> Self {
        Self {
            record_type: BLOG_ENTRY_COLLECTION.to_string(),
            content: content.into(),
            created_at: created_at.into(),
            visibility,
            theme: DEFAULT_THEME.to_string(),
            title: None,
            blobs: Vec::new(),
        }
    }
}

/// One uploaded asset listed on a blog entry.
#[derive(Debug, Clone, Serialize)]
pub struct BlobEntry {
    pub blobref: BlobRef,
    pub name: String,
}

/// Web URL where a published entry can be read.
///
/// WhiteWind serves titled entries under the URL-encoded title and
/// untitled ones under the record key.
#[must_use]
pub fn entry_url(host: &str, handle: &str, title: Option<&str>, uri: &str) -> String {
    match title {
        Some(title) => format!("{}/{}/entries/{}", host, handle, title.replace(' ', "%20")),
        None => format!("{}/{}/{}", host, handle, record_key(uri)),
    }
}

/// Tell the WhiteWind instance about a new entry so it shows up without
/// waiting for a firehose pass.
///
/// Failures are logged and swallowed; the record already exists in the
/// author's repo either way.
pub fn notify_new_entry(client: &XrpcClient, entry_uri: &str) {
    let request = client
        .post("com.whtwnd.blog.notifyOfNewEntry")
        .timeout(NOTIFY_TIMEOUT)
        .json(&serde_json::json!({ "entryUri": entry_uri }));

    match client.execute(request, "notifyOfNewEntry") {
        Ok(response) if response.status().is_success() => {
            info!("Notified WhiteWind of the new entry");
        }
        Ok(response) => {
            warn!(
                "notifyOfNewEntry returned HTTP {}; the entry is published regardless",
                response.status().as_u16()
            );
        }
        Err(e) => {
            warn!(
                "notifyOfNewEntry failed: {}; the entry is published regardless",
                e
            );
        }
    }
}
