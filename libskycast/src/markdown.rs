//! Markdown asset handling
//!
//! Rewrites local image references in a markdown document to public blob
//! URLs, uploading each distinct file once.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use crate::atproto::BlobRef;
use crate::error::Result;

/// Outcome of uploading one asset.
#[derive(Debug, Clone)]
pub struct UploadedBlob {
    pub blob: BlobRef,
    pub public_url: String,
}

/// Uploads a local file and reports where it now lives.
pub trait BlobUploader {
    fn upload(&self, path: &Path) -> Result<UploadedBlob>;
}

/// One local asset uploaded during a rewrite.
#[derive(Debug, Clone)]
pub struct AssetReference {
    pub local_path: PathBuf,
    pub blob: BlobRef,
    pub public_url: String,
    pub file_name: String,
}

/// Rewritten document plus the assets it now references.
#[derive(Debug, Clone)]
pub struct RewriteResult {
    pub content: String,
    pub assets: Vec<AssetReference>,
}

fn image_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"!\[([^\]]*)\]\(([^)]+)\)").expect("invalid image regex"))
}

fn heading_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^#\s+(.+)$").expect("invalid heading regex"))
}

/// First level-one heading of a markdown document, if any.
#[must_use]
pub fn first_heading(content: &str) -> Option<&str> {
    heading_regex()
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

fn is_remote(reference: &str) -> bool {
    reference.starts_with("http://")
        || reference.starts_with("https://")
        || reference.starts_with("data:")
}

/// Rewrite local image references to public blob URLs.
///
/// Each `![alt](path)` whose path is not already remote is resolved against
/// `base_dir`, uploaded through `uploader`, and replaced with the returned
/// public URL. A file referenced several times is uploaded once. References
/// to files that do not exist are left as written, with a warning. Upload
/// failures abort the rewrite.
///
/// The substitution is purely textual; image syntax inside code fences is
/// rewritten like any other.
pub fn rewrite_local_images(
    content: &str,
    base_dir: &Path,
    uploader: &dyn BlobUploader,
) -> Result<RewriteResult> {
    let mut rewritten = String::with_capacity(content.len());
    let mut assets: Vec<AssetReference> = Vec::new();
    let mut uploaded: HashMap<PathBuf, String> = HashMap::new();
    let mut last_end = 0;

    for caps in image_regex().captures_iter(content) {
        let whole = match caps.get(0) {
            Some(m) => m,
            None => continue,
        };
        let alt = caps.get(1).map_or("", |m| m.as_str());
        let reference = caps.get(2).map_or("", |m| m.as_str());

        if is_remote(reference) {
            continue;
        }

        // Canonicalization both verifies the file exists and gives the
        // dedup cache a stable key for equivalent spellings of one path
        let joined = base_dir.join(reference);
        let resolved = match joined.canonicalize() {
            Ok(path) => path,
            Err(_) => {
                warn!(
                    "Image not found, keeping the original reference: {}",
                    joined.display()
                );
                continue;
            }
        };

        let public_url = match uploaded.get(&resolved) {
            Some(url) => url.clone(),
            None => {
                let outcome = uploader.upload(&resolved)?;
                let file_name = resolved
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| reference.to_string());
                uploaded.insert(resolved.clone(), outcome.public_url.clone());
                assets.push(AssetReference {
                    local_path: resolved,
                    blob: outcome.blob,
                    public_url: outcome.public_url.clone(),
                    file_name,
                });
                outcome.public_url
            }
        };

        rewritten.push_str(&content[last_end..whole.start()]);
        rewritten.push_str(&format!("![{}]({})", alt, public_url));
        last_end = whole.end();
    }

    rewritten.push_str(&content[last_end..]);
    Ok(RewriteResult {
        content: rewritten,
        assets,
    })
}
