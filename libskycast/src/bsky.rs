//! Bluesky feed post records

use serde::Serialize;
use unicode_segmentation::UnicodeSegmentation;

use crate::atproto::{record_key, BlobRef};
use crate::error::{Result, SkycastError};
use crate::facets::Facet;

/// Collection NSID for feed posts.
pub const FEED_POST_COLLECTION: &str = "app.bsky.feed.post";

/// Maximum post length, counted in grapheme clusters.
pub const MAX_POST_GRAPHEMES: usize = 300;

/// Maximum number of images in one post.
pub const MAX_POST_IMAGES: usize = 4;

/// An `app.bsky.feed.post` record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPost {
    #[serde(rename = "$type")]
    pub record_type: String,
    pub text: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub facets: Vec<Facet>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub langs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed: Option<ImagesEmbed>,
}

impl FeedPost {
    #[must_use]
    pub fn new(text: impl Into<String>, created_at: impl Into<String>) -> Self {
        Self {
            record_type: FEED_POST_COLLECTION.to_string(),
            text: text.into(),
            created_at: created_at.into(),
            facets: Vec::new(),
            langs: Vec::new(),
            embed: None,
        }
    }
}

/// Image embed block of a feed post.
#[derive(Debug, Clone, Serialize)]
pub struct ImagesEmbed {
    #[serde(rename = "$type")]
    pub embed_type: String,
    pub images: Vec<ImageItem>,
}

impl ImagesEmbed {
    #[must_use]
    pub fn new(images: Vec<ImageItem>) -> Self {
        Self {
            embed_type: "app.bsky.embed.images".to_string(),
            images,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageItem {
    pub image: BlobRef,
    pub alt: String,
}

/// Check post text against the record schema limits.
///
/// Length is counted in extended grapheme clusters, matching how the
/// AppView counts characters, so a multi-codepoint emoji is one unit.
pub fn validate_post_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(SkycastError::InvalidInput(
            "Post text cannot be empty".to_string(),
        ));
    }
    let length = text.graphemes(true).count();
    if length > MAX_POST_GRAPHEMES {
        return Err(SkycastError::InvalidInput(format!(
            "Post text is {} characters, the limit is {}",
            length, MAX_POST_GRAPHEMES
        )));
    }
    Ok(())
}

/// Web URL where a freshly created post can be viewed.
#[must_use]
pub fn post_url(handle: &str, uri: &str) -> String {
    format!(
        "https://bsky.app/profile/{}/post/{}",
        handle,
        record_key(uri)
    )
}
