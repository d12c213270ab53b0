//! Rich-text facet detection
//!
//! Scans post text for links, mentions, and hashtags and produces the
//! byte-indexed annotation spans expected by `app.bsky.feed.post` records.
//! All offsets are UTF-8 byte positions into the original text, half-open
//! `[byteStart, byteEnd)`.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Byte range of a facet within the post text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByteSlice {
    pub byte_start: usize,
    pub byte_end: usize,
}

/// One rich-text feature attached to a byte range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "$type")]
pub enum FacetFeature {
    #[serde(rename = "app.bsky.richtext.facet#link")]
    Link { uri: String },
    #[serde(rename = "app.bsky.richtext.facet#mention")]
    Mention { did: String },
    #[serde(rename = "app.bsky.richtext.facet#tag")]
    Tag { tag: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facet {
    pub index: ByteSlice,
    pub features: Vec<FacetFeature>,
}

/// Maps a handle like `alice.bsky.social` to a DID.
///
/// Implementations return `None` for anything that fails to resolve;
/// resolution problems are never fatal to facet detection.
pub trait HandleResolver {
    fn resolve_handle(&self, handle: &str) -> Option<String>;
}

fn link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Stops at whitespace and the CJK punctuation that commonly trails
        // URLs in Japanese prose
        Regex::new(
            r"https?://[^\s\u{3000}\u{3001}\u{3002}\u{FF0C}\u{FF0E}\u{300C}-\u{301F}\u{FF08}\u{FF09}\u{FF3B}\u{FF3D}\u{300A}\u{300B}]+",
        )
        .expect("invalid link regex")
    })
}

fn mention_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // The leading group stands in for a lookbehind: an @ directly after
        // an ASCII alphanumeric is part of something else (x@foo.bar)
        Regex::new(
            r"(?:^|[^a-zA-Z0-9])(@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+)",
        )
        .expect("invalid mention regex")
    })
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:^|\W)(#[\w\u{3040}-\u{30FF}\u{4E00}-\u{9FFF}]+)")
            .expect("invalid tag regex")
    })
}

/// Detect links, mentions, and hashtags in post text.
///
/// Output is grouped by kind: all links first, then mentions, then tags,
/// each in first-match order. Callers that need positional order must sort
/// by `index.byte_start` themselves.
///
/// Mention and tag spans include the leading `@`/`#`; the feature payload
/// does not. Mentions are resolved to DIDs through `resolver`; handles that
/// do not resolve are skipped with a warning and never abort detection of
/// the remaining matches.
#[must_use]
pub fn detect_facets(text: &str, resolver: &dyn HandleResolver) -> Vec<Facet> {
    let mut facets = Vec::new();

    for m in link_regex().find_iter(text) {
        facets.push(Facet {
            index: ByteSlice {
                byte_start: m.start(),
                byte_end: m.end(),
            },
            features: vec![FacetFeature::Link {
                uri: m.as_str().to_string(),
            }],
        });
    }

    for caps in mention_regex().captures_iter(text) {
        if let Some(m) = caps.get(1) {
            let handle = &m.as_str()[1..];
            match resolver.resolve_handle(handle) {
                Some(did) => facets.push(Facet {
                    index: ByteSlice {
                        byte_start: m.start(),
                        byte_end: m.end(),
                    },
                    features: vec![FacetFeature::Mention { did }],
                }),
                None => warn!("Skipping mention @{}: handle did not resolve", handle),
            }
        }
    }

    for caps in tag_regex().captures_iter(text) {
        if let Some(m) = caps.get(1) {
            facets.push(Facet {
                index: ByteSlice {
                    byte_start: m.start(),
                    byte_end: m.end(),
                },
                features: vec![FacetFeature::Tag {
                    tag: m.as_str()[1..].to_string(),
                }],
            });
        }
    }

    facets
}
