//! Skycast - command-line publishing for Bluesky and WhiteWind
//!
//! This library provides the shared plumbing for the `sky-post` and
//! `sky-blog` tools: PDS sessions, resilient XRPC requests, rich-text
//! facet detection, and markdown asset uploads.

pub mod atproto;
pub mod bsky;
pub mod config;
pub mod error;
pub mod facets;
pub mod logging;
pub mod markdown;
pub mod whitewind;
pub mod xrpc;

// Re-export commonly used types
pub use atproto::{PdsClient, Session};
pub use config::Config;
pub use error::{ApiError, ConfigError, Result, SkycastError};
