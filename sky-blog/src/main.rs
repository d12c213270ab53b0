//! sky-blog - Publish markdown blog entries to WhiteWind
//!
//! Unix-style tool that publishes a markdown file as a
//! `com.whtwnd.blog.entry` record in your own PDS repo, uploading local
//! images along the way.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use libskycast::atproto::{created_at_now, record_key, PdsClient, SessionUploader};
use libskycast::logging;
use libskycast::markdown::{first_heading, rewrite_local_images, RewriteResult};
use libskycast::whitewind::{
    entry_url, notify_new_entry, BlobEntry, BlogEntry, Visibility, BLOG_ENTRY_COLLECTION,
};
use libskycast::xrpc::XrpcClient;
use libskycast::{Config, Result, SkycastError};

#[derive(Parser, Debug)]
#[command(name = "sky-blog")]
#[command(version)]
#[command(about = "Publish markdown blog entries to WhiteWind")]
#[command(long_about = "\
sky-blog - Publish markdown blog entries to WhiteWind

DESCRIPTION:
    sky-blog publishes markdown files as WhiteWind blog entries stored in
    your own PDS repo. Local images referenced by the document are
    uploaded as blobs and the references rewritten to public URLs.

COMMANDS:
    post    Publish a markdown file as a blog entry
    list    List your existing blog entries

USAGE EXAMPLES:
    # Publish a post
    sky-blog post article.md

    # Publish with an explicit title, visible only to you
    sky-blog post article.md --title \"Draft thoughts\" --draft

    # Publish unlisted (anyone with the URL can read it)
    sky-blog post article.md --visibility url

    # List entries
    sky-blog list

CONFIGURATION:
    Configuration file: ~/.config/skycast/config.toml

    Override with environment variables:
        SKYCAST_CONFIG      - Path to config file
        SKYCAST_LOG_FORMAT  - Log format: text, json, pretty
        SKYCAST_LOG_LEVEL   - Log level filter (default: info)

EXIT CODES:
    0 - Success
    1 - Publishing failed
    2 - Authentication error
    3 - Invalid input (bad visibility, unreadable file, etc.)

For more information, visit: https://github.com/skycast/skycast
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Publish a markdown file as a blog entry
    Post {
        /// Markdown file to publish
        file: PathBuf,

        /// Entry title; defaults to the first heading or the file name
        #[arg(short, long)]
        title: Option<String>,

        /// Who can see the entry: public, url, or author
        #[arg(long, default_value = "public")]
        visibility: String,

        /// Publish as a draft only the author can see
        #[arg(short, long)]
        draft: bool,

        /// Skip uploading local images
        #[arg(long)]
        no_images: bool,
    },

    /// List your existing blog entries
    List,
}

fn main() {
    let cli = Cli::parse();

    logging::init_from_env(cli.verbose);

    // Run the main logic and handle errors
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Post {
            file,
            title,
            visibility,
            draft,
            no_images,
        } => cmd_post(&file, title, &visibility, draft, no_images),
        Commands::List => cmd_list(),
    }
}

/// Publish one markdown file
fn cmd_post(
    file: &Path,
    title: Option<String>,
    visibility: &str,
    draft: bool,
    no_images: bool,
) -> Result<()> {
    // Validate input before touching the network
    let visibility: Visibility = visibility.parse().map_err(SkycastError::InvalidInput)?;
    let content = std::fs::read_to_string(file).map_err(|e| {
        SkycastError::InvalidInput(format!("Cannot read {}: {}", file.display(), e))
    })?;

    // The title fallback reads the original document, before any rewrite
    let heading = first_heading(&content).map(|h| h.to_string());

    // Load configuration and log in
    let config = Config::load()?;
    let client = PdsClient::new(config.pds.host.as_str())?;
    let session = client.create_session(&config.account.handle, &config.account.app_password)?;

    // Upload local images and point the document at their public URLs
    let base_dir = match file.parent() {
        Some(parent) if parent != Path::new("") => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let rewrite = if no_images {
        RewriteResult {
            content,
            assets: Vec::new(),
        }
    } else {
        let uploader = SessionUploader::new(&client, &session);
        rewrite_local_images(&content, &base_dir, &uploader)?
    };

    let title = title
        .or(heading)
        .or_else(|| file.file_stem().map(|s| s.to_string_lossy().into_owned()));
    let visibility = if draft { Visibility::Author } else { visibility };

    let mut entry = BlogEntry::new(rewrite.content, created_at_now(), visibility);
    entry.title = title.clone();
    entry.blobs = rewrite
        .assets
        .iter()
        .map(|asset| BlobEntry {
            blobref: asset.blob.clone(),
            name: asset.file_name.clone(),
        })
        .collect();

    let record = client.create_record(&session, BLOG_ENTRY_COLLECTION, &entry)?;

    // Best effort; the record is in the repo either way
    let whitewind = XrpcClient::new(config.whitewind.host.as_str())?;
    notify_new_entry(&whitewind, &record.uri);

    println!(
        "Published: {}",
        entry_url(
            &config.whitewind.host,
            &session.handle,
            title.as_deref(),
            &record.uri
        )
    );
    println!("URI: {}", record.uri);
    if !rewrite.assets.is_empty() {
        println!("Uploaded {} image(s)", rewrite.assets.len());
    }

    Ok(())
}

/// List existing blog entries
fn cmd_list() -> Result<()> {
    let config = Config::load()?;
    let client = PdsClient::new(config.pds.host.as_str())?;
    let session = client.create_session(&config.account.handle, &config.account.app_password)?;

    let records = client.list_records(&session, BLOG_ENTRY_COLLECTION, 50)?;
    if records.is_empty() {
        println!("No blog entries found.");
        return Ok(());
    }

    println!(
        "{:<30} {:<10} {:<12} RKEY",
        "TITLE", "VISIBILITY", "CREATED"
    );
    for record in &records {
        let title = record
            .value
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or("(untitled)");
        let visibility = record
            .value
            .get("visibility")
            .and_then(|v| v.as_str())
            .unwrap_or("public");
        let created = record
            .value
            .get("createdAt")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        let date = created.get(..10).unwrap_or(created);

        println!(
            "{:<30} {:<10} {:<12} {}",
            truncate_title(title, 28),
            visibility,
            date,
            record_key(&record.uri)
        );
    }

    Ok(())
}

/// Truncate a title to max length with ellipsis
fn truncate_title(title: &str, max_chars: usize) -> String {
    if title.chars().count() <= max_chars {
        title.to_string()
    } else {
        let truncated: String = title.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}
