//! sky-post - Post short text updates to Bluesky
//!
//! Unix-style tool that reads post text from an argument, a file, or
//! stdin and publishes it as an `app.bsky.feed.post` record.

use std::io::Read;
use std::path::PathBuf;

use clap::Parser;
use libskycast::atproto::{created_at_now, PdsClient};
use libskycast::bsky::{
    post_url, validate_post_text, FeedPost, ImageItem, ImagesEmbed, FEED_POST_COLLECTION,
    MAX_POST_IMAGES,
};
use libskycast::facets::detect_facets;
use libskycast::logging;
use libskycast::{Config, Result, SkycastError};

#[derive(Parser, Debug)]
#[command(name = "sky-post")]
#[command(version)]
#[command(about = "Post short text updates to Bluesky")]
#[command(long_about = "\
sky-post - Post short text updates to Bluesky

DESCRIPTION:
    sky-post publishes a text post to your Bluesky account. Links,
    @mentions, and #hashtags in the text are detected and attached as
    rich-text facets, and up to four images can be embedded.

USAGE EXAMPLES:
    # Post from an argument
    sky-post \"Hello from the command line\"

    # Post from a file
    sky-post --file announcement.txt

    # Post from stdin
    echo \"Hello\" | sky-post

    # Attach images and set the language
    sky-post \"Sunset over the bay\" --image sunset.jpg --lang en

CONFIGURATION:
    Configuration file: ~/.config/skycast/config.toml

    Override with environment variables:
        SKYCAST_CONFIG      - Path to config file
        SKYCAST_LOG_FORMAT  - Log format: text, json, pretty
        SKYCAST_LOG_LEVEL   - Log level filter (default: info)

EXIT CODES:
    0 - Success
    1 - Posting failed
    2 - Authentication error
    3 - Invalid input (empty text, over the limit, missing image, etc.)

For more information, visit: https://github.com/skycast/skycast
")]
struct Cli {
    /// Post text; read from --file or stdin when omitted
    text: Option<String>,

    /// Read the post text from a file
    #[arg(short, long, value_name = "PATH", conflicts_with = "text")]
    file: Option<PathBuf>,

    /// Attach an image (repeat for up to four)
    #[arg(short, long, value_name = "PATH")]
    image: Vec<PathBuf>,

    /// Language tag to record on the post (repeatable)
    #[arg(short, long, value_name = "LANG")]
    lang: Vec<String>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
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
    // Gather and validate input before touching the network
    let text = read_text(&cli)?;
    validate_post_text(&text)?;

    if cli.image.len() > MAX_POST_IMAGES {
        return Err(SkycastError::InvalidInput(format!(
            "At most {} images can be attached, got {}",
            MAX_POST_IMAGES,
            cli.image.len()
        )));
    }
    for path in &cli.image {
        if !path.is_file() {
            return Err(SkycastError::InvalidInput(format!(
                "Image file not found: {}",
                path.display()
            )));
        }
    }

    // Load configuration and log in
    let config = Config::load()?;
    let client = PdsClient::new(config.pds.host.as_str())?;
    let session = client.create_session(&config.account.handle, &config.account.app_password)?;

    // Detect rich-text facets, resolving mentions through the PDS
    let facets = detect_facets(&text, &client);

    let mut post = FeedPost::new(text, created_at_now());
    post.facets = facets;
    post.langs = cli.lang.clone();

    if !cli.image.is_empty() {
        let mut images = Vec::with_capacity(cli.image.len());
        for path in &cli.image {
            let blob = client.upload_blob(&session, path)?;
            // TODO: take per-image alt text on the command line
            images.push(ImageItem {
                image: blob,
                alt: String::new(),
            });
        }
        post.embed = Some(ImagesEmbed::new(images));
    }

    let record = client.create_record(&session, FEED_POST_COLLECTION, &post)?;

    println!("Posted: {}", post_url(&session.handle, &record.uri));
    println!("URI: {}", record.uri);

    Ok(())
}

/// Post text from the argument, the --file flag, or stdin, in that order.
fn read_text(cli: &Cli) -> Result<String> {
    if let Some(text) = &cli.text {
        return Ok(text.clone());
    }
    if let Some(path) = &cli.file {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SkycastError::InvalidInput(format!("Cannot read {}: {}", path.display(), e))
        })?;
        return Ok(text.trim_end().to_string());
    }

    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .map_err(|e| SkycastError::InvalidInput(format!("Cannot read stdin: {}", e)))?;
    Ok(text.trim_end().to_string())
}
