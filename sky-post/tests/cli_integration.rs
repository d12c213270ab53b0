//! CLI integration tests for sky-post

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::Read;
use std::sync::mpsc;
use std::thread;
use tempfile::TempDir;

/// Helper to write a config file pointing at the given PDS host
fn write_config(dir: &TempDir, pds_host: &str) -> String {
    let config_path = dir.path().join("config.toml");
    let content = format!(
        r#"
[account]
handle = "alice.bsky.social"
app_password = "app-pass"

[pds]
host = "{}"
"#,
        pds_host
    );
    fs::write(&config_path, content).unwrap();
    config_path.to_string_lossy().to_string()
}

struct Recorded {
    url: String,
    body: String,
    authorization: Option<String>,
}

/// Answers the scripted responses in order and reports each request seen.
fn spawn_pds(responses: Vec<&'static str>) -> (String, mpsc::Receiver<Recorded>) {
    let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        for body in responses {
            let mut request = match server.recv() {
                Ok(r) => r,
                Err(_) => return,
            };
            let mut content = String::new();
            let _ = request.as_reader().read_to_string(&mut content);
            let recorded = Recorded {
                url: request.url().to_string(),
                body: content,
                authorization: request
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv("Authorization"))
                    .map(|h| h.value.as_str().to_string()),
            };
            let _ = tx.send(recorded);
            let _ = request.respond(tiny_http::Response::from_string(body));
        }
    });

    (format!("http://{}", addr), rx)
}

#[test]
fn test_help_flag_output() {
    let mut cmd = Command::cargo_bin("sky-post").unwrap();

    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Post short text updates to Bluesky"))
        .stdout(predicate::str::contains("USAGE EXAMPLES"))
        .stdout(predicate::str::contains("--file"))
        .stdout(predicate::str::contains("--image"))
        .stdout(predicate::str::contains("--lang"))
        .stdout(predicate::str::contains("--verbose"));
}

#[test]
fn test_help_shows_exit_codes() {
    let mut cmd = Command::cargo_bin("sky-post").unwrap();

    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("EXIT CODES"))
        .stdout(predicate::str::contains("0 - Success"))
        .stdout(predicate::str::contains("2 - Authentication error"))
        .stdout(predicate::str::contains("3 - Invalid input"));
}

#[test]
fn test_version_flag_output() {
    let mut cmd = Command::cargo_bin("sky-post").unwrap();

    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sky-post"));
}

#[test]
fn test_empty_argument_is_invalid_input() {
    let mut cmd = Command::cargo_bin("sky-post").unwrap();

    cmd.arg("")
        .assert()
        .failure()
        .code(3) // Invalid input exit code
        .stderr(predicate::str::contains("Post text cannot be empty"));
}

#[test]
fn test_whitespace_stdin_is_invalid_input() {
    let mut cmd = Command::cargo_bin("sky-post").unwrap();

    cmd.write_stdin("   \n\t\n")
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("Post text cannot be empty"));
}

#[test]
fn test_text_over_the_limit_is_invalid_input() {
    let mut cmd = Command::cargo_bin("sky-post").unwrap();

    cmd.write_stdin("a".repeat(301))
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("301 characters, the limit is 300"));
}

#[test]
fn test_more_than_four_images_is_invalid_input() {
    let mut cmd = Command::cargo_bin("sky-post").unwrap();

    // The count check fires before the files are even looked at
    cmd.arg("Valid text")
        .args(["-i", "1.png", "-i", "2.png", "-i", "3.png", "-i", "4.png", "-i", "5.png"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains(
            "At most 4 images can be attached, got 5",
        ));
}

#[test]
fn test_missing_image_file_is_invalid_input() {
    let mut cmd = Command::cargo_bin("sky-post").unwrap();

    cmd.arg("Valid text")
        .args(["--image", "/no/such/image.png"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("Image file not found"))
        .stderr(predicate::str::contains("/no/such/image.png"));
}

#[test]
fn test_missing_text_file_is_invalid_input() {
    let mut cmd = Command::cargo_bin("sky-post").unwrap();

    cmd.args(["--file", "/no/such/post.txt"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("Cannot read"));
}

#[test]
fn test_text_argument_conflicts_with_file_flag() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("post.txt");
    fs::write(&path, "from file").unwrap();

    let mut cmd = Command::cargo_bin("sky-post").unwrap();
    cmd.arg("from argument")
        .args(["--file", path.to_str().unwrap()])
        .assert()
        .failure();
}

#[test]
fn test_missing_config_is_a_configuration_error() {
    let mut cmd = Command::cargo_bin("sky-post").unwrap();

    cmd.env("SKYCAST_CONFIG", "/nonexistent/config.toml")
        .arg("Valid text")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Configuration error"))
        .stderr(predicate::str::contains("/nonexistent/config.toml"));
}

#[test]
fn test_post_publishes_the_record_and_prints_the_url() {
    let (host, rx) = spawn_pds(vec![
        r#"{"did":"did:plc:abc","handle":"alice.bsky.social","accessJwt":"jwt-a"}"#,
        r#"{"uri":"at://did:plc:abc/app.bsky.feed.post/3kpost1","cid":"bafyrec1"}"#,
    ]);
    let dir = TempDir::new().unwrap();
    let config_path = write_config(&dir, &host);

    let mut cmd = Command::cargo_bin("sky-post").unwrap();
    cmd.env("SKYCAST_CONFIG", config_path)
        .arg("Hello world")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Posted: https://bsky.app/profile/alice.bsky.social/post/3kpost1",
        ))
        .stdout(predicate::str::contains(
            "URI: at://did:plc:abc/app.bsky.feed.post/3kpost1",
        ));

    let requests: Vec<Recorded> = rx.try_iter().collect();
    assert_eq!(requests.len(), 2);

    assert_eq!(requests[0].url, "/xrpc/com.atproto.server.createSession");
    let login: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
    assert_eq!(login["identifier"], "alice.bsky.social");
    assert_eq!(login["password"], "app-pass");

    assert_eq!(requests[1].url, "/xrpc/com.atproto.repo.createRecord");
    assert_eq!(requests[1].authorization.as_deref(), Some("Bearer jwt-a"));
    let envelope: serde_json::Value = serde_json::from_str(&requests[1].body).unwrap();
    assert_eq!(envelope["repo"], "did:plc:abc");
    assert_eq!(envelope["collection"], "app.bsky.feed.post");
    assert_eq!(envelope["record"]["$type"], "app.bsky.feed.post");
    assert_eq!(envelope["record"]["text"], "Hello world");
    let created_at = envelope["record"]["createdAt"].as_str().unwrap();
    assert!(created_at.ends_with(".000Z"), "got {}", created_at);
    // No facets, langs, or embed on a plain text post
    assert!(envelope["record"].get("facets").is_none());
    assert!(envelope["record"].get("langs").is_none());
    assert!(envelope["record"].get("embed").is_none());
}

#[test]
fn test_unreachable_pds_exits_with_operation_failure() {
    let dir = TempDir::new().unwrap();
    // Bind and drop to find a port with no listener
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config_path = write_config(&dir, &format!("http://127.0.0.1:{}", port));

    let mut cmd = Command::cargo_bin("sky-post").unwrap();
    cmd.env("SKYCAST_CONFIG", config_path)
        .arg("Hello")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("createSession"));
}
