//! End-to-end update checks through [`Updater`], against a mock HTTP server
//! and against local `file://` appcasts.

use appcast::{FeedSource, FetchOptions, SourceError, StaticMetadata, UpdateError, Updater};
use std::path::PathBuf;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const APPCAST: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<rss version="2.0" xmlns:sparkle="http://www.andymatuschak.org/xml-namespaces/sparkle">
  <channel>
    <title>Example</title>
    <item>
      <title>Version 1.1.0</title>
      <enclosure url="https://downloads.example.com/app-1.1.0.msi" sparkle:version="1.1.0"/>
    </item>
    <item>
      <title>Version 2.0.0</title>
      <sparkle:releaseNotesLink>https://example.com/notes/2.0.0.html</sparkle:releaseNotesLink>
      <enclosure url="https://downloads.example.com/app-2.0.0.msi" sparkle:version="2.0.0" sparkle:dsaSignature="MC0CFQCm"/>
    </item>
  </channel>
</rss>"#;

async fn mock_appcast(body: &str) -> MockServer {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/appcast.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("Content-Type", "application/rss+xml"),
        )
        .mount(&mock_server)
        .await;
    mock_server
}

fn http_source(server: &MockServer) -> FeedSource {
    FeedSource::parse(&format!("{}/appcast.xml", server.uri())).unwrap()
}

fn write_feed(name: &str, content: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(name);
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("appcast.xml");
    std::fs::write(&path, content).unwrap();
    path
}

#[tokio::test]
async fn test_http_update_available() {
    let server = mock_appcast(APPCAST).await;
    let updater = Updater::new(http_source(&server), StaticMetadata::new("Example", "1.0.0.12"));

    let release = updater.check_for_update().await.unwrap().unwrap();
    assert_eq!(release.version(), "2.0.0");
    assert_eq!(
        release.download_link(),
        "https://downloads.example.com/app-2.0.0.msi"
    );
    assert_eq!(release.signature(), Some("MC0CFQCm"));
    assert_eq!(
        release.release_notes_link(),
        Some("https://example.com/notes/2.0.0.html")
    );
    assert_eq!(release.app_name, "Example");
    assert_eq!(release.installed_version.to_string(), "1.0.0.12");
}

#[tokio::test]
async fn test_http_up_to_date() {
    let server = mock_appcast(APPCAST).await;
    let updater = Updater::new(http_source(&server), StaticMetadata::new("Example", "2.0"));

    assert!(updater.check_for_update().await.unwrap().is_none());
}

#[tokio::test]
async fn test_http_malformed_feed_parse_error() {
    let server = mock_appcast("<not valid xml").await;
    let updater = Updater::new(http_source(&server), StaticMetadata::new("Example", "1.0"));

    match updater.check_for_update().await.unwrap_err() {
        UpdateError::Parse(_) => {}
        e => panic!("Expected Parse error, got {:?}", e),
    }
}

#[tokio::test]
async fn test_http_404_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let updater = Updater::new(http_source(&server), StaticMetadata::new("Example", "1.0"));

    match updater.check_for_update().await.unwrap_err() {
        UpdateError::Source(SourceError::HttpStatus(404)) => {}
        e => panic!("Expected HttpStatus(404), got {:?}", e),
    }
}

#[tokio::test]
async fn test_http_size_limit_applies() {
    let server = mock_appcast(APPCAST).await;
    let updater = Updater::new(http_source(&server), StaticMetadata::new("Example", "1.0"))
        .with_options(FetchOptions {
            max_bytes: 64,
            ..FetchOptions::default()
        });

    assert!(matches!(
        updater.check_for_update().await,
        Err(UpdateError::Source(SourceError::ResponseTooLarge))
    ));
}

#[tokio::test]
async fn test_file_update_available() {
    let path = write_feed("appcast_update_check_file", APPCAST);
    let source = FeedSource::parse(&format!("file://{}", path.display())).unwrap();
    let updater = Updater::new(source, StaticMetadata::new("Example", "1.1.0"));

    let release = updater.check_for_update().await.unwrap().unwrap();
    assert_eq!(release.version(), "2.0.0");

    std::fs::remove_file(&path).ok();
}

#[tokio::test]
async fn test_file_empty_feed() {
    let path = write_feed(
        "appcast_update_check_empty",
        r#"<?xml version="1.0"?><rss version="2.0"><channel></channel></rss>"#,
    );
    let updater = Updater::new(
        FeedSource::File(path.clone()),
        StaticMetadata::new("Example", "1.0"),
    );

    assert!(updater.check_for_update().await.unwrap().is_none());

    std::fs::remove_file(&path).ok();
}

#[tokio::test]
async fn test_package_metadata_drives_check() {
    // This crate's own version is far below 99.0.0
    let server = mock_appcast(
        r#"<rss><channel><item><enclosure url="https://x/99.msi" sparkle:version="99.0.0"/></item></channel></rss>"#,
    )
    .await;
    let updater = Updater::new(http_source(&server), appcast::package_metadata!());

    let release = updater.check_for_update().await.unwrap().unwrap();
    assert_eq!(release.app_name, "appcast");
    assert_eq!(release.version(), "99.0.0");
}
