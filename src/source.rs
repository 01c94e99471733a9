//! Where an appcast comes from: a local `file://` path or an HTTP(S) endpoint.
use futures::StreamExt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default limit for a downloaded appcast body.
pub const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

const FILE_PREFIX: &str = "file://";

/// Errors that can occur while obtaining appcast bytes.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The location is neither `file://` nor `http(s)://`.
    #[error("Unsupported feed location scheme: {0} (only file, http and https allowed)")]
    UnsupportedScheme(String),
    /// The location could not be parsed as a URL.
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The local feed file could not be opened or read.
    #[error("Failed to read feed file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Limits applied when downloading a remote appcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub max_bytes: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_bytes: MAX_FEED_SIZE,
        }
    }
}

/// Location of an appcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    /// `file://<path>`, handy for testing a feed before publishing it.
    File(PathBuf),
    /// `http://` or `https://` URL.
    Http(Url),
}

impl FeedSource {
    /// Parses a feed location.
    ///
    /// Everything after `file://` is taken as a filesystem path, so both
    /// `file:///srv/appcast.xml` and `file://appcast.xml` work.
    ///
    /// # Examples
    ///
    /// ```
    /// use appcast::FeedSource;
    ///
    /// assert!(matches!(FeedSource::parse("file:///tmp/appcast.xml"), Ok(FeedSource::File(_))));
    /// assert!(matches!(FeedSource::parse("https://example.com/appcast.xml"), Ok(FeedSource::Http(_))));
    /// assert!(FeedSource::parse("ftp://example.com/appcast.xml").is_err());
    /// ```
    pub fn parse(location: &str) -> Result<Self, SourceError> {
        let location = location.trim();
        if let Some(path) = location.strip_prefix(FILE_PREFIX) {
            return Ok(Self::File(PathBuf::from(path)));
        }

        let url = Url::parse(location)?;
        match url.scheme() {
            "http" | "https" => Ok(Self::Http(url)),
            scheme => Err(SourceError::UnsupportedScheme(scheme.to_owned())),
        }
    }
}

impl std::fmt::Display for FeedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}{}", FILE_PREFIX, path.display()),
            Self::Http(url) => write!(f, "{}", url),
        }
    }
}

/// Opens a local appcast for streaming.
pub fn open_file(path: &Path) -> Result<BufReader<File>, SourceError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Downloads a remote appcast.
///
/// # Errors
///
/// - [`SourceError::Network`] - Connection or TLS errors
/// - [`SourceError::Timeout`] - Request exceeded `options.timeout`
/// - [`SourceError::HttpStatus`] - Non-2xx HTTP response
/// - [`SourceError::ResponseTooLarge`] - Body exceeded `options.max_bytes`
/// - [`SourceError::IncompleteResponse`] - Body shorter than Content-Length
pub async fn fetch_http(
    client: &reqwest::Client,
    url: &Url,
    options: FetchOptions,
) -> Result<Vec<u8>, SourceError> {
    let response = tokio::time::timeout(options.timeout, client.get(url.clone()).send())
        .await
        .map_err(|_| SourceError::Timeout)?
        .map_err(SourceError::Network)?;

    if !response.status().is_success() {
        return Err(SourceError::HttpStatus(response.status().as_u16()));
    }

    let bytes = tokio::time::timeout(
        options.timeout,
        read_limited_bytes(response, options.max_bytes),
    )
    .await
    .map_err(|_| SourceError::Timeout)??;

    tracing::debug!(feed = %url, bytes = bytes.len(), "Downloaded appcast");
    Ok(bytes)
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, SourceError> {
    // Capture Content-Length for completeness check
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(SourceError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(SourceError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(SourceError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(SourceError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_file_locations() {
        assert_eq!(
            FeedSource::parse("file:///srv/appcast.xml").unwrap(),
            FeedSource::File(PathBuf::from("/srv/appcast.xml"))
        );
        assert_eq!(
            FeedSource::parse("file://appcast.xml").unwrap(),
            FeedSource::File(PathBuf::from("appcast.xml"))
        );
    }

    #[test]
    fn test_parse_http_locations() {
        let source = FeedSource::parse(" https://example.com/appcast.xml ").unwrap();
        match &source {
            FeedSource::Http(url) => assert_eq!(url.host_str(), Some("example.com")),
            other => panic!("Expected Http source, got {:?}", other),
        }
        assert_eq!(source.to_string(), "https://example.com/appcast.xml");
        assert!(FeedSource::parse("http://127.0.0.1:8080/appcast.xml").is_ok());
    }

    #[test]
    fn test_parse_rejects_other_schemes() {
        assert!(matches!(
            FeedSource::parse("ftp://example.com/appcast.xml"),
            Err(SourceError::UnsupportedScheme(s)) if s == "ftp"
        ));
        assert!(matches!(
            FeedSource::parse("not a url"),
            Err(SourceError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_open_missing_file() {
        let err = open_file(Path::new("/tmp/appcast_test_missing_feed.xml")).unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
        assert!(err.to_string().contains("appcast_test_missing_feed.xml"));
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/appcast.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<rss></rss>"))
            .mount(&mock_server)
            .await;

        let url = Url::parse(&format!("{}/appcast.xml", mock_server.uri())).unwrap();
        let bytes = fetch_http(&reqwest::Client::new(), &url, FetchOptions::default())
            .await
            .unwrap();
        assert_eq!(bytes, b"<rss></rss>");
    }

    #[tokio::test]
    async fn test_fetch_404_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let url = Url::parse(&format!("{}/appcast.xml", mock_server.uri())).unwrap();
        let result = fetch_http(&reqwest::Client::new(), &url, FetchOptions::default()).await;
        match result.unwrap_err() {
            SourceError::HttpStatus(404) => {}
            e => panic!("Expected HttpStatus(404), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_fetch_server_error_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&mock_server)
            .await;

        let url = Url::parse(&format!("{}/appcast.xml", mock_server.uri())).unwrap();
        let result = fetch_http(&reqwest::Client::new(), &url, FetchOptions::default()).await;
        assert!(matches!(result, Err(SourceError::HttpStatus(503))));
    }

    #[tokio::test]
    async fn test_fetch_too_large() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(2048)))
            .mount(&mock_server)
            .await;

        let url = Url::parse(&format!("{}/appcast.xml", mock_server.uri())).unwrap();
        let options = FetchOptions {
            max_bytes: 1024,
            ..FetchOptions::default()
        };
        let result = fetch_http(&reqwest::Client::new(), &url, options).await;
        assert!(matches!(result, Err(SourceError::ResponseTooLarge)));
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<rss></rss>")
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&mock_server)
            .await;

        let url = Url::parse(&format!("{}/appcast.xml", mock_server.uri())).unwrap();
        let options = FetchOptions {
            timeout: Duration::from_millis(100),
            ..FetchOptions::default()
        };
        let result = fetch_http(&reqwest::Client::new(), &url, options).await;
        assert!(matches!(result, Err(SourceError::Timeout)));
    }
}
