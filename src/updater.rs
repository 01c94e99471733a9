//! One-call update check: fetch the appcast, resolve it against the installed build.
use std::io::Cursor;
use thiserror::Error;

use crate::appcast::{resolve, FeedParseError, ResolvedRelease, Version, VersionError};
use crate::metadata::BuildMetadata;
use crate::source::{fetch_http, open_file, FeedSource, FetchOptions, SourceError};

/// Errors that can occur during an update check.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// The installed version reported by the build metadata is not a dotted version.
    #[error("Invalid installed version '{version}': {source}")]
    InstalledVersion {
        version: String,
        #[source]
        source: VersionError,
    },
    /// The appcast could not be obtained.
    #[error(transparent)]
    Source(#[from] SourceError),
    /// The appcast is not well-formed XML.
    #[error("Failed to parse appcast: {0}")]
    Parse(#[from] FeedParseError),
    /// The blocking task reading a local appcast panicked or was cancelled.
    #[error("Appcast reader task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Checks an appcast for releases newer than the running build.
pub struct Updater<M> {
    source: FeedSource,
    metadata: M,
    client: reqwest::Client,
    options: FetchOptions,
}

impl<M: BuildMetadata> Updater<M> {
    pub fn new(source: FeedSource, metadata: M) -> Self {
        Self {
            source,
            metadata,
            client: reqwest::Client::new(),
            options: FetchOptions::default(),
        }
    }

    /// Uses a caller-configured HTTP client (proxies, user agent, ...).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn source(&self) -> &FeedSource {
        &self.source
    }

    pub fn metadata(&self) -> &M {
        &self.metadata
    }

    /// Returns the release to update to, or `None` when up to date.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError`] if the installed version is invalid, the feed
    /// cannot be fetched, or the feed is malformed.
    pub async fn check_for_update(&self) -> Result<Option<ResolvedRelease>, UpdateError> {
        let raw_version = self.metadata.installed_version();
        let installed: Version =
            raw_version
                .parse()
                .map_err(|source| UpdateError::InstalledVersion {
                    version: raw_version.to_string(),
                    source,
                })?;
        let app_name = self.metadata.application_name().to_string();

        tracing::debug!(
            feed = %self.source,
            app = %app_name,
            installed = %installed,
            "Checking for updates"
        );

        match &self.source {
            FeedSource::File(path) => {
                // Opening and reading both block, so neither runs on the executor
                let path = path.clone();
                tokio::task::spawn_blocking(move || -> Result<_, UpdateError> {
                    let reader = open_file(&path)?;
                    Ok(resolve(reader, &installed, &app_name)?)
                })
                .await?
            }
            FeedSource::Http(url) => {
                let bytes = fetch_http(&self.client, url, self.options).await?;
                Ok(resolve(Cursor::new(bytes), &installed, &app_name)?)
            }
        }
    }
}
