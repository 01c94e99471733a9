use serde::Serialize;
use std::io::BufRead;
use thiserror::Error;

use super::parser::{AppcastItem, AppcastReader, Enclosure, FeedParseError};
use super::version::{Version, VersionError};

/// Why a single item was left out of the comparison.
///
/// Never returned to callers of [`resolve`]; skipped items are only logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemVersionError {
    /// The selected enclosure has no `sparkle:version`.
    #[error("Item {position} has no version")]
    Missing { position: usize },
    /// The version string is not a dotted-integer version.
    #[error("Item {position} has an invalid version: {source}")]
    Invalid {
        position: usize,
        #[source]
        source: VersionError,
    },
}

/// A release candidate: an appcast item reduced to its selected enclosure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseItem {
    /// Version string as written in the feed.
    pub version: String,
    pub download_link: String,
    /// DSA signature of the download, passed through for a downstream verifier.
    pub signature: Option<String>,
    pub release_notes_link: Option<String>,
    /// Zero-based index of the item in the feed.
    #[serde(skip)]
    pub position: usize,
}

impl ReleaseItem {
    pub fn parsed_version(&self) -> Result<Version, ItemVersionError> {
        self.version
            .parse()
            .map_err(|source| ItemVersionError::Invalid {
                position: self.position,
                source,
            })
    }
}

/// The release a caller should update to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedRelease {
    #[serde(flatten)]
    pub release: ReleaseItem,
    pub app_name: String,
    pub installed_version: Version,
}

impl ResolvedRelease {
    pub fn version(&self) -> &str {
        &self.release.version
    }

    pub fn download_link(&self) -> &str {
        &self.release.download_link
    }

    pub fn signature(&self) -> Option<&str> {
        self.release.signature.as_deref()
    }

    pub fn release_notes_link(&self) -> Option<&str> {
        self.release.release_notes_link.as_deref()
    }
}

impl Enclosure {
    /// Full installers are always eligible. A delta is eligible only when its
    /// `deltaFrom` names the installed build (first three segments).
    pub fn is_eligible_for(&self, installed: &Version) -> bool {
        let Some(delta_from) = self.delta_from.as_deref() else {
            return true;
        };

        match delta_from.parse::<Version>() {
            Ok(source) => source.is_delta_source_of(installed),
            Err(e) => {
                tracing::debug!(delta_from = %delta_from, error = %e, "Ignoring delta with unparseable source version");
                false
            }
        }
    }
}

impl AppcastItem {
    /// Reduces the item to its first eligible enclosure.
    ///
    /// Returns `None` if no enclosure is eligible or the eligible one has no URL.
    pub fn select(self, installed: &Version) -> Option<ReleaseItem> {
        let AppcastItem {
            position,
            enclosures,
            release_notes_link,
        } = self;

        let enclosure = enclosures
            .into_iter()
            .find(|enclosure| enclosure.is_eligible_for(installed))?;

        let Some(download_link) = enclosure.url.filter(|url| !url.is_empty()) else {
            tracing::warn!(position = position, "Skipping appcast item whose enclosure has no url");
            return None;
        };

        Some(ReleaseItem {
            version: enclosure.version.unwrap_or_default(),
            download_link,
            signature: enclosure.dsa_signature,
            release_notes_link,
            position,
        })
    }
}

/// Running "best so far" over release candidates in document order.
///
/// A candidate replaces the current best only if its version is strictly
/// greater, so among equal versions the first one seen is kept.
#[derive(Debug, Default)]
pub struct LatestRelease {
    best: Option<(Version, ReleaseItem)>,
}

impl LatestRelease {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offers a candidate. Candidates without a usable version are rejected
    /// with the reason and leave the current best untouched.
    pub fn offer(&mut self, item: ReleaseItem) -> Result<(), ItemVersionError> {
        if item.version.trim().is_empty() {
            return Err(ItemVersionError::Missing {
                position: item.position,
            });
        }
        let version = item.parsed_version()?;

        let replace = match &self.best {
            None => true,
            Some((best, _)) => version > *best,
        };
        if replace {
            self.best = Some((version, item));
        }
        Ok(())
    }

    pub fn best(&self) -> Option<(&Version, &ReleaseItem)> {
        self.best.as_ref().map(|(version, item)| (version, item))
    }

    pub fn into_inner(self) -> Option<(Version, ReleaseItem)> {
        self.best
    }
}

/// Picks the latest release among `items`, skipping unusable ones.
pub fn select_latest<I>(items: I) -> Option<ReleaseItem>
where
    I: IntoIterator<Item = ReleaseItem>,
{
    let mut latest = LatestRelease::new();
    for item in items {
        if let Err(e) = latest.offer(item) {
            tracing::warn!(error = %e, "Skipping appcast item");
        }
    }
    latest.into_inner().map(|(_, item)| item)
}

/// Reads an appcast and returns the release to update to, if any.
///
/// Items are reduced as they are read, so memory use does not grow with the
/// feed. `Ok(None)` means no release in the feed is newer than `installed`
/// (including the case of a feed without usable items).
///
/// # Errors
///
/// Returns [`FeedParseError`] if the document is not well-formed. No partial
/// result is returned in that case.
///
/// # Example
///
/// ```
/// use appcast::{resolve, Version};
///
/// let feed = r#"<rss><channel><item>
///     <enclosure sparkle:version="2.0.0" url="https://x/y.pkg"/>
/// </item></channel></rss>"#;
///
/// let installed: Version = "1.0.0".parse().unwrap();
/// let release = resolve(feed.as_bytes(), &installed, "Example").unwrap().unwrap();
/// assert_eq!(release.version(), "2.0.0");
/// assert_eq!(release.download_link(), "https://x/y.pkg");
/// ```
pub fn resolve<R: BufRead>(
    source: R,
    installed: &Version,
    app_name: &str,
) -> Result<Option<ResolvedRelease>, FeedParseError> {
    let mut latest = LatestRelease::new();
    let mut seen = 0usize;

    for item in AppcastReader::with_installed(source, *installed) {
        let item = item?;
        seen += 1;
        let position = item.position;

        let Some(candidate) = item.select(installed) else {
            tracing::debug!(position = position, "No eligible enclosure in appcast item");
            continue;
        };
        if let Err(e) = latest.offer(candidate) {
            tracing::warn!(error = %e, "Skipping appcast item");
        }
    }

    let Some((version, release)) = latest.into_inner() else {
        tracing::info!(items = seen, "No usable release found in appcast");
        return Ok(None);
    };

    if version <= *installed {
        tracing::info!(
            latest = %version,
            installed = %installed,
            "Installed version is up to date"
        );
        return Ok(None);
    }

    tracing::info!(
        latest = %version,
        installed = %installed,
        url = %release.download_link,
        "Update available"
    );
    Ok(Some(ResolvedRelease {
        release,
        app_name: app_name.to_string(),
        installed_version: *installed,
    }))
}
