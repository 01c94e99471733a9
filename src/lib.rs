//! Application self-update client for Sparkle-style appcasts.
//!
//! - [`appcast`] - streaming appcast parser and release resolution
//! - [`source`] - obtaining appcast bytes from `file://` or HTTP(S)
//! - [`metadata`] - name and version of the running build
//! - [`updater`] - one-call update check combining the above
//! - [`config`] - optional TOML configuration
//!
//! # Example
//!
//! ```ignore
//! use appcast::{package_metadata, FeedSource, Updater};
//!
//! let source = FeedSource::parse("https://example.com/appcast.xml")?;
//! let updater = Updater::new(source, package_metadata!());
//! if let Some(release) = updater.check_for_update().await? {
//!     println!("{} {} is available at {}", release.app_name, release.version(), release.download_link());
//! }
//! ```

pub mod appcast;
pub mod config;
pub mod metadata;
pub mod source;
pub mod updater;

pub use appcast::{
    resolve, select_latest, AppcastItem, AppcastReader, Enclosure, FeedParseError,
    ItemVersionError, LatestRelease, ReleaseItem, ResolvedRelease, Version, VersionError,
    MAX_ENCLOSURES_PER_ITEM,
};
pub use config::{Config, ConfigError};
pub use metadata::{BuildMetadata, PackageMetadata, StaticMetadata};
pub use source::{FeedSource, FetchOptions, SourceError};
pub use updater::{UpdateError, Updater};
