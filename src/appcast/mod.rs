//! Appcast resolution engine.
//!
//! An appcast is an RSS feed whose items describe application releases,
//! with Sparkle's `sparkle:` attributes on each `<enclosure>`:
//!
//! ```xml
//! <item>
//!   <sparkle:releaseNotesLink>https://example.com/notes/2.0.html</sparkle:releaseNotesLink>
//!   <enclosure url="https://example.com/app-2.0.msi"
//!              sparkle:version="2.0.0"
//!              sparkle:dsaSignature="MC0CFQ..."/>
//!   <enclosure url="https://example.com/app-1.9-to-2.0.msp"
//!              sparkle:version="2.0.0"
//!              sparkle:deltaFrom="1.9.0"/>
//! </item>
//! ```
//!
//! # Architecture
//!
//! - [`parser`] - forward-only extraction of [`AppcastItem`]s with `quick-xml`
//! - [`release`] - enclosure eligibility and latest-release selection
//! - [`version`] - dotted numeric versions with integer ordering
//!
//! The two halves meet at an iterator: [`AppcastReader`] yields items one at a
//! time and [`resolve`] folds them into a single best candidate, so the feed
//! is never held in memory as a whole.

pub mod parser;
pub mod release;
pub mod version;

pub use parser::{
    AppcastItem, AppcastReader, Enclosure, FeedParseError, MAX_ENCLOSURES_PER_ITEM, MAX_FEED_DEPTH,
};
pub use release::{
    resolve, select_latest, ItemVersionError, LatestRelease, ReleaseItem, ResolvedRelease,
};
pub use version::{Version, VersionError};
