use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

/// Maximum number of dotted segments a version may carry.
pub const MAX_SEGMENTS: usize = 4;

/// Number of leading segments that identify a build for delta matching.
///
/// The fourth segment is ignored by Windows Installer, so a delta built
/// from `1.2.3` applies to any installed `1.2.3.x`.
pub const DELTA_SEGMENTS: usize = 3;

/// Errors that can occur while parsing a dotted version string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// The string was empty or whitespace only.
    #[error("Version string is empty")]
    Empty,
    /// A segment between dots was empty (e.g. `1..2`, `1.2.`).
    #[error("Empty segment in version '{0}'")]
    EmptySegment(String),
    /// A segment was not an unsigned integer.
    #[error("Invalid segment '{segment}' in version '{version}'")]
    InvalidSegment { version: String, segment: String },
    /// More than [`MAX_SEGMENTS`] segments.
    #[error("Version '{0}' has more than 4 segments")]
    TooManySegments(String),
}

/// A dotted numeric version such as `1.2.3.4`.
///
/// Segments compare as integers, never as strings, and missing trailing
/// segments compare as zero: `1.2 == 1.2.0`. The written segment count is
/// kept only for display.
#[derive(Debug, Clone, Copy)]
pub struct Version {
    segments: [u32; MAX_SEGMENTS],
    len: usize,
}

impl Version {
    /// Builds a version from up to four segments.
    ///
    /// Returns `None` if `segments` is empty or longer than [`MAX_SEGMENTS`].
    pub fn from_segments(segments: &[u32]) -> Option<Self> {
        if segments.is_empty() || segments.len() > MAX_SEGMENTS {
            return None;
        }
        let mut padded = [0; MAX_SEGMENTS];
        padded[..segments.len()].copy_from_slice(segments);
        Some(Self {
            segments: padded,
            len: segments.len(),
        })
    }

    /// The segments as written, without zero padding.
    pub fn segments(&self) -> &[u32] {
        &self.segments[..self.len]
    }

    pub fn major(&self) -> u32 {
        self.segments[0]
    }

    pub fn minor(&self) -> u32 {
        self.segments[1]
    }

    pub fn build(&self) -> u32 {
        self.segments[2]
    }

    pub fn revision(&self) -> u32 {
        self.segments[3]
    }

    /// Compares only the first `n` segments (missing segments are zero).
    pub fn cmp_prefix(&self, other: &Self, n: usize) -> Ordering {
        let n = n.min(MAX_SEGMENTS);
        self.segments[..n].cmp(&other.segments[..n])
    }

    /// Whether a delta built from `self` can be applied on top of `installed`.
    pub fn is_delta_source_of(&self, installed: &Self) -> bool {
        self.cmp_prefix(installed, DELTA_SEGMENTS) == Ordering::Equal
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(VersionError::Empty);
        }

        let mut segments = [0; MAX_SEGMENTS];
        let mut len = 0;
        for part in trimmed.split('.') {
            if len == MAX_SEGMENTS {
                return Err(VersionError::TooManySegments(trimmed.to_string()));
            }
            if part.is_empty() {
                return Err(VersionError::EmptySegment(trimmed.to_string()));
            }
            // u32::from_str accepts a leading '+', which is not a version digit
            if !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(VersionError::InvalidSegment {
                    version: trimmed.to_string(),
                    segment: part.to_string(),
                });
            }
            segments[len] = part
                .parse::<u32>()
                .map_err(|_| VersionError::InvalidSegment {
                    version: trimmed.to_string(),
                    segment: part.to_string(),
                })?;
            len += 1;
        }

        Ok(Self { segments, len })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments().iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.segments.hash(state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.segments.cmp(&other.segments)
    }
}

impl serde::Serialize for Version {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
