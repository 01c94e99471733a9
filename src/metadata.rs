//! Build metadata of the running application.
//!
//! The updater needs the application name and installed version. Rust binaries
//! carry these as Cargo package variables resolved at compile time, so the
//! [`package_metadata!`](crate::package_metadata) macro reads them in the
//! *calling* crate rather than in this one.

/// Descriptive strings of the installed application.
pub trait BuildMetadata {
    fn application_name(&self) -> &str;

    /// Dotted version of the running build, e.g. `1.4.2`.
    fn installed_version(&self) -> &str;

    fn company(&self) -> Option<&str> {
        None
    }

    fn description(&self) -> Option<&str> {
        None
    }

    fn copyright(&self) -> Option<&str> {
        None
    }

    fn product(&self) -> Option<&str> {
        None
    }

    fn title(&self) -> Option<&str> {
        None
    }
}

/// Metadata captured from `CARGO_PKG_*` variables.
///
/// Build it with [`package_metadata!`](crate::package_metadata).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageMetadata {
    pub name: &'static str,
    pub version: &'static str,
    pub authors: &'static str,
    pub description: &'static str,
    /// SPDX license expression. Cargo has no copyright notice, so
    /// [`BuildMetadata::copyright`] stays `None`.
    pub license: &'static str,
}

impl BuildMetadata for PackageMetadata {
    fn application_name(&self) -> &str {
        self.name
    }

    fn installed_version(&self) -> &str {
        self.version
    }

    fn company(&self) -> Option<&str> {
        non_empty(self.authors)
    }

    fn description(&self) -> Option<&str> {
        non_empty(self.description)
    }

    fn product(&self) -> Option<&str> {
        Some(self.name)
    }

    fn title(&self) -> Option<&str> {
        Some(self.name)
    }
}

fn non_empty(value: &str) -> Option<&str> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Captures the calling crate's package metadata as a [`PackageMetadata`].
///
/// ```
/// let metadata = appcast::package_metadata!();
/// assert!(!metadata.version.is_empty());
/// ```
#[macro_export]
macro_rules! package_metadata {
    () => {
        $crate::metadata::PackageMetadata {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            authors: env!("CARGO_PKG_AUTHORS"),
            description: env!("CARGO_PKG_DESCRIPTION"),
            license: env!("CARGO_PKG_LICENSE"),
        }
    };
}

/// Metadata supplied explicitly, e.g. from configuration or the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticMetadata {
    pub application_name: String,
    pub installed_version: String,
    pub company: Option<String>,
}

impl StaticMetadata {
    pub fn new(application_name: impl Into<String>, installed_version: impl Into<String>) -> Self {
        Self {
            application_name: application_name.into(),
            installed_version: installed_version.into(),
            company: None,
        }
    }
}

impl BuildMetadata for StaticMetadata {
    fn application_name(&self) -> &str {
        &self.application_name
    }

    fn installed_version(&self) -> &str {
        &self.installed_version
    }

    fn company(&self) -> Option<&str> {
        self.company.as_deref()
    }
}
