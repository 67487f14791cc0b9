use getset::Getters;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::tar_file::GoTarFile;

lazy_static! {
    /// `1.23rc2`
    static ref RC_REGEX: Regex = Regex::new(r"^\d{1,2}\.\d{1,2}rc\d+$").expect("valid rc regex");
    /// `1.22.5`
    static ref LATEST_REGEX: Regex =
        Regex::new(r"^\d{1,2}\.\d{1,2}\.\d+$").expect("valid release regex");
    /// Anything Go has ever published: `1.4`, `1.21.0`, `1.9beta2`, `1.23rc1`
    static ref ORDER_REGEX: Regex =
        Regex::new(r"^(\d+)\.(\d+)(?:\.(\d+))?(?:(beta|rc)(\d+))?$").expect("valid order regex");
}

/// A sortable key for a Go version: major, minor, patch, stage (beta < rc < final) and the
/// pre-release number.
pub type VersionKey = (u32, u32, u32, u8, u32);

/// A published Go release, as listed by `https://go.dev/dl/?mode=json`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Getters)]
#[get = "pub"]
pub struct GoVersion {
    /// The release name (e.g., `go1.22.5`)
    version: String,
    /// Whether Go marks this release as stable
    stable: bool,
    /// Every file of the release, one per platform plus the source archive
    files: Vec<GoTarFile>,
}

impl GoVersion {
    pub fn new(version: impl Into<String>, stable: bool, files: Vec<GoTarFile>) -> Self {
        Self {
            version: version.into(),
            stable,
            files,
        }
    }

    /// The version without its `go` prefix (e.g., `1.22.5`).
    pub fn number(&self) -> &str {
        strip_go_prefix(&self.version)
    }

    /// Whether this is a release candidate, like `go1.23rc2`.
    pub fn is_rc(&self) -> bool {
        RC_REGEX.is_match(self.number())
    }

    /// Whether this is a dotted stable release, like `go1.22.5`.
    pub fn is_latest(&self) -> bool {
        LATEST_REGEX.is_match(self.number())
    }

    /// The ordering key, or `None` when the version can't be parsed.
    pub fn sort_key(&self) -> Option<VersionKey> {
        version_key(self.number())
    }

    /// The `.tar.gz` archive for the given platform, if the release has one.
    pub fn archive_for(&self, goos: &str, goarch: &str) -> Option<&GoTarFile> {
        self.files.iter().find(|f| f.is_archive_for(goos, goarch))
    }
}

pub fn strip_go_prefix(version: &str) -> &str {
    version.strip_prefix("go").unwrap_or(version)
}

/// Parses a version number (without the `go` prefix) into a [`VersionKey`].
pub fn version_key(number: &str) -> Option<VersionKey> {
    let captures = ORDER_REGEX.captures(number)?;
    let part = |i: usize| -> Option<u32> {
        match captures.get(i) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(0),
        }
    };
    let stage = match captures.get(4).map(|m| m.as_str()) {
        Some("beta") => 0,
        Some(_) => 1,
        None => 2,
    };
    Some((part(1)?, part(2)?, part(3)?, stage, part(5)?))
}
