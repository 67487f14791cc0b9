use getset::Getters;
use serde::{Deserialize, Serialize};

/// Base URL every Go release file is served from.
pub const DOWNLOAD_BASE_URL: &str = "https://go.dev/dl";

/// One downloadable file of a Go release (an archive, an installer or the source tarball).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Getters)]
#[get = "pub"]
pub struct GoTarFile {
    /// The file name (e.g., `go1.22.5.linux-amd64.tar.gz`)
    filename: String,
    /// The target OS, empty for the source archive
    os: String,
    /// The target architecture, empty for the source archive
    arch: String,
    /// The release this file belongs to (e.g., `go1.22.5`)
    version: String,
    /// Hex encoded SHA-256 of the file
    #[serde(rename = "sha256")]
    checksum: String,
    /// Size in bytes
    size: u64,
    /// `archive`, `installer` or `source`
    kind: String,
}

impl GoTarFile {
    pub fn new(
        filename: impl Into<String>,
        os: impl Into<String>,
        arch: impl Into<String>,
        version: impl Into<String>,
        checksum: impl Into<String>,
        size: u64,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            os: os.into(),
            arch: arch.into(),
            version: version.into(),
            checksum: checksum.into(),
            size,
            kind: kind.into(),
        }
    }

    /// The source tarball is the only file without a platform.
    pub fn is_source(&self) -> bool {
        self.os.is_empty() && self.arch.is_empty()
    }

    /// Whether this is the `.tar.gz` archive for the given platform.
    pub fn is_archive_for(&self, goos: &str, goarch: &str) -> bool {
        self.kind == "archive"
            && self.os == goos
            && self.arch == goarch
            && self.filename.ends_with(".tar.gz")
    }

    pub fn download_url(&self) -> String {
        format!("{DOWNLOAD_BASE_URL}/{}", self.filename)
    }
}
