use std::path::Path;

use getset::Getters;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::util::async_create_dir_if_not_exists;

use self::go_version::{strip_go_prefix, GoVersion};

pub mod go_version;
pub mod tar_file;

const RELEASE_INDEX_URL: &str = "https://go.dev/dl/?mode=json&include=all";

/// The file name the release index is cached under.
pub const RELEASE_INDEX_FILE: &str = "releases.json";

#[derive(Debug, thiserror::Error)]
pub enum ReleaseIndexError {
    #[error("Failed to download release index: {0}")]
    DownloadError(#[from] reqwest::Error),
    #[error("Failed to parse release index: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Failed to read or write release index: {0}")]
    ReadWriteError(#[from] std::io::Error),
    #[error("No release matches {0}")]
    NoMatchingRelease(String),
}

/// Every Go release published on go.dev, newest first (in the order go.dev lists them).
#[derive(Debug, Clone, Default, Deserialize, Serialize, Getters)]
#[serde(transparent)]
#[get = "pub"]
pub struct ReleaseIndex {
    versions: Vec<GoVersion>,
}

impl ReleaseIndex {
    pub fn new(versions: Vec<GoVersion>) -> Self {
        Self { versions }
    }

    /// Loads the release index cached at `path`. This will not download the index if it does
    /// not exist, use `refresh` to do that.
    pub async fn load(path: &Path) -> Result<ReleaseIndex, ReleaseIndexError> {
        debug!("Loading release index from {}", path.display());
        let index_string = tokio::fs::read_to_string(path).await?;
        ReleaseIndex::try_from(index_string)
    }

    /// Downloads the release index from go.dev and saves it to `path`. This will overwrite any
    /// existing index, hence the name "refresh".
    ///
    /// # Errors
    ///
    /// This function will return an error if the index could not be downloaded, parsed, or
    /// written to disk.
    pub async fn refresh(path: &Path) -> Result<ReleaseIndex, ReleaseIndexError> {
        debug!("Downloading release index from {RELEASE_INDEX_URL}");
        let index_bytes = reqwest::get(RELEASE_INDEX_URL)
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        // parse before writing so a broken response never replaces a good cache
        let index = serde_json::from_slice::<ReleaseIndex>(&index_bytes)?;
        if let Some(parent) = path.parent() {
            async_create_dir_if_not_exists(parent).await?;
        }
        debug!("Writing release index to {}", path.display());
        tokio::fs::write(path, index_bytes).await?;
        Ok(index)
    }

    /// Uses the cached index unless `force_refresh` is set or the cache is missing or broken.
    pub async fn load_or_refresh(
        path: &Path,
        force_refresh: bool,
    ) -> Result<ReleaseIndex, ReleaseIndexError> {
        if !force_refresh {
            match ReleaseIndex::load(path).await {
                Ok(index) => return Ok(index),
                Err(ReleaseIndexError::ReadWriteError(e))
                    if e.kind() == std::io::ErrorKind::NotFound =>
                {
                    debug!("No cached release index at {}", path.display());
                }
                Err(e) => warn!("Ignoring cached release index: {e}"),
            }
        }
        ReleaseIndex::refresh(path).await
    }

    /// The newest dotted stable release.
    pub fn latest_stable(&self) -> Option<&GoVersion> {
        self.newest(GoVersion::is_latest)
    }

    /// The newest release candidate.
    pub fn latest_rc(&self) -> Option<&GoVersion> {
        self.newest(GoVersion::is_rc)
    }

    /// Finds a release by its version, with or without the `go` prefix.
    pub fn find(&self, version: &str) -> Option<&GoVersion> {
        let wanted = strip_go_prefix(version);
        self.versions.iter().find(|v| v.number() == wanted)
    }

    fn newest(&self, filter: fn(&GoVersion) -> bool) -> Option<&GoVersion> {
        self.versions
            .iter()
            .filter(|v| filter(v))
            .filter_map(|v| v.sort_key().map(|key| (key, v)))
            .max_by_key(|(key, _)| *key)
            .map(|(_, v)| v)
    }
}

impl TryFrom<&str> for ReleaseIndex {
    type Error = ReleaseIndexError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let index = serde_json::from_str::<ReleaseIndex>(value)?;
        Ok(index)
    }
}

impl TryFrom<String> for ReleaseIndex {
    type Error = ReleaseIndexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}
