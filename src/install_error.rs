use std::{error, fmt, io};

use crate::{
    app::BackupError, config::ConfigError, installer::InstallError, logging::LoggingError,
    release::ReleaseIndexError,
};

/// An error wrapper type used across the entire crate, usually where multiple error types are
/// returned.
#[derive(Debug)]
pub enum InstallGoError {
    IoError(io::Error),
    ConfigError(ConfigError),
    LoggingError(LoggingError),
    ReleaseIndexError(ReleaseIndexError),
    BackupError(BackupError),
    InstallError(InstallError),
    /// Raised when the workspace directory (GODIR) cannot be created.
    Workspace(std::path::PathBuf, io::Error),
}

pub type Result<T> = std::result::Result<T, InstallGoError>;

impl fmt::Display for InstallGoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallGoError::IoError(e) => write!(f, "IO error: {}", e),
            InstallGoError::ConfigError(e) => write!(f, "Configuration error: {}", e),
            InstallGoError::LoggingError(e) => write!(f, "Logging error: {}", e),
            InstallGoError::ReleaseIndexError(e) => write!(f, "Release index error: {}", e),
            InstallGoError::BackupError(e) => write!(f, "Backup error: {}", e),
            InstallGoError::InstallError(e) => write!(f, "{}", e),
            InstallGoError::Workspace(path, e) => write!(
                f,
                "Failed to prepare workspace at '{}': {}",
                path.display(),
                e
            ),
        }
    }
}

impl error::Error for InstallGoError {}

impl From<io::Error> for InstallGoError {
    fn from(e: io::Error) -> Self {
        InstallGoError::IoError(e)
    }
}

impl From<ConfigError> for InstallGoError {
    fn from(e: ConfigError) -> Self {
        InstallGoError::ConfigError(e)
    }
}

impl From<LoggingError> for InstallGoError {
    fn from(e: LoggingError) -> Self {
        InstallGoError::LoggingError(e)
    }
}

impl From<ReleaseIndexError> for InstallGoError {
    fn from(e: ReleaseIndexError) -> Self {
        InstallGoError::ReleaseIndexError(e)
    }
}

impl From<BackupError> for InstallGoError {
    fn from(e: BackupError) -> Self {
        InstallGoError::BackupError(e)
    }
}

impl From<InstallError> for InstallGoError {
    fn from(e: InstallError) -> Self {
        InstallGoError::InstallError(e)
    }
}
