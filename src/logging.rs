use std::{
    fs, io,
    path::{Path, PathBuf},
};

use log::{LevelFilter, SetLoggerError};
use simplelog::{
    ColorChoice, ConfigBuilder, LevelPadding, TermLogger, TerminalMode, ThreadLogMode, WriteLogger,
};
use thiserror::Error;

/// Used when the configured log file can't be opened.
pub const FALLBACK_LOG_FILE: &str = "tmp.install-go.log";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to initialize logging: {0}")]
    InitLogging(#[from] SetLoggerError),
}

/// Where log output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stdout,
    File(PathBuf),
}

impl LogTarget {
    /// `STDOUT` (in any case) and the empty string select the terminal, anything else is a path.
    pub fn from_setting(setting: &str) -> Self {
        let setting = setting.trim();
        if setting.is_empty() || setting.eq_ignore_ascii_case("stdout") {
            LogTarget::Stdout
        } else {
            LogTarget::File(PathBuf::from(setting))
        }
    }
}

/// Opens the log file at `path` for appending, creating it if needed.
fn open_log_file(path: &Path) -> io::Result<fs::File> {
    let mut options = fs::OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

/// Opens `path`, falling back to `fallback` if that fails. Returns the file and the path that
/// was actually opened, or `None` if neither could be opened.
pub fn open_with_fallback(path: &Path, fallback: &Path) -> Option<(fs::File, PathBuf)> {
    match open_log_file(path) {
        Ok(file) => Some((file, path.to_path_buf())),
        Err(e) => {
            eprintln!(
                "Failed to open log file {}: {}, trying {}",
                path.display(),
                e,
                fallback.display()
            );
            match open_log_file(fallback) {
                Ok(file) => Some((file, fallback.to_path_buf())),
                Err(e) => {
                    eprintln!(
                        "Failed to open log file {}: {}, logging to the terminal",
                        fallback.display(),
                        e
                    );
                    None
                }
            }
        }
    }
}

/// Initializes the logging library. The current implementation uses `simplelog` and logs either
/// to standard output or to a single file, never both. Can only be called once per process.
///
/// # Arguments
///
/// * `target` - Where to write the logs.
/// * `min_level` - The minimum level to log.
///
/// returns: the log file that was opened, if any.
pub fn init_logging(
    target: &LogTarget,
    min_level: LevelFilter,
) -> Result<Option<PathBuf>, LoggingError> {
    let config = ConfigBuilder::new()
        .add_filter_allow_str("install_go")
        .set_time_offset_to_local()
        .unwrap_or_else(|c| {
            eprintln!("Failed to determine local time offset, using UTC");
            c
        })
        .set_level_padding(LevelPadding::Right)
        .set_thread_mode(ThreadLogMode::Both)
        .set_target_level(LevelFilter::Error)
        .set_thread_level(LevelFilter::Off)
        .build();

    let opened = match target {
        LogTarget::Stdout => None,
        LogTarget::File(path) => {
            open_with_fallback(path, &PathBuf::from(".").join(FALLBACK_LOG_FILE))
        }
    };
    match opened {
        Some((file, path)) => {
            WriteLogger::init(min_level, config, file)?;
            Ok(Some(path))
        }
        None => {
            TermLogger::init(min_level, config, TerminalMode::Stdout, ColorChoice::Auto)?;
            Ok(None)
        }
    }
}
