use std::{
    collections::BTreeSet,
    fmt::Write as _,
    fs, io,
    path::{Path, PathBuf},
};

use chrono::{Datelike, Local, NaiveDate};
use getset::{Getters, MutGetters, Setters};
use log::{debug, info};
use walkdir::WalkDir;
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

use crate::{
    config::{Config, ConfigError},
    release::{
        go_version::{strip_go_prefix, GoVersion},
        ReleaseIndex, ReleaseIndexError, RELEASE_INDEX_FILE,
    },
    util::async_create_dir_if_not_exists,
};

/// Used when neither a version nor `--latest` / `--rc` is selected.
pub const FALLBACK_VERSION: &str = "1.22.5";

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("Failed to write backup: {0}")]
    IoError(#[from] io::Error),
    #[error("Failed to write zip archive: {0}")]
    ZipError(#[from] zip::result::ZipError),
    #[error("Failed to walk workspace: {0}")]
    WalkError(#[from] walkdir::Error),
    #[error("Backup task failed: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

/// The runtime context: the resolved config and every path derived from GODIR.
#[derive(Debug, Getters, MutGetters, Setters)]
#[getset(get = "pub")]
pub struct Application {
    #[getset(get = "pub", get_mut = "pub")]
    config: Config,
    home: PathBuf,
    godir: PathBuf,
    gobin: PathBuf,
    goshims: PathBuf,
    goscripts: PathBuf,
    gopath: PathBuf,
    /// The `root` link pointing at the active installation
    goroot: PathBuf,
    /// One `go<version>` directory per installed release
    versions_dir: PathBuf,
    /// Downloaded tarballs and the cached release index
    downloads_dir: PathBuf,
    goos: String,
    goarch: String,
    #[getset(get = "pub", set = "pub")]
    backup_dir: PathBuf,
    latest_backup: Option<PathBuf>,
    latest_backup_version: Option<String>,
    #[getset(skip)]
    releases: Option<ReleaseIndex>,
}

impl Application {
    /// Builds the application from the built-in defaults, the config file (if any) and the
    /// command line, in that order of precedence.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub async fn load(
        home: PathBuf,
        cli: Config,
        config_file: Option<&Path>,
    ) -> Result<Application, ConfigError> {
        let mut config = Config::defaults(&home);
        if let Some(path) = config_file {
            debug!("Loading config from {}", path.display());
            config = config.merge(Config::try_from_path(path).await?);
        }
        Ok(Application::from_config(home, config.merge(cli)))
    }

    /// Cleans the free-text values and derives the workspace layout from GODIR.
    pub fn from_config(home: PathBuf, mut config: Config) -> Application {
        config.clean_strings();
        let godir = config.godir().clone().unwrap_or_else(|| home.join("go"));
        let goos = config.goos().clone().unwrap_or_default();
        let goarch = config.goarch().clone().unwrap_or_default();
        Application {
            gobin: godir.join("bin"),
            goshims: godir.join("shims"),
            goscripts: godir.join("scripts"),
            gopath: godir.join("path"),
            goroot: godir.join("root"),
            versions_dir: godir.join("versions"),
            downloads_dir: godir.join("downloads"),
            backup_dir: godir.join("backups"),
            latest_backup: None,
            latest_backup_version: None,
            releases: None,
            godir,
            goos,
            goarch,
            home,
            config,
        }
    }

    pub fn release_index_path(&self) -> PathBuf {
        self.downloads_dir.join(RELEASE_INDEX_FILE)
    }

    /// The release index, loaded from the cache (or go.dev) on first use.
    pub async fn releases(&mut self) -> Result<&ReleaseIndex, ReleaseIndexError> {
        let index = match self.releases.take() {
            Some(index) => index,
            None => {
                let path = self.release_index_path();
                ReleaseIndex::load_or_refresh(&path, self.config.refresh_flag()).await?
            }
        };
        let index: &ReleaseIndex = self.releases.insert(index);
        Ok(index)
    }

    /// Replaces the release index, skipping the cache and the network.
    pub fn set_releases(&mut self, index: ReleaseIndex) {
        self.releases = Some(index);
    }

    /// The version to operate on, without the `go` prefix. Only touches the release index when
    /// `--latest` or `--rc` has to be resolved.
    pub async fn version(&mut self) -> Result<String, ReleaseIndexError> {
        if self.needs_release_index() {
            self.releases().await?;
        }
        select_version(&self.config, self.releases.as_ref())
    }

    fn needs_release_index(&self) -> bool {
        self.config.version_str().is_empty()
            && (self.config.latest_flag() || self.config.latest_rc_flag())
    }

    /// The go.dev download URL of the selected version for `--os` and `--arch`.
    pub async fn version_tarball_url(&mut self) -> Result<String, ReleaseIndexError> {
        let version = self.version().await?;
        Ok(self.tarball_url(&version))
    }

    pub fn tarball_url(&self, version: &str) -> String {
        format!(
            "https://go.dev/dl/go{}.{}-{}.tar.gz",
            strip_go_prefix(version),
            self.goos,
            self.goarch
        )
    }

    /// Lists every release, with the matching `--os`/`--arch` file of each and the other
    /// platforms that could be selected instead.
    pub async fn list_versions(&mut self) -> Result<String, ReleaseIndexError> {
        let goos = self.goos.clone();
        let goarch = self.goarch.clone();
        let index = self.releases().await?;
        Ok(format_versions(index, &goos, &goarch))
    }

    /// The active version, read from where the `root` link points.
    pub fn active_version(&self) -> Option<String> {
        let target = fs::read_link(&self.goroot).ok()?;
        let name = target.file_name()?.to_str()?;
        Some(strip_go_prefix(name).to_string())
    }

    /// Writes a zip of GODIR into the backup directory and records it as the latest backup.
    ///
    /// The archive is named `backup-go-<version>-<year>-<month>-<day>.zip`, where the version is
    /// the selected one, or the active one when nothing was selected.
    pub async fn backup(&mut self) -> Result<PathBuf, BackupError> {
        let label = match self.config.version_str() {
            "" => self.active_version().unwrap_or_else(|| String::from("none")),
            version => strip_go_prefix(version).to_string(),
        };
        async_create_dir_if_not_exists(&self.backup_dir).await?;
        let file_name = backup_file_name(&label, Local::now().date_naive());
        let archive_path = self.backup_dir.join(&file_name);

        // compare resolved paths so links and relative paths can't hide the backups from the walk
        let source = dunce::canonicalize(&self.godir)?;
        let backup_dir = dunce::canonicalize(&self.backup_dir)?;
        let dest = backup_dir.join(&file_name);
        let skip = backup_dir.starts_with(&source).then_some(backup_dir);

        info!(
            "Backing up {} to {}",
            self.godir.display(),
            archive_path.display()
        );
        tokio::task::spawn_blocking(move || write_zip(&source, &dest, skip.as_deref())).await??;

        self.latest_backup = Some(archive_path.clone());
        self.latest_backup_version = Some(label);
        Ok(archive_path)
    }
}

/// Picks the version to operate on. An explicit version always wins, then `--latest`, then
/// `--rc`. Without any selection the fallback version is used.
pub fn select_version(
    config: &Config,
    index: Option<&ReleaseIndex>,
) -> Result<String, ReleaseIndexError> {
    let explicit = config.version_str();
    if !explicit.is_empty() {
        return Ok(strip_go_prefix(explicit).to_string());
    }
    type Pick = fn(&ReleaseIndex) -> Option<&GoVersion>;
    let (selection, pick): (&str, Pick) = if config.latest_flag() {
        ("the latest stable release", ReleaseIndex::latest_stable)
    } else if config.latest_rc_flag() {
        ("the latest release candidate", ReleaseIndex::latest_rc)
    } else {
        return Ok(FALLBACK_VERSION.to_string());
    };
    index
        .and_then(pick)
        .map(|v| v.number().to_string())
        .ok_or_else(|| ReleaseIndexError::NoMatchingRelease(selection.to_string()))
}

fn format_versions(index: &ReleaseIndex, goos: &str, goarch: &str) -> String {
    let mut out = String::from("Listing available versions:\n");
    let mut other_platforms = BTreeSet::new();
    for release in index.versions() {
        let v = release.number();
        let _ = writeln!(out, "--version {v}");
        for file in release.files() {
            if file.is_source() {
                continue;
            }
            if file.os() == goos && file.arch() == goarch {
                if file.is_archive_for(goos, goarch) {
                    let _ = writeln!(out, "  --version {v} --os {goos} --arch {goarch}");
                }
            } else {
                other_platforms.insert((file.os().clone(), file.arch().clone()));
            }
        }
    }
    if !other_platforms.is_empty() {
        out.push_str("\nOverride --os and --arch with these possible combinations:\n");
        for (os, arch) in other_platforms {
            let _ = writeln!(out, "  --os {os} --arch {arch}");
        }
    }
    out
}

/// `backup-go-<version>-<year>-<month>-<day>.zip`, month and day without padding.
pub fn backup_file_name(version: &str, date: NaiveDate) -> String {
    format!(
        "backup-go-{}-{}-{}-{}.zip",
        version,
        date.year(),
        date.month(),
        date.day()
    )
}

/// Zips everything under `source` into `dest`, leaving out `skip` (and `dest` itself).
fn write_zip(source: &Path, dest: &Path, skip: Option<&Path>) -> Result<(), BackupError> {
    let mut zip = ZipWriter::new(fs::File::create(dest)?);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let walker = WalkDir::new(source)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| skip.map_or(true, |s| !e.path().starts_with(s)) && e.path() != dest);
    for entry in walker {
        let entry = entry?;
        let Ok(relative) = entry.path().strip_prefix(source) else {
            continue;
        };
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let file_type = entry.file_type();
        if file_type.is_symlink() {
            let target = fs::read_link(entry.path())?;
            zip.add_symlink(name, target.to_string_lossy(), options)?;
        } else if file_type.is_dir() {
            zip.add_directory(name, options)?;
        } else {
            #[cfg(unix)]
            let options = {
                use std::os::unix::fs::PermissionsExt;
                options.unix_permissions(entry.metadata()?.permissions().mode())
            };
            zip.start_file(name, options)?;
            io::copy(&mut fs::File::open(entry.path())?, &mut zip)?;
        }
    }
    zip.finish()?;
    Ok(())
}
