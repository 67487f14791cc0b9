use std::{
    fs,
    io::{self, BufReader},
    path::{Path, PathBuf},
    time::Duration,
};

use flate2::read::GzDecoder;
use futures::{Stream, StreamExt};
use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use crate::{
    app::Application,
    release::{tar_file::GoTarFile, ReleaseIndexError},
    util::{
        async_create_dir_if_not_exists, create_dir_if_not_exists, remove_file_if_exists,
        symlink_dir, write_executable,
    },
};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// The tools a shim is written for.
const SHIMMED_TOOLS: [&str; 2] = ["go", "gofmt"];

#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("{0}")]
    ReleaseIndex(#[from] ReleaseIndexError),
    #[error("Go {version} has no archive for {os}/{arch}")]
    MissingArchive {
        version: String,
        os: String,
        arch: String,
    },
    #[error("Failed to download Go: {0}")]
    DownloadError(#[from] reqwest::Error),
    #[error("Checksum mismatch for {}: expected {expected}, got {actual}", .file.display())]
    ChecksumMismatch {
        file: PathBuf,
        expected: String,
        actual: String,
    },
    #[error("{} does not contain a go/ directory", .0.display())]
    InvalidArchive(PathBuf),
    #[error("Go {0} is not installed")]
    NotInstalled(String),
    #[error("{} exists and is not a link, refusing to replace it", .0.display())]
    RootOccupied(PathBuf),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Install task failed: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

impl Application {
    /// Where a version is (or would be) installed.
    pub fn version_dir(&self, version: &str) -> PathBuf {
        self.versions_dir().join(format!("go{version}"))
    }

    pub fn is_installed(&self, version: &str) -> bool {
        self.version_dir(version).is_dir()
    }

    /// Downloads, verifies and extracts the selected version into `versions/go<version>`.
    /// Installing a version that is already there does nothing.
    pub async fn install(&mut self) -> Result<PathBuf, InstallError> {
        let version = self.version().await?;
        let target = self.version_dir(&version);
        if target.is_dir() {
            info!("Go {version} is already installed at {}", target.display());
            return Ok(target);
        }

        let (goos, goarch) = (self.goos().clone(), self.goarch().clone());
        let tar_file = self
            .releases()
            .await?
            .find(&version)
            .and_then(|release| release.archive_for(&goos, &goarch))
            .cloned()
            .ok_or_else(|| InstallError::MissingArchive {
                version: version.clone(),
                os: goos.clone(),
                arch: goarch.clone(),
            })?;

        info!("Installing Go {version} for {goos}/{goarch}");
        let archive = download_verified(&tar_file, self.downloads_dir()).await?;
        self.install_archive(&archive, &version).await?;
        info!("Installed Go {version} at {}", target.display());
        Ok(target)
    }

    /// Extracts an already verified tarball as `version`.
    pub async fn install_archive(&self, archive: &Path, version: &str) -> Result<(), InstallError> {
        let archive = archive.to_path_buf();
        let versions_dir = self.versions_dir().clone();
        let target = self.version_dir(version);
        tokio::task::spawn_blocking(move || extract_archive(&archive, &versions_dir, &target))
            .await?
    }

    /// Makes the selected version the active one by repointing `root` and rewriting the shims
    /// and the environment script.
    pub async fn switch(&mut self) -> Result<(), InstallError> {
        let version = self.version().await?;
        let target = self.version_dir(&version);
        if !target.is_dir() {
            return Err(InstallError::NotInstalled(version));
        }

        let goroot = self.goroot().clone();
        tokio::task::spawn_blocking(move || activate(&target, &goroot)).await??;
        self.write_shims()?;
        info!("Switched to Go {version}");

        warn_if_shadowed(self.goshims(), &self.goscripts().join(ENV_SCRIPT));
        Ok(())
    }

    /// Removes the selected version. Uninstalling the active version also removes `root` and
    /// the shims.
    pub async fn uninstall(&mut self) -> Result<(), InstallError> {
        let version = self.version().await?;
        let target = self.version_dir(&version);
        if !target.is_dir() {
            return Err(InstallError::NotInstalled(version));
        }

        let was_active = self.active_version().as_deref() == Some(version.as_str());
        if was_active {
            debug!("Go {version} is active, deactivating it first");
            remove_file_if_exists(self.goroot())?;
            for tool in SHIMMED_TOOLS {
                remove_file_if_exists(&self.goshims().join(tool))?;
            }
        }
        tokio::task::spawn_blocking(move || fs::remove_dir_all(target)).await??;
        info!("Uninstalled Go {version}");
        Ok(())
    }

    fn write_shims(&self) -> io::Result<()> {
        create_dir_if_not_exists(self.goshims())?;
        create_dir_if_not_exists(self.goscripts())?;
        for tool in SHIMMED_TOOLS {
            let shim = self.goshims().join(tool);
            debug!("Writing shim {}", shim.display());
            write_executable(&shim, &shim_script(self, tool))?;
        }
        write_executable(&self.goscripts().join(ENV_SCRIPT), &env_script(self))
    }
}

/// The activation script written to `scripts/`.
pub const ENV_SCRIPT: &str = "env.sh";

fn environment_exports(app: &Application) -> String {
    format!(
        "export GOROOT=\"{}\"\nexport GOPATH=\"{}\"\nexport GOBIN=\"{}\"\n",
        app.goroot().display(),
        app.gopath().display(),
        app.gobin().display()
    )
}

/// A shell shim running `tool` from the active installation.
pub fn shim_script(app: &Application, tool: &str) -> String {
    format!(
        "#!/bin/sh\n# generated by install-go\n{}exec \"$GOROOT/bin/{tool}\" \"$@\"\n",
        environment_exports(app)
    )
}

/// A script to `source` from a shell profile.
pub fn env_script(app: &Application) -> String {
    format!(
        "# generated by install-go, source this file from your shell profile\n\
         {}export PATH=\"{}:{}:$PATH\"\n",
        environment_exports(app),
        app.goshims().display(),
        app.gobin().display()
    )
}

fn warn_if_shadowed(shims: &Path, env_script: &Path) {
    match which::which("go") {
        Ok(found) if found.starts_with(shims) => debug!("go resolves to {}", found.display()),
        Ok(found) => warn!(
            "go on your PATH resolves to {}, source {} to use the managed version",
            found.display(),
            env_script.display()
        ),
        Err(_) => info!(
            "go is not on your PATH yet, source {} to use it",
            env_script.display()
        ),
    }
}

/// Calculates the hex encoded SHA-256 of a file.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut sha = Sha256::new();
    io::copy(&mut file, &mut sha)?;
    Ok(format!("{:x}", sha.finalize()))
}

fn check_checksum(file: &Path, expected: &str, actual: &str) -> Result<(), InstallError> {
    if expected.eq_ignore_ascii_case(actual) {
        Ok(())
    } else {
        Err(InstallError::ChecksumMismatch {
            file: file.to_path_buf(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }
}

/// Downloads `tar_file` into `downloads_dir`, hashing it on the way. A cached copy with the
/// right checksum is reused. Returns the verified archive.
async fn download_verified(
    tar_file: &GoTarFile,
    downloads_dir: &Path,
) -> Result<PathBuf, InstallError> {
    async_create_dir_if_not_exists(downloads_dir).await?;
    let dest = downloads_dir.join(tar_file.filename());

    if dest.is_file() {
        let cached = dest.clone();
        let actual = tokio::task::spawn_blocking(move || hash_file(&cached)).await??;
        match check_checksum(&dest, tar_file.checksum(), &actual) {
            Ok(()) => {
                debug!("Using cached {}", dest.display());
                return Ok(dest);
            }
            Err(e) => warn!("Discarding cached archive: {e}"),
        }
    }

    let partial = downloads_dir.join(format!("{}.part", tar_file.filename()));
    let url = tar_file.download_url();
    info!("Downloading {url}");
    let client = reqwest::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()?;
    let stream = client
        .get(&url)
        .send()
        .await?
        .error_for_status()?
        .bytes_stream();

    let downloaded = save_verified(stream, &partial, &dest, tar_file.checksum()).await?;
    debug!("Downloaded {downloaded} of {} bytes", tar_file.size());
    Ok(dest)
}

/// Writes `stream` to `partial` while hashing it, then moves it to `dest` if the hash matches
/// `expected`. A download with the wrong hash is deleted. Returns the number of bytes written.
async fn save_verified<S, B, E>(
    stream: S,
    partial: &Path,
    dest: &Path,
    expected: &str,
) -> Result<u64, InstallError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    InstallError: From<E>,
{
    futures::pin_mut!(stream);
    let mut file = tokio::fs::File::create(partial).await?;
    let mut sha = Sha256::new();
    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let bytes = chunk.as_ref();
        sha.update(bytes);
        file.write_all(bytes).await?;
        written += bytes.len() as u64;
    }
    file.flush().await?;
    drop(file);

    let actual = format!("{:x}", sha.finalize());
    if let Err(e) = check_checksum(partial, expected, &actual) {
        tokio::fs::remove_file(partial).await?;
        return Err(e);
    }
    tokio::fs::rename(partial, dest).await?;
    Ok(written)
}

/// Unpacks a Go tarball into a staging directory next to `target`, then moves its `go/` tree
/// into place with a single rename.
fn extract_archive(archive: &Path, versions_dir: &Path, target: &Path) -> Result<(), InstallError> {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let staging = versions_dir.join(format!(".{name}.partial"));
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    create_dir_if_not_exists(&staging)?;

    debug!("Extracting {} to {}", archive.display(), staging.display());
    let unpacked = fs::File::open(archive).and_then(|file| {
        tar::Archive::new(GzDecoder::new(BufReader::new(file))).unpack(&staging)
    });
    let result = match unpacked {
        Ok(()) => {
            let extracted = staging.join("go");
            if extracted.is_dir() {
                fs::rename(&extracted, target).map_err(InstallError::from)
            } else {
                Err(InstallError::InvalidArchive(archive.to_path_buf()))
            }
        }
        Err(e) => Err(e.into()),
    };
    fs::remove_dir_all(&staging)?;
    result
}

/// Points `link` at `target` by renaming a freshly made link over it.
fn activate(target: &Path, link: &Path) -> Result<(), InstallError> {
    if let Ok(meta) = fs::symlink_metadata(link) {
        if !meta.file_type().is_symlink() {
            return Err(InstallError::RootOccupied(link.to_path_buf()));
        }
    }
    let staged = link.with_extension("tmp");
    remove_file_if_exists(&staged)?;
    symlink_dir(target, &staged)?;
    fs::rename(&staged, link)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        release::{go_version::GoVersion, tests::INDEX_JSON, ReleaseIndex},
    };
    use flate2::{write::GzEncoder, Compression};

    fn app_in(godir: &Path, version: &str) -> Application {
        let mut cli = Config::default();
        cli.set_godir(Some(godir.to_path_buf()))
            .set_version(Some(version.to_string()));
        let home = godir.to_path_buf();
        let mut app = Application::from_config(home.clone(), Config::defaults(&home).merge(cli));
        app.config_mut().address_usability();
        app
    }

    /// Builds a tarball shaped like the official ones: everything under `go/`.
    fn fake_tarball(path: &Path, top_level: &str) {
        let file = fs::File::create(path).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        let contents = b"#!/bin/sh\necho go version\n";
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("{top_level}/bin/go"), &contents[..])
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn hashes_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("hello");
        fs::write(&file, "hello world").unwrap();
        assert_eq!(
            hash_file(&file).unwrap(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn checksum_comparison_ignores_case() {
        let file = Path::new("go.tar.gz");
        assert!(check_checksum(file, "ABCDEF", "abcdef").is_ok());
        assert!(matches!(
            check_checksum(file, "abcdef", "012345"),
            Err(InstallError::ChecksumMismatch { .. })
        ));
    }

    fn index_with_archive(version: &str, filename: &str, checksum: &str) -> ReleaseIndex {
        let file = GoTarFile::new(
            filename,
            "linux",
            "amd64",
            format!("go{version}"),
            checksum,
            1,
            "archive",
        );
        ReleaseIndex::new(vec![GoVersion::new(format!("go{version}"), true, vec![file])])
    }

    #[tokio::test]
    async fn saves_stream_with_matching_checksum() {
        let dir = tempfile::TempDir::new().unwrap();
        let partial = dir.path().join("go.tar.gz.part");
        let dest = dir.path().join("go.tar.gz");
        let chunks = vec![Ok::<_, io::Error>(b"hello ".to_vec()), Ok(b"world".to_vec())];

        let written = save_verified(
            futures::stream::iter(chunks),
            &partial,
            &dest,
            "B94D27B9934D3E08A52E52D7DA7DABFAC484EFE37A5380EE9088F7ACE2EFCDE9",
        )
        .await
        .unwrap();

        assert_eq!(written, 11);
        assert_eq!(fs::read_to_string(&dest).unwrap(), "hello world");
        assert!(!partial.exists());
    }

    #[tokio::test]
    async fn discards_stream_with_wrong_checksum() {
        let dir = tempfile::TempDir::new().unwrap();
        let partial = dir.path().join("go.tar.gz.part");
        let dest = dir.path().join("go.tar.gz");
        let chunks = vec![Ok::<_, io::Error>(b"tampered".to_vec())];

        let result = save_verified(futures::stream::iter(chunks), &partial, &dest, "00").await;

        assert!(matches!(result, Err(InstallError::ChecksumMismatch { .. })));
        assert!(!partial.exists());
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn stream_errors_are_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let chunks = vec![
            Ok(b"partial".to_vec()),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
        ];

        let result = save_verified(
            futures::stream::iter(chunks),
            &dir.path().join("go.part"),
            &dir.path().join("go"),
            "00",
        )
        .await;
        assert!(matches!(result, Err(InstallError::IoError(_))));
        assert!(!dir.path().join("go").exists());
    }

    #[tokio::test]
    async fn reuses_cached_archive() {
        let dir = tempfile::TempDir::new().unwrap();
        let downloads = dir.path().join("downloads");
        fs::create_dir_all(&downloads).unwrap();
        let cached = downloads.join("go1.22.5.linux-amd64.tar.gz");
        fs::write(&cached, "hello world").unwrap();
        let tar_file = GoTarFile::new(
            "go1.22.5.linux-amd64.tar.gz",
            "linux",
            "amd64",
            "go1.22.5",
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9",
            11,
            "archive",
        );

        assert_eq!(download_verified(&tar_file, &downloads).await.unwrap(), cached);
        assert_eq!(fs::read_to_string(&cached).unwrap(), "hello world");
    }

    #[tokio::test]
    async fn installs_from_cached_download() {
        let dir = tempfile::TempDir::new().unwrap();
        let godir = dir.path().join("go");
        let mut app = app_in(&godir, "1.22.5");
        fs::create_dir_all(app.downloads_dir()).unwrap();
        let cached = app.downloads_dir().join("go1.22.5.linux-amd64.tar.gz");
        fake_tarball(&cached, "go");
        let checksum = hash_file(&cached).unwrap();
        app.set_releases(index_with_archive(
            "1.22.5",
            "go1.22.5.linux-amd64.tar.gz",
            &checksum,
        ));

        let installed = app.install().await.unwrap();

        assert_eq!(installed, godir.join("versions/go1.22.5"));
        assert!(installed.join("bin/go").is_file());
        // installing again is a no-op
        assert_eq!(app.install().await.unwrap(), installed);
    }

    #[tokio::test]
    async fn install_needs_an_archive_for_the_platform() {
        let dir = tempfile::TempDir::new().unwrap();
        let godir = dir.path().join("go");
        let mut cli = Config::default();
        cli.set_godir(Some(godir.clone()))
            .set_version(Some("1.22.5".into()))
            .set_goos(Some("plan9".into()));
        let mut app = Application::from_config(godir.clone(), Config::defaults(&godir).merge(cli));
        app.config_mut().address_usability();
        app.set_releases(ReleaseIndex::try_from(INDEX_JSON).unwrap());

        match app.install().await {
            Err(InstallError::MissingArchive { version, os, arch }) => {
                assert_eq!(version, "1.22.5");
                assert_eq!(os, "plan9");
                assert_eq!(arch, "amd64");
            }
            other => panic!("expected a missing archive, got {other:?}"),
        }
        assert!(!app.is_installed("1.22.5"));
    }

    #[tokio::test]
    async fn installs_from_archive() {
        let dir = tempfile::TempDir::new().unwrap();
        let godir = dir.path().join("go");
        let app = app_in(&godir, "1.22.5");
        let archive = dir.path().join("go1.22.5.linux-amd64.tar.gz");
        fake_tarball(&archive, "go");

        app.install_archive(&archive, "1.22.5").await.unwrap();

        assert!(app.is_installed("1.22.5"));
        assert!(godir.join("versions/go1.22.5/bin/go").is_file());
        // no staging leftovers
        let entries = fs::read_dir(godir.join("versions")).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn rejects_archive_without_go_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let godir = dir.path().join("go");
        let app = app_in(&godir, "1.22.5");
        let archive = dir.path().join("bad.tar.gz");
        fake_tarball(&archive, "not-go");

        let result = app.install_archive(&archive, "1.22.5").await;
        assert!(matches!(result, Err(InstallError::InvalidArchive(_))));
        assert!(!app.is_installed("1.22.5"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn switches_and_uninstalls() {
        let dir = tempfile::TempDir::new().unwrap();
        let godir = dir.path().join("go");
        let archive = dir.path().join("go.tar.gz");
        fake_tarball(&archive, "go");

        let mut old = app_in(&godir, "1.21.0");
        old.install_archive(&archive, "1.21.0").await.unwrap();
        old.switch().await.unwrap();
        assert_eq!(old.active_version().as_deref(), Some("1.21.0"));

        let mut new = app_in(&godir, "1.22.5");
        new.install_archive(&archive, "1.22.5").await.unwrap();
        new.switch().await.unwrap();
        assert_eq!(new.active_version().as_deref(), Some("1.22.5"));
        assert!(godir.join("root/bin/go").is_file());
        assert!(!godir.join("root.tmp").exists());

        let shim = fs::read_to_string(godir.join("shims/go")).unwrap();
        assert!(shim.contains("exec \"$GOROOT/bin/go\" \"$@\""));
        assert!(shim.contains(&format!("GOROOT=\"{}\"", godir.join("root").display())));
        let env = fs::read_to_string(godir.join("scripts/env.sh")).unwrap();
        assert!(env.contains(&godir.join("shims").display().to_string()));

        // the inactive version goes away on its own
        old.uninstall().await.unwrap();
        assert!(!old.is_installed("1.21.0"));
        assert_eq!(new.active_version().as_deref(), Some("1.22.5"));

        // the active one takes root and the shims with it
        new.uninstall().await.unwrap();
        assert!(fs::symlink_metadata(godir.join("root")).is_err());
        assert!(!godir.join("shims/go").exists());
    }

    #[tokio::test]
    async fn cannot_switch_to_missing_version() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut app = app_in(&dir.path().join("go"), "1.22.5");
        assert!(matches!(
            app.switch().await,
            Err(InstallError::NotInstalled(v)) if v == "1.22.5"
        ));
        assert!(matches!(
            app.uninstall().await,
            Err(InstallError::NotInstalled(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn refuses_to_replace_real_root_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path().join("root");
        fs::create_dir_all(&root).unwrap();
        assert!(matches!(
            activate(dir.path(), &root),
            Err(InstallError::RootOccupied(_))
        ));
    }
}
