use std::{
    io,
    path::{Path, PathBuf},
};

use getset::{Getters, MutGetters, Setters};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The config file looked up in the current working directory.
pub const CONFIG_FILE_NAME: &str = "config.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml_ng::Error),
    #[error("Failed to read config: {0}")]
    IoError(#[from] std::io::Error),
}

/// Every option install-go understands. Each value is optional so that the built-in defaults,
/// the config file and the command line can be layered on top of each other.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, Getters, MutGetters, Setters,
)]
#[getset(get = "pub", get_mut = "pub", set = "pub")]
pub struct Config {
    /// An explicit Go version, or one of the `latest` / `latest-rc` sentinels
    #[serde(rename = "Version", alias = "version", default)]
    version: Option<String>,
    /// Use the newest stable release
    #[serde(rename = "Latest", alias = "latest", default)]
    latest: Option<bool>,
    /// Use the newest release candidate
    #[serde(rename = "LatestRC", alias = "latest_rc", alias = "rc", default)]
    latest_rc: Option<bool>,
    #[serde(rename = "Install", alias = "install", default)]
    install: Option<bool>,
    #[serde(rename = "Uninstall", alias = "uninstall", default)]
    uninstall: Option<bool>,
    /// The workspace holding every managed Go installation
    #[serde(rename = "GODIR", alias = "godir", default)]
    godir: Option<PathBuf>,
    #[serde(rename = "Switch", alias = "switch", default)]
    switch: Option<bool>,
    #[serde(rename = "Backup", alias = "backup", default)]
    backup: Option<bool>,
    /// Where backups are written
    #[serde(rename = "Output", alias = "output", default)]
    output: Option<String>,
    #[serde(rename = "GOOS", alias = "goos", alias = "os", default)]
    goos: Option<String>,
    #[serde(rename = "GOARCH", alias = "goarch", alias = "arch", default)]
    goarch: Option<String>,
    #[serde(rename = "Debug", alias = "debug", default)]
    debug: Option<bool>,
    /// `STDOUT` or a path to a writable log file
    #[serde(rename = "LogFile", alias = "log_file", alias = "log", default)]
    log_file: Option<String>,
    #[serde(rename = "Help", alias = "help", default)]
    help: Option<bool>,
    /// Print the available releases
    #[serde(rename = "List", alias = "list", default)]
    list: Option<bool>,
    /// Download a fresh copy of the release index
    #[serde(rename = "Refresh", alias = "refresh", default)]
    refresh: Option<bool>,
}

impl Config {
    /// The built-in defaults, used underneath the config file and the command line.
    ///
    /// `output` is intentionally left empty, an empty output means `<GODIR>/backups`.
    pub fn defaults(home: &Path) -> Self {
        Self {
            version: Some(String::new()),
            latest: Some(true),
            latest_rc: Some(false),
            install: Some(false),
            uninstall: Some(false),
            godir: Some(home.join("go")),
            switch: Some(false),
            backup: Some(false),
            output: None,
            goos: Some(String::from("linux")),
            goarch: Some(String::from("amd64")),
            debug: Some(false),
            log_file: Some(String::from("STDOUT")),
            help: Some(false),
            list: Some(false),
            refresh: Some(false),
        }
    }

    /// Attempts to asynchronously load a config from the given path.
    ///
    /// # Arguments
    ///
    /// * `path` - The path-like to load the config from
    ///
    /// # Errors
    ///
    /// This function will return an error if the file cannot be read or if the file cannot be
    /// parsed.
    pub async fn try_from_path<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let config = tokio::fs::read_to_string(path).await?;
        Config::try_from(config.as_str())
    }

    /// Layers `other` on top of `self`. Any value set in `other` wins.
    pub fn merge(self, other: Config) -> Config {
        Config {
            version: other.version.or(self.version),
            latest: other.latest.or(self.latest),
            latest_rc: other.latest_rc.or(self.latest_rc),
            install: other.install.or(self.install),
            uninstall: other.uninstall.or(self.uninstall),
            godir: other.godir.or(self.godir),
            switch: other.switch.or(self.switch),
            backup: other.backup.or(self.backup),
            output: other.output.or(self.output),
            goos: other.goos.or(self.goos),
            goarch: other.goarch.or(self.goarch),
            debug: other.debug.or(self.debug),
            log_file: other.log_file.or(self.log_file),
            help: other.help.or(self.help),
            list: other.list.or(self.list),
            refresh: other.refresh.or(self.refresh),
        }
    }

    /// Cleans every free-text value, see [`clean`].
    pub fn clean_strings(&mut self) {
        for value in [
            &mut self.version,
            &mut self.output,
            &mut self.log_file,
            &mut self.goos,
            &mut self.goarch,
        ]
        .into_iter()
        .flatten()
        {
            *value = clean(value);
        }
    }

    /// Resolves conflicting version selections into exactly one mode.
    ///
    /// `--version latest` and `--version latest-rc` are turned into their flags, and an explicit
    /// version always beats `--latest` and `--rc`. Without a version `--rc` beats `--latest`,
    /// which is on by default.
    pub fn address_usability(&mut self) {
        match self.version.as_deref() {
            Some("latest") => {
                self.version = None;
                self.latest = Some(true);
                self.latest_rc = Some(false);
            }
            Some("latest-rc") => {
                self.version = None;
                self.latest = Some(false);
                self.latest_rc = Some(true);
            }
            Some(version)
                if !version.is_empty() && (self.latest_flag() || self.latest_rc_flag()) =>
            {
                self.latest = Some(false);
                self.latest_rc = Some(false);
            }
            None | Some("") if self.latest_flag() && self.latest_rc_flag() => {
                self.latest = Some(false);
            }
            _ => {}
        }
    }

    /// The explicit version, or an empty string when none is set.
    pub fn version_str(&self) -> &str {
        self.version.as_deref().unwrap_or_default()
    }

    pub fn output_str(&self) -> &str {
        self.output.as_deref().unwrap_or_default()
    }

    pub fn log_file_str(&self) -> &str {
        self.log_file.as_deref().unwrap_or_default()
    }

    pub fn latest_flag(&self) -> bool {
        self.latest.unwrap_or(false)
    }

    pub fn latest_rc_flag(&self) -> bool {
        self.latest_rc.unwrap_or(false)
    }

    pub fn install_flag(&self) -> bool {
        self.install.unwrap_or(false)
    }

    pub fn uninstall_flag(&self) -> bool {
        self.uninstall.unwrap_or(false)
    }

    pub fn switch_flag(&self) -> bool {
        self.switch.unwrap_or(false)
    }

    pub fn backup_flag(&self) -> bool {
        self.backup.unwrap_or(false)
    }

    pub fn debug_flag(&self) -> bool {
        self.debug.unwrap_or(false)
    }

    pub fn help_flag(&self) -> bool {
        self.help.unwrap_or(false)
    }

    pub fn list_flag(&self) -> bool {
        self.list.unwrap_or(false)
    }

    pub fn refresh_flag(&self) -> bool {
        self.refresh.unwrap_or(false)
    }
}

impl TryFrom<&str> for Config {
    type Error = ConfigError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        // an empty document is a valid (empty) config
        if value.trim().is_empty() {
            return Ok(Config::default());
        }
        let config = serde_yaml_ng::from_str::<Config>(value)?;
        Ok(config)
    }
}

/// Collapses whitespace runs (newlines and tabs included) into single spaces, then strips one
/// leading and one trailing double quote. The quotes don't need to be a matching pair.
pub fn clean(input: &str) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    let unquoted = collapsed.strip_prefix('"').unwrap_or(&collapsed);
    let unquoted = unquoted.strip_suffix('"').unwrap_or(unquoted);
    unquoted.to_string()
}

/// Looks for the config file at `path`. A missing or unreadable file is not an error, the
/// program simply runs without one.
pub fn discover_config_file(path: &Path) -> Option<PathBuf> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => Some(path.to_path_buf()),
        Ok(_) => {
            eprintln!("WARNING: {} is not a file, ignoring it", path.display());
            None
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            eprintln!(
                "WARNING: Permission denied attempting to read {}: {}",
                path.display(),
                e
            );
            None
        }
        Err(e) => {
            eprintln!("WARNING: Cannot use {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_version(version: &str, latest: bool, latest_rc: bool) -> Config {
        let mut config = Config::defaults(Path::new("/home/gopher"));
        config
            .set_version(Some(version.to_string()))
            .set_latest(Some(latest))
            .set_latest_rc(Some(latest_rc));
        config
    }

    #[test]
    fn clean_collapses_whitespace() {
        assert_eq!(clean("  1.22.5\n"), "1.22.5");
        assert_eq!(clean("a\t\tb\n\nc   d"), "a b c d");
    }

    #[test]
    fn clean_strips_single_quotes() {
        assert_eq!(clean("\"1.22.5\""), "1.22.5");
        assert_eq!(clean("\"darwin"), "darwin");
        assert_eq!(clean("arm64\""), "arm64");
        assert_eq!(clean("\"\"x\"\""), "\"x\"");
        assert_eq!(clean("\""), "");
    }

    #[test]
    fn latest_sentinel_becomes_flag() {
        let mut config = with_version("latest", false, true);
        config.address_usability();
        assert_eq!(config.version_str(), "");
        assert!(config.latest_flag());
        assert!(!config.latest_rc_flag());
    }

    #[test]
    fn latest_rc_sentinel_becomes_flag() {
        let mut config = with_version("latest-rc", true, false);
        config.address_usability();
        assert_eq!(config.version_str(), "");
        assert!(!config.latest_flag());
        assert!(config.latest_rc_flag());
    }

    #[test]
    fn explicit_version_wins_over_flags() {
        let mut config = with_version("1.21.0", true, false);
        config.address_usability();
        assert_eq!(config.version_str(), "1.21.0");
        assert!(!config.latest_flag());
        assert!(!config.latest_rc_flag());

        let mut config = with_version("1.21.0", false, true);
        config.address_usability();
        assert!(!config.latest_flag());
        assert!(!config.latest_rc_flag());
    }

    #[test]
    fn empty_version_keeps_flags() {
        let mut config = with_version("", true, false);
        config.address_usability();
        assert!(config.latest_flag());
    }

    #[test]
    fn rc_flag_beats_default_latest() {
        let mut config = Config::defaults(Path::new("/home/gopher"));
        config.set_latest_rc(Some(true));
        config.address_usability();
        assert!(!config.latest_flag());
        assert!(config.latest_rc_flag());

        let mut config = Config::defaults(Path::new("/home/gopher"));
        config.set_version(None).set_latest_rc(Some(true));
        config.address_usability();
        assert!(!config.latest_flag());
        assert!(config.latest_rc_flag());
    }

    #[test]
    fn address_usability_is_idempotent() {
        for (version, latest, rc) in [
            ("latest", false, false),
            ("latest-rc", true, true),
            ("1.22.5", true, true),
            ("", true, false),
            ("", false, true),
            ("", true, true),
        ] {
            let mut once = with_version(version, latest, rc);
            once.address_usability();
            let mut twice = once.clone();
            twice.address_usability();
            assert_eq!(once, twice, "not idempotent for {version:?}");
        }
    }

    #[test]
    fn merge_prefers_the_upper_layer() {
        let defaults = Config::defaults(Path::new("/home/gopher"));
        let mut cli = Config::default();
        cli.set_goos(Some("darwin".into())).set_backup(Some(true));

        let merged = defaults.merge(cli);
        assert_eq!(merged.goos().as_deref(), Some("darwin"));
        assert_eq!(merged.goarch().as_deref(), Some("amd64"));
        assert!(merged.backup_flag());
        assert_eq!(
            merged.godir().as_deref(),
            Some(Path::new("/home/gopher/go"))
        );
    }

    #[test]
    fn parses_yaml_keys() {
        let yaml = "Version: \"1.22.5\"\nLatest: false\nGOOS: darwin\nGOARCH: arm64\n\
                    LogFile: install.log\n";
        let config = Config::try_from(yaml).unwrap();
        assert_eq!(config.version().as_deref(), Some("1.22.5"));
        assert_eq!(config.latest(), &Some(false));
        assert_eq!(config.goos().as_deref(), Some("darwin"));
        assert_eq!(config.log_file_str(), "install.log");
        assert_eq!(config.install(), &None);
    }

    #[test]
    fn empty_yaml_is_an_empty_config() {
        assert_eq!(Config::try_from("\n  \n").unwrap(), Config::default());
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        assert!(matches!(
            Config::try_from("Latest: [not, a, bool]"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn missing_config_file_is_ignored() {
        let dir = tempfile::TempDir::new().unwrap();
        assert_eq!(discover_config_file(&dir.path().join(CONFIG_FILE_NAME)), None);

        let file = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&file, "Debug: true\n").unwrap();
        assert_eq!(discover_config_file(&file), Some(file));
    }
}
