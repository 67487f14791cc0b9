use std::path::PathBuf;

use clap::{ArgAction, CommandFactory, Parser};

use crate::config::Config;

/// install-go installs, switches between, backs up and uninstalls Go toolchains inside a single
/// workspace directory (GODIR).
///
/// Every option can also be set in `./config.yaml`; options given on the command line win.
#[derive(Parser, Debug, Default)]
#[command(name = "install-go", author, about, long_about = None)]
#[command(disable_help_flag = true, disable_version_flag = true)]
pub struct CommandLineArgs {
    /// Specify a stable release, or use `latest` / `latest-rc`.
    #[arg(long, value_name = "VERSION")]
    version: Option<String>,

    /// Use the latest stable release.
    #[arg(
        long,
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "true",
        action = ArgAction::Set,
    )]
    latest: Option<bool>,

    /// Use the latest release candidate.
    #[arg(
        long = "rc",
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "true",
        action = ArgAction::Set,
    )]
    latest_rc: Option<bool>,

    /// Install the selected version.
    #[arg(
        long,
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "true",
        action = ArgAction::Set,
    )]
    install: Option<bool>,

    /// Uninstall the selected version.
    #[arg(
        long,
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "true",
        action = ArgAction::Set,
    )]
    uninstall: Option<bool>,

    /// Path to GODIR, the target directory for all actions (must be writable). [default: ~/go]
    #[arg(long, value_name = "DIR")]
    godir: Option<PathBuf>,

    /// Switch the active Go to the selected version.
    #[arg(
        long,
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "true",
        action = ArgAction::Set,
    )]
    switch: Option<bool>,

    /// Create a zip backup of GODIR inside --output.
    #[arg(
        long,
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "true",
        action = ArgAction::Set,
    )]
    backup: Option<bool>,

    /// Where --backup stores its archive. [default: GODIR/backups]
    #[arg(long, value_name = "PATH")]
    output: Option<String>,

    /// Override GOOS for the downloaded toolchain. [default: linux]
    #[arg(long = "os", value_name = "GOOS")]
    goos: Option<String>,

    /// Override GOARCH for the downloaded toolchain. [default: amd64]
    #[arg(long = "arch", value_name = "GOARCH")]
    goarch: Option<String>,

    /// Enable debug logging.
    #[arg(
        long,
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "true",
        action = ArgAction::Set,
    )]
    debug: Option<bool>,

    /// STDOUT or a path to a writable log file, appended to if it exists. [default: STDOUT]
    #[arg(long = "log", value_name = "DEST")]
    log_file: Option<String>,

    /// List the available versions for --os and --arch.
    #[arg(
        long,
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "true",
        action = ArgAction::Set,
    )]
    list: Option<bool>,

    /// Refreshes the cached Go release index.
    #[arg(
        short,
        long,
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "true",
        action = ArgAction::Set,
    )]
    refresh: Option<bool>,

    /// Print this help message.
    #[arg(
        short,
        long,
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "true",
        action = ArgAction::Set,
    )]
    help: Option<bool>,
}

impl CommandLineArgs {
    /// Turns the parsed arguments into a config layer. Options that were not given stay unset.
    pub fn into_config(self) -> Config {
        let mut config = Config::default();
        config
            .set_version(self.version)
            .set_latest(self.latest)
            .set_latest_rc(self.latest_rc)
            .set_install(self.install)
            .set_uninstall(self.uninstall)
            .set_godir(self.godir)
            .set_switch(self.switch)
            .set_backup(self.backup)
            .set_output(self.output)
            .set_goos(self.goos)
            .set_goarch(self.goarch)
            .set_debug(self.debug)
            .set_log_file(self.log_file)
            .set_list(self.list)
            .set_refresh(self.refresh)
            .set_help(self.help);
        config
    }

    /// The rendered usage text.
    pub fn usage() -> String {
        CommandLineArgs::command().render_help().to_string()
    }
}
