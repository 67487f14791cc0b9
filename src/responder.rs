use std::{
    io,
    path::{Path, PathBuf},
};

use log::{debug, info, warn, LevelFilter};

use crate::{
    app::Application,
    commandline::CommandLineArgs,
    install_error::{self, InstallGoError},
    logging::{init_logging, LogTarget},
    util::{async_create_dir_if_not_exists, create_dir_if_not_exists},
};

/// Whether the remaining steps should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Runs every step of an invocation, one after the other, against a single application.
pub struct Responder<'a> {
    app: &'a mut Application,
}

impl<'a> Responder<'a> {
    pub fn new(app: &'a mut Application) -> Self {
        Self { app }
    }

    /// Help, input correction, logging, workspace, backup, then the requested actions.
    /// Help stops everything after it.
    pub async fn respond(&mut self) -> install_error::Result<()> {
        if self.show_help() == Flow::Stop {
            return Ok(());
        }
        self.address_usability();
        self.set_logging()?;
        self.prepare_workspace().await?;
        self.take_backup().await?;

        let config = self.app.config();
        let (list, uninstall, install, switch) = (
            config.list_flag(),
            config.uninstall_flag(),
            config.install_flag(),
            config.switch_flag(),
        );
        if list {
            println!("{}", self.app.list_versions().await?);
        }
        if uninstall {
            self.app.uninstall().await?;
        }
        if install {
            self.app.install().await?;
        }
        if switch {
            self.app.switch().await?;
        }
        Ok(())
    }

    /// Prints the usage text if `--help` was given.
    pub fn show_help(&self) -> Flow {
        if self.app.config().help_flag() {
            println!("{}", CommandLineArgs::usage());
            Flow::Stop
        } else {
            Flow::Continue
        }
    }

    pub fn address_usability(&mut self) {
        self.app.config_mut().address_usability();
    }

    /// Sends all further log output to the terminal or to `--log`.
    pub fn set_logging(&self) -> install_error::Result<()> {
        let config = self.app.config();
        let level = if config.debug_flag() {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        };
        let target = LogTarget::from_setting(config.log_file_str());
        if let Some(path) = init_logging(&target, level)? {
            println!("Logs can be found at: {}", path.display());
        }
        debug!("Resolved config: {:?}", config);
        Ok(())
    }

    pub async fn prepare_workspace(&self) -> install_error::Result<()> {
        prepare_workspace(self.app.godir()).await
    }

    /// Backs up GODIR if `--backup` was given.
    pub async fn take_backup(&mut self) -> install_error::Result<()> {
        if !self.app.config().backup_flag() {
            return Ok(());
        }
        let backup_dir = resolve_backup_dir(self.app.godir(), self.app.config().output_str())?;
        self.app.set_backup_dir(backup_dir);
        let backup_file = self.app.backup().await?;
        info!("SUCCESS! Created {}", backup_file.display());
        Ok(())
    }
}

/// Creates GODIR (and its parents) if it is missing. An existing directory is left alone.
pub async fn prepare_workspace(godir: &Path) -> install_error::Result<()> {
    match tokio::fs::metadata(godir).await {
        Ok(meta) if meta.is_dir() => {
            debug!("Workspace {} already exists", godir.display());
            Ok(())
        }
        Ok(_) => Err(InstallGoError::Workspace(
            godir.to_path_buf(),
            io::Error::new(io::ErrorKind::AlreadyExists, "not a directory"),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            async_create_dir_if_not_exists(godir)
                .await
                .map_err(|e| InstallGoError::Workspace(godir.to_path_buf(), e))?;
            info!(
                "Installed workspace at {}! Now use --install --latest",
                godir.display()
            );
            Ok(())
        }
        Err(e) => {
            warn!("Cannot inspect workspace {}: {}", godir.display(), e);
            Ok(())
        }
    }
}

/// Works out where the backup goes and makes sure that directory exists.
///
/// - no `--output` (or GODIR itself): `<GODIR>/backups`
/// - an existing directory: that directory
/// - an existing file: the directory containing it
/// - a missing path: created as the backup directory
pub fn resolve_backup_dir(godir: &Path, output: &str) -> io::Result<PathBuf> {
    let default_dir = godir.join("backups");
    let output_path = Path::new(output);
    let backup_dir = if output.is_empty() || output_path == godir {
        default_dir
    } else {
        match std::fs::metadata(output_path) {
            Ok(meta) if meta.is_dir() => dunce::canonicalize(output_path)?,
            Ok(_) => match output_path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => output_path.to_path_buf(),
            Err(e) => {
                warn!(
                    "Cannot use --output {}: {}, using {}",
                    output,
                    e,
                    default_dir.display()
                );
                default_dir
            }
        }
    };
    create_dir_if_not_exists(&backup_dir)?;
    Ok(backup_dir)
}
