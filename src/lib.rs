use std::path::Path;

use app::Application;
use commandline::CommandLineArgs;
use responder::Responder;

pub mod app;
pub mod commandline;
pub mod config;
pub mod install_error;
pub mod installer;
pub mod logging;
pub mod release;
pub mod responder;
pub mod util;

/// Loads the configuration for this invocation and responds to it.
pub async fn run(args: CommandLineArgs) -> install_error::Result<()> {
    let home = util::home_dir();
    let config_file = config::discover_config_file(Path::new(config::CONFIG_FILE_NAME));
    let mut app = Application::load(home, args.into_config(), config_file.as_deref()).await?;
    Responder::new(&mut app).respond().await
}
