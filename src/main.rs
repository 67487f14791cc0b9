use clap::Parser;
use install_go::commandline::CommandLineArgs;
use log::error;

#[tokio::main]
async fn main() {
    let args = CommandLineArgs::parse();
    if let Err(e) = install_go::run(args).await {
        error!("{e}");
        eprintln!("install-go: {e}");
        std::process::exit(1);
    }
}
