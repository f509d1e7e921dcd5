use murl_core::logging;

mod cli;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    // Initialize logging as early as possible; stderr if the state dir is unusable.
    if let Err(err) = logging::init_logging() {
        logging::init_logging_stderr();
        tracing::warn!("log file unavailable, logging to stderr: {:#}", err);
    }

    if let Err(err) = Cli::run_from_args().await {
        eprintln!("mount-url error: {:#}", err);
        std::process::exit(1);
    }
    // Reached only after an interrupt tore the mount down.
    std::process::exit(1);
}
