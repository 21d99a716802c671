//! bsync - versioning-aware project sync for S3-compatible storage

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use bsync_cli::commands::{self, Cli};
use bsync_cli::exit_code::ExitCode;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    // A transfer cut short by Ctrl+C can leave a `.bsync-part` file behind
    let exit_code = tokio::select! {
        code = commands::execute(cli) => code,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted");
            ExitCode::Interrupted
        }
    };

    std::process::exit(exit_code.as_i32());
}
