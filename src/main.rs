use anyhow::Result;
use clap::Parser;

use navshell::cli;

// Single-threaded on purpose: navigation callbacks, deferred trail writes,
// and mirror ticks are serialized on one scheduler.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::init();
    let args = cli::Cli::parse();
    cli::run(args).await
}
