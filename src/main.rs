mod cli;
mod logging;
mod model;
mod report;
mod service;
#[cfg(feature = "tui")]
mod tui;
mod workflow;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let is_non_tui = args.json || args.text;

    let interactive = cfg!(feature = "tui") && !is_non_tui;

    logging::init(args.verbose, args.log_file.as_deref(), interactive)?;

    cli::run(args).await?;
    // Exit explicitly so a call task still winding down cannot hold the process open.
    if !interactive {
        std::process::exit(0);
    }
    Ok(())
}
