use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

fn default_filter(verbose: u8) -> String {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    format!("warn,seo_workflow={level}")
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the verbosity flag.
///
/// The TUI owns the terminal, so interactive runs only log when a file is given.
pub fn init(verbose: u8, log_file: Option<&Path>, interactive: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let res = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).try_init()
        }
        None if interactive => return Ok(()),
        None => builder.with_writer(std::io::stderr).try_init(),
    };
    res.map_err(|e| anyhow::anyhow!("init logging: {e}"))
}
