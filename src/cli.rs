use crate::model::{Stage, WorkflowConfig, WorkflowReport};
use crate::service::SeoServiceClient;
use crate::workflow::{WorkflowController, WorkflowState};
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "seo-workflow",
    version,
    about = "Sitemap -> titles -> outlines -> articles, driven against an SEO generation service"
)]
pub struct Cli {
    /// Base URL of the SEO generation service
    #[arg(long, env = "SEO_SERVICE_URL", default_value = "http://127.0.0.1:5000")]
    pub base_url: String,

    /// Competitor sitemap to analyze (pre-fills the TUI input; required with --text/--json)
    #[arg(long)]
    pub sitemap_url: Option<String>,

    /// Run the whole pipeline and print the JSON report (no TUI)
    #[arg(long, conflicts_with = "text")]
    pub json: bool,

    /// Run the whole pipeline and print a text summary (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Title to select for outline generation (repeatable; default: all titles)
    #[arg(long = "select", value_name = "TITLE")]
    pub select: Vec<String>,

    /// Select only the first N titles when --select is not given
    #[arg(long, conflicts_with = "select")]
    pub max_titles: Option<usize>,

    /// Stop after outlines; do not generate article content
    #[arg(long)]
    pub skip_content: bool,

    /// Deadline for each call to the generation service
    #[arg(long, default_value = "10m")]
    pub call_timeout: humantime::Duration,

    /// TCP connect timeout for the generation service
    #[arg(long, default_value = "10s")]
    pub connect_timeout: humantime::Duration,

    /// Export the final report as JSON
    #[arg(long)]
    pub export_json: Option<std::path::PathBuf>,

    /// Append logs to this file (the only log sink in TUI mode)
    #[arg(long)]
    pub log_file: Option<std::path::PathBuf>,

    /// Increase log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

pub async fn run(args: Cli) -> Result<()> {
    if !args.json && !args.text {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_text(args).await;
        }
    }

    if args.json {
        return run_json(args).await;
    }

    run_text(args).await
}

/// Build a `WorkflowConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> WorkflowConfig {
    WorkflowConfig {
        base_url: args.base_url.clone(),
        sitemap_url: args.sitemap_url.clone(),
        call_timeout: Duration::from(args.call_timeout),
        connect_timeout: Duration::from(args.connect_timeout),
        user_agent: format!("seo-workflow/{}", env!("CARGO_PKG_VERSION")),
    }
}

/// Run every stage non-interactively. Progress goes to `progress` when given.
async fn run_pipeline(
    args: &Cli,
    cfg: &WorkflowConfig,
    progress: Option<&mpsc::UnboundedSender<OutputLine>>,
) -> Result<WorkflowState> {
    let say = |msg: String| {
        if let Some(tx) = progress {
            let _ = tx.send(OutputLine::Stderr(msg));
        }
    };

    let sitemap_url = args
        .sitemap_url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .context("--sitemap-url is required with --text/--json")?;

    let client = Arc::new(SeoServiceClient::new(cfg)?);
    tracing::info!(base_url = client.base_url(), "using generation service");
    let mut ctl = WorkflowController::new(client, cfg);

    say(format!("== {} ==", Stage::SitemapInput.label()));
    ctl.set_sitemap_url(sitemap_url);
    ctl.submit_sitemap().await;
    ensure_stage(ctl.state(), Stage::TitleSelection)?;
    if ctl.state().titles().is_empty() {
        bail!("sitemap yielded no titles");
    }
    say(format!("Found {} title(s)", ctl.state().titles().len()));

    say(format!("== {} ==", Stage::TitleSelection.label()));
    let picks: Vec<String> = if args.select.is_empty() {
        let limit = args.max_titles.unwrap_or(usize::MAX);
        ctl.state().titles().iter().take(limit).cloned().collect()
    } else {
        args.select.clone()
    };
    for title in &picks {
        if ctl.state().is_selected(title) {
            continue;
        }
        if !ctl.toggle_title(title) {
            bail!("title not offered by the sitemap: {title:?}");
        }
        say(format!("Selected: {title}"));
    }
    if ctl.state().selected_titles().is_empty() {
        bail!("no titles selected");
    }
    ctl.generate_outlines().await;
    ensure_stage(ctl.state(), Stage::OutlineAndContent)?;

    say(format!("== {} ==", Stage::OutlineAndContent.label()));
    if args.skip_content {
        return Ok(ctl.state().clone());
    }
    // Content calls run one at a time; a failure is reported and the next outline is tried.
    let outlines = ctl.state().outlines().to_vec();
    for item in outlines {
        if item.outline.is_empty() {
            say(format!("Skipping {:?}: no outline returned", item.title));
            continue;
        }
        if ctl.state().content_for(&item.outline).is_some() {
            continue;
        }
        let Some(pending) = ctl.start_generate_content(&item.outline) else {
            continue;
        };
        say(format!("{} {}", pending.kind().progress_label(), item.title));
        let outcome = pending.wait().await;
        ctl.finish(outcome);
        if let Some(err) = ctl.state().last_error() {
            say(format!("Content for {:?} failed: {err}", item.title));
        }
    }

    Ok(ctl.state().clone())
}

/// Fail when the last call did not move the workflow to `expected`.
fn ensure_stage(state: &WorkflowState, expected: Stage) -> Result<()> {
    if state.stage() >= expected {
        return Ok(());
    }
    let msg = state.last_error().unwrap_or("stage did not advance");
    bail!("{} failed: {msg}", state.stage().label())
}

/// Run the pipeline, bailing out cleanly on Ctrl-C.
async fn run_pipeline_interruptible(
    args: &Cli,
    cfg: &WorkflowConfig,
    progress: Option<&mpsc::UnboundedSender<OutputLine>>,
) -> Result<WorkflowState> {
    tokio::select! {
        res = run_pipeline(args, cfg, progress) => res,
        _ = tokio::signal::ctrl_c() => bail!("interrupted"),
    }
}

async fn run_json(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    let (out_tx, out_handle) = spawn_output_writer();

    let state = run_pipeline_interruptible(&args, &cfg, None).await?;
    let report = crate::report::build_report(&cfg, &state);
    handle_exports(&args, &report)?;

    let out = serde_json::to_string_pretty(&report)?;
    let _ = out_tx.send(OutputLine::Stdout(out));

    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}

async fn run_text(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    let (out_tx, out_handle) = spawn_output_writer();

    let res = run_pipeline_interruptible(&args, &cfg, Some(&out_tx)).await;
    let state = match res {
        Ok(s) => s,
        Err(e) => {
            drop(out_tx);
            let _ = out_handle.await;
            return Err(e);
        }
    };

    let report = crate::report::build_report(&cfg, &state);
    handle_exports(&args, &report)?;
    let summary = crate::report::build_text_summary(&report);
    for line in summary.lines {
        let _ = out_tx.send(OutputLine::Stdout(line));
    }
    if let Some(p) = args.export_json.as_deref() {
        let _ = out_tx.send(OutputLine::Stderr(format!("Exported: {}", p.display())));
    }
    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}

/// Handle export operations for both text and JSON modes.
fn handle_exports(args: &Cli, report: &WorkflowReport) -> Result<()> {
    if let Some(p) = args.export_json.as_deref() {
        crate::report::export_json(p, report)?;
    }
    Ok(())
}
