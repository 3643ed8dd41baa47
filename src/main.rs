//! QuakeScope - inspect one earthquake event from your terminal.
//!
//! Selects a USGS event by id, fetches every data product around it
//! (aftershocks, historical seismicity, forecast, moment tensor, PAGER),
//! and renders the assembled document.

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;

mod app;
mod cli;
mod errors;
mod feed;
mod features;
mod models;
mod output;
mod panes;
mod registry;
mod status;
mod util;

use app::{AppState, keys};
use cli::{Cli, Command};
use feed::JsonFeed;
use panes::PaneController;
use registry::Orchestrator;
use status::StatusBar;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Command::Show(args) => cmd_show(args),
    }
}

/// Initialize tracing subscriber.
fn init_tracing(verbose: bool, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Execute the `show` command - select an event and render its document.
fn cmd_show(args: cli::ShowArgs) -> Result<()> {
    tokio::runtime::Runtime::new()
        .context("failed to create tokio runtime")?
        .block_on(show(args))
}

async fn show(args: cli::ShowArgs) -> Result<()> {
    let mut state = AppState::new();
    seed_params(&args, &mut state);

    let mut panes = PaneController::from_state(&state);
    panes.show_pane(args.pane, &mut state);
    panes.show_sidebar(args.sidebar, &mut state);

    let status = StatusBar::shared();
    let mirror = match status.lock() {
        Ok(bar) => Some(tokio::spawn(status::mirror_updates(bar.subscribe()))),
        Err(_) => None,
    };

    let feed = JsonFeed::new(Arc::clone(&status)).context("failed to create feed client")?;
    let mut orchestrator = Orchestrator::new(Arc::new(feed), Arc::clone(&status));

    let document = orchestrator
        .select(&args.eqid, &mut state)
        .await
        .context("selection failed")?;

    if let Some(task) = mirror {
        task.abort();
    }

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    output::write_document(&mut handle, &document, args.format)?;

    Ok(())
}

/// Record CLI overrides as query parameters before the selection begins,
/// so features read them the same way they would a restored session.
fn seed_params(args: &cli::ShowArgs, state: &mut AppState) {
    if let Some(dist) = args.aftershocks_dist {
        state.params.set(keys::AFTERSHOCKS_DIST, dist.to_string());
    }
    if let Some(mag) = args.aftershocks_mag {
        state.params.set(keys::AFTERSHOCKS_MAG, mag.to_string());
    }
    if let Some(dist) = args.historical_dist {
        state.params.set(keys::HISTORICAL_DIST, dist.to_string());
    }
    if let Some(mag) = args.historical_mag {
        state.params.set(keys::HISTORICAL_MAG, mag.to_string());
    }
}
