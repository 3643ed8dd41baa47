//! Command-line interface definitions.
//!
//! Uses clap derive API for argument parsing.

use clap::{Parser, Subcommand};

use crate::errors::QuakeError;
use crate::output::Format;
use crate::panes::{Pane, SideBar};

/// Inspect one earthquake event and its derived data products.
#[derive(Parser, Debug)]
#[command(name = "quakescope")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    pub quiet: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Select an event and show every data product around it
    Show(ShowArgs),
}

/// Arguments for the `show` command.
#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// USGS event id to select (e.g. us7000abcd)
    pub eqid: String,

    /// Aftershock search radius in km (default derived from magnitude)
    #[arg(long = "as-dist")]
    pub aftershocks_dist: Option<f64>,

    /// Minimum aftershock magnitude (default derived from magnitude)
    #[arg(long = "as-mag")]
    pub aftershocks_mag: Option<f64>,

    /// Historical seismicity search radius in km
    #[arg(long = "hs-dist")]
    pub historical_dist: Option<f64>,

    /// Minimum historical magnitude
    #[arg(long = "hs-mag")]
    pub historical_mag: Option<f64>,

    /// Pane to open with
    #[arg(long, default_value = "map", value_parser = parse_pane)]
    pub pane: Pane,

    /// Sidebar to open with
    #[arg(long, default_value = "hidden", value_parser = parse_sidebar)]
    pub sidebar: SideBar,

    /// Output format
    #[arg(long, short = 'f', default_value = "human", value_parser = parse_format)]
    pub format: Format,
}

/// Parse an output format from string.
fn parse_format(s: &str) -> Result<Format, String> {
    s.parse()
}

/// Parse a pane selection from string.
fn parse_pane(s: &str) -> Result<Pane, String> {
    s.parse().map_err(|e: QuakeError| e.to_string())
}

/// Parse a sidebar selection from string.
fn parse_sidebar(s: &str) -> Result<SideBar, String> {
    s.parse().map_err(|e: QuakeError| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_show_defaults() {
        let cli = Cli::parse_from(["quakescope", "show", "us7000abcd"]);
        let Command::Show(args) = cli.command;
        assert_eq!(args.eqid, "us7000abcd");
        assert_eq!(args.pane, Pane::Map);
        assert_eq!(args.sidebar, SideBar::Hidden);
        assert_eq!(args.format, Format::Human);
        assert!(args.aftershocks_dist.is_none());
    }

    #[test]
    fn test_show_overrides() {
        let cli = Cli::parse_from([
            "quakescope",
            "show",
            "nc73292360",
            "--as-dist",
            "40",
            "--as-mag",
            "1.5",
            "--pane",
            "plots",
            "-f",
            "ndjson",
        ]);
        let Command::Show(args) = cli.command;
        assert_eq!(args.aftershocks_dist, Some(40.0));
        assert_eq!(args.aftershocks_mag, Some(1.5));
        assert_eq!(args.pane, Pane::Plots);
        assert_eq!(args.format, Format::Ndjson);
    }

    #[test]
    fn test_bad_pane_rejected() {
        let result = Cli::try_parse_from(["quakescope", "show", "x", "--pane", "browser"]);
        assert!(result.is_err());
    }
}
