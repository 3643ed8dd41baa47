//! Output formatters for the selection document.
//!
//! Supports human-readable (with colors), JSON, and NDJSON formats.

use std::io::{self, Write};

use crate::registry::{FeatureStatus, SummaryDocument};

// ANSI color codes
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

// Magnitude-based colors
const RED: &str = "\x1b[91m";      // Critical: mag >= 7.0
const YELLOW: &str = "\x1b[93m";   // Warning: mag >= 6.0
const CYAN: &str = "\x1b[96m";     // Significant: mag >= 4.5
const GREEN: &str = "\x1b[92m";    // Moderate: mag >= 3.0
const WHITE: &str = "\x1b[97m";    // Minor: mag < 3.0

// Alert level colors
const ALERT_GREEN: &str = "\x1b[42;30m";   // Green background
const ALERT_YELLOW: &str = "\x1b[43;30m";  // Yellow background
const ALERT_ORANGE: &str = "\x1b[48;5;208;30m"; // Orange background
const ALERT_RED: &str = "\x1b[41;97m";     // Red background

// Icons for visual richness
const ICON_QUAKE: &str = "🌍";
const ICON_MARKER: &str = "📍";

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Human-readable terminal output (default)
    #[default]
    Human,
    /// Pretty-printed JSON document
    Json,
    /// Newline-delimited JSON (one feature report per line)
    Ndjson,
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            "ndjson" => Ok(Self::Ndjson),
            _ => Err(format!("unknown format: {s} (expected: human, json, ndjson)")),
        }
    }
}

/// Get the color code for a magnitude value.
fn magnitude_color(mag: Option<f64>) -> &'static str {
    match mag {
        Some(m) if m >= 7.0 => RED,
        Some(m) if m >= 6.0 => YELLOW,
        Some(m) if m >= 4.5 => CYAN,
        Some(m) if m >= 3.0 => GREEN,
        _ => WHITE,
    }
}

/// Get severity label for magnitude.
fn magnitude_label(mag: Option<f64>) -> &'static str {
    match mag {
        Some(m) if m >= 7.0 => "MAJOR",
        Some(m) if m >= 6.0 => "STRONG",
        Some(m) if m >= 4.5 => "MODERATE",
        Some(m) if m >= 3.0 => "LIGHT",
        Some(m) if m >= 2.0 => "MINOR",
        _ => "MICRO",
    }
}

/// Format alert level with color.
fn format_alert(alert: Option<&str>) -> String {
    match alert {
        Some("red") => format!(" {ALERT_RED} RED {RESET}"),
        Some("orange") => format!(" {ALERT_ORANGE} ORANGE {RESET}"),
        Some("yellow") => format!(" {ALERT_YELLOW} YELLOW {RESET}"),
        Some("green") => format!(" {ALERT_GREEN} GREEN {RESET}"),
        _ => String::new(),
    }
}

/// Write the selection document in human-readable format with rich colors.
///
/// The mainshock report becomes the header, tinted by magnitude; every other
/// ready feature gets its own section. Skipped features show dimmed, and
/// errored ones are collected into a trailing "Unavailable" list.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_human<W: Write>(writer: &mut W, doc: &SummaryDocument) -> io::Result<()> {
    let color = magnitude_color(doc.mag);
    let label = magnitude_label(doc.mag);
    let alert = format_alert(doc.alert.as_deref());

    let header = doc
        .features
        .iter()
        .find(|f| f.id == "mainshock" && f.status == FeatureStatus::Ready);

    match header {
        Some(report) => {
            writeln!(
                writer,
                "{ICON_QUAKE} {color}{BOLD}{title}{RESET} │ {color}{label}{RESET}{alert}",
                title = report.title
            )?;
            for line in &report.lines {
                writeln!(writer, "   {line}")?;
            }
        }
        None => writeln!(writer, "{ICON_QUAKE} {BOLD}{}{RESET}", doc.eqid)?,
    }

    for report in &doc.features {
        if report.id == "mainshock" {
            continue;
        }
        match report.status {
            FeatureStatus::Ready => {
                let markers = if report.show_layer && report.marker_count > 0 {
                    format!(" {DIM}{ICON_MARKER} {}{RESET}", report.marker_count)
                } else {
                    String::new()
                };
                writeln!(writer)?;
                writeln!(writer, "{BOLD}{}{RESET}{markers}", report.title)?;
                for line in &report.lines {
                    writeln!(writer, "   {line}")?;
                }
            }
            FeatureStatus::Skipped => {
                writeln!(writer)?;
                writeln!(writer, "{DIM}{} (skipped){RESET}", report.name)?;
            }
            _ => {}
        }
    }

    let unavailable = doc.unavailable();
    if !unavailable.is_empty() {
        writeln!(writer)?;
        for report in unavailable {
            let detail = report.error.as_deref().unwrap_or("unknown error");
            writeln!(writer, "{DIM}Unavailable: {} ({detail}){RESET}", report.name)?;
        }
    }

    Ok(())
}

/// Write the selection document as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json<W: Write>(writer: &mut W, doc: &SummaryDocument) -> io::Result<()> {
    let json = serde_json::to_string_pretty(doc)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{json}")
}

/// Write the selection document as newline-delimited JSON.
///
/// Each feature report is written as a single line of JSON.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_ndjson<W: Write>(writer: &mut W, doc: &SummaryDocument) -> io::Result<()> {
    for report in &doc.features {
        let json = serde_json::to_string(report)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writeln!(writer, "{json}")?;
    }
    Ok(())
}

/// Write the selection document in the specified format.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_document<W: Write>(
    writer: &mut W,
    doc: &SummaryDocument,
    format: Format,
) -> io::Result<()> {
    match format {
        Format::Human => write_human(writer, doc),
        Format::Json => write_json(writer, doc),
        Format::Ndjson => write_ndjson(writer, doc),
    }
}
