//! Output side of a harvest: the JSONL product file and the summary table.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, info};

use crate::model::{ProductRecord, SummaryEntry};

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub trait Sink: Send + Sync {
    /// Durably appends `records`, returning how many were written.
    fn append(&self, records: &[ProductRecord]) -> Result<usize, SinkError>;

    /// Presents the run summary to a human.
    fn summarize(&self, entries: &[SummaryEntry]) -> Result<(), SinkError>;
}

/// Appends records as newline-delimited JSON and prints summaries to stdout.
#[derive(Debug, Clone)]
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Sink for JsonlSink {
    fn append(&self, records: &[ProductRecord]) -> Result<usize, SinkError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = BufWriter::new(file);
        for record in records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;

        info!("Saved {} records to {}", records.len(), self.path.display());
        Ok(records.len())
    }

    fn summarize(&self, entries: &[SummaryEntry]) -> Result<(), SinkError> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "\n=== Scraping Summary ===")?;
        write!(stdout, "{}", render_summary(entries))?;
        stdout.flush()?;
        Ok(())
    }
}

/// Hands a finished harvest to `sink`. Failures are logged and swallowed:
/// the harvest itself already succeeded.
pub fn deliver<S: Sink + ?Sized>(sink: &S, records: &[ProductRecord], summary: &[SummaryEntry]) {
    if let Err(e) = sink.append(records) {
        error!(error = %e, "Failed to save data");
    }
    if let Err(e) = sink.summarize(summary) {
        error!(error = %e, "Failed to display summary");
    }
}

/// Renders `entries` as a markdown table followed by a totals line.
pub fn render_summary(entries: &[SummaryEntry]) -> String {
    const HEADERS: [&str; 4] = ["Category", "Subcategory", "Listed", "Scraped"];

    let rows: Vec<[String; 4]> = entries
        .iter()
        .map(|entry| {
            [
                entry.category.clone(),
                entry.subcategory.clone(),
                entry.listed.to_string(),
                entry.scraped.to_string(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(|header| header.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let header: Vec<String> = HEADERS
        .iter()
        .zip(widths)
        .map(|(header, width)| format!("{header:<width$}"))
        .collect();
    out.push_str(&format!("| {} |\n", header.join(" | ")));

    // Text columns left-aligned, counts right-aligned.
    let rule: Vec<String> = widths
        .iter()
        .enumerate()
        .map(|(i, width)| {
            let dashes = "-".repeat(width + 1);
            if i < 2 {
                format!(":{dashes}")
            } else {
                format!("{dashes}:")
            }
        })
        .collect();
    out.push_str(&format!("|{}|\n", rule.join("|")));

    for row in &rows {
        let cells: Vec<String> = row
            .iter()
            .zip(widths)
            .enumerate()
            .map(|(i, (cell, width))| {
                if i < 2 {
                    format!("{cell:<width$}")
                } else {
                    format!("{cell:>width$}")
                }
            })
            .collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }

    let listed: usize = entries.iter().map(|entry| entry.listed).sum();
    let scraped: usize = entries.iter().map(|entry| entry.scraped).sum();
    out.push_str(&format!(
        "\nTotal: {} subcategories, {listed} listed, {scraped} scraped\n",
        entries.len()
    ));
    out
}
