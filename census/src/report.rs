//! Ranking and output of the final tally.

use crate::collector::{CollectionSummary, Tally};
use anyhow::{Context, Result};
use colored::*;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedEntry {
    pub recipient: String,
    pub blocks: u64,
}

/// Count descending, then recipient ascending.
pub fn rank(tally: &Tally) -> Vec<RankedEntry> {
    let mut ranked: Vec<RankedEntry> = tally
        .iter()
        .map(|(recipient, blocks)| RankedEntry {
            recipient: recipient.to_string(),
            blocks,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.blocks
            .cmp(&a.blocks)
            .then_with(|| a.recipient.cmp(&b.recipient))
    });
    ranked
}

/// One `<recipient> <blocks>` line per entry.
pub fn render_console<W: Write>(ranked: &[RankedEntry], out: &mut W) -> std::io::Result<()> {
    for entry in ranked {
        writeln!(out, "{} {}", entry.recipient, entry.blocks)?;
    }
    out.flush()
}

/// Two-column `recipient,blocks` rows, no header.
pub fn write_csv_to<W: Write>(ranked: &[RankedEntry], out: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    for entry in ranked {
        let blocks = entry.blocks.to_string();
        wtr.write_record([entry.recipient.as_str(), blocks.as_str()])
            .context("Failed to write CSV row")?;
    }
    wtr.flush().context("Failed to flush CSV output")?;
    Ok(())
}

/// Create (or truncate) `path` and write the ranking to it.
pub fn write_csv(ranked: &[RankedEntry], path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create output file {}", path.display()))?;
    write_csv_to(ranked, file)
}

pub fn print_summary(summary: &CollectionSummary) {
    let state = &summary.state;
    let ended = if state.reached_genesis() {
        "genesis".bright_green()
    } else {
        "sample target".bright_cyan()
    };

    println!();
    println!("{} {}", " * ".bright_green().bold(), "CENSUS".bright_white().bold());
    println!("{}  {:<12} {}", "   ".bright_black(), "node".bright_black(), state.node.bright_white());
    println!(
        "{}  {:<12} {} {} {}",
        "   ".bright_black(),
        "heights".bright_black(),
        summary.start_height.to_string().bright_magenta(),
        "→".bright_black(),
        summary.end_height().to_string().bright_magenta(),
    );
    println!(
        "{}  {:<12} {} of {} {}",
        "   ".bright_black(),
        "blocks".bright_black(),
        state.blocks_collected.to_string().bright_cyan().bold(),
        state.target,
        format!("(stopped at {})", ended).bright_black(),
    );
    println!(
        "{}  {:<12} {}",
        "   ".bright_black(),
        "recipients".bright_black(),
        summary.tally.len().to_string().bright_cyan(),
    );
    if summary.fetch_failures > 0 {
        println!(
            "{}  {:<12} {}",
            "   ".bright_black(),
            "retries".bright_black(),
            summary.fetch_failures.to_string().bright_yellow(),
        );
    }
    println!();
}
