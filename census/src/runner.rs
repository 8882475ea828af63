//! One census run: validate, collect, report.
//!
//! The binary only parses flags, sets up logging and hands a source to
//! [`run`]. Everything that decides whether a file gets written lives here.

use crate::collector::{BackwardCollector, CollectionSummary};
use crate::config::CensusConfig;
use crate::report;
use crate::source::BlockSource;
use anyhow::{Context, Result};
use log::{error, info};
use std::io::Write;

/// Run a census against `source`, writing the ranking to `out` and, when
/// configured, to the CSV file.
///
/// The config (output path included) is validated before the first request.
/// On a fatal abort nothing is written, neither to `out` nor to the CSV.
pub async fn run<S, W>(config: &CensusConfig, source: S, out: &mut W) -> Result<CollectionSummary>
where
    S: BlockSource,
    W: Write,
{
    config.validate()?;

    let collector = BackwardCollector::new(source, config.collector_config());

    let summary = match collector.collect().await {
        Ok(summary) => summary,
        Err(e) => {
            error!(
                "Census aborted after {} blocks ({} recipients seen): {}",
                e.blocks_collected(),
                e.partial_tally().len(),
                e
            );
            return Err(e.into());
        }
    };

    report::print_summary(&summary);

    let ranked = report::rank(&summary.tally);
    report::render_console(&ranked, out).context("Failed to write ranking")?;

    if let Some(path) = &config.output_csv_file {
        report::write_csv(&ranked, path)?;
        info!("Wrote {} rows to {}", ranked.len(), path.display());
    }

    Ok(summary)
}
