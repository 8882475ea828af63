// ZION Block Reward Census
//
// Walks a node backward from the tip (or a given height), counts how many
// blocks each reward recipient was paid in, and prints the ranking.

use clap::Parser;
use colored::*;
use std::path::PathBuf;

use census::config::{CensusConfig, DEFAULT_BLOCKS_TO_COLLECT, DEFAULT_DELAY_MS, DEFAULT_NODE};
use census::source::HttpBlockSource;

#[derive(Parser, Debug)]
#[command(
    name = "zion-census",
    version,
    about = "Rank block reward recipients by walking a node's blocks backward",
    long_about = None
)]
struct Cli {
    /// Optional CSV file receiving the sorted recipient -> blocks rows
    #[arg(long, env = "CENSUS_OUTPUT_CSV_FILE")]
    output_csv_file: Option<PathBuf>,

    /// Node to collect data from
    #[arg(long, env = "CENSUS_NODE", default_value = DEFAULT_NODE)]
    node: String,

    /// Height to start from. The walk steps back to
    /// max(genesis, starting height - blocks to collect). Defaults to the tip.
    #[arg(long, env = "CENSUS_STARTING_BLOCK_HEIGHT")]
    starting_block_height: Option<u64>,

    /// Number of blocks to collect moving backward
    #[arg(long, env = "CENSUS_BLOCKS_TO_COLLECT", default_value_t = DEFAULT_BLOCKS_TO_COLLECT)]
    blocks_to_collect: u64,

    /// Delay between requests and after failed requests (ms)
    #[arg(long, env = "CENSUS_DELAY_MILLISECONDS", default_value_t = DEFAULT_DELAY_MS)]
    delay_milliseconds: u64,

    /// Give up on a block after this many retries (default: retry forever)
    #[arg(long, env = "CENSUS_MAX_RETRIES")]
    max_retries: Option<u32>,

    /// Per-request timeout (ms). Transport default when unset.
    #[arg(long, env = "CENSUS_REQUEST_TIMEOUT_MS")]
    request_timeout_ms: Option<u64>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Quiet mode (warnings and errors only)
    #[arg(short, long)]
    quiet: bool,

    /// Debug logging
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn into_config(self) -> CensusConfig {
        CensusConfig {
            output_csv_file: self.output_csv_file,
            node: self.node,
            starting_block_height: self.starting_block_height,
            blocks_to_collect: self.blocks_to_collect,
            delay_ms: self.delay_milliseconds,
            max_retries: self.max_retries,
            request_timeout_ms: self.request_timeout_ms,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    if cli.debug {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else if cli.quiet {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Warn)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    if cli.no_color {
        colored::control::set_override(false);
    }

    let config = cli.into_config();
    config.validate()?;

    let start = match config.starting_block_height {
        Some(height) => format!("height {}", height),
        None => "tip".to_string(),
    };
    let retries = match config.max_retries {
        Some(n) => n.to_string(),
        None => "unbounded".to_string(),
    };
    println!("{} {}", " * ".bright_green().bold(), "CONFIG".bright_white().bold());
    println!("{}  {:<12} {}", "   ".bright_black(), "node".bright_black(), config.node.bright_white());
    println!("{}  {:<12} {}", "   ".bright_black(), "start".bright_black(), start.bright_cyan());
    println!("{}  {:<12} {}", "   ".bright_black(), "blocks".bright_black(), config.blocks_to_collect.to_string().bright_magenta().bold());
    println!("{}  {:<12} {}ms", "   ".bright_black(), "delay".bright_black(), config.delay_ms.to_string().bright_cyan());
    println!("{}  {:<12} {}", "   ".bright_black(), "retries".bright_black(), retries.bright_cyan());
    if let Some(path) = &config.output_csv_file {
        println!("{}  {:<12} {}", "   ".bright_black(), "csv".bright_black(), path.display().to_string().bright_white());
    }
    println!();

    let source = HttpBlockSource::new(&config.node, config.request_timeout())?;
    census::run(&config, source, &mut std::io::stdout()).await?;

    Ok(())
}
