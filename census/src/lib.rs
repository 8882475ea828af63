pub mod block;
pub mod source;
pub mod extractor;
pub mod retry;
pub mod collector;
pub mod report;
pub mod config;
pub mod runner;

pub use collector::{BackwardCollector, CollectError, CollectionSummary, Tally};
pub use config::CensusConfig;
pub use runner::run;
pub use source::{BlockRequest, BlockSource, FetchError, HttpBlockSource};
