//! Backward collector - walks the chain from a start block toward genesis
//!
//! One request in flight at a time. Each step follows the current header's
//! back-link by hash, so the walk is a plain linked-list traversal in strictly
//! descending height. Fetch failures are retried through [`RetryPolicy`];
//! malformed blocks end the run.

use crate::block::{Block, BlockHeader};
use crate::extractor::{extract_recipients, ValidationError};
use crate::retry::RetryPolicy;
use crate::source::{BlockRequest, BlockSource, FetchError};
use log::{debug, error, info, warn};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Blocks credited per reward recipient.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    counts: BTreeMap<String, u64>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit one block to each distinct recipient. Returns how many were credited.
    pub fn record_block(&mut self, recipients: &[String]) -> usize {
        let mut seen_this_block: HashSet<&str> = HashSet::with_capacity(recipients.len());
        for recipient in recipients {
            if !seen_this_block.insert(recipient.as_str()) {
                continue;
            }
            *self.counts.entry(recipient.clone()).or_insert(0) += 1;
        }
        seen_this_block.len()
    }

    pub fn get(&self, recipient: &str) -> u64 {
        self.counts.get(recipient).copied().unwrap_or(0)
    }

    /// Number of distinct recipients.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts, i.e. the number of (block, recipient) credits.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, u64)> for Tally {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        Self {
            counts: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Height of the first block; `None` starts at the tip.
    pub starting_height: Option<u64>,
    pub blocks_to_collect: u64,
    pub retry: RetryPolicy,
    /// Node endpoint, for logs and the summary.
    pub node: String,
}

/// Where the walk stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalState {
    pub current: BlockHeader,
    pub blocks_collected: u64,
    pub target: u64,
    pub node: String,
    pub retry_delay: Duration,
}

impl TraversalState {
    pub fn reached_genesis(&self) -> bool {
        self.current.is_genesis()
    }

    pub fn is_done(&self) -> bool {
        self.reached_genesis() || self.blocks_collected == self.target
    }
}

#[derive(Debug, Clone)]
pub struct CollectionSummary {
    pub tally: Tally,
    pub state: TraversalState,
    pub start_height: u64,
    /// Failed fetch attempts absorbed by retries over the whole run.
    pub fetch_failures: u64,
}

impl CollectionSummary {
    pub fn blocks_collected(&self) -> u64 {
        self.state.blocks_collected
    }

    pub fn end_height(&self) -> u64 {
        self.state.current.height
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("invalid block after {blocks_collected} collected blocks: {source}")]
    InvalidBlock {
        #[source]
        source: ValidationError,
        blocks_collected: u64,
        partial: Tally,
    },

    #[error("gave up on {request} after {attempts} attempts ({blocks_collected} blocks collected): {source}")]
    RetriesExhausted {
        request: BlockRequest,
        attempts: u32,
        #[source]
        source: FetchError,
        blocks_collected: u64,
        partial: Tally,
    },
}

impl CollectError {
    pub fn blocks_collected(&self) -> u64 {
        match self {
            CollectError::InvalidBlock { blocks_collected, .. }
            | CollectError::RetriesExhausted { blocks_collected, .. } => *blocks_collected,
        }
    }

    /// Tally as of the last block processed before the abort.
    pub fn partial_tally(&self) -> &Tally {
        match self {
            CollectError::InvalidBlock { partial, .. }
            | CollectError::RetriesExhausted { partial, .. } => partial,
        }
    }
}

pub struct BackwardCollector<S> {
    source: S,
    config: CollectorConfig,
}

impl<S: BlockSource> BackwardCollector<S> {
    pub fn new(source: S, config: CollectorConfig) -> Self {
        Self { source, config }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Run the census to completion.
    pub async fn collect(&self) -> Result<CollectionSummary, CollectError> {
        let mut tally = Tally::new();
        let mut fetch_failures: u64 = 0;

        // Phase 1: start block
        let start_request = match self.config.starting_height {
            Some(height) => BlockRequest::ByHeight(height),
            None => BlockRequest::Tip,
        };
        let start = self
            .fetch_with_retry(&start_request, self.config.starting_height, 0, &tally, &mut fetch_failures)
            .await?;
        info!(
            "Got starting block with hash: {} height: {}",
            start.header.hash, start.header.height
        );

        let recipients = extract_recipients(&start).map_err(|source| CollectError::InvalidBlock {
            source,
            blocks_collected: 0,
            partial: tally.clone(),
        })?;
        tally.record_block(&recipients);

        let start_height = start.header.height;
        let mut state = TraversalState {
            current: start.header,
            blocks_collected: 1,
            target: self.config.blocks_to_collect,
            node: self.config.node.clone(),
            retry_delay: self.config.retry.delay(),
        };

        // Phase 2: follow back-links
        while !state.is_done() {
            info!(
                "Starting block {} of {}",
                state.blocks_collected + 1,
                state.target
            );

            if state.current.prev_hash.is_empty() {
                return Err(CollectError::InvalidBlock {
                    source: ValidationError::MissingBackLink {
                        height: state.current.height,
                    },
                    blocks_collected: state.blocks_collected,
                    partial: tally,
                });
            }

            let request = BlockRequest::ByHash(state.current.prev_hash.clone());
            let expected_height = state.current.height.checked_sub(1);
            let block = self
                .fetch_with_retry(
                    &request,
                    expected_height,
                    state.blocks_collected,
                    &tally,
                    &mut fetch_failures,
                )
                .await?;

            let recipients = match extract_recipients(&block) {
                Ok(recipients) => recipients,
                Err(source) => {
                    return Err(CollectError::InvalidBlock {
                        source,
                        blocks_collected: state.blocks_collected,
                        partial: tally,
                    })
                }
            };
            let credited = tally.record_block(&recipients);

            if block.header.height + 1 != state.current.height {
                warn!(
                    "Back-link of height {} led to height {}",
                    state.current.height, block.header.height
                );
            }
            info!(
                "Got block with hash: {} height: {}",
                block.header.hash, block.header.height
            );
            debug!(
                "{} recipients credited, {} distinct so far",
                credited,
                tally.len()
            );

            state.current = block.header;
            state.blocks_collected += 1;

            // Pacing between requests, independent of failures.
            if !state.is_done() {
                self.config.retry.pause().await;
            }
        }

        // Phase 3
        if state.reached_genesis() {
            info!("Reached genesis after {} blocks", state.blocks_collected);
        } else {
            info!("Collected {} blocks", state.blocks_collected);
        }

        Ok(CollectionSummary {
            tally,
            state,
            start_height,
            fetch_failures,
        })
    }

    async fn fetch_with_retry(
        &self,
        request: &BlockRequest,
        expected_height: Option<u64>,
        blocks_collected: u64,
        tally: &Tally,
        fetch_failures: &mut u64,
    ) -> Result<Block, CollectError> {
        let what = format!("fetch of {} from {}", request, self.config.node);
        let node_errors = NodeErrorLog::new(request, expected_height);
        let node_errors = &node_errors;
        let source = &self.source;
        let attempt = move || async move {
            let result = source.fetch(request).await;
            if let Err(err) = &result {
                if let Some(message) = node_errors.note(err) {
                    error!("{}", message);
                }
            }
            result
        };
        match self.config.retry.run(&what, attempt).await {
            Ok(retried) => {
                *fetch_failures += u64::from(retried.failures);
                Ok(retried.value)
            }
            Err(exhausted) => Err(CollectError::RetriesExhausted {
                request: request.clone(),
                attempts: exhausted.attempts,
                source: exhausted.last_error,
                blocks_collected,
                partial: tally.clone(),
            }),
        }
    }
}

/// First node-side rejection of one request, reported once at error level.
/// Later rejections of the same request only show up as retry warnings.
struct NodeErrorLog<'a> {
    request: &'a BlockRequest,
    expected_height: Option<u64>,
    reported: AtomicBool,
}

impl<'a> NodeErrorLog<'a> {
    fn new(request: &'a BlockRequest, expected_height: Option<u64>) -> Self {
        Self {
            request,
            expected_height,
            reported: AtomicBool::new(false),
        }
    }

    fn note(&self, err: &FetchError) -> Option<String> {
        let FetchError::Node { message, .. } = err else {
            return None;
        };
        if self.reported.swap(true, Ordering::Relaxed) {
            return None;
        }

        let height = match self.expected_height {
            Some(height) => format!("height {}", height),
            None => "the tip".to_string(),
        };
        Some(format!(
            "Node returned no block for {} (expected {}): {}; retrying until it does",
            self.request, height, message
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_tally_counts_once_per_block() {
        let mut tally = Tally::new();
        assert_eq!(tally.record_block(&keys(&["A", "B", "A"])), 2);
        assert_eq!(tally.record_block(&keys(&["A"])), 1);

        assert_eq!(tally.get("A"), 2);
        assert_eq!(tally.get("B"), 1);
        assert_eq!(tally.get("C"), 0);
        assert_eq!(tally.total(), 3);
        assert_eq!(tally.len(), 2);
    }

    #[test]
    fn test_empty_block_credits_nobody() {
        let mut tally = Tally::new();
        assert_eq!(tally.record_block(&[]), 0);
        assert!(tally.is_empty());
    }

    #[test]
    fn test_traversal_state_done() {
        let mut state = TraversalState {
            current: BlockHeader {
                height: 5,
                hash: "05".into(),
                prev_hash: "04".into(),
            },
            blocks_collected: 1,
            target: 3,
            node: "http://node".into(),
            retry_delay: Duration::ZERO,
        };
        assert!(!state.is_done());

        state.blocks_collected = 3;
        assert!(state.is_done());

        state.blocks_collected = 1;
        state.current.height = 0;
        assert!(state.reached_genesis());
        assert!(state.is_done());
    }

    #[test]
    fn test_node_error_reported_once_per_request() {
        let request = BlockRequest::ByHash("0a".into());
        let log = NodeErrorLog::new(&request, Some(41));
        let rejected = FetchError::Node {
            request: request.clone(),
            message: "block not found".into(),
        };

        let message = log.note(&rejected).unwrap();
        assert!(message.contains("height 41"));
        assert!(message.contains("block with hash 0a"));
        assert!(message.contains("block not found"));
        assert!(log.note(&rejected).is_none());
    }

    #[test]
    fn test_transport_errors_are_not_node_errors() {
        let request = BlockRequest::Tip;
        let log = NodeErrorLog::new(&request, None);
        let refused = FetchError::Transport {
            request: request.clone(),
            reason: "connection refused".into(),
        };
        assert!(log.note(&refused).is_none());

        let missing_header = FetchError::Node {
            request: request.clone(),
            message: "response carried no block header".into(),
        };
        assert!(log.note(&missing_header).unwrap().contains("expected the tip"));
    }
}
