//! Block sources - where the census gets its blocks from.
//!
//! A source does exactly one round trip per call and never retries; the
//! collector owns the retry policy.

pub mod http;

pub use http::HttpBlockSource;

use crate::block::Block;
use std::fmt;
use std::sync::Arc;

/// What the caller asked a source for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BlockRequest {
    ByHeight(u64),
    ByHash(String),
    Tip,
}

impl fmt::Display for BlockRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockRequest::ByHeight(h) => write!(f, "block at height {}", h),
            BlockRequest::ByHash(hash) => write!(f, "block with hash {}", hash),
            BlockRequest::Tip => write!(f, "chain tip"),
        }
    }
}

/// A failed fetch. Every variant is transient from the collector's point of view.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request for {request} failed: {reason}")]
    Transport { request: BlockRequest, reason: String },

    #[error("request for {request} got HTTP {status}: {body}")]
    Status {
        request: BlockRequest,
        status: u16,
        body: String,
    },

    #[error("request for {request} returned an unreadable body: {reason}")]
    Decode { request: BlockRequest, reason: String },

    #[error("node rejected request for {request}: {message}")]
    Node { request: BlockRequest, message: String },
}

impl FetchError {
    pub fn request(&self) -> &BlockRequest {
        match self {
            FetchError::Transport { request, .. }
            | FetchError::Status { request, .. }
            | FetchError::Decode { request, .. }
            | FetchError::Node { request, .. } => request,
        }
    }
}

/// Block source trait
#[async_trait::async_trait]
pub trait BlockSource: Send + Sync {
    /// Fetch a full block (transactions included) by height or by hash.
    async fn fetch_block(&self, request: &BlockRequest) -> Result<Block, FetchError>;

    /// Fetch the node's current tip.
    async fn fetch_tip(&self) -> Result<Block, FetchError>;

    /// Dispatch any request, including [`BlockRequest::Tip`].
    async fn fetch(&self, request: &BlockRequest) -> Result<Block, FetchError> {
        match request {
            BlockRequest::Tip => self.fetch_tip().await,
            other => self.fetch_block(other).await,
        }
    }
}

#[async_trait::async_trait]
impl<T: BlockSource + ?Sized> BlockSource for Arc<T> {
    async fn fetch_block(&self, request: &BlockRequest) -> Result<Block, FetchError> {
        (**self).fetch_block(request).await
    }

    async fn fetch_tip(&self) -> Result<Block, FetchError> {
        (**self).fetch_tip().await
    }
}
