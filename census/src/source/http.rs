/// Node HTTP client - block lookups against the public block API
///
/// `POST {node}/api/v1/block` for a height or hash, `GET {node}/api/v1` for the tip.

use super::{BlockRequest, BlockSource, FetchError};
use crate::block::{Block, BlockResponse};
use anyhow::{Context, Result};
use serde::Serialize;
use std::time::Duration;

pub const BLOCK_ROUTE: &str = "/api/v1/block";
pub const BASE_ROUTE: &str = "/api/v1";

#[derive(Debug, Clone, Serialize)]
struct ApiBlockRequest<'a> {
    #[serde(rename = "Height")]
    height: u64,
    #[serde(rename = "HashHex")]
    hash_hex: &'a str,
    #[serde(rename = "FullBlock")]
    full_block: bool,
}

impl<'a> ApiBlockRequest<'a> {
    fn from_request(request: &'a BlockRequest) -> Self {
        match request {
            BlockRequest::ByHeight(height) => Self {
                height: *height,
                hash_hex: "",
                full_block: true,
            },
            BlockRequest::ByHash(hash) => Self {
                height: 0,
                hash_hex: hash,
                full_block: true,
            },
            // The tip goes through BASE_ROUTE; never serialized.
            BlockRequest::Tip => Self {
                height: 0,
                hash_hex: "",
                full_block: true,
            },
        }
    }
}

pub struct HttpBlockSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBlockSource {
    pub fn new(node: &str, timeout: Option<Duration>) -> Result<Self> {
        let base_url = node.trim_end_matches('/').to_string();

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        log::debug!("HttpBlockSource initialized: {}", base_url);

        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn read_block(
        &self,
        request: &BlockRequest,
        response: reqwest::Response,
    ) -> Result<Block, FetchError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                request: request.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let parsed: BlockResponse = response.json().await.map_err(|e| FetchError::Decode {
            request: request.clone(),
            reason: e.to_string(),
        })?;

        parsed.into_block().map_err(|message| FetchError::Node {
            request: request.clone(),
            message,
        })
    }

    fn transport_error(request: &BlockRequest, err: reqwest::Error) -> FetchError {
        FetchError::Transport {
            request: request.clone(),
            reason: err.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl BlockSource for HttpBlockSource {
    async fn fetch_block(&self, request: &BlockRequest) -> Result<Block, FetchError> {
        if *request == BlockRequest::Tip {
            return self.fetch_tip().await;
        }

        let endpoint = format!("{}{}", self.base_url, BLOCK_ROUTE);
        let payload = ApiBlockRequest::from_request(request);

        let response = self
            .client
            .post(&endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Self::transport_error(request, e))?;

        self.read_block(request, response).await
    }

    async fn fetch_tip(&self) -> Result<Block, FetchError> {
        let request = BlockRequest::Tip;
        let endpoint = format!("{}{}", self.base_url, BASE_ROUTE);

        let response = self
            .client
            .get(&endpoint)
            .send()
            .await
            .map_err(|e| Self::transport_error(&request, e))?;

        self.read_block(&request, response).await
    }
}
