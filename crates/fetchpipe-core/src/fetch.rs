//! Fetch layer
//!
//! The engine talks to origins only through [`Fetcher`]: a short sniff of
//! the leading bytes, and a full fetch returning a status and a body
//! stream. Only status 200 leads to persistence.

use crate::config::PipelineConfig;
use crate::error::FetchError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use std::fmt;

/// Body of a fetched resource, chunk by chunk
pub type BodyStream = BoxStream<'static, Result<Vec<u8>, FetchError>>;

/// Status and body of a full fetch
pub struct FetchResponse {
    /// HTTP-style status code
    pub status: u16,
    /// Response body
    pub body: BodyStream,
}

impl FetchResponse {
    /// Whether the status permits persisting the body
    #[inline]
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

impl fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Source of remote resources
#[async_trait]
pub trait Fetcher: Send + Sync + fmt::Debug {
    /// Read at most `limit` leading bytes of `url`.
    async fn sniff(&self, url: &str, limit: usize) -> Result<Vec<u8>, FetchError>;

    /// Start a full download of `url`.
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError>;
}

/// [`Fetcher`] over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher from the engine configuration
    ///
    /// # Errors
    /// `FetchError::Client` if the TLS backend cannot be initialized
    pub fn new(config: &PipelineConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        self.client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::transport(url, e))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn sniff(&self, url: &str, limit: usize) -> Result<Vec<u8>, FetchError> {
        let mut response = self.get(url).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }

        let mut head = Vec::with_capacity(limit);
        while head.len() < limit {
            match response
                .chunk()
                .await
                .map_err(|e| FetchError::transport(url, e))?
            {
                Some(chunk) => head.extend_from_slice(&chunk),
                None => break,
            }
        }
        head.truncate(limit);
        Ok(head)
    }

    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let response = self.get(url).await?;
        let status = response.status().as_u16();
        let owned_url = url.to_owned();
        let body = response
            .bytes_stream()
            .map_ok(|bytes| bytes.to_vec())
            .map_err(move |e| FetchError::transport(owned_url.as_str(), e))
            .boxed();
        Ok(FetchResponse { status, body })
    }
}
