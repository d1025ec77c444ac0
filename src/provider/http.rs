use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use super::{RawReply, Transport};
use crate::errors::TransportError;
use crate::wire::ChatRequest;

const RETRY_PAUSE: Duration = Duration::from_millis(500);

/// Messages-style endpoint over reqwest. Transport failures are retried a
/// bounded number of times; HTTP error statuses are handed back untouched.
pub struct HttpTransport {
    client: Client,
    api_base: String,
    api_version: String,
    retries: u32,
}

impl HttpTransport {
    pub fn new(api_base: &str, api_version: &str, timeout: Duration, retries: u32) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_version: api_version.to_string(),
            retries,
        })
    }

    async fn send_once(&self, url: &str, api_key: &str, req: &ChatRequest) -> Result<RawReply, reqwest::Error> {
        let resp = self
            .client
            .post(url)
            .header("x-api-key", api_key)
            .header("anthropic-version", &self.api_version)
            .json(req)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        Ok(RawReply { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, api_key: &str, req: &ChatRequest) -> Result<RawReply, TransportError> {
        let url = format!("{}/v1/messages", self.api_base);
        let mut attempt = 0;
        loop {
            debug!(%url, model = %req.model, attempt, "POST");
            match self.send_once(&url, api_key, req).await {
                Ok(reply) => return Ok(reply),
                Err(e) if attempt < self.retries && (e.is_timeout() || e.is_connect()) => {
                    warn!(error = %e, attempt, "transient transport failure, retrying");
                    attempt += 1;
                    tokio::time::sleep(RETRY_PAUSE).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
