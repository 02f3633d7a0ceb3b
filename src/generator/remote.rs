use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::debug;

use crate::readings::Fields;

/// Submits readings to a running ingestion service over HTTP.
#[derive(Debug, Clone)]
pub struct RemoteSink {
    http: Client,
    url: String,
}

impl RemoteSink {
    /// `url` is the full submit endpoint, e.g. `http://localhost:5000/readings`.
    /// A request still unanswered after `timeout` fails, so one silent
    /// target cannot hold up later cycles.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST `fields` as a JSON object. Any non-2xx status is an error.
    pub async fn submit(&self, fields: &Fields) -> Result<()> {
        let resp = self
            .http
            .post(&self.url)
            .json(fields)
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.url))?
            .error_for_status()
            .with_context(|| format!("{} rejected the reading", self.url))?;

        debug!(url = %self.url, status = %resp.status(), "reading delivered");
        Ok(())
    }
}
