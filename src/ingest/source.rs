// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Upstream country feeds.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

/// Longest upstream error body kept in a [`SourceError::Status`].
const MAX_ERROR_BODY: usize = 512;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Upstream returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Unexpected upstream payload: {0}")]
    Decode(String),
}

/// A source of raw country records.
#[async_trait]
pub trait CountrySource: Send + Sync {
    async fn fetch_batch(&self) -> Result<Vec<Value>, SourceError>;
}

/// restcountries.com v3.1 client.
pub struct RestCountriesClient {
    client: reqwest::Client,
    url: String,
}

impl RestCountriesClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("country-service/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, url: url.into() })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl CountrySource for RestCountriesClient {
    async fn fetch_batch(&self) -> Result<Vec<Value>, SourceError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(SourceError::Status { status: status.as_u16(), body });
        }

        match response.json::<Value>().await? {
            Value::Array(items) => {
                debug!(count = items.len(), url = %self.url, "Fetched upstream batch");
                Ok(items)
            }
            other => Err(SourceError::Decode(format!(
                "expected a JSON array, got {}",
                type_name(&other)
            ))),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Fixed in-process batch, replaceable between runs.
#[derive(Default)]
pub struct StaticSource {
    batch: RwLock<Vec<Value>>,
}

impl StaticSource {
    pub fn new(batch: Vec<Value>) -> Self {
        Self { batch: RwLock::new(batch) }
    }

    /// Swap in the batch served by the next fetch.
    pub async fn replace(&self, batch: Vec<Value>) {
        *self.batch.write().await = batch;
    }
}

#[async_trait]
impl CountrySource for StaticSource {
    async fn fetch_batch(&self) -> Result<Vec<Value>, SourceError> {
        Ok(self.batch.read().await.clone())
    }
}
