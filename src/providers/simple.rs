// SPDX-License-Identifier: MIT
// Simple provider — one POST, whole completion in the response body.
//
// Useful against local bridges and in tests: no auth, no SSE, the body text
// streams out as chars so the engine's filtering path is identical to the
// real streaming providers.

use futures_util::stream;
use serde::Serialize;
use tracing::debug;

use super::{CharStream, CompletionProvider, ProviderError};
use crate::cancel::CancelToken;
use crate::config::ProviderConfig;

#[derive(Debug, Serialize)]
struct SimpleRequest<'a> {
    prefix: &'a str,
    suffix: &'a str,
}

pub struct SimpleClient {
    http: reqwest::Client,
    api_base: String,
}

impl SimpleClient {
    pub fn new(config: &ProviderConfig) -> anyhow::Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            api_base: config.api_base.clone(),
        })
    }
}

#[async_trait::async_trait]
impl CompletionProvider for SimpleClient {
    async fn completion_stream(
        &self,
        prefix: &str,
        suffix: &str,
        token: &CancelToken,
    ) -> Result<CharStream, ProviderError> {
        let response = self
            .http
            .post(&self.api_base)
            .json(&SimpleRequest { prefix, suffix })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status { status, body });
        }

        if token.is_cancelled() {
            return Ok(Box::pin(stream::empty::<char>()));
        }

        let body = response.text().await?;
        debug!(chars = body.chars().count(), "simple provider response");
        let chars: Vec<char> = body.chars().collect();
        Ok(Box::pin(stream::iter(chars)))
    }
}
