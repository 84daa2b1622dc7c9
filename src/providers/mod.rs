// SPDX-License-Identifier: MIT
// LLM provider clients — the engine treats provider identity and protocol as
// opaque: a provider turns (prefix, suffix) into a stream of chars and can
// fail with a transport error or be aborted via the cancel token.

pub mod mistral;
pub mod simple;

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::Stream;
use thiserror::Error;

use crate::cancel::CancelToken;
use crate::config::{ProviderConfig, ProviderKind};

/// Streamed completion text, one char at a time.
pub type CharStream = Pin<Box<dyn Stream<Item = char> + Send>>;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// Non-success HTTP status from the provider.
    #[error("completion request failed: {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    /// Connection/protocol failure before or while streaming.
    #[error("provider transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// A streamed text-generation backend.
///
/// Implementations must check `token` between chunks and release the
/// underlying transport once it fires; cancellation ends the stream, it is
/// never surfaced as an error.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn completion_stream(
        &self,
        prefix: &str,
        suffix: &str,
        token: &CancelToken,
    ) -> Result<CharStream, ProviderError>;
}

/// Build the configured provider client.
pub fn from_config(config: &ProviderConfig) -> anyhow::Result<Arc<dyn CompletionProvider>> {
    match config.kind {
        ProviderKind::Mistral => Ok(Arc::new(mistral::MistralClient::new(config)?)),
        ProviderKind::Simple => Ok(Arc::new(simple::SimpleClient::new(config)?)),
    }
}
