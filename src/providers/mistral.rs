// SPDX-License-Identifier: MIT
// Mistral FIM provider — POST /v1/fim/completions with SSE streaming.
//
// The response body is consumed chunk-by-chunk: chunks split into lines,
// `data: ` lines accumulate into a message until a blank line, `[DONE]`
// terminates the stream. Each message's delta content fans out as chars.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use super::{CharStream, CompletionProvider, ProviderError};
use crate::cancel::CancelToken;
use crate::config::ProviderConfig;

#[derive(Debug, Serialize)]
struct FimRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    suffix: &'a str,
    stream: bool,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct StreamMessage {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    delta: Delta,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

pub struct MistralClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl MistralClient {
    pub fn new(config: &ProviderConfig) -> anyhow::Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait::async_trait]
impl CompletionProvider for MistralClient {
    async fn completion_stream(
        &self,
        prefix: &str,
        suffix: &str,
        token: &CancelToken,
    ) -> Result<CharStream, ProviderError> {
        let url = format!("{}/v1/fim/completions", self.api_base);
        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, "application/json")
            .json(&FimRequest {
                model: &self.model,
                prompt: prefix,
                suffix,
                stream: true,
                max_tokens: self.max_tokens,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status { status, body });
        }

        let (tx, rx) = mpsc::channel::<char>(64);
        let token = token.clone();
        tokio::spawn(async move {
            pump_sse(response, token, tx).await;
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

/// Read the SSE body, forwarding delta chars until the stream ends, the
/// token fires, or the receiver goes away. Dropping `response` on exit
/// releases the connection.
async fn pump_sse(mut response: reqwest::Response, token: CancelToken, tx: mpsc::Sender<char>) {
    // Byte-accurate line buffer: chunk boundaries may split multibyte chars,
    // so decoding happens per complete line.
    let mut line_buf: Vec<u8> = Vec::new();
    let mut message = String::new();
    let mut usage: Option<Usage> = None;

    'outer: while !token.is_cancelled() {
        let chunk = match response.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "mistral stream read failed");
                break;
            }
        };
        line_buf.extend_from_slice(&chunk);

        while let Some(nl) = line_buf.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = line_buf.drain(..=nl).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if message == "[DONE]" {
                    break 'outer;
                }
                if !message.is_empty() {
                    match serde_json::from_str::<StreamMessage>(&message) {
                        Ok(msg) => {
                            if msg.usage.is_some() {
                                usage = msg.usage;
                            }
                            for choice in &msg.choices {
                                for c in choice.delta.content.chars() {
                                    if token.is_cancelled() || tx.send(c).await.is_err() {
                                        break 'outer;
                                    }
                                }
                            }
                        }
                        Err(e) => warn!(error = %e, "malformed stream message"),
                    }
                }
                message.clear();
            } else if let Some(data) = line.strip_prefix("data: ") {
                message.push_str(data);
            }
        }
    }

    if let Some(usage) = usage {
        debug!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            total_tokens = usage.total_tokens,
            "fim usage"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_message_parses_delta() {
        let raw = r#"{"choices":[{"delta":{"content":"fn ma"},"finish_reason":null}]}"#;
        let msg: StreamMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.choices[0].delta.content, "fn ma");
        assert!(msg.usage.is_none());
    }

    #[test]
    fn stream_message_parses_usage() {
        let raw = r#"{"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#;
        let msg: StreamMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn fim_request_serializes() {
        let req = FimRequest {
            model: "codestral-latest",
            prompt: "let x = ",
            suffix: ";",
            stream: true,
            max_tokens: 64,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["stream"], true);
        assert_eq!(json["prompt"], "let x = ");
        assert_eq!(json["max_tokens"], 64);
    }
}
