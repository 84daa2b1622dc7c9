// SPDX-License-Identifier: MIT
// Engine and provider configuration (`codetab.toml`).

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const DEFAULT_PREFIX_LENGTH: usize = 2000;
const DEFAULT_SUFFIX_LENGTH: usize = 1000;
const DEFAULT_MATCH_LENGTH: usize = 100;
const DEFAULT_SEARCH_LENGTH: usize = 30;
const DEFAULT_MODEL: &str = "codestral-latest";
const DEFAULT_MAX_TOKENS: u32 = 64;

// ─── EngineConfig ─────────────────────────────────────────────────────────────

/// Context-window lengths used when deriving prefix/suffix/anchors from the
/// document (`[engine]` in codetab.toml). All lengths are in chars.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Chars of document text before the cursor sent to the provider.
    pub prefix_length: usize,
    /// Chars of document text after the cursor sent to the provider.
    pub suffix_length: usize,
    /// Trailing prefix chars a generation is conditioned on (the anchor).
    pub match_length: usize,
    /// Trailing prefix chars used when matching against pooled responses.
    /// Must not exceed `match_length`.
    pub search_length: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            prefix_length: DEFAULT_PREFIX_LENGTH,
            suffix_length: DEFAULT_SUFFIX_LENGTH,
            match_length: DEFAULT_MATCH_LENGTH,
            search_length: DEFAULT_SEARCH_LENGTH,
        }
    }
}

// ─── ProviderConfig ───────────────────────────────────────────────────────────

/// Which LLM provider backend to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Mistral FIM endpoint with SSE streaming.
    Mistral,
    /// Plain POST `{prefix, suffix}` returning the completion body.
    Simple,
}

/// Provider connection settings (`[provider]` in codetab.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Mistral,
            api_base: "https://api.mistral.ai".to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

// ─── Config ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub provider: ProviderConfig,
}

impl Config {
    /// Load from a TOML file. A missing file yields defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self =
            toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config.validated())
    }

    /// Enforce `search_length ≤ match_length`.
    pub fn validated(mut self) -> Self {
        if self.engine.search_length > self.engine.match_length {
            warn!(
                search_length = self.engine.search_length,
                match_length = self.engine.match_length,
                "search_length exceeds match_length, clamping"
            );
            self.engine.search_length = self.engine.match_length;
        }
        self
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_consistent() {
        let config = Config::default();
        assert!(config.engine.search_length <= config.engine.match_length);
        assert_eq!(config.provider.kind, ProviderKind::Mistral);
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("codetab.toml")).unwrap();
        assert_eq!(config.engine.prefix_length, DEFAULT_PREFIX_LENGTH);
    }

    #[test]
    fn load_parses_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codetab.toml");
        std::fs::write(
            &path,
            "[engine]\nmatch_length = 50\n\n[provider]\nkind = \"simple\"\napi_base = \"http://localhost:9000\"\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.engine.match_length, 50);
        assert_eq!(config.engine.suffix_length, DEFAULT_SUFFIX_LENGTH);
        assert_eq!(config.provider.kind, ProviderKind::Simple);
        assert_eq!(config.provider.api_base, "http://localhost:9000");
    }

    #[test]
    fn search_length_clamped_to_match_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codetab.toml");
        std::fs::write(&path, "[engine]\nmatch_length = 10\nsearch_length = 40\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.engine.search_length, 10);
    }
}
