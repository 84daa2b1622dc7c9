// SPDX-License-Identifier: MIT
// codetab — incremental inline code-completion engine.
//
// Turns rapid, overlapping completion requests into at most one concurrent
// LLM generation call, reusing partial or complete results from prior calls
// whenever the typed text is still consistent with what was generated.

pub mod cancel;
pub mod config;
pub mod engine;
pub mod filter;
pub mod matcher;
pub mod pool;
pub mod providers;

pub use cancel::CancelToken;
pub use config::{Config, EngineConfig, ProviderConfig, ProviderKind};
pub use engine::{CompletionEngine, EditorContext};
pub use providers::{CompletionProvider, ProviderError};
