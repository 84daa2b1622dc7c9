// SPDX-License-Identifier: MIT
// Generation coordinator — turns a burst of overlapping completion requests
// into at most one concurrent provider call.
//
// A single-slot pending queue feeds a sequential processing loop. Each
// incoming request first tries to reuse a pooled response; failing that it
// either joins the active generation (identical anchor), or cancels it and
// takes its place. Served text always passes the display filter; fetched
// text is capped by the fetch budget.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures_util::StreamExt;
use tokio::sync::{watch, Notify};
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::config::{Config, EngineConfig};
use crate::filter::{display_filter, FetchBudget};
use crate::matcher::find_best_candidate;
use crate::pool::{GenerationRecord, ResponsePool};
use crate::providers::{self, CompletionProvider, ProviderError};

/// A candidate's offset may drift this far from the request cursor before a
/// background regeneration is queued alongside the reused text.
pub const REGEN_OFFSET_THRESHOLD: usize = 10;

/// What the editor hands over on each completion trigger.
#[derive(Debug, Clone)]
pub struct EditorContext {
    /// File identity; stored on records for diagnostics.
    pub file: String,
    /// Full document text.
    pub text: String,
    /// Cursor position as a char offset into `text`.
    pub cursor: usize,
}

struct PendingJob {
    record: Arc<GenerationRecord>,
    prefix: String,
    suffix: String,
}

struct EngineState {
    pool: ResponsePool,
    /// Single pending slot: enqueueing replaces any job that has not started.
    pending: Option<PendingJob>,
    /// The one record currently streaming from the provider.
    active: Option<Arc<GenerationRecord>>,
    next_id: u64,
}

struct EngineInner {
    config: EngineConfig,
    provider: Arc<dyn CompletionProvider>,
    state: Mutex<EngineState>,
    wake: Notify,
    stop: CancelToken,
    progress: watch::Sender<bool>,
}

/// The incremental completion engine.
///
/// Construction spawns the processing loop onto the current tokio runtime;
/// `shutdown` stops it. Clonable handle.
#[derive(Clone)]
pub struct CompletionEngine {
    inner: Arc<EngineInner>,
}

enum Plan {
    /// A pooled response covers the request; serve it right away.
    Serve(String),
    /// The active generation matches the anchor exactly; wait on it.
    Join(Arc<GenerationRecord>),
    /// A fresh generation was queued for this request; wait on it.
    Wait(Arc<GenerationRecord>),
}

impl CompletionEngine {
    pub fn new(config: EngineConfig, provider: Arc<dyn CompletionProvider>) -> Self {
        let (progress, _) = watch::channel(false);
        let inner = Arc::new(EngineInner {
            config,
            provider,
            state: Mutex::new(EngineState {
                pool: ResponsePool::new(),
                pending: None,
                active: None,
                next_id: 0,
            }),
            wake: Notify::new(),
            stop: CancelToken::new(),
            progress,
        });
        tokio::spawn(run_loop(inner.clone()));
        Self { inner }
    }

    /// Build engine plus provider client from a full [`Config`].
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let provider = providers::from_config(&config.provider)?;
        Ok(Self::new(config.engine.clone(), provider))
    }

    /// "Generation in progress" signal for UI feedback.
    pub fn progress(&self) -> watch::Receiver<bool> {
        self.inner.progress.subscribe()
    }

    /// Completed responses currently reusable.
    pub fn pool_size(&self) -> usize {
        self.inner.state.lock().unwrap().pool.len()
    }

    /// Stop the processing loop. Idempotent.
    pub fn shutdown(&self) {
        self.inner.stop.cancel();
    }

    /// Handle one completion trigger.
    ///
    /// Returns the text to insert at the cursor, or `None` when no
    /// suggestion is available (cancelled, superseded, or nothing usable).
    /// Provider failures never propagate: they degrade to `None` or to the
    /// partial text fetched before the failure.
    pub async fn complete(&self, ctx: &EditorContext, editor_token: &CancelToken) -> Option<String> {
        let cfg = &self.inner.config;
        let before = char_head(&ctx.text, ctx.cursor);
        let after = &ctx.text[before.len()..];
        let prefix = char_tail(before, cfg.prefix_length).to_string();
        let suffix = char_head(after, cfg.suffix_length).to_string();
        let anchor = char_tail(&prefix, cfg.match_length).to_string();
        let search_anchor = char_tail(&prefix, cfg.search_length).to_string();
        let offset = ctx.cursor;

        debug!(file = %ctx.file, offset, "completion requested");

        let plan = {
            let mut st = self.inner.state.lock().unwrap();
            st.pool.prune(offset, Instant::now());

            if let Some(candidate) = find_best_candidate(&search_anchor, &st.pool) {
                let regenerate = candidate.needs_regeneration
                    || candidate.record.offset.abs_diff(offset) > REGEN_OFFSET_THRESHOLD;
                debug!(
                    record = candidate.record.id,
                    regenerate, "reusing pooled response"
                );
                if regenerate {
                    let record = next_record(&mut st, ctx, offset, anchor.clone());
                    enqueue(&mut st, &self.inner.wake, PendingJob { record, prefix, suffix });
                }
                Plan::Serve(display_filter(&candidate.text))
            } else if let Some(active) = st.active.clone().filter(|a| a.anchor == anchor) {
                debug!(record = active.id, "joining active generation");
                Plan::Join(active)
            } else {
                if let Some(active) = &st.active {
                    debug!(record = active.id, "cancelling mismatched active generation");
                    active.token.cancel();
                }
                let record = next_record(&mut st, ctx, offset, anchor);
                debug!(record = record.id, "queueing generation");
                enqueue(
                    &mut st,
                    &self.inner.wake,
                    PendingJob { record: record.clone(), prefix, suffix },
                );
                Plan::Wait(record)
            }
        };

        match plan {
            Plan::Serve(text) => Some(text),
            Plan::Join(record) => {
                if !self.wait_finished(&record).await {
                    return None;
                }
                if editor_token.is_cancelled() {
                    debug!(record = record.id, "editor cancelled while joining");
                    return None;
                }
                Some(display_filter(&record.buffer_snapshot()))
            }
            Plan::Wait(record) => {
                if !self.wait_finished(&record).await {
                    return None;
                }
                if editor_token.is_cancelled() || !record.generation_done() {
                    debug!(record = record.id, "no usable result");
                    return None;
                }
                Some(display_filter(&record.buffer_snapshot()))
            }
        }
    }

    /// Wait for the record to finish. Returns `false` when the engine was
    /// shut down first; the record will never finish once the loop is gone.
    async fn wait_finished(&self, record: &GenerationRecord) -> bool {
        tokio::select! {
            _ = record.finished() => true,
            _ = self.inner.stop.cancelled() => {
                debug!(record = record.id, "engine stopped while waiting");
                false
            }
        }
    }
}

fn next_record(
    st: &mut EngineState,
    ctx: &EditorContext,
    offset: usize,
    anchor: String,
) -> Arc<GenerationRecord> {
    let id = st.next_id;
    st.next_id += 1;
    Arc::new(GenerationRecord::new(id, ctx.file.clone(), offset, anchor))
}

/// Replace the pending slot and wake the loop. The superseded record's
/// waiters unblock with no result.
fn enqueue(st: &mut EngineState, wake: &Notify, job: PendingJob) {
    if let Some(old) = st.pending.replace(job) {
        debug!(record = old.record.id, "pending generation superseded");
        old.record.finish_superseded();
    }
    wake.notify_one();
}

// ─── Processing loop ──────────────────────────────────────────────────────────

async fn run_loop(inner: Arc<EngineInner>) {
    debug!("completion request loop started");
    loop {
        tokio::select! {
            _ = inner.wake.notified() => {}
            _ = inner.stop.cancelled() => {}
        }
        if inner.stop.is_cancelled() {
            // Unblock any caller parked behind the pending slot.
            let pending = inner.state.lock().unwrap().pending.take();
            if let Some(job) = pending {
                debug!(record = job.record.id, "pending generation dropped at shutdown");
                job.record.finish_superseded();
            }
            debug!("stop requested, exiting request loop");
            break;
        }

        let job = {
            let mut st = inner.state.lock().unwrap();
            match st.pending.take() {
                Some(job) => {
                    st.active = Some(job.record.clone());
                    job
                }
                None => continue,
            }
        };

        inner.progress.send_replace(true);
        debug!(record = job.record.id, "generation started");

        if let Err(e) = generate_into(&inner, &job).await {
            warn!(record = job.record.id, error = %e, "generation failed, keeping partial buffer");
        }

        {
            let mut st = inner.state.lock().unwrap();
            st.active = None;
            st.pool.push(job.record.clone());
        }
        job.record.finish_done();
        inner.progress.send_replace(false);
        debug!(record = job.record.id, "generation finished");
    }
}

/// Stream provider chars into the record's buffer, cancelling the call once
/// the fetch budget is spent.
async fn generate_into(inner: &EngineInner, job: &PendingJob) -> Result<(), ProviderError> {
    let mut chars = inner
        .provider
        .completion_stream(&job.prefix, &job.suffix, &job.record.token)
        .await?;

    let mut budget = FetchBudget::new();
    while let Some(c) = chars.next().await {
        if job.record.token.is_cancelled() {
            debug!(record = job.record.id, "generation cancelled");
            break;
        }
        if !budget.admit(c) {
            debug!(record = job.record.id, "fetch word cap reached");
            job.record.token.cancel();
            break;
        }
        job.record.append(c);
    }
    Ok(())
}

// ─── Char-window helpers ──────────────────────────────────────────────────────

/// First `n` chars of `s`.
fn char_head(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

/// Last `n` chars of `s`.
fn char_tail(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match s.char_indices().rev().nth(n - 1) {
        Some((i, _)) => &s[i..],
        None => s,
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
