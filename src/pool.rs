// SPDX-License-Identifier: MIT
// Response pool — bounded set of generation records reusable by later
// requests.
//
// Records are created by the engine when a request is accepted for
// generation and enter the pool once their provider call has ended. Pruning
// is lazy: it runs once per incoming request, never on a timer, and only
// changes membership.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::cancel::CancelToken;

/// Records further than this many chars from the current cursor are stale.
pub const MAX_OFFSET_DRIFT: usize = 30;

/// Records older than this are stale.
pub const MAX_AGE: Duration = Duration::from_secs(30);

/// One generation attempt: the context it was conditioned on plus the text
/// accumulated from the provider stream.
///
/// Single-writer discipline: only the engine's generation loop appends to
/// the buffer or marks the record done. Everything else reads.
pub struct GenerationRecord {
    /// Strictly increasing, never reused.
    pub id: u64,
    /// File the generation was computed for.
    pub file: String,
    /// Cursor char-offset the generation was computed for.
    pub offset: usize,
    /// Trailing prefix text the generation was conditioned on.
    pub anchor: String,
    /// Creation time, drives age pruning.
    pub created_at: Instant,
    /// Cancels the in-flight provider call for this record.
    pub token: CancelToken,

    state: Mutex<RecordState>,
    finished_tx: watch::Sender<bool>,
}

#[derive(Default)]
struct RecordState {
    buffer: String,
    /// True once the provider call ended — success, filtered stop,
    /// transport error, or cancellation. A superseded queued record is
    /// finished without this ever becoming true.
    generation_done: bool,
}

impl GenerationRecord {
    pub fn new(id: u64, file: String, offset: usize, anchor: String) -> Self {
        let (finished_tx, _) = watch::channel(false);
        Self {
            id,
            file,
            offset,
            anchor,
            created_at: Instant::now(),
            token: CancelToken::new(),
            state: Mutex::new(RecordState::default()),
            finished_tx,
        }
    }

    /// Append streamed chars. Called only by the active generation.
    pub fn append(&self, c: char) {
        self.state.lock().unwrap().buffer.push(c);
    }

    pub fn buffer_snapshot(&self) -> String {
        self.state.lock().unwrap().buffer.clone()
    }

    pub fn generation_done(&self) -> bool {
        self.state.lock().unwrap().generation_done
    }

    /// Mark the generation as ended and wake every waiter.
    pub fn finish_done(&self) {
        self.state.lock().unwrap().generation_done = true;
        self.finished_tx.send_replace(true);
    }

    /// Wake waiters without a usable result (queued record replaced before
    /// its generation ever started).
    pub fn finish_superseded(&self) {
        self.finished_tx.send_replace(true);
    }

    /// Resolves once the record is finished — done or superseded. Resolves
    /// immediately for waiters arriving after the fact.
    pub async fn finished(&self) {
        let mut rx = self.finished_tx.subscribe();
        let _ = rx.wait_for(|finished| *finished).await;
    }
}

impl std::fmt::Debug for GenerationRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationRecord")
            .field("id", &self.id)
            .field("file", &self.file)
            .field("offset", &self.offset)
            .field("done", &self.generation_done())
            .finish()
    }
}

// ─── ResponsePool ─────────────────────────────────────────────────────────────

/// Completed generation records, pruned lazily against each new request.
#[derive(Default)]
pub struct ResponsePool {
    records: Vec<std::sync::Arc<GenerationRecord>>,
}

impl ResponsePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop records whose offset drifted more than [`MAX_OFFSET_DRIFT`] chars
    /// from the current cursor or that are older than [`MAX_AGE`].
    pub fn prune(&mut self, current_offset: usize, now: Instant) {
        self.records.retain(|record| {
            record.offset.abs_diff(current_offset) <= MAX_OFFSET_DRIFT
                && now.duration_since(record.created_at) <= MAX_AGE
        });
    }

    /// Add a finished record. Idempotent per record id.
    pub fn push(&mut self, record: std::sync::Arc<GenerationRecord>) {
        if self.records.iter().all(|r| r.id != record.id) {
            self.records.push(record);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &std::sync::Arc<GenerationRecord>> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
