// SPDX-License-Identifier: MIT
// Candidate matcher — decides whether any pooled generation can serve a new
// request, and what text to serve.
//
// Matching is purely textual: the new request's search anchor is looked up
// inside `record.anchor + record.buffer`, biased toward the original anchor
// boundary. Matches found only deep inside already-generated text are
// rejected — reusing those would splice the suggestion onto context the
// model never saw in that position.

use std::sync::Arc;

use crate::pool::{GenerationRecord, ResponsePool};

/// Result of cutting a record's text at the search-anchor match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CutMatch {
    /// Index into `anchor + buffer` just past the matched search anchor.
    pub cut_idx: usize,
    /// Everything after the cut — the reusable completion text.
    pub text: String,
}

/// A pooled record judged reusable for the current request.
pub struct Candidate {
    /// The cached text may be stale: the matched context is shorter than
    /// what conditioned the generation, so a fresh generation should be
    /// queued while this text is served (stale-while-revalidate).
    pub needs_regeneration: bool,
    /// Text to serve, before display filtering.
    pub text: String,
    pub record: Arc<GenerationRecord>,
    /// `cut_idx - anchor.len()`: negative means prefix chars were deleted
    /// since generation time, positive means typed chars already consumed
    /// part of the buffer.
    pub cursor_shift: i64,
}

/// Locate the search anchor inside `anchor + buffer`.
///
/// Only occurrences ending at or before `anchor.len() + search.len()` count;
/// the last such occurrence wins. Anything beyond that window is treated as
/// no match.
pub fn search_cut(search: &str, anchor: &str, buffer: &str) -> Option<CutMatch> {
    if search.is_empty() {
        return None;
    }

    let all: String = format!("{anchor}{buffer}");
    let mut window_end = (anchor.len() + search.len()).min(all.len());
    while !all.is_char_boundary(window_end) {
        window_end -= 1;
    }

    let idx = all[..window_end].rfind(search)?;
    let cut_idx = idx + search.len();
    Some(CutMatch {
        cut_idx,
        text: all[cut_idx..].to_string(),
    })
}

/// Pick the best reusable record from the pool, if any.
pub fn find_best_candidate(search: &str, pool: &ResponsePool) -> Option<Candidate> {
    pool.iter()
        .filter_map(|record| {
            let m = search_cut(search, &record.anchor, &record.buffer_snapshot())?;
            Some(Candidate {
                // A cut inside the anchor means the model saw a longer
                // prefix than what remains; its continuation may no longer
                // apply.
                needs_regeneration: m.cut_idx < record.anchor.len(),
                cursor_shift: m.cut_idx as i64 - record.anchor.len() as i64,
                text: m.text,
                record: record.clone(),
            })
        })
        .max_by(rank)
}

/// Ranking, best candidate greatest:
/// 1. no regeneration needed beats regeneration needed;
/// 2. if either shift is negative, the shift closer to zero wins (fewer
///    prefix chars deleted since generation started);
/// 3. longer candidate text wins.
fn rank(a: &Candidate, b: &Candidate) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    match (a.needs_regeneration, b.needs_regeneration) {
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        _ => {}
    }

    if (a.cursor_shift < 0 || b.cursor_shift < 0) && a.cursor_shift != b.cursor_shift {
        return a.cursor_shift.cmp(&b.cursor_shift);
    }

    a.text.len().cmp(&b.text.len())
}

// ─── Tests ────────────────────────────────────────────────────────────────────
