// SPDX-License-Identifier: MIT
// Stream filter — bounds what is fetched from the provider and what is shown
// to the editor.
//
// Two independent gates over the same word-counting machinery:
//   fetch budget   — stop pulling chars from the network once a tenth word
//                    begins (resource cap, never truncates for display);
//   display filter — show leading punctuation plus the first word and its
//                    trailing punctuation, stopping the instant a second
//                    word-run or a line break appears.

/// Characters that never belong to a word.
const NON_WORD_CHARS: &str = " \t\r\n()[]{}'\"`+-*/~!%^&|;:.,";

/// Word-count ceiling while fetching from the provider.
pub const FETCH_WORD_CAP: u32 = 9;

/// Word-count ceiling while serving text to the editor.
const DISPLAY_WORD_CAP: u32 = 1;

fn is_word_char(c: char) -> bool {
    !NON_WORD_CHARS.contains(c)
}

/// Streaming word tally.
///
/// The count is pre-seeded at 1: word 1 is considered implicitly open, so a
/// stream that begins mid-word does not fire an event for its initial run.
/// Every later word-run start fires one event and bumps the count.
#[derive(Debug)]
struct WordTally {
    count: u32,
    in_word: bool,
    seen_any: bool,
}

impl WordTally {
    fn new() -> Self {
        Self {
            count: 1,
            in_word: false,
            seen_any: false,
        }
    }

    /// Feed one character. Returns `true` when `c` fires a word-start event.
    fn observe(&mut self, c: char) -> bool {
        let first = !self.seen_any;
        self.seen_any = true;

        if is_word_char(c) {
            if !self.in_word {
                self.in_word = true;
                if !first {
                    self.count += 1;
                    return true;
                }
            }
        } else {
            self.in_word = false;
        }
        false
    }

    fn count(&self) -> u32 {
        self.count
    }
}

// ─── Fetch budget ─────────────────────────────────────────────────────────────

/// Resource gate applied while accumulating a generation into its buffer.
///
/// The generation loop feeds every streamed char through `admit`; the first
/// refusal means the word cap was hit and the provider call should be
/// cancelled. Refusal is sticky.
pub struct FetchBudget {
    tally: WordTally,
    exhausted: bool,
}

impl FetchBudget {
    pub fn new() -> Self {
        Self {
            tally: WordTally::new(),
            exhausted: false,
        }
    }

    /// Whether `c` may still be appended to the buffer.
    pub fn admit(&mut self, c: char) -> bool {
        if self.exhausted {
            return false;
        }
        if self.tally.observe(c) && self.tally.count() > FETCH_WORD_CAP {
            self.exhausted = true;
            return false;
        }
        true
    }
}

impl Default for FetchBudget {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Display filter ───────────────────────────────────────────────────────────

/// Cut a generated text down to what is worth showing inline.
///
/// Output ends right before the second word-run begins, or at the first line
/// break past the opening character — whichever comes first. Leading
/// punctuation and the first word (with any punctuation glued to it) always
/// pass through.
pub fn display_filter(text: &str) -> String {
    let mut tally = WordTally::new();
    let mut out = String::new();

    for (i, c) in text.chars().enumerate() {
        if (c == '\n' || c == '\r') && i > 0 {
            break;
        }
        if tally.observe(c) && tally.count() > DISPLAY_WORD_CAP {
            break;
        }
        out.push(c);
    }
    out
}

// ─── Tests ────────────────────────────────────────────────────────────────────
