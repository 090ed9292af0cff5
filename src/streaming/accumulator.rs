//! Accumulates the streamed answer and keeps it well-formed markdown.
//!
//! The backend sends fragments of arbitrary length, so a heading or list
//! marker can be split across two chunks. Repairs therefore run over the
//! whole buffer after every chunk, and every repair is idempotent.

use regex::Regex;
use std::sync::OnceLock;

/// Payload that marks the end of the stream. Never part of the answer.
pub const DONE_SENTINEL: &str = "[DONE]";

static HEADING_MARKER: OnceLock<Regex> = OnceLock::new();
static LIST_MARKER: OnceLock<Regex> = OnceLock::new();

fn heading_marker() -> &'static Regex {
    // Whole runs, so "####" is a single marker and never split
    HEADING_MARKER.get_or_init(|| Regex::new(r"#{3,}").expect("static regex"))
}

fn list_marker() -> &'static Regex {
    LIST_MARKER.get_or_init(|| Regex::new(r"(?:- |• |\* )").expect("static regex"))
}

pub fn is_done_sentinel(raw: &str) -> bool {
    raw == DONE_SENTINEL
}

/// Turn the two-character sequence `\n` into a real line break
pub fn unescape_newlines(raw: &str) -> String {
    raw.replace("\\n", "\n")
}

/// Insert `insert` before every match of `marker` whose preceding character
/// is not a line break. Matches at the very start are left alone.
fn break_before(text: &str, marker: &Regex, insert: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut last = 0;
    for m in marker.find_iter(text) {
        let preceded_by_break = text[..m.start()].ends_with('\n');
        out.push_str(&text[last..m.start()]);
        if m.start() > 0 && !preceded_by_break {
            out.push_str(insert);
        }
        out.push_str(m.as_str());
        last = m.end();
    }
    out.push_str(&text[last..]);
    out
}

/// Blank line before headings, line break before list items.
///
/// `repair_markdown(repair_markdown(x)) == repair_markdown(x)` for every
/// input.
pub fn repair_markdown(text: &str) -> String {
    let text = break_before(text, heading_marker(), "\n\n");
    break_before(&text, list_marker(), "\n")
}

/// The mutable "answer so far"
#[derive(Debug, Default, Clone)]
pub struct StreamTextAccumulator {
    buffer: String,
    /// A chunk ended in a backslash that may start an escaped newline
    pending_backslash: bool,
    chunks: usize,
}

impl StreamTextAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one chunk and return the repaired text so far.
    ///
    /// The termination sentinel is not content and leaves the buffer
    /// untouched.
    pub fn append(&mut self, raw: &str) -> &str {
        if is_done_sentinel(raw) {
            return &self.buffer;
        }

        let mut raw = raw.to_string();
        if std::mem::take(&mut self.pending_backslash) {
            raw.insert(0, '\\');
        }
        if raw.ends_with('\\') && !raw.ends_with("\\\\") {
            raw.pop();
            self.pending_backslash = true;
        }

        let fragment = unescape_newlines(&raw);
        self.buffer.push_str(&fragment);
        self.buffer = repair_markdown(&self.buffer);
        self.chunks += 1;
        &self.buffer
    }

    /// Flush a held-back trailing backslash once no more chunks will come
    pub fn finish(&mut self) -> &str {
        if std::mem::take(&mut self.pending_backslash) {
            self.buffer.push('\\');
        }
        &self.buffer
    }

    /// Replace the whole buffer, used for the apology text
    pub fn replace(&mut self, text: &str) {
        self.buffer = text.to_string();
        self.pending_backslash = false;
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.pending_backslash = false;
        self.chunks = 0;
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Content chunks appended since the last clear
    pub fn chunk_count(&self) -> usize {
        self.chunks
    }
}
