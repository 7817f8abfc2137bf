//! Overlapping-window text chunker.
//!
//! Splits document text into fixed-size character windows with a
//! configurable overlap fraction, so evidence near a boundary appears in
//! two adjacent chunks. Windows prefer to break at whitespace and receive
//! contiguous sequence indices starting at 0.
//!
//! Each window carries a SHA-256 hash of its text for staleness detection
//! on re-upsert.

use sha2::{Digest, Sha256};

/// One text window plus its position within the document.
#[derive(Debug, Clone)]
pub struct Window {
    pub sequence_index: usize,
    pub text: String,
    pub hash: String,
}

/// Split `text` into overlapping windows of at most `window_chars`
/// characters, each overlapping the previous by `overlap_fraction` of the
/// window size. Always returns at least one window for non-empty input.
pub fn chunk_text(text: &str, window_chars: usize, overlap_fraction: f64) -> Vec<Window> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let window_chars = window_chars.max(1);
    let overlap = ((window_chars as f64) * overlap_fraction) as usize;
    // Stride must advance, whatever the overlap config says
    let stride = (window_chars - overlap.min(window_chars - 1)).max(1);

    let mut windows = Vec::new();
    let mut start = 0usize;
    let mut index = 0usize;

    while start < text.len() {
        let hard_end = byte_floor(text, (start + window_chars).min(text.len()));

        // Prefer a whitespace break when we are mid-text
        let end = if hard_end < text.len() {
            text[start..hard_end]
                .rfind(char::is_whitespace)
                .filter(|pos| *pos > 0)
                .map(|pos| start + pos)
                .unwrap_or(hard_end)
        } else {
            hard_end
        };

        let piece = text[start..end].trim();
        if !piece.is_empty() {
            windows.push(make_window(index, piece));
            index += 1;
        }

        if end >= text.len() {
            break;
        }
        let next = byte_floor(text, start + stride.min(end - start).max(1));
        // Guarantee forward progress even when flooring lands back on start
        start = if next > start {
            next
        } else {
            byte_ceil(text, start + 1)
        };
    }

    if windows.is_empty() {
        windows.push(make_window(0, text));
    }

    windows
}

fn make_window(index: usize, text: &str) -> Window {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    Window {
        sequence_index: index,
        text: text.to_string(),
        hash: format!("{:x}", hasher.finalize()),
    }
}

/// Largest char boundary <= `i`.
fn byte_floor(text: &str, mut i: usize) -> usize {
    while i > 0 && !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Smallest char boundary >= `i`, capped at the text length.
fn byte_ceil(text: &str, mut i: usize) -> usize {
    while i < text.len() && !text.is_char_boundary(i) {
        i += 1;
    }
    i.min(text.len())
}
