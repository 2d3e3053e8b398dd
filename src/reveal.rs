//! Typewriter reveal of generated text
//!
//! Pure helpers; the SSE reveal stream drives them with a timer.

use std::time::Duration;

/// Time between revealed characters
pub const REVEAL_INTERVAL: Duration = Duration::from_millis(50);

/// First `elapsed_chars` characters of `full_text`.
///
/// Counts Unicode scalar values, never splits a character and saturates at
/// the whole text.
pub fn reveal_prefix(full_text: &str, elapsed_chars: usize) -> &str {
    match full_text.char_indices().nth(elapsed_chars) {
        Some((end, _)) => full_text.get(..end).unwrap_or(full_text),
        None => full_text,
    }
}

/// How long revealing the whole text takes
pub fn reveal_duration(full_text: &str) -> Duration {
    let chars = u32::try_from(full_text.chars().count()).unwrap_or(u32::MAX);
    REVEAL_INTERVAL.saturating_mul(chars)
}
