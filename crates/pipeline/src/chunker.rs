//! Sentence-boundary chunking
//!
//! Splits message text into pieces no longer than the configured character
//! budget, preferring the sentence-terminal punctuation nearest the budget.
//! Concatenating the chunks in order reconstructs the input modulo boundary
//! whitespace.

/// Characters that end a sentence for splitting purposes.
const SENTENCE_TERMINATORS: &[char] = &['。', '．', '！', '？', '.', '!', '?', '…', '\n'];

/// Split `text` into chunks of at most `max_chars` characters.
///
/// The split point is the last sentence terminator within the budget; when a
/// sentence exceeds the budget on its own it is hard-split at `max_chars`.
/// Chunk edges are trimmed; whitespace-only pieces are dropped. Non-empty
/// input always yields at least one chunk.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    // A zero budget would never advance; treat it as the minimum.
    let max_chars = max_chars.max(1);
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let window = (chars.len() - pos).min(max_chars);
        let end = if pos + window == chars.len() {
            // Remainder fits in one chunk.
            chars.len()
        } else {
            match last_terminator(&chars[pos..pos + window]) {
                Some(i) => pos + i + 1,
                None => pos + window,
            }
        };

        let piece: String = chars[pos..end].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }
        pos = end;
    }

    if chunks.is_empty() && !text.trim().is_empty() {
        chunks.push(text.trim().to_string());
    }
    chunks
}

fn last_terminator(window: &[char]) -> Option<usize> {
    window.iter().rposition(|c| SENTENCE_TERMINATORS.contains(c))
}
