//! Query chunking
//!
//! The portal's search endpoint accepts many space-separated terms per
//! request but caps the query string length. These helpers turn a raw query
//! into deduplicated terms and pack them greedily into chunks that respect
//! the character budget, so each chunk can be submitted as one request.

/// Split a raw query into search terms
///
/// Tokenizes on whitespace, drops empty tokens, and deduplicates while
/// preserving first-seen order. Chunking itself never deduplicates; this is
/// the one place duplicate terms are removed.
pub fn make_term_list(raw: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    raw.split_whitespace()
        .filter(|term| seen.insert(term.to_string()))
        .map(str::to_string)
        .collect()
}

/// Pack terms into chunks bounded by a joined-length character budget
///
/// Greedy left-to-right: a term joins the current chunk if the space-joined
/// length stays within `max_chars` (boundary inclusive); otherwise the chunk
/// is closed and the term starts a new one. A single term longer than the
/// budget is isolated in its own chunk rather than split or dropped — the
/// caller gets to decide what to do with it. The final partial chunk is
/// always emitted.
///
/// Order is preserved: flattening the output reproduces the input exactly.
pub fn chunk_by_char_budget(terms: &[String], max_chars: usize) -> Vec<Vec<String>> {
    let mut chunks: Vec<Vec<String>> = Vec::new();
    let mut chunk: Vec<String> = Vec::new();
    let mut chunk_len = 0usize; // space-joined length of `chunk`

    for term in terms {
        let candidate_len = if chunk.is_empty() {
            term.len()
        } else {
            chunk_len + 1 + term.len()
        };
        if candidate_len > max_chars && !chunk.is_empty() {
            chunks.push(std::mem::take(&mut chunk));
            chunk_len = term.len();
            chunk.push(term.clone());
        } else {
            chunk_len = candidate_len;
            chunk.push(term.clone());
        }
    }

    if !chunk.is_empty() {
        chunks.push(chunk);
    }
    chunks
}
