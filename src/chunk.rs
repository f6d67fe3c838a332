//! Recursive, overlapping text chunker.
//!
//! Splits normalized document text into [`Chunk`]s of at most `max_chars`
//! bytes. Split points prefer the largest available semantic boundary:
//! paragraph break, then sentence end, then whitespace, then a hard cut at
//! a character boundary. Consecutive chunks share `overlap` trailing bytes
//! of context to improve retrieval recall at segment boundaries.
//!
//! Each chunk records its byte offset in the source text for provenance.

use crate::models::Chunk;

const SENTENCE_ENDS: [&str; 3] = [". ", "! ", "? "];

/// Split `text` into chunks. `overlap` must be < `max_chars` (validated at
/// config load time). Empty or whitespace-only input yields no chunks.
pub fn split_text(source: &str, text: &str, max_chars: usize, overlap: usize) -> Vec<Chunk> {
    if max_chars == 0 || text.trim().is_empty() {
        return Vec::new();
    }

    let mut chunks: Vec<Chunk> = Vec::new();
    // End of the content covered so far. Each chunk's start backs off by
    // `overlap` from here; split points are only searched in fresh content
    // beyond it, so a boundary is never chosen twice.
    let mut cursor = 0usize;

    while cursor < text.len() {
        let mut start = floor_char_boundary(text, cursor.saturating_sub(overlap));
        if let Some(prev) = chunks.last() {
            if start <= prev.start_offset {
                // Keep offsets strictly increasing even when the previous
                // chunk was shorter than the overlap.
                start = cursor;
            }
        }

        let end = if text.len() - start <= max_chars {
            text.len()
        } else {
            let hard_end = floor_char_boundary(text, start + max_chars);
            if hard_end <= cursor {
                // Multibyte floor ate the whole fresh window (overlap very
                // close to max_chars); advance by one character.
                ceil_char_boundary(text, cursor + 1)
            } else {
                split_point(text, cursor, hard_end)
            }
        };

        chunks.push(Chunk {
            content: text[start..end].to_string(),
            source: source.to_string(),
            start_offset: start,
        });
        cursor = end;
    }

    chunks
}

/// Choose the split point in `(cursor, hard_end]`, preferring a paragraph
/// break, then a sentence end, then whitespace, falling back to `hard_end`.
fn split_point(text: &str, cursor: usize, hard_end: usize) -> usize {
    let window = &text[cursor..hard_end];

    if let Some(pos) = window.rfind("\n\n") {
        // Split after the break so its bytes stay with the leading chunk.
        return cursor + pos + 2;
    }

    if let Some(pos) = SENTENCE_ENDS
        .iter()
        .filter_map(|p| window.rfind(p).map(|i| i + p.len()))
        .max()
    {
        return cursor + pos;
    }

    if let Some(pos) = window.rfind(char::is_whitespace) {
        if pos > 0 {
            let ws_len = text[cursor + pos..].chars().next().map_or(1, char::len_utf8);
            return cursor + pos + ws_len;
        }
    }

    hard_end
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(split_text("doc", "", 100, 10).is_empty());
        assert!(split_text("doc", "   \n\n  ", 100, 10).is_empty());
    }

    #[test]
    fn short_text_single_chunk() {
        let chunks = split_text("doc", "Hello, world!", 100, 10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Hello, world!");
        assert_eq!(chunks[0].start_offset, 0);
        assert_eq!(chunks[0].source, "doc");
    }

    #[test]
    fn chunks_respect_max_chars() {
        let text = "word ".repeat(200);
        for chunk in split_text("doc", &text, 64, 16) {
            assert!(chunk.content.len() <= 64, "chunk too long: {}", chunk.content.len());
        }
    }

    #[test]
    fn offsets_strictly_increase_and_match_content() {
        let text = "First paragraph of some length.\n\nSecond paragraph, a bit longer than the first one.\n\nThird.";
        let chunks = split_text("doc", text, 40, 10);
        let mut prev = None;
        for chunk in &chunks {
            if let Some(p) = prev {
                assert!(chunk.start_offset > p);
            }
            prev = Some(chunk.start_offset);
            assert_eq!(
                &text[chunk.start_offset..chunk.start_offset + chunk.content.len()],
                chunk.content
            );
        }
    }

    #[test]
    fn coverage_has_no_gaps() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu nu xi omicron pi";
        let chunks = split_text("doc", text, 20, 5);
        assert!(!chunks.is_empty());
        assert_eq!(chunks[0].start_offset, 0);
        for pair in chunks.windows(2) {
            let prev_end = pair[0].start_offset + pair[0].content.len();
            assert!(
                pair[1].start_offset <= prev_end,
                "gap between chunks at {}..{}",
                prev_end,
                pair[1].start_offset
            );
        }
        let last = chunks.last().unwrap();
        assert_eq!(last.start_offset + last.content.len(), text.len());
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let text = "Short one.\n\nThis second paragraph is noticeably longer than the first.";
        let chunks = split_text("doc", text, 40, 0);
        assert!(chunks[0].content.ends_with("\n\n"));
        assert!(chunks[1].content.starts_with("This second"));
    }

    #[test]
    fn falls_back_to_sentence_boundaries() {
        let text = "One sentence here. Another sentence follows it. And then a third one rounds it out.";
        let chunks = split_text("doc", text, 50, 0);
        assert!(chunks.len() >= 2);
        assert!(chunks[0].content.ends_with(". "));
    }

    #[test]
    fn hard_cut_on_unbroken_text() {
        let text = "x".repeat(250);
        let chunks = split_text("doc", &text, 100, 0);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].content.len(), 100);
        assert_eq!(chunks[1].start_offset, 100);
    }

    #[test]
    fn overlap_repeats_trailing_context() {
        let text = "a".repeat(100) + " " + &"b".repeat(100);
        let chunks = split_text("doc", &text, 120, 20);
        assert_eq!(chunks.len(), 2);
        let first_end = chunks[0].start_offset + chunks[0].content.len();
        assert!(chunks[1].start_offset < first_end, "no overlap between chunks");
        assert_eq!(first_end - chunks[1].start_offset, 20);
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let text = "é".repeat(100);
        let chunks = split_text("doc", &text, 33, 5);
        for chunk in &chunks {
            assert!(chunk.content.len() <= 33);
            assert!(!chunk.content.is_empty());
        }
    }

    #[test]
    fn deterministic() {
        let text = "Alpha beta.\n\nGamma delta epsilon. Zeta eta theta iota kappa.";
        let a = split_text("doc", text, 30, 8);
        let b = split_text("doc", text, 30, 8);
        assert_eq!(a, b);
    }
}
